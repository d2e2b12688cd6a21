//! Error types shared by every layer of the link stack.
//!
//! Frame decode failures are absent: a garbled frame is reported through
//! [`Callback::on_protocol_rx_error`](crate::protocol::Callback::on_protocol_rx_error)
//! and the receive loop keeps going.

/// Result type alias
pub type Result<T> = std::result::Result<T, LinkError>;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// I/O error on the underlying medium
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error (USB serial, Bluetooth RFCOMM tty)
    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Write attempted on a transport that has been closed
    #[error("transport closed")]
    Closed,

    /// Send or receive before `initialize` bound a transport
    #[error("protocol not initialized")]
    NotInitialized,

    /// The pipeline cannot perform this operation (e.g. PCM audio without a codec)
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// Audio frame does not match the codec session's frame shape
    #[error("frame size mismatch: expected {expected}, got {actual}")]
    FrameSize { expected: usize, actual: usize },

    /// Codec session could not be created or is gone
    #[error("codec error: {0}")]
    Codec(String),

    /// Configuration value that cannot be used
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

impl LinkError {
    /// True for contract violations, as opposed to medium or lifecycle failures.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, LinkError::Unsupported(_))
    }
}
