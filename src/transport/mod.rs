//! # Transport Layer
//!
//! A [`Transport`] is a blocking, byte-oriented duplex channel over one physical or
//! virtual medium. Protocols frame bytes on top of it; the transport knows nothing
//! about frames.
//!
//! ## Contract
//!
//! - `read` blocks until at least one byte is available and returns the count.
//!   `Ok(0)` means end of stream: the peer went away or the transport was closed.
//! - `write` may accept fewer bytes than offered; use [`write_all`] to push a frame.
//! - `close` is idempotent and must make a `read` blocked in another thread return
//!   promptly with `Ok(0)`.
//! - I/O failures surface as [`LinkError`](crate::error::LinkError); retry and
//!   reconnect are the application's business.
//!
//! ## Media
//!
//! | Type          | Implementation                           |
//! |---------------|------------------------------------------|
//! | `loopback`    | [`Loopback`]                             |
//! | `usb`         | `SerialTransport` (feature `serial`)     |
//! | `bluetooth`   | `SerialTransport` on an RFCOMM tty       |
//! | `tcp_ip`      | [`TcpIpTransport`]                       |
//! | `ble`         | [`BleTransport`] over a [`GattLink`]     |
//! | `sound_modem` | [`SoundModem`] or [`SoundModemFsk`]      |

use crate::error::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

mod ble;
mod channel;
pub mod factory;
mod loopback;
pub mod mock;
#[cfg(feature = "serial")]
mod serial;
mod sound_modem;
mod tcp;

pub(crate) use channel::ByteQueue;
pub use ble::{BleTransport, GattLink, NUS_RX_CHAR_UUID, NUS_SERVICE_UUID, NUS_TX_CHAR_UUID};
pub use factory::TransportFactory;
pub use loopback::Loopback;
#[cfg(feature = "serial")]
pub use serial::SerialTransport;
pub use sound_modem::{ModemPort, SoundModem, SoundModemFsk};
pub use tcp::TcpIpTransport;

/// Byte channel over one medium.
pub trait Transport: Send + Sync {
    /// Concrete implementation behind this handle
    fn kind(&self) -> TransportKind;

    /// Endpoint name supplied by the device handler (port path, peer address, ...)
    fn name(&self) -> &str;

    /// Read into `buffer`, blocking until data arrives. `Ok(0)` is end of stream.
    fn read(&self, buffer: &mut [u8]) -> Result<usize>;

    /// Write from `data`, returns number of bytes accepted
    fn write(&self, data: &[u8]) -> Result<usize>;

    /// Push any bytes buffered below us out to the medium
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Release the channel. Safe to call more than once.
    fn close(&self) -> Result<()>;
}

/// Write the whole of `data`, looping over short writes.
pub fn write_all(transport: &dyn Transport, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        let n = transport.write(data)?;
        if n == 0 {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("{} accepted no bytes", transport.name()),
            )));
        }
        data = &data[n..];
    }
    Ok(())
}

/// Configured medium, as selected in `[transport].type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Usb,
    Bluetooth,
    Loopback,
    TcpIp,
    Ble,
    SoundModem,
}

impl TransportType {
    pub const ALL: [TransportType; 6] = [
        TransportType::Usb,
        TransportType::Bluetooth,
        TransportType::Loopback,
        TransportType::TcpIp,
        TransportType::Ble,
        TransportType::SoundModem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportType::Usb => "usb",
            TransportType::Bluetooth => "bluetooth",
            TransportType::Loopback => "loopback",
            TransportType::TcpIp => "tcp_ip",
            TransportType::Ble => "ble",
            TransportType::SoundModem => "sound_modem",
        }
    }

    /// Lenient parse of a settings value. Absent or unknown values yield `None`
    /// and the factory falls back to loopback.
    pub fn from_setting(value: Option<&str>) -> Option<TransportType> {
        let value = value?;
        match value.parse() {
            Ok(t) => Some(t),
            Err(_) => {
                log::warn!(
                    "Unknown transport type '{}', falling back to loopback",
                    crate::logutil::escape_log(value)
                );
                None
            }
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportType {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        TransportType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| LinkError::InvalidSetting(format!("transport type '{}'", s)))
    }
}

/// Concrete transport implementation. The sound modem type splits in two here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Loopback,
    UsbSerial,
    Bluetooth,
    TcpIp,
    Ble,
    SoundModem,
    SoundModemFsk,
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
