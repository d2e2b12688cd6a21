//! # Protocol Layer
//!
//! A [`Protocol`] frames application traffic onto a [`Transport`] and decodes
//! inbound bytes into [`Callback`] events. Leaf protocols own the transport they
//! are initialized with; decorators own the protocol they wrap and present the
//! same trait, so the application always holds exactly one top-level handle:
//!
//! ```text
//! Transport -> Raw | Kiss | KissParrot -> (optional) AudioCodec2
//! ```
//!
//! ## Supported operations
//!
//! | Operation                | Raw | Kiss / KissParrot | AudioCodec2 |
//! |--------------------------|-----|-------------------|-------------|
//! | `send_position`          | no  | yes               | no          |
//! | `send_data`              | yes | yes               | inner       |
//! | `send_compressed_audio`  | yes | yes               | no          |
//! | `send_pcm_audio`         | no  | no                | yes         |
//!
//! "no" is [`LinkError::Unsupported`](crate::error::LinkError::Unsupported),
//! returned before anything is written or any state is touched.
//!
//! ## Concurrency
//!
//! All operations take `&self`. One thread may sit in `receive` while others send,
//! and `close` from any thread makes a blocked `receive` return.

use crate::codec::CodecMode;
use crate::error::{LinkError, Result};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

mod audio_codec2;
mod callback;
pub mod envelope;
mod factory;
pub mod kiss;
mod raw;

pub use audio_codec2::AudioCodec2;
pub use callback::{Callback, EventSink, LinkEvent};
pub use factory::ProtocolFactory;
pub use kiss::{Kiss, KissParrot};
pub use raw::Raw;

pub trait Protocol: Send + Sync {
    /// Bind the transport. Must be called once before any other operation.
    fn initialize(&mut self, transport: Box<dyn Transport>) -> Result<()>;

    /// PCM samples per audio frame, when this stage transcodes audio.
    fn pcm_frame_size(&self) -> Option<usize> {
        None
    }

    fn send_position(
        &self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        bearing: f32,
        comment: &str,
    ) -> Result<bool>;

    fn send_data(&self, src: &str, dst: &str, data: &[u8]) -> Result<bool>;

    /// Send one already encoded codec frame.
    fn send_compressed_audio(
        &self,
        src: &str,
        dst: &str,
        codec_mode: CodecMode,
        frame: &[u8],
    ) -> Result<bool>;

    /// Send one PCM frame; only stages that own a codec accept this.
    fn send_pcm_audio(&self, src: &str, dst: &str, pcm: &[i16]) -> Result<bool>;

    /// Block until one inbound unit is decoded and reported to `callback`.
    ///
    /// Returns `Ok(true)` when an event was delivered and the caller should keep
    /// looping, `Ok(false)` at end of stream.
    fn receive(&self, callback: &mut dyn Callback) -> Result<bool>;

    fn flush(&self) -> Result<()>;

    /// Release this stage and everything below it. Idempotent.
    fn close(&self) -> Result<()>;
}

/// Configured framing, as selected in `[protocol].type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolType {
    Raw,
    Kiss,
    KissParrot,
}

impl ProtocolType {
    pub const ALL: [ProtocolType; 3] = [
        ProtocolType::Raw,
        ProtocolType::Kiss,
        ProtocolType::KissParrot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolType::Raw => "raw",
            ProtocolType::Kiss => "kiss",
            ProtocolType::KissParrot => "kiss_parrot",
        }
    }

    /// Lenient parse of a settings value. Absent or unknown values yield `None`
    /// and the factory falls back to raw.
    pub fn from_setting(value: Option<&str>) -> Option<ProtocolType> {
        let value = value?;
        match value.parse() {
            Ok(t) => Some(t),
            Err(_) => {
                log::warn!(
                    "Unknown protocol type '{}', falling back to raw",
                    crate::logutil::escape_log(value)
                );
                None
            }
        }
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtocolType {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ProtocolType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| LinkError::InvalidSetting(format!("protocol type '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_type_names() {
        for t in ProtocolType::ALL {
            assert_eq!(t.as_str().parse::<ProtocolType>().unwrap(), t);
        }
        assert_eq!(
            ProtocolType::from_setting(Some("KISS_PARROT")),
            Some(ProtocolType::KissParrot)
        );
        assert_eq!(ProtocolType::from_setting(Some("ax25")), None);
        assert_eq!(ProtocolType::from_setting(None), None);
    }
}
