//! # Codec2 speech codec sessions
//!
//! A [`CodecSession`] owns one codec engine and the two buffers sized from it: the
//! encode buffer holds one compressed frame, the decode buffer one PCM frame.
//! They are created together and dropped together, so a session can never be
//! half-torn-down and buffer sizes can never drift from the engine's mode.
//!
//! The engine sits behind [`SpeechCodec`]; the default [`Codec2Engine`] wraps the
//! `codec2` crate. A [`CodecFactory`] decides which engine a session gets, which is
//! how tests substitute an instrumented codec.

use crate::error::{LinkError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Codec2 operating modes. `id` is the native mode number carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecMode {
    Mode3200,
    Mode2400,
    Mode1600,
    Mode1400,
    Mode1300,
    Mode1200,
}

impl CodecMode {
    pub const ALL: [CodecMode; 6] = [
        CodecMode::Mode3200,
        CodecMode::Mode2400,
        CodecMode::Mode1600,
        CodecMode::Mode1400,
        CodecMode::Mode1300,
        CodecMode::Mode1200,
    ];

    pub fn id(&self) -> u8 {
        match self {
            CodecMode::Mode3200 => 0,
            CodecMode::Mode2400 => 1,
            CodecMode::Mode1600 => 2,
            CodecMode::Mode1400 => 3,
            CodecMode::Mode1300 => 4,
            CodecMode::Mode1200 => 5,
        }
    }

    pub fn from_id(id: u8) -> Option<CodecMode> {
        CodecMode::ALL.into_iter().find(|m| m.id() == id)
    }

    pub fn bitrate(&self) -> u32 {
        match self {
            CodecMode::Mode3200 => 3200,
            CodecMode::Mode2400 => 2400,
            CodecMode::Mode1600 => 1600,
            CodecMode::Mode1400 => 1400,
            CodecMode::Mode1300 => 1300,
            CodecMode::Mode1200 => 1200,
        }
    }

    pub fn from_bitrate(bitrate: u32) -> Option<CodecMode> {
        CodecMode::ALL.into_iter().find(|m| m.bitrate() == bitrate)
    }
}

impl fmt::Display for CodecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bitrate())
    }
}

/// One native codec handle bound to a single mode.
pub trait SpeechCodec: Send {
    fn mode(&self) -> CodecMode;

    /// PCM samples (8 kHz, 16-bit) per frame
    fn samples_per_frame(&self) -> usize;

    /// Packed bytes per compressed frame
    fn bytes_per_frame(&self) -> usize;

    /// Compress exactly one PCM frame into `bits`.
    fn encode(&mut self, bits: &mut [u8], pcm: &[i16]);

    /// Expand exactly one compressed frame into `pcm`.
    fn decode(&mut self, pcm: &mut [i16], bits: &[u8]);
}

/// Codec2 engine from the `codec2` crate.
pub struct Codec2Engine {
    mode: CodecMode,
    inner: codec2::Codec2,
}

impl Codec2Engine {
    pub fn new(mode: CodecMode) -> Self {
        let native = match mode {
            CodecMode::Mode3200 => codec2::Codec2Mode::MODE_3200,
            CodecMode::Mode2400 => codec2::Codec2Mode::MODE_2400,
            CodecMode::Mode1600 => codec2::Codec2Mode::MODE_1600,
            CodecMode::Mode1400 => codec2::Codec2Mode::MODE_1400,
            CodecMode::Mode1300 => codec2::Codec2Mode::MODE_1300,
            CodecMode::Mode1200 => codec2::Codec2Mode::MODE_1200,
        };
        Self {
            mode,
            inner: codec2::Codec2::new(native),
        }
    }
}

impl SpeechCodec for Codec2Engine {
    fn mode(&self) -> CodecMode {
        self.mode
    }

    fn samples_per_frame(&self) -> usize {
        self.inner.samples_per_frame()
    }

    fn bytes_per_frame(&self) -> usize {
        self.inner.bits_per_frame().div_ceil(8)
    }

    fn encode(&mut self, bits: &mut [u8], pcm: &[i16]) {
        self.inner.encode(bits, pcm);
    }

    fn decode(&mut self, pcm: &mut [i16], bits: &[u8]) {
        self.inner.decode(pcm, bits);
    }
}

/// Creates the engine for a session.
pub type CodecFactory = Arc<dyn Fn(CodecMode) -> Result<Box<dyn SpeechCodec>> + Send + Sync>;

/// Factory producing [`Codec2Engine`]s.
pub fn codec2_factory() -> CodecFactory {
    Arc::new(|mode| Ok(Box::new(Codec2Engine::new(mode)) as Box<dyn SpeechCodec>))
}

/// Codec handle plus its encode and decode buffers.
pub struct CodecSession {
    codec: Box<dyn SpeechCodec>,
    encoded: Vec<u8>,
    decoded: Vec<i16>,
}

impl CodecSession {
    pub fn open(mode: CodecMode, factory: &CodecFactory) -> Result<Self> {
        let codec = factory(mode)?;
        let samples = codec.samples_per_frame();
        let bytes = codec.bytes_per_frame();
        if samples == 0 || bytes == 0 {
            return Err(LinkError::Codec(format!(
                "mode {} reports an empty frame ({} samples, {} bytes)",
                mode, samples, bytes
            )));
        }
        debug!(
            "Created codec2 session: mode {}, {} samples -> {} bytes per frame",
            mode, samples, bytes
        );
        Ok(Self {
            codec,
            encoded: vec![0; bytes],
            decoded: vec![0; samples],
        })
    }

    pub fn mode(&self) -> CodecMode {
        self.codec.mode()
    }

    pub fn samples_per_frame(&self) -> usize {
        self.decoded.len()
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.encoded.len()
    }

    /// Compress one PCM frame. The returned slice is the session's encode buffer.
    pub fn encode(&mut self, pcm: &[i16]) -> Result<&[u8]> {
        if pcm.len() != self.decoded.len() {
            return Err(LinkError::FrameSize {
                expected: self.decoded.len(),
                actual: pcm.len(),
            });
        }
        self.codec.encode(&mut self.encoded, pcm);
        Ok(&self.encoded)
    }

    /// Expand one compressed frame. The returned slice is the session's decode buffer.
    pub fn decode(&mut self, bits: &[u8]) -> Result<&[i16]> {
        if bits.len() != self.encoded.len() {
            return Err(LinkError::FrameSize {
                expected: self.encoded.len(),
                actual: bits.len(),
            });
        }
        self.codec.decode(&mut self.decoded, bits);
        Ok(&self.decoded)
    }
}

impl Drop for CodecSession {
    fn drop(&mut self) {
        debug!("Destroyed codec2 session (mode {})", self.codec.mode());
    }
}
