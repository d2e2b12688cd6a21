//! # Codec2 voice decorator
//!
//! [`AudioCodec2`] wraps another [`Protocol`] and adds speech transcoding in both
//! directions: PCM sent through it is compressed and handed to the inner
//! protocol's compressed-audio send; compressed audio received from below is
//! expanded and delivered as PCM. Data, signal level and RX errors pass through
//! untouched.
//!
//! Pre-encoded audio and position reports are refused: the first would be encoded
//! twice, the second is not voice. Use the inner protocol directly for those.
//!
//! ## Session lifecycle
//!
//! The codec handle and its two buffers live in one [`CodecSession`] behind a
//! mutex. Changing mode drops the old session before the new one is opened; `close`
//! drops it and closes the inner protocol, each exactly once. Encode, decode and
//! reconfiguration all take the same lock, so they never interleave.

use super::{Callback, Protocol};
use crate::codec::{codec2_factory, CodecFactory, CodecMode, CodecSession};
use crate::error::{LinkError, Result};
use crate::position::Position;
use crate::transport::{lock, Transport};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub struct AudioCodec2 {
    inner: Box<dyn Protocol>,
    factory: CodecFactory,
    session: Mutex<Option<CodecSession>>,
    closed: AtomicBool,
}

impl AudioCodec2 {
    pub fn new(inner: Box<dyn Protocol>, mode: CodecMode) -> Result<Self> {
        Self::with_codec_factory(inner, mode, codec2_factory())
    }

    /// Like [`new`](Self::new), with the codec engines supplied by `factory`.
    pub fn with_codec_factory(
        inner: Box<dyn Protocol>,
        mode: CodecMode,
        factory: CodecFactory,
    ) -> Result<Self> {
        let session = CodecSession::open(mode, &factory)?;
        info!(
            "Codec2 {} enabled: {} samples, {} bytes per frame",
            mode,
            session.samples_per_frame(),
            session.bytes_per_frame()
        );
        Ok(Self {
            inner,
            factory,
            session: Mutex::new(Some(session)),
            closed: AtomicBool::new(false),
        })
    }

    /// Current mode; `None` after close or a failed reconfiguration.
    pub fn codec_mode(&self) -> Option<CodecMode> {
        lock(&self.session).as_ref().map(CodecSession::mode)
    }

    /// Replace the codec session with one for `mode`.
    ///
    /// The old session is released first. If the new one cannot be opened the
    /// decorator is left without a session and audio calls fail until a later
    /// reconfiguration succeeds.
    pub fn set_codec_mode(&self, mode: CodecMode) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        let mut session = lock(&self.session);
        // close() may have won the race for the lock
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        if let Some(old) = session.take() {
            debug!("Releasing codec2 {} session", old.mode());
        }
        let new = CodecSession::open(mode, &self.factory)?;
        info!("Codec2 switched to {}", mode);
        *session = Some(new);
        Ok(())
    }
}

impl Protocol for AudioCodec2 {
    fn initialize(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        self.inner.initialize(transport)
    }

    fn pcm_frame_size(&self) -> Option<usize> {
        lock(&self.session)
            .as_ref()
            .map(CodecSession::samples_per_frame)
    }

    fn send_position(
        &self,
        _latitude: f64,
        _longitude: f64,
        _altitude: f64,
        _bearing: f32,
        _comment: &str,
    ) -> Result<bool> {
        Err(LinkError::Unsupported(
            "the codec2 decorator only transcodes voice",
        ))
    }

    fn send_data(&self, src: &str, dst: &str, data: &[u8]) -> Result<bool> {
        self.inner.send_data(src, dst, data)
    }

    fn send_compressed_audio(
        &self,
        _src: &str,
        _dst: &str,
        _codec_mode: CodecMode,
        _frame: &[u8],
    ) -> Result<bool> {
        Err(LinkError::Unsupported(
            "audio is already encoded; send PCM through the codec2 decorator",
        ))
    }

    fn send_pcm_audio(&self, src: &str, dst: &str, pcm: &[i16]) -> Result<bool> {
        let (mode, frame) = {
            let mut guard = lock(&self.session);
            let session = guard
                .as_mut()
                .ok_or_else(|| LinkError::Codec("no codec2 session".to_string()))?;
            let frame = session.encode(pcm)?.to_vec();
            (session.mode(), frame)
        };
        self.inner.send_compressed_audio(src, dst, mode, &frame)
    }

    fn receive(&self, callback: &mut dyn Callback) -> Result<bool> {
        let mut decoding = DecodingCallback {
            session: &self.session,
            parent: callback,
        };
        self.inner.receive(&mut decoding)
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(session) = lock(&self.session).take() {
            debug!("Releasing codec2 {} session on close", session.mode());
        }
        self.inner.close()
    }
}

/// Expands compressed audio from the inner protocol into PCM for `parent`.
struct DecodingCallback<'a> {
    session: &'a Mutex<Option<CodecSession>>,
    parent: &'a mut dyn Callback,
}

impl Callback for DecodingCallback<'_> {
    fn on_receive_position(&mut self, position: Position) {
        self.parent.on_receive_position(position);
    }

    fn on_receive_pcm_audio(
        &mut self,
        src: &str,
        dst: &str,
        codec_mode: Option<CodecMode>,
        pcm: &[i16],
    ) {
        self.parent.on_receive_pcm_audio(src, dst, codec_mode, pcm);
    }

    fn on_receive_compressed_audio(
        &mut self,
        src: &str,
        dst: &str,
        codec_mode: Option<CodecMode>,
        frame: &[u8],
    ) {
        // Decode under the lock, deliver after it: the parent may send audio back
        let decoded = lock(self.session)
            .as_mut()
            .map(|session| decode_frames(session, src, codec_mode, frame));
        let Some((mode, pcm_frames, trailing)) = decoded else {
            warn!("Dropping audio from {}: no codec2 session", src);
            self.parent.on_protocol_rx_error();
            return;
        };

        for pcm in &pcm_frames {
            self.parent.on_receive_pcm_audio(src, dst, Some(mode), pcm);
        }
        if trailing > 0 {
            warn!(
                "Audio from {} has {} trailing bytes, not a whole codec2 frame",
                src, trailing
            );
            self.parent.on_protocol_rx_error();
        }
    }

    fn on_receive_data(&mut self, src: &str, dst: &str, data: &[u8]) {
        self.parent.on_receive_data(src, dst, data);
    }

    fn on_receive_signal_level(&mut self, rssi: i16, snr: i16) {
        self.parent.on_receive_signal_level(rssi, snr);
    }

    fn on_protocol_rx_error(&mut self) {
        self.parent.on_protocol_rx_error();
    }
}

/// Decode every whole frame in `frame`. Returns the session mode, the PCM frames
/// and the count of trailing bytes that did not make a whole frame.
fn decode_frames(
    session: &mut CodecSession,
    src: &str,
    codec_mode: Option<CodecMode>,
    frame: &[u8],
) -> (CodecMode, Vec<Vec<i16>>, usize) {
    if let Some(m) = codec_mode {
        if m != session.mode() {
            debug!(
                "Audio from {} tagged {} decoded as {}",
                src,
                m,
                session.mode()
            );
        }
    }
    let bpf = session.bytes_per_frame();
    let chunks = frame.chunks_exact(bpf);
    let trailing = chunks.remainder().len();
    let mut pcm_frames = Vec::with_capacity(frame.len() / bpf);
    for bits in chunks {
        match session.decode(bits) {
            Ok(pcm) => pcm_frames.push(pcm.to_vec()),
            Err(e) => warn!("Codec2 decode failed: {}", e),
        }
    }
    (session.mode(), pcm_frames, trailing)
}
