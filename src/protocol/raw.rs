//! Unframed pass-through.
//!
//! Bytes go to the transport as given and every chunk read comes back as one
//! compressed audio event without addressing. Suited to a modem that carries a bare
//! codec bitstream (FreeDV); positions and PCM cannot be expressed and are refused.

use super::{Callback, Protocol};
use crate::codec::CodecMode;
use crate::error::{LinkError, Result};
use crate::transport::{lock, write_all, Transport};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

const READ_CHUNK: usize = 1024;

pub struct Raw {
    transport: Option<Box<dyn Transport>>,
    rx_buf: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl Default for Raw {
    fn default() -> Self {
        Self::new()
    }
}

impl Raw {
    pub fn new() -> Self {
        Self {
            transport: None,
            rx_buf: Mutex::new(vec![0u8; READ_CHUNK]),
            closed: AtomicBool::new(false),
        }
    }

    fn transport(&self) -> Result<&dyn Transport> {
        self.transport.as_deref().ok_or(LinkError::NotInitialized)
    }

    fn send_bytes(&self, data: &[u8]) -> Result<bool> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        write_all(self.transport()?, data)?;
        Ok(true)
    }
}

impl Protocol for Raw {
    fn initialize(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        info!("Raw protocol on {}", transport.name());
        if let Some(old) = self.transport.replace(transport) {
            if let Err(e) = old.close() {
                warn!("Closing previous transport {} failed: {}", old.name(), e);
            }
        }
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn send_position(
        &self,
        _latitude: f64,
        _longitude: f64,
        _altitude: f64,
        _bearing: f32,
        _comment: &str,
    ) -> Result<bool> {
        Err(LinkError::Unsupported("raw streams carry no position reports"))
    }

    fn send_data(&self, _src: &str, _dst: &str, data: &[u8]) -> Result<bool> {
        self.send_bytes(data)
    }

    fn send_compressed_audio(
        &self,
        _src: &str,
        _dst: &str,
        _codec_mode: CodecMode,
        frame: &[u8],
    ) -> Result<bool> {
        self.send_bytes(frame)
    }

    fn send_pcm_audio(&self, _src: &str, _dst: &str, _pcm: &[i16]) -> Result<bool> {
        Err(LinkError::Unsupported(
            "raw streams carry compressed audio; enable the codec2 decorator for PCM",
        ))
    }

    fn receive(&self, callback: &mut dyn Callback) -> Result<bool> {
        let transport = self.transport()?;
        let mut buf = lock(&self.rx_buf);
        let n = transport.read(&mut buf)?;
        if n == 0 {
            debug!("End of stream on {}", transport.name());
            return Ok(false);
        }
        callback.on_receive_compressed_audio("", "", None, &buf[..n]);
        Ok(true)
    }

    fn flush(&self) -> Result<()> {
        self.transport()?.flush()
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match &self.transport {
            Some(transport) => transport.close(),
            None => Ok(()),
        }
    }
}
