//! KISS with loop-back: every frame sent is transmitted and also decoded locally,
//! as if the radio had heard itself.
//!
//! The transport is wrapped in an [`EchoTransport`] whose read side merges two
//! sources into one queue: bytes pumped from the medium by a reader thread, and
//! bytes just written. A receiver blocked on a quiet medium still sees its own
//! frames. Media that already echo (the loopback transport) deliver each frame twice.

use super::Kiss;
use crate::codec::CodecMode;
use crate::config::{KissConfig, StationConfig};
use crate::error::Result;
use crate::protocol::{Callback, Protocol};
use crate::transport::{lock, ByteQueue, Transport, TransportKind};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

const PUMP_CHUNK: usize = 1024;

pub struct KissParrot {
    kiss: Kiss,
}

impl KissParrot {
    pub fn new(station: StationConfig, params: KissConfig) -> Self {
        Self {
            kiss: Kiss::new(station, params),
        }
    }
}

impl Protocol for KissParrot {
    fn initialize(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        let echo = EchoTransport::start(transport)?;
        self.kiss.initialize(Box::new(echo))
    }

    fn send_position(
        &self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        bearing: f32,
        comment: &str,
    ) -> Result<bool> {
        self.kiss
            .send_position(latitude, longitude, altitude, bearing, comment)
    }

    fn send_data(&self, src: &str, dst: &str, data: &[u8]) -> Result<bool> {
        self.kiss.send_data(src, dst, data)
    }

    fn send_compressed_audio(
        &self,
        src: &str,
        dst: &str,
        codec_mode: CodecMode,
        frame: &[u8],
    ) -> Result<bool> {
        self.kiss.send_compressed_audio(src, dst, codec_mode, frame)
    }

    fn send_pcm_audio(&self, src: &str, dst: &str, pcm: &[i16]) -> Result<bool> {
        self.kiss.send_pcm_audio(src, dst, pcm)
    }

    fn receive(&self, callback: &mut dyn Callback) -> Result<bool> {
        self.kiss.receive(callback)
    }

    fn flush(&self) -> Result<()> {
        self.kiss.flush()
    }

    fn close(&self) -> Result<()> {
        self.kiss.close()
    }
}

struct EchoTransport {
    inner: Arc<dyn Transport>,
    merged: Arc<ByteQueue>,
    pump: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl EchoTransport {
    fn start(inner: Box<dyn Transport>) -> Result<Self> {
        let inner: Arc<dyn Transport> = Arc::from(inner);
        let merged = Arc::new(ByteQueue::new());
        let pump = {
            let inner = Arc::clone(&inner);
            let merged = Arc::clone(&merged);
            std::thread::Builder::new()
                .name(format!("parrot-{}", inner.name()))
                .spawn(move || pump(inner, merged))?
        };
        debug!("Parrot echo started on {}", inner.name());
        Ok(Self {
            inner,
            merged,
            pump: Mutex::new(Some(pump)),
            closed: AtomicBool::new(false),
        })
    }
}

fn pump(inner: Arc<dyn Transport>, merged: Arc<ByteQueue>) {
    let mut buf = [0u8; PUMP_CHUNK];
    loop {
        match inner.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if !merged.push(&buf[..n]) {
                    break;
                }
            }
            Err(e) => {
                warn!("Parrot read from {} failed: {}", inner.name(), e);
                break;
            }
        }
    }
    debug!("Parrot pump on {} finished", inner.name());
    merged.close();
}

impl Transport for EchoTransport {
    fn kind(&self) -> TransportKind {
        self.inner.kind()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.merged.pop_blocking(buffer))
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        let n = self.inner.write(data)?;
        if !self.merged.push(&data[..n]) {
            debug!(
                "Parrot echo on {} closed; {} bytes sent without echo",
                self.inner.name(),
                n
            );
        }
        Ok(n)
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.inner.close();
        self.merged.close();
        if let Some(handle) = lock(&self.pump).take() {
            if handle.join().is_err() {
                warn!("Parrot pump on {} panicked", self.inner.name());
            }
        }
        result
    }
}

impl Drop for EchoTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
