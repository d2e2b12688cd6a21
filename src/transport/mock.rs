//! Scripted transport for exercising protocols without hardware.
//!
//! Reads are served from a queue of injected chunks, one chunk (or part of one) per
//! `read`. An empty chunk, or an exhausted queue, reads as end of stream. Writes are
//! captured, and `close` calls are counted.

use super::{lock, Transport, TransportKind};
use crate::error::{LinkError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    closes: Arc<AtomicUsize>,
}

#[derive(Default)]
struct MockTransportInner {
    reads: VecDeque<Vec<u8>>,
    written: Vec<u8>,
    write_limit: Option<usize>,
    fail_close: bool,
    closed: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept at most `limit` bytes per `write` call
    pub fn with_write_limit(self, limit: usize) -> Self {
        lock(&self.inner).write_limit = Some(limit);
        self
    }

    /// Make every `close` fail after counting it
    pub fn with_failing_close(self) -> Self {
        lock(&self.inner).fail_close = true;
        self
    }

    /// Queue one chunk to be returned by `read`
    pub fn inject_read(&self, data: &[u8]) {
        lock(&self.inner).reads.push_back(data.to_vec());
    }

    /// Queue an end-of-stream indication
    pub fn inject_eof(&self) {
        lock(&self.inner).reads.push_back(Vec::new());
    }

    /// Everything written so far
    pub fn written(&self) -> Vec<u8> {
        lock(&self.inner).written.clone()
    }

    pub fn clear_written(&self) {
        lock(&self.inner).written.clear();
    }

    /// Number of times `close` was called
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Loopback
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return Ok(0);
        }
        let Some(mut chunk) = inner.reads.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buffer.len());
        buffer[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunk.drain(..n);
            inner.reads.push_front(chunk);
        }
        Ok(n)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return Err(LinkError::Closed);
        }
        let n = inner.write_limit.map_or(data.len(), |l| l.min(data.len()));
        inner.written.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        let mut inner = lock(&self.inner);
        inner.closed = true;
        if inner.fail_close {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "device gone",
            )));
        }
        Ok(())
    }
}
