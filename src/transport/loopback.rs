//! Loopback transport: everything written becomes readable on the same handle.
//!
//! Used for self-test and as the factory's fallback when no usable medium is
//! configured.

use super::channel::ByteQueue;
use super::{Transport, TransportKind};
use crate::error::{LinkError, Result};
use log::{debug, trace};

#[derive(Debug, Default)]
pub struct Loopback {
    queue: ByteQueue,
}

impl Loopback {
    pub fn new() -> Self {
        debug!("Opened loopback transport");
        Self {
            queue: ByteQueue::new(),
        }
    }
}

impl Transport for Loopback {
    fn kind(&self) -> TransportKind {
        TransportKind::Loopback
    }

    fn name(&self) -> &str {
        "loopback"
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.queue.pop_blocking(buffer))
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        if !self.queue.push(data) {
            return Err(LinkError::Closed);
        }
        trace!("loopback echo {} bytes", data.len());
        Ok(data.len())
    }

    fn close(&self) -> Result<()> {
        if self.queue.close() {
            debug!("Closed loopback transport");
        }
        Ok(())
    }
}
