//! Bluetooth Low Energy transport over a Nordic UART Service style GATT link.
//!
//! The GATT connection itself (scan, connect, MTU exchange, notification subscribe)
//! belongs to the host platform and is handed in as a [`GattLink`].

use super::{lock, Transport, TransportKind};
use crate::error::{LinkError, Result};
use bytes::{Buf, BytesMut};
use log::{debug, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Nordic UART Service UUID: 6E400001-B5A3-F393-E0A9-E50E24DCCA9E
pub const NUS_SERVICE_UUID: [u8; 16] = [
    0x6e, 0x40, 0x00, 0x01, 0xb5, 0xa3, 0xf3, 0x93, 0xe0, 0xa9, 0xe5, 0x0e, 0x24, 0xdc, 0xca, 0x9e,
];

/// NUS RX characteristic (we write here): 6E400002-B5A3-F393-E0A9-E50E24DCCA9E
pub const NUS_RX_CHAR_UUID: [u8; 16] = [
    0x6e, 0x40, 0x00, 0x02, 0xb5, 0xa3, 0xf3, 0x93, 0xe0, 0xa9, 0xe5, 0x0e, 0x24, 0xdc, 0xca, 0x9e,
];

/// NUS TX characteristic (notifications to us): 6E400003-B5A3-F393-E0A9-E50E24DCCA9E
pub const NUS_TX_CHAR_UUID: [u8; 16] = [
    0x6e, 0x40, 0x00, 0x03, 0xb5, 0xa3, 0xf3, 0x93, 0xe0, 0xa9, 0xe5, 0x0e, 0x24, 0xdc, 0xca, 0x9e,
];

/// ATT payload for the default 23-byte MTU
pub const DEFAULT_MTU_PAYLOAD: usize = 20;

/// Connected GATT link supplied by the platform BLE stack.
pub trait GattLink: Send + Sync {
    /// Write one chunk (at most [`GattLink::mtu`] bytes) to the RX characteristic.
    fn write_rx(&self, chunk: &[u8]) -> std::io::Result<()>;

    /// Block for the next TX notification. `None` once disconnected.
    fn next_notification(&self) -> std::io::Result<Option<Vec<u8>>>;

    /// Usable bytes per write after MTU negotiation
    fn mtu(&self) -> usize {
        DEFAULT_MTU_PAYLOAD
    }

    /// Tear the connection down; must wake a blocked `next_notification`.
    fn disconnect(&self);
}

pub struct BleTransport {
    name: String,
    link: Box<dyn GattLink>,
    pending: Mutex<BytesMut>,
    closed: AtomicBool,
}

impl BleTransport {
    pub fn new(link: Box<dyn GattLink>, name: &str) -> Self {
        info!("Opened BLE transport to {} (mtu {})", name, link.mtu());
        Self {
            name: name.to_string(),
            link,
            pending: Mutex::new(BytesMut::new()),
            closed: AtomicBool::new(false),
        }
    }
}

impl Transport for BleTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ble
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(0);
        }
        let mut pending = lock(&self.pending);
        if pending.is_empty() {
            match self.link.next_notification()? {
                Some(chunk) => pending.extend_from_slice(&chunk),
                None => return Ok(0),
            }
        }
        let n = pending.len().min(buffer.len());
        buffer[..n].copy_from_slice(&pending[..n]);
        pending.advance(n);
        Ok(n)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LinkError::Closed);
        }
        for chunk in data.chunks(self.link.mtu().max(1)) {
            trace!("BLE write {} bytes", chunk.len());
            self.link.write_rx(chunk)?;
        }
        Ok(data.len())
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.link.disconnect();
            debug!("Closed BLE transport to {}", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeLink {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        notifications: Mutex<VecDeque<Vec<u8>>>,
        disconnects: Arc<AtomicUsize>,
    }

    impl GattLink for FakeLink {
        fn write_rx(&self, chunk: &[u8]) -> std::io::Result<()> {
            self.writes.lock().unwrap().push(chunk.to_vec());
            Ok(())
        }

        fn next_notification(&self) -> std::io::Result<Option<Vec<u8>>> {
            Ok(self.notifications.lock().unwrap().pop_front())
        }

        fn mtu(&self) -> usize {
            4
        }

        fn disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn writes_are_split_to_mtu() {
        let link = FakeLink::default();
        let writes = link.writes.clone();
        let t = BleTransport::new(Box::new(link), "radio");
        assert_eq!(t.write(b"0123456789").unwrap(), 10);
        let writes = writes.lock().unwrap();
        assert_eq!(
            *writes,
            vec![b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]
        );
    }

    #[test]
    fn notifications_are_buffered_across_reads() {
        let link = FakeLink::default();
        link.notifications
            .lock()
            .unwrap()
            .push_back(b"abcdef".to_vec());
        let disconnects = link.disconnects.clone();
        let t = BleTransport::new(Box::new(link), "radio");

        let mut buf = [0u8; 4];
        assert_eq!(t.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(t.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ef");
        // link has nothing more: disconnected
        assert_eq!(t.read(&mut buf).unwrap(), 0);

        t.close().unwrap();
        t.close().unwrap();
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
    }
}
