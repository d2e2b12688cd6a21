//! Serial transport for USB serial adapters and Bluetooth RFCOMM ttys.
//!
//! The port handle arrives already opened (see [`crate::connect`]). Reads and writes
//! go through separate clones of the handle so a blocked reader never holds up a
//! sender. The read side polls with a short port timeout so `close` is noticed
//! promptly.

use super::{lock, Transport, TransportKind};
use crate::error::{LinkError, Result};
use log::{debug, info};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct SerialTransport {
    kind: TransportKind,
    name: String,
    reader: Mutex<Box<dyn SerialPort>>,
    writer: Mutex<Box<dyn SerialPort>>,
    closed: AtomicBool,
}

impl SerialTransport {
    /// USB serial port (TNC, LoRa KISS modem, ...)
    pub fn usb(port: Box<dyn SerialPort>, name: &str) -> Result<Self> {
        Self::new(TransportKind::UsbSerial, port, name)
    }

    /// Bluetooth classic SPP link exposed as an RFCOMM tty
    pub fn bluetooth(port: Box<dyn SerialPort>, name: &str) -> Result<Self> {
        Self::new(TransportKind::Bluetooth, port, name)
    }

    fn new(kind: TransportKind, mut port: Box<dyn SerialPort>, name: &str) -> Result<Self> {
        port.set_timeout(POLL_INTERVAL)?;
        let writer = port.try_clone()?;
        info!("Opened {:?} transport on {}", kind, name);
        Ok(Self {
            kind,
            name: name.to_string(),
            reader: Mutex::new(port),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        })
    }
}

impl Transport for SerialTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Ok(0);
            }
            let result = lock(&self.reader).read(buffer);
            match result {
                Ok(n) if n > 0 => return Ok(n),
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LinkError::Closed);
        }
        Ok(lock(&self.writer).write(data)?)
    }

    fn flush(&self) -> Result<()> {
        lock(&self.writer).flush()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("Closed {:?} transport on {}", self.kind, self.name);
        }
        Ok(())
    }
}
