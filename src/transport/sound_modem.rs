//! Sound card modem transports.
//!
//! Modulation and demodulation live outside this crate. Each modem transport is a
//! pair of byte queues whose far end is a [`ModemPort`]: the DSP side pulls bytes to
//! modulate and pushes demodulated bytes back in.
//!
//! The sub-type string from `[transport].sound_modem_type` selects the variant:
//! anything starting with `F` is a FreeDV speech-grade mode (`F1600`, `F700D`, ...),
//! anything else names the FSK baud rate (`300`, `1200`, `9600`).

use super::channel::ByteQueue;
use super::{Transport, TransportKind};
use crate::error::{LinkError, Result};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_FSK_BAUD: u32 = 1200;

/// DSP-facing end of a sound modem transport.
#[derive(Debug, Clone, Default)]
pub struct ModemPort {
    to_link: Arc<ByteQueue>,
    to_air: Arc<ByteQueue>,
}

impl ModemPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand demodulated bytes to the link. Returns false once the modem is closed.
    pub fn push_demodulated(&self, data: &[u8]) -> bool {
        self.to_link.push(data)
    }

    /// Wait up to `timeout` for bytes the link wants on air. Empty on timeout or close.
    pub fn next_to_modulate(&self, max: usize, timeout: Duration) -> Vec<u8> {
        let mut buf = vec![0u8; max];
        let n = self.to_air.pop_timeout(&mut buf, timeout);
        buf.truncate(n);
        buf
    }

    /// Everything currently queued for transmission.
    pub fn drain_to_modulate(&self) -> Vec<u8> {
        self.to_air.drain()
    }

    pub fn is_closed(&self) -> bool {
        self.to_link.is_closed()
    }

    fn read(&self, buffer: &mut [u8]) -> usize {
        self.to_link.pop_blocking(buffer)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        if self.to_air.push(data) {
            Ok(data.len())
        } else {
            Err(LinkError::Closed)
        }
    }

    fn close(&self) -> bool {
        let a = self.to_link.close();
        let b = self.to_air.close();
        a || b
    }
}

/// FreeDV speech-grade data modem.
#[derive(Debug)]
pub struct SoundModem {
    name: String,
    mode: String,
    port: ModemPort,
}

impl SoundModem {
    pub fn new(modem_type: &str, port: ModemPort) -> Self {
        let mode = modem_type.trim_start_matches('F').to_string();
        info!("Opened FreeDV sound modem, mode {}", mode);
        Self {
            name: format!("freedv-{}", mode),
            mode,
            port,
        }
    }

    /// FreeDV mode label, e.g. `1600` for sub-type `F1600`
    pub fn mode(&self) -> &str {
        &self.mode
    }
}

impl Transport for SoundModem {
    fn kind(&self) -> TransportKind {
        TransportKind::SoundModem
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.port.read(buffer))
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        self.port.write(data)
    }

    fn close(&self) -> Result<()> {
        if self.port.close() {
            debug!("Closed {}", self.name);
        }
        Ok(())
    }
}

/// AFSK/FSK packet modem.
#[derive(Debug)]
pub struct SoundModemFsk {
    name: String,
    baud: u32,
    port: ModemPort,
}

impl SoundModemFsk {
    pub fn new(modem_type: &str, port: ModemPort) -> Self {
        let baud = match modem_type.trim().parse::<u32>() {
            Ok(b) if b > 0 => b,
            _ => {
                warn!(
                    "Unrecognised FSK modem type '{}', using {} baud",
                    crate::logutil::escape_log(modem_type),
                    DEFAULT_FSK_BAUD
                );
                DEFAULT_FSK_BAUD
            }
        };
        info!("Opened FSK sound modem at {} baud", baud);
        Self {
            name: format!("fsk-{}", baud),
            baud,
            port,
        }
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }
}

impl Transport for SoundModemFsk {
    fn kind(&self) -> TransportKind {
        TransportKind::SoundModemFsk
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.port.read(buffer))
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        self.port.write(data)
    }

    fn close(&self) -> Result<()> {
        if self.port.close() {
            debug!("Closed {}", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_flow_through_modem_port() {
        let port = ModemPort::new();
        let modem = SoundModemFsk::new("1200", port.clone());
        assert_eq!(modem.baud(), 1200);

        modem.write(b"\xc0\x00hi\xc0").unwrap();
        assert_eq!(port.drain_to_modulate(), b"\xc0\x00hi\xc0");

        assert!(port.push_demodulated(b"rx"));
        let mut buf = [0u8; 8];
        assert_eq!(modem.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"rx");
    }

    #[test]
    fn freedv_mode_label() {
        let modem = SoundModem::new("F700D", ModemPort::new());
        assert_eq!(modem.mode(), "700D");
        assert_eq!(modem.name(), "freedv-700D");
    }

    #[test]
    fn bad_fsk_type_defaults_to_1200() {
        let modem = SoundModemFsk::new("fast", ModemPort::new());
        assert_eq!(modem.baud(), DEFAULT_FSK_BAUD);
    }

    #[test]
    fn close_ends_both_directions() {
        let port = ModemPort::new();
        let modem = SoundModem::new("F1600", port.clone());
        modem.close().unwrap();
        assert!(port.is_closed());
        assert!(!port.push_demodulated(b"late"));
        assert!(port
            .next_to_modulate(16, Duration::from_millis(1))
            .is_empty());
        let mut buf = [0u8; 4];
        assert_eq!(modem.read(&mut buf).unwrap(), 0);
    }
}
