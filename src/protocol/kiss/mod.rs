//! # KISS protocol
//!
//! Frames every outgoing unit as a KISS data frame carrying an address envelope
//! (see [`envelope`](crate::protocol::envelope)) and decodes inbound frames back
//! into callback events:
//!
//! - data frames become a position, compressed audio or data event,
//! - set-hardware frames of at least four bytes carry signal level (RSSI and SNR,
//!   big-endian `i16` each),
//! - other control frames and frames for another TNC port are skipped,
//! - decode failures (bad escape, oversize, truncated at end of stream, bad
//!   envelope, garbled position) raise exactly one RX error each.

pub mod frame;
mod parrot;

pub use frame::{
    encode_frame, FrameError, KissCommand, KissDecoder, KissFrame, FEND, FESC, MAX_FRAME_SIZE,
    TFEND, TFESC,
};
pub use parrot::KissParrot;

use super::envelope::{self, Body, Envelope};
use super::{Callback, Protocol};
use crate::codec::CodecMode;
use crate::config::{KissConfig, StationConfig};
use crate::error::{LinkError, Result};
use crate::logutil::hex_snippet;
use crate::position::{aprs, Position};
use crate::transport::{lock, write_all, Transport};
use log::{debug, info, trace, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

const READ_CHUNK: usize = 1024;

#[derive(Default)]
struct RxState {
    decoder: KissDecoder,
    ready: VecDeque<std::result::Result<KissFrame, FrameError>>,
}

pub struct Kiss {
    station: StationConfig,
    params: KissConfig,
    transport: Option<Box<dyn Transport>>,
    rx: Mutex<RxState>,
    closed: AtomicBool,
}

impl Kiss {
    pub fn new(station: StationConfig, params: KissConfig) -> Self {
        Self {
            station,
            params,
            transport: None,
            rx: Mutex::new(RxState::default()),
            closed: AtomicBool::new(false),
        }
    }

    fn transport(&self) -> Result<&dyn Transport> {
        self.transport.as_deref().ok_or(LinkError::NotInitialized)
    }

    /// Destination with the digipath SSID applied.
    fn destination(&self) -> String {
        if self.station.ext_digipath_ssid > 0 {
            format!(
                "{}-{}",
                self.station.destination, self.station.ext_digipath_ssid
            )
        } else {
            self.station.destination.clone()
        }
    }

    fn send_frame(&self, command: KissCommand, payload: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LinkError::Closed);
        }
        let transport = self.transport()?;
        let frame = encode_frame(self.params.port, command, payload);
        trace!(
            "KISS tx {:?} on {}: {}",
            command,
            transport.name(),
            hex_snippet(&frame, 48)
        );
        write_all(transport, &frame)
    }

    fn send_envelope(&self, src: &str, dst: &str, info: &[u8]) -> Result<bool> {
        let default_dst;
        let src = if src.is_empty() {
            self.station.callsign.as_str()
        } else {
            src
        };
        let dst = if dst.is_empty() {
            default_dst = self.destination();
            default_dst.as_str()
        } else {
            dst
        };
        for call in [src, dst] {
            if !envelope::is_callsign(call) {
                return Err(LinkError::InvalidSetting(format!("callsign '{}'", call)));
            }
        }
        let path = envelope::split_path(&self.station.digipath);
        let payload = envelope::encode(src, dst, &path, info);
        if payload.len() + 1 > MAX_FRAME_SIZE {
            return Err(LinkError::FrameSize {
                expected: MAX_FRAME_SIZE - 1,
                actual: payload.len(),
            });
        }
        self.send_frame(KissCommand::Data, &payload)?;
        Ok(true)
    }

    /// Report one decoded frame. Returns false when it produced no event.
    fn dispatch(
        &self,
        item: std::result::Result<KissFrame, FrameError>,
        callback: &mut dyn Callback,
    ) -> bool {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                warn!("KISS decode error: {}", e);
                callback.on_protocol_rx_error();
                return true;
            }
        };
        if frame.command != KissCommand::Return && frame.port != self.params.port {
            debug!(
                "Skipping KISS frame for port {} ({} bytes)",
                frame.port,
                frame.payload.len()
            );
            return false;
        }
        match frame.command {
            KissCommand::Data => self.dispatch_data(&frame.payload, callback),
            KissCommand::SetHardware if frame.payload.len() >= 4 => {
                let p = &frame.payload;
                let rssi = i16::from_be_bytes([p[0], p[1]]);
                let snr = i16::from_be_bytes([p[2], p[3]]);
                trace!("Signal level rssi={} snr={}", rssi, snr);
                callback.on_receive_signal_level(rssi, snr);
                true
            }
            other => {
                debug!(
                    "Ignoring KISS {:?} frame: {}",
                    other,
                    hex_snippet(&frame.payload, 16)
                );
                false
            }
        }
    }

    fn dispatch_data(&self, payload: &[u8], callback: &mut dyn Callback) -> bool {
        let Some(env) = Envelope::parse(payload) else {
            warn!(
                "Dropping KISS data frame with malformed address header: {}",
                hex_snippet(payload, 32)
            );
            callback.on_protocol_rx_error();
            return true;
        };
        match env.body() {
            Body::Position => match aprs::decode(env.src, env.dst, env.info) {
                Some(position) => {
                    debug!(
                        "Position from {}: {:.5},{:.5}",
                        position.src_callsign, position.latitude, position.longitude
                    );
                    callback.on_receive_position(position);
                }
                None => {
                    warn!(
                        "Malformed position report from {}: {}",
                        env.src,
                        crate::logutil::escape_log(&String::from_utf8_lossy(env.info))
                    );
                    callback.on_protocol_rx_error();
                }
            },
            Body::Audio { codec_mode, frame } => {
                if codec_mode.is_none() {
                    debug!("Audio frame from {} with unknown codec mode", env.src);
                }
                callback.on_receive_compressed_audio(env.src, env.dst, codec_mode, frame);
            }
            Body::Data(data) => callback.on_receive_data(env.src, env.dst, data),
        }
        true
    }
}

impl Protocol for Kiss {
    fn initialize(&mut self, transport: Box<dyn Transport>) -> Result<()> {
        info!(
            "KISS protocol on {} (port {}, callsign {})",
            transport.name(),
            self.params.port,
            self.station.callsign
        );
        if let Some(old) = self.transport.replace(transport) {
            if let Err(e) = old.close() {
                warn!("Closing previous transport {} failed: {}", old.name(), e);
            }
        }
        *lock(&self.rx) = RxState::default();
        self.closed.store(false, Ordering::SeqCst);

        if self.params.send_params_on_init {
            let p = &self.params;
            for (command, value) in [
                (KissCommand::TxDelay, p.tx_delay),
                (KissCommand::Persistence, p.persistence),
                (KissCommand::SlotTime, p.slot_time),
                (KissCommand::TxTail, p.tx_tail),
            ] {
                self.send_frame(command, &[value])?;
            }
            debug!(
                "Sent KISS parameters: txdelay={} persist={} slottime={} txtail={}",
                p.tx_delay, p.persistence, p.slot_time, p.tx_tail
            );
        }
        Ok(())
    }

    fn send_position(
        &self,
        latitude: f64,
        longitude: f64,
        altitude: f64,
        bearing: f32,
        comment: &str,
    ) -> Result<bool> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LinkError::InvalidSetting(format!(
                "position {},{} out of range",
                latitude, longitude
            )));
        }
        let s = &self.station;
        let mut position = Position::new(&s.callsign, &s.destination, latitude, longitude);
        position.altitude_meters = altitude;
        position.bearing_degrees = bearing;
        position.comment = comment.to_string();
        position.status = s.status.clone();
        position.symbol_code = s.symbol.clone();
        position.is_compressed = s.compressed;
        position.privacy_level = s.privacy_level;
        position.ext_digipath_ssid = s.ext_digipath_ssid;
        position.is_speed_bearing_enabled = s.speed_bearing_enabled;
        position.is_altitude_enabled = s.altitude_enabled;

        let info = aprs::encode(&position);
        debug!("Sending position report: {}", crate::logutil::escape_log(&info));
        self.send_envelope(&s.callsign, &self.destination(), info.as_bytes())
    }

    fn send_data(&self, src: &str, dst: &str, data: &[u8]) -> Result<bool> {
        self.send_envelope(src, dst, &envelope::data_info(data))
    }

    fn send_compressed_audio(
        &self,
        src: &str,
        dst: &str,
        codec_mode: CodecMode,
        frame: &[u8],
    ) -> Result<bool> {
        self.send_envelope(src, dst, &envelope::audio_info(codec_mode, frame))
    }

    fn send_pcm_audio(&self, _src: &str, _dst: &str, _pcm: &[i16]) -> Result<bool> {
        Err(LinkError::Unsupported(
            "KISS carries compressed audio; enable the codec2 decorator for PCM",
        ))
    }

    fn receive(&self, callback: &mut dyn Callback) -> Result<bool> {
        let transport = self.transport()?;
        let mut rx = lock(&self.rx);
        let mut buf = [0u8; READ_CHUNK];
        loop {
            while let Some(item) = rx.ready.pop_front() {
                if self.dispatch(item, callback) {
                    return Ok(true);
                }
            }
            let n = transport.read(&mut buf)?;
            if n == 0 {
                if let Some(e) = rx.decoder.finish() {
                    warn!("KISS stream on {} ended: {}", transport.name(), e);
                    callback.on_protocol_rx_error();
                }
                debug!("End of stream on {}", transport.name());
                return Ok(false);
            }
            let decoded = rx.decoder.push(&buf[..n]);
            rx.ready.extend(decoded);
        }
    }

    fn flush(&self) -> Result<()> {
        self.transport()?.flush()
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        match &self.transport {
            Some(transport) => {
                debug!("Closing KISS protocol on {}", transport.name());
                transport.close()
            }
            None => Ok(()),
        }
    }
}
