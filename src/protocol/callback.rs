//! Receive-side event sink.
//!
//! A protocol's `receive` reports what it decoded by calling exactly one
//! [`Callback`] method. Every method defaults to a no-op, so a sink implements
//! only what it consumes and a decorator overrides only what it transforms,
//! forwarding the rest to the callback it wraps.

use crate::codec::CodecMode;
use crate::position::Position;
use serde::Serialize;
use tokio::sync::mpsc;

pub trait Callback {
    fn on_receive_position(&mut self, _position: Position) {}

    fn on_receive_pcm_audio(
        &mut self,
        _src: &str,
        _dst: &str,
        _codec_mode: Option<CodecMode>,
        _pcm: &[i16],
    ) {
    }

    fn on_receive_compressed_audio(
        &mut self,
        _src: &str,
        _dst: &str,
        _codec_mode: Option<CodecMode>,
        _frame: &[u8],
    ) {
    }

    fn on_receive_data(&mut self, _src: &str, _dst: &str, _data: &[u8]) {}

    /// Radio signal report: received signal strength and signal-to-noise ratio
    fn on_receive_signal_level(&mut self, _rssi: i16, _snr: i16) {}

    /// A frame was lost to a decode failure
    fn on_protocol_rx_error(&mut self) {}
}

/// Owned form of one callback invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LinkEvent {
    Position(Position),
    PcmAudio {
        src: String,
        dst: String,
        codec_mode: Option<CodecMode>,
        pcm: Vec<i16>,
    },
    CompressedAudio {
        src: String,
        dst: String,
        codec_mode: Option<CodecMode>,
        frame: Vec<u8>,
    },
    Data {
        src: String,
        dst: String,
        data: Vec<u8>,
    },
    SignalLevel {
        rssi: i16,
        snr: i16,
    },
    RxError,
}

impl LinkEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LinkEvent::Position(_) => "position",
            LinkEvent::PcmAudio { .. } => "pcm_audio",
            LinkEvent::CompressedAudio { .. } => "compressed_audio",
            LinkEvent::Data { .. } => "data",
            LinkEvent::SignalLevel { .. } => "signal_level",
            LinkEvent::RxError => "rx_error",
        }
    }
}

/// Collects events in order; handy wherever a receive result is inspected later.
impl Callback for Vec<LinkEvent> {
    fn on_receive_position(&mut self, position: Position) {
        self.push(LinkEvent::Position(position));
    }

    fn on_receive_pcm_audio(
        &mut self,
        src: &str,
        dst: &str,
        codec_mode: Option<CodecMode>,
        pcm: &[i16],
    ) {
        self.push(LinkEvent::PcmAudio {
            src: src.to_string(),
            dst: dst.to_string(),
            codec_mode,
            pcm: pcm.to_vec(),
        });
    }

    fn on_receive_compressed_audio(
        &mut self,
        src: &str,
        dst: &str,
        codec_mode: Option<CodecMode>,
        frame: &[u8],
    ) {
        self.push(LinkEvent::CompressedAudio {
            src: src.to_string(),
            dst: dst.to_string(),
            codec_mode,
            frame: frame.to_vec(),
        });
    }

    fn on_receive_data(&mut self, src: &str, dst: &str, data: &[u8]) {
        self.push(LinkEvent::Data {
            src: src.to_string(),
            dst: dst.to_string(),
            data: data.to_vec(),
        });
    }

    fn on_receive_signal_level(&mut self, rssi: i16, snr: i16) {
        self.push(LinkEvent::SignalLevel { rssi, snr });
    }

    fn on_protocol_rx_error(&mut self) {
        self.push(LinkEvent::RxError);
    }
}

/// Forwards events into a tokio channel, bridging the blocking receive loop to
/// async consumers.
pub struct EventSink {
    tx: mpsc::UnboundedSender<LinkEvent>,
    events: Vec<LinkEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self {
            tx,
            events: Vec::with_capacity(4),
        }
    }

    /// True once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn forward(&mut self) {
        for event in self.events.drain(..) {
            if self.tx.send(event).is_err() {
                log::debug!("Event receiver dropped; discarding events");
                break;
            }
        }
        self.events.clear();
    }
}

impl Callback for EventSink {
    fn on_receive_position(&mut self, position: Position) {
        self.events.on_receive_position(position);
        self.forward();
    }

    fn on_receive_pcm_audio(
        &mut self,
        src: &str,
        dst: &str,
        codec_mode: Option<CodecMode>,
        pcm: &[i16],
    ) {
        self.events.on_receive_pcm_audio(src, dst, codec_mode, pcm);
        self.forward();
    }

    fn on_receive_compressed_audio(
        &mut self,
        src: &str,
        dst: &str,
        codec_mode: Option<CodecMode>,
        frame: &[u8],
    ) {
        self.events
            .on_receive_compressed_audio(src, dst, codec_mode, frame);
        self.forward();
    }

    fn on_receive_data(&mut self, src: &str, dst: &str, data: &[u8]) {
        self.events.on_receive_data(src, dst, data);
        self.forward();
    }

    fn on_receive_signal_level(&mut self, rssi: i16, snr: i16) {
        self.events.on_receive_signal_level(rssi, snr);
        self.forward();
    }

    fn on_protocol_rx_error(&mut self) {
        self.events.on_protocol_rx_error();
        self.forward();
    }
}
