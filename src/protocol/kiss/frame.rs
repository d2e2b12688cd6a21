//! KISS framing
//!
//! A KISS frame is `FEND <command> <payload> FEND`, with FEND and FESC inside the
//! frame replaced by two-byte escape sequences. The command byte carries the TNC
//! port in its high nibble and the command code in its low nibble; `0xFF` is the
//! whole-byte "return" command.

use bytes::{BufMut, BytesMut};

pub const FEND: u8 = 0xC0; // frame delimiter
pub const FESC: u8 = 0xDB;
pub const TFEND: u8 = 0xDC;
pub const TFESC: u8 = 0xDD;

/// Largest unescaped frame (command byte included) the decoder will assemble.
pub const MAX_FRAME_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KissCommand {
    Data,
    TxDelay,
    Persistence,
    SlotTime,
    TxTail,
    FullDuplex,
    SetHardware,
    Return,
    Unknown(u8),
}

impl KissCommand {
    pub fn code(&self) -> u8 {
        match self {
            KissCommand::Data => 0x00,
            KissCommand::TxDelay => 0x01,
            KissCommand::Persistence => 0x02,
            KissCommand::SlotTime => 0x03,
            KissCommand::TxTail => 0x04,
            KissCommand::FullDuplex => 0x05,
            KissCommand::SetHardware => 0x06,
            KissCommand::Return => 0xFF,
            KissCommand::Unknown(code) => *code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => KissCommand::Data,
            0x01 => KissCommand::TxDelay,
            0x02 => KissCommand::Persistence,
            0x03 => KissCommand::SlotTime,
            0x04 => KissCommand::TxTail,
            0x05 => KissCommand::FullDuplex,
            0x06 => KissCommand::SetHardware,
            0xFF => KissCommand::Return,
            other => KissCommand::Unknown(other),
        }
    }
}

/// Command byte for `command` on TNC `port`.
pub fn command_byte(port: u8, command: KissCommand) -> u8 {
    match command {
        KissCommand::Return => 0xFF,
        other => ((port & 0x0F) << 4) | (other.code() & 0x0F),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KissFrame {
    pub port: u8,
    pub command: KissCommand,
    pub payload: Vec<u8>,
}

impl KissFrame {
    fn from_unescaped(frame: &[u8]) -> Self {
        let cmd = frame[0];
        let (port, command) = if cmd == 0xFF {
            (0, KissCommand::Return)
        } else {
            (cmd >> 4, KissCommand::from_code(cmd & 0x0F))
        };
        Self {
            port,
            command,
            payload: frame[1..].to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("invalid escape sequence FESC 0x{0:02x}")]
    InvalidEscape(u8),
    #[error("frame exceeds 4096 bytes")]
    Oversize,
    #[error("stream ended inside a frame")]
    Truncated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    AwaitingFrameStart,
    InFrame,
    Escape,
}

/// Incremental KISS decoder. Bytes outside a frame are discarded; a closing FEND
/// also opens the next frame, so back-to-back frames may share one delimiter.
#[derive(Debug)]
pub struct KissDecoder {
    buf: BytesMut,
    state: DecoderState,
}

impl Default for KissDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl KissDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(512),
            state: DecoderState::AwaitingFrameStart,
        }
    }

    /// Push bytes, returning completed frames and decode errors in stream order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Result<KissFrame, FrameError>> {
        let mut out = Vec::new();
        for &b in data {
            match self.state {
                DecoderState::AwaitingFrameStart => {
                    if b == FEND {
                        self.buf.clear();
                        self.state = DecoderState::InFrame;
                    }
                }
                DecoderState::InFrame => match b {
                    FEND => {
                        if !self.buf.is_empty() {
                            out.push(Ok(KissFrame::from_unescaped(&self.buf)));
                            self.buf.clear();
                        }
                    }
                    FESC => self.state = DecoderState::Escape,
                    _ => self.append(b, &mut out),
                },
                DecoderState::Escape => match b {
                    TFEND => {
                        self.state = DecoderState::InFrame;
                        self.append(FEND, &mut out);
                    }
                    TFESC => {
                        self.state = DecoderState::InFrame;
                        self.append(FESC, &mut out);
                    }
                    FEND => {
                        // The delimiter still opens the next frame
                        out.push(Err(FrameError::InvalidEscape(b)));
                        self.buf.clear();
                        self.state = DecoderState::InFrame;
                    }
                    _ => {
                        out.push(Err(FrameError::InvalidEscape(b)));
                        self.reset();
                    }
                },
            }
        }
        out
    }

    /// Signal end of stream. Reports a partially assembled frame and resets.
    pub fn finish(&mut self) -> Option<FrameError> {
        let truncated = self.state == DecoderState::Escape
            || (self.state == DecoderState::InFrame && !self.buf.is_empty());
        self.reset();
        truncated.then_some(FrameError::Truncated)
    }

    /// True when no frame is being assembled.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::AwaitingFrameStart
            || (self.state == DecoderState::InFrame && self.buf.is_empty())
    }

    fn append(&mut self, b: u8, out: &mut Vec<Result<KissFrame, FrameError>>) {
        if self.buf.len() >= MAX_FRAME_SIZE {
            out.push(Err(FrameError::Oversize));
            self.reset();
            return;
        }
        self.buf.put_u8(b);
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.state = DecoderState::AwaitingFrameStart;
    }
}

/// Encode one frame: delimiters, command byte and escaped payload.
pub fn encode_frame(port: u8, command: KissCommand, payload: &[u8]) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(payload.len() + payload.len() / 8 + 4);
    out.put_u8(FEND);
    escape_into(&mut out, &[command_byte(port, command)]);
    escape_into(&mut out, payload);
    out.put_u8(FEND);
    out.to_vec()
}

fn escape_into(out: &mut BytesMut, data: &[u8]) {
    for &b in data {
        match b {
            FEND => {
                out.put_u8(FESC);
                out.put_u8(TFEND);
            }
            FESC => {
                out.put_u8(FESC);
                out.put_u8(TFESC);
            }
            _ => out.put_u8(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(results: Vec<Result<KissFrame, FrameError>>) -> Vec<KissFrame> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn encodes_data_frame() {
        assert_eq!(
            encode_frame(0, KissCommand::Data, b"hi"),
            vec![FEND, 0x00, b'h', b'i', FEND]
        );
        assert_eq!(
            encode_frame(2, KissCommand::TxDelay, &[50]),
            vec![FEND, 0x21, 50, FEND]
        );
        assert_eq!(
            encode_frame(5, KissCommand::Return, &[]),
            vec![FEND, 0xFF, FEND]
        );
    }

    #[test]
    fn escapes_delimiter_and_escape_bytes() {
        let encoded = encode_frame(0, KissCommand::Data, &[FEND, 1, FESC, 2]);
        assert_eq!(
            encoded,
            vec![FEND, 0x00, FESC, TFEND, 1, FESC, TFESC, 2, FEND]
        );
        // Port 12 data makes the command byte itself a FEND
        assert_eq!(
            encode_frame(12, KissCommand::Data, &[7]),
            vec![FEND, FESC, TFEND, 7, FEND]
        );

        let mut dec = KissDecoder::new();
        let got = frames(dec.push(&encoded));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].payload, vec![FEND, 1, FESC, 2]);
    }

    #[test]
    fn decode_restores_every_byte_value() {
        let payload: Vec<u8> = (0..=255u8).chain((0..=255u8).rev()).collect();
        let mut dec = KissDecoder::new();
        let got = frames(dec.push(&encode_frame(3, KissCommand::Data, &payload)));
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].port, 3);
        assert_eq!(got[0].command, KissCommand::Data);
        assert_eq!(got[0].payload, payload);
        assert!(dec.is_idle());
    }

    #[test]
    fn frames_split_across_pushes() {
        let encoded = encode_frame(0, KissCommand::Data, &[1, FEND, 2]);
        let mut dec = KissDecoder::new();
        let mut got = Vec::new();
        for b in &encoded {
            got.extend(frames(dec.push(std::slice::from_ref(b))));
        }
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].payload, vec![1, FEND, 2]);
    }

    #[test]
    fn shared_delimiter_and_noise() {
        let mut dec = KissDecoder::new();
        let got = frames(dec.push(&[
            b'x', b'y', FEND, FEND, 0x00, b'a', FEND, 0x00, b'b', FEND, FEND,
        ]));
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].payload, b"a");
        assert_eq!(got[1].payload, b"b");
    }

    #[test]
    fn control_frames_keep_port_and_command() {
        let mut dec = KissDecoder::new();
        let got = frames(dec.push(&[FEND, 0x16, 0, 1, 0, 2, FEND, FEND, 0xFF, FEND]));
        assert_eq!(got[0].port, 1);
        assert_eq!(got[0].command, KissCommand::SetHardware);
        assert_eq!(got[0].payload, vec![0, 1, 0, 2]);
        assert_eq!(got[1].command, KissCommand::Return);
        assert_eq!(KissCommand::from_code(0x0A), KissCommand::Unknown(0x0A));
    }

    #[test]
    fn invalid_escape_resets_decoder() {
        let mut dec = KissDecoder::new();
        let out = dec.push(&[FEND, 0x00, b'a', FESC, b'z', b'b', FEND, 0x00, b'c', FEND]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Err(FrameError::InvalidEscape(b'z')));
        // "b" is discarded as inter-frame noise; its FEND opens the next frame
        assert_eq!(out[1].as_ref().unwrap().payload, b"c");
    }

    #[test]
    fn escape_followed_by_delimiter_opens_next_frame() {
        let mut dec = KissDecoder::new();
        let out = dec.push(&[FEND, 0x00, b'a', FESC, FEND, 0x00, b'c', FEND]);
        assert_eq!(out[0], Err(FrameError::InvalidEscape(FEND)));
        assert_eq!(out[1].as_ref().unwrap().payload, b"c");
    }

    #[test]
    fn oversize_frame_is_rejected() {
        let mut dec = KissDecoder::new();
        let mut data = vec![FEND, 0x00];
        data.extend(std::iter::repeat(0x55).take(MAX_FRAME_SIZE + 10));
        data.extend([FEND, 0x00, b'k', FEND]);
        let out = dec.push(&data);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Err(FrameError::Oversize));
        assert_eq!(out[1].as_ref().unwrap().payload, b"k");
    }

    #[test]
    fn finish_reports_truncation_only_mid_frame() {
        let mut dec = KissDecoder::new();
        assert_eq!(dec.finish(), None);
        dec.push(&[FEND]);
        assert_eq!(dec.finish(), None);
        dec.push(&[FEND, 0x00, 1, 2]);
        assert!(!dec.is_idle());
        assert_eq!(dec.finish(), Some(FrameError::Truncated));
        assert!(dec.is_idle());
        dec.push(&[FEND, 0x00, FESC]);
        assert_eq!(dec.finish(), Some(FrameError::Truncated));
    }
}
