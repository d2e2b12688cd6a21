//! Addressing carried inside a KISS data frame.
//!
//! The payload of every data frame is a TNC2-style monitor line,
//! `SRC>DST[,DIGI...]:INFO`. The information field decides what the frame is:
//!
//! - a position report when it starts with an APRS position data type,
//! - compressed audio when it starts with [`AUDIO_MARKER`], followed by the codec
//!   mode id and the codec frames,
//! - opaque data otherwise.
//!
//! Data whose first byte would be read as one of the above (or as
//! [`DATA_MARKER`] itself) goes out behind a [`DATA_MARKER`], which the receiver
//! strips. See [`data_info`].

use crate::codec::CodecMode;
use crate::position::aprs;
use std::borrow::Cow;

pub const AUDIO_MARKER: u8 = 0x00;
pub const DATA_MARKER: u8 = 0x01;

const MAX_CALLSIGN_LEN: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub src: &'a str,
    pub dst: &'a str,
    pub path: Vec<&'a str>,
    pub info: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Body<'a> {
    Position,
    Audio {
        codec_mode: Option<CodecMode>,
        frame: &'a [u8],
    },
    Data(&'a [u8]),
}

impl<'a> Envelope<'a> {
    /// Parse a frame payload. `None` when the header is not a valid address line.
    pub fn parse(payload: &'a [u8]) -> Option<Self> {
        let colon = payload.iter().position(|&b| b == b':')?;
        let header = std::str::from_utf8(&payload[..colon]).ok()?;
        let (src, rest) = header.split_once('>')?;
        let mut hops = rest.split(',');
        let dst = hops.next()?;
        if !is_callsign(src) || !is_callsign(dst) {
            return None;
        }
        let path: Vec<&str> = hops.collect();
        if !path.iter().all(|hop| is_callsign(hop.trim_end_matches('*'))) {
            return None;
        }
        Some(Self {
            src,
            dst,
            path,
            info: &payload[colon + 1..],
        })
    }

    pub fn body(&self) -> Body<'a> {
        if aprs::is_position_report(self.info) {
            return Body::Position;
        }
        match self.info {
            [DATA_MARKER, data @ ..] => Body::Data(data),
            [AUDIO_MARKER, mode, frame @ ..] => Body::Audio {
                codec_mode: CodecMode::from_id(*mode),
                frame,
            },
            _ => Body::Data(self.info),
        }
    }
}

/// Build a frame payload. Empty path entries are skipped.
pub fn encode(src: &str, dst: &str, path: &[&str], info: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len() + dst.len() + 16 + info.len());
    out.extend_from_slice(src.as_bytes());
    out.push(b'>');
    out.extend_from_slice(dst.as_bytes());
    for hop in path.iter().map(|h| h.trim()).filter(|h| !h.is_empty()) {
        out.push(b',');
        out.extend_from_slice(hop.as_bytes());
    }
    out.push(b':');
    out.extend_from_slice(info);
    out
}

/// Information field of a compressed audio frame.
pub fn audio_info(codec_mode: CodecMode, frame: &[u8]) -> Vec<u8> {
    let mut info = Vec::with_capacity(frame.len() + 2);
    info.push(AUDIO_MARKER);
    info.push(codec_mode.id());
    info.extend_from_slice(frame);
    info
}

/// Information field of a data packet. Marked only when the first byte would
/// otherwise be taken for a position, audio or a marked packet.
pub fn data_info(data: &[u8]) -> Cow<'_, [u8]> {
    let ambiguous = aprs::is_position_report(data)
        || matches!(data.first(), Some(&AUDIO_MARKER) | Some(&DATA_MARKER));
    if !ambiguous {
        return Cow::Borrowed(data);
    }
    let mut info = Vec::with_capacity(data.len() + 1);
    info.push(DATA_MARKER);
    info.extend_from_slice(data);
    Cow::Owned(info)
}

/// Split a comma separated digipeater path setting.
pub fn split_path(digipath: &str) -> Vec<&str> {
    digipath
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .collect()
}

/// Station identifier: 1 to 9 letters, digits or `-`.
pub fn is_callsign(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_CALLSIGN_LEN
        && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_path() {
        let env = Envelope::parse(b"N0CALL-7>APZMDM,WIDE1-1,WIDE2-1*:hello").unwrap();
        assert_eq!(env.src, "N0CALL-7");
        assert_eq!(env.dst, "APZMDM");
        assert_eq!(env.path, vec!["WIDE1-1", "WIDE2-1*"]);
        assert_eq!(env.info, b"hello");
        assert_eq!(env.body(), Body::Data(b"hello"));
    }

    #[test]
    fn info_may_contain_colons() {
        let env = Envelope::parse(b"A>B::N0CALL   :msg").unwrap();
        assert_eq!(env.info, b":N0CALL   :msg");
    }

    #[test]
    fn classifies_body() {
        let env = Envelope::parse(b"A>B:!4903.50N/07201.75W-").unwrap();
        assert_eq!(env.body(), Body::Position);

        let payload = encode("A", "B", &[], &audio_info(CodecMode::Mode1300, &[9, 8, 7]));
        let env = Envelope::parse(&payload).unwrap();
        assert_eq!(
            env.body(),
            Body::Audio {
                codec_mode: Some(CodecMode::Mode1300),
                frame: &[9, 8, 7]
            }
        );

        let env = Envelope::parse(&[b'A', b'>', b'B', b':', 0x00, 0x42, 1]).unwrap();
        assert_eq!(
            env.body(),
            Body::Audio {
                codec_mode: None,
                frame: &[1]
            }
        );

        // A lone marker byte has no mode; it is plain data
        let env = Envelope::parse(&[b'A', b'>', b'B', b':', 0x00]).unwrap();
        assert_eq!(env.body(), Body::Data(&[0x00]));
    }

    #[test]
    fn data_that_looks_like_another_body_is_marked() {
        assert!(matches!(data_info(b"hello"), Cow::Borrowed(_)));
        let cases: [&[u8]; 4] = [b"!4903.50N/07201.75W-", &[0x00, 0x02, 0xAA], &[0x01], b"@x"];
        for data in cases {
            let info = data_info(data);
            assert_eq!(info[0], DATA_MARKER);
            let payload = encode("A", "B", &[], &info);
            let env = Envelope::parse(&payload).unwrap();
            assert_eq!(env.body(), Body::Data(data));
        }
        assert_eq!(data_info(b"").as_ref(), b"");
    }

    #[test]
    fn encode_skips_empty_hops() {
        let payload = encode("A", "B", &split_path(" WIDE1-1, ,WIDE2-2 "), b"x");
        assert_eq!(payload, b"A>B,WIDE1-1,WIDE2-2:x");
        assert_eq!(encode("A", "B", &[], b""), b"A>B:");
    }

    #[test]
    fn rejects_bad_headers() {
        assert!(Envelope::parse(b"no header here").is_none());
        assert!(Envelope::parse(b">B:x").is_none());
        assert!(Envelope::parse(b"A>:x").is_none());
        assert!(Envelope::parse(b"A B>C:x").is_none());
        assert!(Envelope::parse(b"A>B,,C:x").is_none());
        assert!(Envelope::parse(b"TOOLONGCALL>B:x").is_none());
        assert!(Envelope::parse(&[0xFF, b'>', b'B', b':']).is_none());
    }
}
