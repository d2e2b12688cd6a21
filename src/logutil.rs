//! Logging helpers for over-the-air content.
//!
//! Comments, status text and callsigns arrive from remote stations and may contain
//! anything; frames are binary. Both are rendered to a bounded single line before
//! they reach the log.

use std::fmt::Write;

const MAX_PREVIEW: usize = 120;

/// Escape untrusted text for single-line logging.
///
/// Newlines, tabs and other control characters are escaped, backslashes doubled,
/// and anything past [`MAX_PREVIEW`] characters is replaced by an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Lower-case hex of the first `max` bytes, with a `+N` suffix for the remainder.
pub fn hex_snippet(data: &[u8], max: usize) -> String {
    let mut out = String::with_capacity(max.min(data.len()) * 2 + 6);
    for b in data.iter().take(max) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    if data.len() > max {
        let _ = write!(&mut out, "..+{}", data.len() - max);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_control_characters() {
        let esc = escape_log("QRV\n73\r\tde N0CALL\x07");
        assert_eq!(esc, "QRV\\n73\\r\\tde N0CALL\\x07");
    }

    #[test]
    fn long_comment_is_truncated() {
        let s = "x".repeat(500);
        let esc = escape_log(&s);
        assert!(esc.ends_with('…'));
        assert_eq!(esc.chars().count(), MAX_PREVIEW + 1);
    }

    #[test]
    fn hex_snippet_marks_remainder() {
        assert_eq!(hex_snippet(&[0xc0, 0x00, 0x41], 8), "c00041");
        assert_eq!(hex_snippet(&[0xc0, 0x00, 0x41, 0xc0], 2), "c000..+2");
    }
}
