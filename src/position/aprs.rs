//! APRS position report format.
//!
//! Outgoing reports use the `!` data type (no timestamp, no messaging). Either the
//! plain `DDMM.mmN/DDDMM.mmW` form or the 13-byte base-91 compressed form is
//! written, following [`Position::is_compressed`]. Incoming reports accept all four
//! position data types (`!`, `=`, `/`, `@`); the two timestamped types have their
//! 7-character timestamp skipped and the position is stamped with the receive time.

use super::{Position, KNOTS_TO_MPS, METERS_TO_FEET};
use chrono::Utc;

const LAT_SCALE: f64 = 380926.0;
const LON_SCALE: f64 = 190463.0;

// Compression type byte (already offset by 33): current fix, software origin,
// with the NMEA source telling the decoder what `cs` holds.
const T_COURSE_SPEED: u8 = (0x20 | 0x18 | 0x02) + 33;
const T_ALTITUDE: u8 = (0x20 | 0x10 | 0x02) + 33;
const T_NONE: u8 = (0x20 | 0x02) + 33;

/// Minutes of arc hidden at each ambiguity level.
const AMBIGUITY_MINUTES: [f64; 5] = [0.0, 0.1, 1.0, 10.0, 60.0];

/// True when `info` starts with one of the position data type identifiers.
pub fn is_position_report(info: &[u8]) -> bool {
    matches!(info.first(), Some(b'!' | b'=' | b'/' | b'@'))
}

/// Encode the information field of a position report.
pub fn encode(position: &Position) -> String {
    let privacy = position.privacy_level.min(4);
    let (table, symbol) = symbol_parts(&position.symbol_code);
    let altitude_cs = if position.is_compressed && !position.is_speed_bearing_enabled {
        cs_altitude(position)
    } else {
        None
    };

    let mut out = String::with_capacity(48 + position.comment.len());
    out.push('!');
    if position.is_compressed {
        let lat = blur(position.latitude.clamp(-90.0, 90.0), privacy);
        let lon = blur(position.longitude.clamp(-180.0, 180.0), privacy);
        out.push(compressed_table(table));
        push_base91(&mut out, ((90.0 - lat) * LAT_SCALE).round() as u32);
        push_base91(&mut out, ((180.0 + lon) * LON_SCALE).round() as u32);
        out.push(symbol);
        if position.is_speed_bearing_enabled {
            let c = (course(position.bearing_degrees) % 360) / 4;
            let s = ((speed_knots(position.speed_meters_per_second) + 1.0).ln() / 1.08f64.ln())
                .round()
                .clamp(0.0, 89.0) as u8;
            out.push((c as u8 + 33) as char);
            out.push((s + 33) as char);
            out.push(T_COURSE_SPEED as char);
        } else if let Some(cs) = altitude_cs {
            out.push((cs / 91 + 33) as u8 as char);
            out.push((cs % 91 + 33) as u8 as char);
            out.push(T_ALTITUDE as char);
        } else {
            out.push_str("  ");
            out.push(T_NONE as char);
        }
    } else {
        out.push_str(&ambiguate(&format_latitude(position.latitude), privacy));
        out.push(table);
        out.push_str(&ambiguate(&format_longitude(position.longitude), privacy));
        out.push(symbol);
        if position.is_speed_bearing_enabled {
            let knots = speed_knots(position.speed_meters_per_second).round().min(999.0);
            out.push_str(&format!(
                "{:03}/{:03}",
                course(position.bearing_degrees),
                knots as u32
            ));
        }
    }
    if position.is_altitude_enabled && altitude_cs.is_none() {
        out.push_str(&format_altitude(position.altitude_meters));
    }
    out.push_str(&position.comment);
    out
}

/// Decode a position report. `None` when `info` is not a well-formed report.
pub fn decode(src: &str, dst: &str, info: &[u8]) -> Option<Position> {
    let body = match info.first()? {
        b'!' | b'=' => &info[1..],
        b'/' | b'@' => info.get(8..)?,
        _ => return None,
    };
    let text = std::str::from_utf8(body).ok()?;

    let (dst_call, ssid) = split_ssid(dst);
    let mut position = Position::new(src, dst_call, 0.0, 0.0);
    position.timestamp = Utc::now();
    position.ext_digipath_ssid = ssid;

    let rest = match body.first()? {
        b'0'..=b'9' | b' ' => decode_uncompressed(text, &mut position)?,
        _ => decode_compressed(text, &mut position)?,
    };
    let comment = extract_altitude(rest, &mut position);
    position.comment = comment.trim().to_string();
    Some(position)
}

fn decode_uncompressed<'a>(text: &'a str, position: &mut Position) -> Option<&'a str> {
    let b = text.as_bytes();
    if b.len() < 19 || !b[8].is_ascii_graphic() || !b[18].is_ascii_graphic() {
        return None;
    }
    let (lat, lat_blur) = parse_coordinate(&b[0..8], 2, b'N', b'S', 90.0)?;
    let (lon, lon_blur) = parse_coordinate(&b[9..18], 3, b'E', b'W', 180.0)?;
    position.latitude = lat;
    position.longitude = lon;
    position.symbol_code = format!("{}{}", b[8] as char, b[18] as char);
    position.privacy_level = lat_blur.max(lon_blur);
    position.is_compressed = false;

    let mut rest = text.get(19..)?;
    if let Some((course, knots)) = parse_course_speed(rest) {
        position.bearing_degrees = (course % 360) as f32;
        position.speed_meters_per_second = (knots as f64 * KNOTS_TO_MPS) as f32;
        position.is_speed_bearing_enabled = true;
        rest = &rest[7..];
    }
    Some(rest)
}

fn decode_compressed<'a>(text: &'a str, position: &mut Position) -> Option<&'a str> {
    let b = text.as_bytes();
    if b.len() < 13 {
        return None;
    }
    let table = match b[0] {
        t @ (b'/' | b'\\' | b'A'..=b'Z') => t as char,
        t @ b'a'..=b'j' => (b'0' + (t - b'a')) as char,
        _ => return None,
    };
    let y = base91(&b[1..5])?;
    let x = base91(&b[5..9])?;
    let lat = 90.0 - y as f64 / LAT_SCALE;
    let lon = x as f64 / LON_SCALE - 180.0;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    if !b[9].is_ascii_graphic() {
        return None;
    }
    position.latitude = lat;
    position.longitude = lon;
    position.symbol_code = format!("{}{}", table, b[9] as char);
    position.is_compressed = true;

    if b[10] != b' ' {
        let c = b[10].checked_sub(33)?;
        let s = b[11].checked_sub(33)?;
        let t = b[12].checked_sub(33)?;
        if (t >> 3) & 0b11 == 0b10 {
            let cs = c as i32 * 91 + s as i32;
            position.altitude_meters = 1.002f64.powi(cs) / METERS_TO_FEET;
            position.is_altitude_enabled = true;
        } else if c <= 89 {
            position.bearing_degrees = c as f32 * 4.0;
            position.speed_meters_per_second =
                ((1.08f64.powi(s as i32) - 1.0) * KNOTS_TO_MPS) as f32;
            position.is_speed_bearing_enabled = true;
        }
        // `{` (pre-calculated radio range) carries nothing we keep
    }
    text.get(13..)
}

fn parse_coordinate(
    field: &[u8],
    degree_digits: usize,
    positive: u8,
    negative: u8,
    max: f64,
) -> Option<(f64, u8)> {
    let (digits, hemisphere) = field.split_at(field.len() - 1);
    let sign = match hemisphere[0] {
        h if h == positive => 1.0,
        h if h == negative => -1.0,
        _ => return None,
    };
    if digits[degree_digits + 2] != b'.' {
        return None;
    }
    let mut blurred = 0u8;
    let mut clean = String::with_capacity(digits.len());
    for &c in digits {
        match c {
            b'0'..=b'9' | b'.' => clean.push(c as char),
            b' ' => {
                blurred += 1;
                clean.push('0');
            }
            _ => return None,
        }
    }
    let degrees: f64 = clean[..degree_digits].parse().ok()?;
    let minutes: f64 = clean[degree_digits..].parse().ok()?;
    if minutes >= 60.0 {
        return None;
    }
    let value = degrees + minutes / 60.0;
    if value > max {
        return None;
    }
    Some((sign * value, blurred.min(4)))
}

fn parse_course_speed(rest: &str) -> Option<(u16, u16)> {
    let b = rest.as_bytes();
    if b.len() < 7 || b[3] != b'/' {
        return None;
    }
    if !b[..3].iter().chain(&b[4..7]).all(u8::is_ascii_digit) {
        return None;
    }
    let course = rest[..3].parse().ok()?;
    let speed = rest[4..7].parse().ok()?;
    Some((course, speed))
}

fn extract_altitude(rest: &str, position: &mut Position) -> String {
    if let Some(idx) = rest.find("/A=") {
        let feet = rest
            .get(idx + 3..idx + 9)
            .and_then(|v| v.parse::<i32>().ok());
        if let Some(feet) = feet {
            position.altitude_meters = feet as f64 / METERS_TO_FEET;
            position.is_altitude_enabled = true;
            let mut comment = String::with_capacity(rest.len());
            comment.push_str(&rest[..idx]);
            comment.push_str(&rest[idx + 9..]);
            return comment;
        }
    }
    rest.to_string()
}

/// Split a `CALL-N` destination into the call and its SSID.
pub fn split_ssid(callsign: &str) -> (&str, u8) {
    if let Some((call, ssid)) = callsign.rsplit_once('-') {
        if let Ok(n) = ssid.parse::<u8>() {
            if n <= 15 && !call.is_empty() {
                return (call, n);
            }
        }
    }
    (callsign, 0)
}

fn symbol_parts(code: &str) -> (char, char) {
    let mut chars = code.chars();
    match (chars.next(), chars.next()) {
        (Some(t), Some(s)) if t.is_ascii_graphic() && s.is_ascii_graphic() => (t, s),
        _ => ('/', '['),
    }
}

/// Overlay digits are written as `a`..`j` in the compressed form.
fn compressed_table(table: char) -> char {
    match table {
        '0'..='9' => (b'a' + (table as u8 - b'0')) as char,
        _ => table,
    }
}

fn format_latitude(lat: f64) -> String {
    let hemisphere = if lat < 0.0 { 'S' } else { 'N' };
    let (deg, min) = degrees_minutes(lat.abs().min(90.0));
    format!("{:02}{:02}.{:02}{}", deg, min / 100, min % 100, hemisphere)
}

fn format_longitude(lon: f64) -> String {
    let hemisphere = if lon < 0.0 { 'W' } else { 'E' };
    let (deg, min) = degrees_minutes(lon.abs().min(180.0));
    format!("{:03}{:02}.{:02}{}", deg, min / 100, min % 100, hemisphere)
}

/// Whole degrees and hundredths of a minute.
fn degrees_minutes(value: f64) -> (u32, u32) {
    let hundredths = (value * 6000.0).round() as u32;
    (hundredths / 6000, hundredths % 6000)
}

/// Replace the last `level` digits (hemisphere excluded) with spaces.
fn ambiguate(field: &str, level: u8) -> String {
    let mut chars: Vec<char> = field.chars().collect();
    let mut remaining = level as usize;
    for i in (0..chars.len().saturating_sub(1)).rev() {
        if remaining == 0 {
            break;
        }
        if chars[i].is_ascii_digit() {
            chars[i] = ' ';
            remaining -= 1;
        }
    }
    chars.into_iter().collect()
}

fn blur(value: f64, level: u8) -> f64 {
    let step = AMBIGUITY_MINUTES[level as usize] / 60.0;
    if step == 0.0 {
        value
    } else {
        (value / step).round() * step
    }
}

fn course(bearing: f32) -> u32 {
    match bearing.rem_euclid(360.0).round() as u32 {
        0 | 360 => 360,
        c => c,
    }
}

fn speed_knots(mps: f32) -> f64 {
    (mps as f64 / KNOTS_TO_MPS).max(0.0)
}

fn cs_altitude(position: &Position) -> Option<u32> {
    if !position.is_altitude_enabled {
        return None;
    }
    let feet = position.altitude_meters * METERS_TO_FEET;
    if feet < 1.0 {
        return None;
    }
    Some(((feet.ln() / 1.002f64.ln()).round() as u32).min(91 * 91 - 1))
}

fn format_altitude(meters: f64) -> String {
    let feet = ((meters * METERS_TO_FEET).round() as i64).clamp(-99_999, 999_999);
    if feet < 0 {
        format!("/A=-{:05}", -feet)
    } else {
        format!("/A={:06}", feet)
    }
}

fn push_base91(out: &mut String, value: u32) {
    for place in [91 * 91 * 91, 91 * 91, 91, 1] {
        out.push(((value / place) % 91 + 33) as u8 as char);
    }
}

fn base91(digits: &[u8]) -> Option<u32> {
    digits.iter().try_fold(0u32, |acc, &d| match d {
        33..=123 => Some(acc * 91 + (d - 33) as u32),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(lat: f64, lon: f64) -> Position {
        let mut p = Position::new("N0CALL-7", "APZMDM", lat, lon);
        p.symbol_code = "/-".to_string();
        p
    }

    #[test]
    fn uncompressed_basic() {
        let mut p = report(49.058333, -72.029167);
        p.comment = "Test".to_string();
        assert_eq!(encode(&p), "!4903.50N/07201.75W-Test");

        let decoded = decode("N0CALL-7", "APZMDM", b"!4903.50N/07201.75W-Test").unwrap();
        assert!((decoded.latitude - 49.058333).abs() < 1e-5);
        assert!((decoded.longitude + 72.029167).abs() < 1e-5);
        assert_eq!(decoded.symbol_code, "/-");
        assert_eq!(decoded.comment, "Test");
        assert!(!decoded.is_compressed);
        assert!(!decoded.is_speed_bearing_enabled);
        assert!(!decoded.is_altitude_enabled);
    }

    #[test]
    fn southern_and_eastern_hemispheres() {
        let p = report(-33.8675, 151.207);
        let info = encode(&p);
        assert_eq!(info, "!3352.05S/15112.42E-");
        let decoded = decode("VK2ABC", "APZMDM", info.as_bytes()).unwrap();
        assert!((decoded.latitude + 33.8675).abs() < 1e-3);
        assert!((decoded.longitude - 151.207).abs() < 1e-3);
    }

    #[test]
    fn course_speed_and_altitude() {
        let mut p = report(49.058333, -72.029167);
        p.is_speed_bearing_enabled = true;
        p.bearing_degrees = 88.0;
        p.speed_meters_per_second = (36.0 * KNOTS_TO_MPS) as f32;
        p.is_altitude_enabled = true;
        p.altitude_meters = 1234.0 / METERS_TO_FEET;
        p.comment = " mobile".to_string();
        let info = encode(&p);
        assert_eq!(info, "!4903.50N/07201.75W-088/036/A=001234 mobile");

        let decoded = decode("N0CALL-7", "APZMDM", info.as_bytes()).unwrap();
        assert_eq!(decoded.bearing_degrees, 88.0);
        assert!((decoded.speed_meters_per_second as f64 - 36.0 * KNOTS_TO_MPS).abs() < 0.01);
        assert!((decoded.altitude_meters * METERS_TO_FEET - 1234.0).abs() < 0.01);
        assert_eq!(decoded.comment, "mobile");
    }

    #[test]
    fn negative_altitude() {
        assert_eq!(format_altitude(-10.0), "/A=-00033");
        let decoded = decode("A", "B", b"!4903.50N/07201.75W-/A=-00033").unwrap();
        assert!((decoded.altitude_meters + 10.0).abs() < 0.2);
    }

    #[test]
    fn north_is_course_360() {
        let mut p = report(10.0, 10.0);
        p.is_speed_bearing_enabled = true;
        p.bearing_degrees = 0.0;
        assert!(encode(&p).ends_with("360/000"));
        let decoded = decode("A", "B", encode(&p).as_bytes()).unwrap();
        assert_eq!(decoded.bearing_degrees, 0.0);
    }

    #[test]
    fn ambiguity_levels() {
        let mut p = report(49.058333, -72.029167);
        let expected = [
            "!4903.50N/07201.75W-",
            "!4903.5 N/07201.7 W-",
            "!4903.  N/07201.  W-",
            "!490 .  N/0720 .  W-",
            "!49  .  N/072  .  W-",
        ];
        for (level, want) in expected.iter().enumerate() {
            p.privacy_level = level as u8;
            assert_eq!(encode(&p), *want, "level {}", level);
            let decoded = decode("A", "B", want.as_bytes()).unwrap();
            assert_eq!(decoded.privacy_level, level as u8);
        }
        p.privacy_level = 9;
        assert_eq!(encode(&p), expected[4]);
    }

    #[test]
    fn decodes_compressed_reference_report() {
        let decoded = decode("N0CALL", "APZMDM", b"!/5L!!<*e7>7P[").unwrap();
        assert!(decoded.is_compressed);
        assert!((decoded.latitude - 49.5).abs() < 1e-4);
        assert!((decoded.longitude + 72.75).abs() < 1e-4);
        assert_eq!(decoded.symbol_code, "/>");
        assert!(decoded.is_speed_bearing_enabled);
        assert_eq!(decoded.bearing_degrees, 88.0);
        let knots = decoded.speed_meters_per_second as f64 / KNOTS_TO_MPS;
        assert!((knots - 36.2).abs() < 0.1);
    }

    #[test]
    fn compressed_report_keeps_position() {
        let mut p = report(51.4779, -0.0015);
        p.is_compressed = true;
        p.is_speed_bearing_enabled = true;
        p.bearing_degrees = 270.0;
        p.speed_meters_per_second = 10.0;
        p.comment = "hi".to_string();
        let info = encode(&p);
        assert_eq!(info.len(), 1 + 13 + 2);

        let decoded = decode("A", "B", info.as_bytes()).unwrap();
        assert!(decoded.is_compressed);
        assert!((decoded.latitude - 51.4779).abs() < 1e-4);
        assert!((decoded.longitude + 0.0015).abs() < 1e-4);
        assert_eq!(decoded.bearing_degrees, 268.0);
        assert!((decoded.speed_meters_per_second - 10.0).abs() < 0.5);
        assert_eq!(decoded.comment, "hi");
    }

    #[test]
    fn compressed_altitude_in_cs() {
        let mut p = report(0.0, 0.0);
        p.is_compressed = true;
        p.is_altitude_enabled = true;
        p.altitude_meters = 100.0;
        let info = encode(&p);
        assert!(!info.contains("/A="));
        let decoded = decode("A", "B", info.as_bytes()).unwrap();
        assert!(decoded.is_altitude_enabled);
        assert!((decoded.altitude_meters - 100.0).abs() < 0.5);
    }

    #[test]
    fn compressed_overlay_symbol() {
        let mut p = report(45.0, 9.0);
        p.symbol_code = "3#".to_string();
        p.is_compressed = true;
        let info = encode(&p);
        assert_eq!(info.as_bytes()[1], b'd');
        let decoded = decode("A", "B", info.as_bytes()).unwrap();
        assert_eq!(decoded.symbol_code, "3#");
    }

    #[test]
    fn timestamped_reports() {
        let decoded = decode("A", "B", b"@092345z4903.50N/07201.75W>").unwrap();
        assert!((decoded.latitude - 49.058333).abs() < 1e-5);
        assert_eq!(decoded.symbol_code, "/>");
        assert!(decode("A", "B", b"/0923").is_none());
    }

    #[test]
    fn destination_ssid_is_digipath() {
        let decoded = decode("A", "APZMDM-2", b"=4903.50N/07201.75W-").unwrap();
        assert_eq!(decoded.dst_callsign, "APZMDM");
        assert_eq!(decoded.ext_digipath_ssid, 2);
        assert_eq!(split_ssid("APZMDM"), ("APZMDM", 0));
        assert_eq!(split_ssid("X-99"), ("X-99", 0));
    }

    #[test]
    fn malformed_reports_are_rejected() {
        assert!(decode("A", "B", b"!49XX.50N/07201.75W-").is_none());
        assert!(decode("A", "B", b"!9903.50N/07201.75W-").is_none());
        assert!(decode("A", "B", b"!4903.50Q/07201.75W-").is_none());
        assert!(decode("A", "B", b"!4903.50N/07201").is_none());
        assert!(decode("A", "B", b"!/5L!").is_none());
        assert!(decode("A", "B", b">status text").is_none());
        assert!(decode("A", "B", b"").is_none());
    }

    #[test]
    fn position_type_detection() {
        assert!(is_position_report(b"!4903.50N"));
        assert!(is_position_report(b"=x"));
        assert!(is_position_report(b"@x"));
        assert!(is_position_report(b"/x"));
        assert!(!is_position_report(b":N0CALL   :hello"));
        assert!(!is_position_report(&[0x00, 4]));
        assert!(!is_position_report(b""));
    }
}
