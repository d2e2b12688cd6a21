//! Station position reports.
//!
//! [`Position`] is a plain transfer object: the KISS protocol builds one when a
//! position report is decoded and hands it to the callback; storage and map layers
//! consume it. Nothing in the link stack mutates it afterwards.

pub mod aprs;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const KNOTS_TO_MPS: f64 = 0.514444;
pub const METERS_TO_FEET: f64 = 3.28084;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// When the report was decoded (or built, for outgoing reports)
    pub timestamp: DateTime<Utc>,
    pub src_callsign: String,
    pub dst_callsign: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_meters: f64,
    pub bearing_degrees: f32,
    pub speed_meters_per_second: f32,
    pub status: String,
    pub comment: String,
    /// Symbol table identifier followed by the symbol code, e.g. `/[`
    pub symbol_code: String,
    pub is_compressed: bool,
    /// Position ambiguity level, 0..=4
    pub privacy_level: u8,
    /// Generic digipath requested through the destination SSID
    pub ext_digipath_ssid: u8,
    pub is_speed_bearing_enabled: bool,
    pub is_altitude_enabled: bool,
}

impl Position {
    pub fn new(src_callsign: &str, dst_callsign: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            src_callsign: src_callsign.to_string(),
            dst_callsign: dst_callsign.to_string(),
            latitude,
            longitude,
            altitude_meters: 0.0,
            bearing_degrees: 0.0,
            speed_meters_per_second: 0.0,
            status: String::new(),
            comment: String::new(),
            symbol_code: "/[".to_string(),
            is_compressed: false,
            privacy_level: 0,
            ext_digipath_ssid: 0,
            is_speed_bearing_enabled: false,
            is_altitude_enabled: false,
        }
    }

    /// Maidenhead locator (6 characters), as shown next to station markers.
    pub fn maidenhead(&self) -> String {
        let lon = (self.longitude + 180.0).clamp(0.0, 359.999_999);
        let lat = (self.latitude + 90.0).clamp(0.0, 179.999_999);
        let field_lon = (lon / 20.0) as u8;
        let field_lat = (lat / 10.0) as u8;
        let square_lon = ((lon % 20.0) / 2.0) as u8;
        let square_lat = (lat % 10.0) as u8;
        let sub_lon = ((lon % 2.0) * 12.0) as u8;
        let sub_lat = ((lat % 1.0) * 24.0) as u8;
        [
            (b'A' + field_lon) as char,
            (b'A' + field_lat) as char,
            (b'0' + square_lon) as char,
            (b'0' + square_lat) as char,
            (b'a' + sub_lon) as char,
            (b'a' + sub_lat) as char,
        ]
        .iter()
        .collect()
    }
}
