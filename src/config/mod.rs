//! # Configuration Management Module
//!
//! All settings the link factories consume live in one TOML file:
//!
//! - [`TransportConfig`] - which medium, plus the per-medium endpoint settings
//! - [`ProtocolConfig`] - link framing and the Codec2 voice decorator
//! - [`StationConfig`] - our callsign and how position reports are encoded
//! - [`KissConfig`] - TNC parameters sent on initialize
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use c2link::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("c2link.toml").await?;
//!     println!("Transport: {:?}", config.transport_type());
//!     Config::create_default("c2link.example.toml").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [transport]
//! type = "usb"                 # usb | bluetooth | tcp_ip | ble | sound_modem | loopback
//! serial_port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! sound_modem_type = "1200"    # "F..." selects FreeDV, otherwise FSK baud
//!
//! [protocol]
//! type = "kiss"                # raw | kiss | kiss_parrot
//! codec2_enabled = true
//! codec2_mode = 1300
//!
//! [station]
//! callsign = "N0CALL-7"
//! symbol = "/["
//! ```
//!
//! Type strings are only checked for existence: an unknown transport falls back to
//! loopback and an unknown protocol to raw, each with a warning in the log.

use crate::codec::CodecMode;
use crate::error::LinkError;
use crate::protocol::ProtocolType;
use crate::transport::TransportType;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub transport: TransportConfig,
    pub protocol: ProtocolConfig,
    pub station: StationConfig,
    #[serde(default)]
    pub kiss: KissConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Medium name; see [`TransportType`]
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Sound modem sub-type. Prefix `F` selects FreeDV, otherwise the FSK baud rate.
    #[serde(default = "default_sound_modem_type")]
    pub sound_modem_type: String,
    #[serde(default)]
    pub serial_port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// RFCOMM tty bound to the paired radio, e.g. `/dev/rfcomm0`
    #[serde(default)]
    pub bluetooth_device: String,
    /// `host:port` of a KISS-over-TCP TNC
    #[serde(default)]
    pub tcp_address: String,
}

fn default_sound_modem_type() -> String {
    "1200".to_string()
}

fn default_baud_rate() -> u32 {
    115200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Framing name; see [`ProtocolType`]
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Wrap the framing protocol in the Codec2 voice decorator
    #[serde(default)]
    pub codec2_enabled: bool,
    /// Codec2 bitrate: 3200, 2400, 1600, 1400, 1300 or 1200
    #[serde(default = "default_codec2_mode")]
    pub codec2_mode: u32,
}

fn default_codec2_mode() -> u32 {
    1300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    pub callsign: String,
    #[serde(default = "default_destination")]
    pub destination: String,
    /// Comma separated digipeater path, e.g. `WIDE1-1,WIDE2-1`
    #[serde(default)]
    pub digipath: String,
    /// SSID appended to the destination to request a generic digipath (0 = none)
    #[serde(default)]
    pub ext_digipath_ssid: u8,
    /// Symbol table identifier followed by symbol code
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Position ambiguity, 0 (exact) to 4 (about 60 nm)
    #[serde(default)]
    pub privacy_level: u8,
    /// Use the compressed position format
    #[serde(default)]
    pub compressed: bool,
    #[serde(default)]
    pub speed_bearing_enabled: bool,
    #[serde(default)]
    pub altitude_enabled: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub status: String,
}

fn default_destination() -> String {
    "APZMDM".to_string()
}

fn default_symbol() -> String {
    "/[".to_string()
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            callsign: "N0CALL".to_string(),
            destination: default_destination(),
            digipath: "WIDE1-1".to_string(),
            ext_digipath_ssid: 0,
            symbol: default_symbol(),
            privacy_level: 0,
            compressed: false,
            speed_bearing_enabled: false,
            altitude_enabled: false,
            comment: String::new(),
            status: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KissConfig {
    /// Send the parameter frames below when the protocol is initialized
    pub send_params_on_init: bool,
    /// TNC port (high nibble of the command byte)
    pub port: u8,
    /// Keyup delay, 10 ms units
    pub tx_delay: u8,
    /// p-persistence, p = (value + 1) / 256
    pub persistence: u8,
    /// Slot interval, 10 ms units
    pub slot_time: u8,
    /// Tail time, 10 ms units
    pub tx_tail: u8,
}

impl Default for KissConfig {
    fn default() -> Self {
        Self {
            send_params_on_init: false,
            port: 0,
            tx_delay: 50,
            persistence: 63,
            slot_time: 10,
            tx_tail: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Configured medium; `None` when absent or unrecognised.
    pub fn transport_type(&self) -> Option<TransportType> {
        TransportType::from_setting(self.transport.kind.as_deref())
    }

    /// Configured framing; `None` when absent or unrecognised.
    pub fn protocol_type(&self) -> Option<ProtocolType> {
        ProtocolType::from_setting(self.protocol.kind.as_deref())
    }

    /// Codec2 mode when the voice decorator is enabled.
    pub fn codec_mode(&self) -> std::result::Result<Option<CodecMode>, LinkError> {
        if !self.protocol.codec2_enabled {
            return Ok(None);
        }
        CodecMode::from_bitrate(self.protocol.codec2_mode)
            .map(Some)
            .ok_or_else(|| {
                LinkError::InvalidSetting(format!(
                    "codec2_mode {} (expected 3200, 2400, 1600, 1400, 1300 or 1200)",
                    self.protocol.codec2_mode
                ))
            })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            transport: TransportConfig {
                kind: Some(TransportType::Loopback.to_string()),
                sound_modem_type: default_sound_modem_type(),
                serial_port: "/dev/ttyUSB0".to_string(),
                baud_rate: default_baud_rate(),
                bluetooth_device: "/dev/rfcomm0".to_string(),
                tcp_address: "127.0.0.1:8001".to_string(),
            },
            protocol: ProtocolConfig {
                kind: Some(ProtocolType::Kiss.to_string()),
                codec2_enabled: true,
                codec2_mode: default_codec2_mode(),
            },
            station: StationConfig::default(),
            kiss: KissConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.transport_type(), Some(TransportType::Loopback));
        assert_eq!(parsed.protocol_type(), Some(ProtocolType::Kiss));
        assert_eq!(parsed.codec_mode().unwrap(), Some(CodecMode::Mode1300));
        assert_eq!(parsed.station.destination, "APZMDM");
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let text = r#"
            [transport]
            type = "sound_modem"

            [protocol]

            [station]
            callsign = "DL1ABC-7"

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.transport_type(), Some(TransportType::SoundModem));
        assert_eq!(config.transport.sound_modem_type, "1200");
        assert_eq!(config.protocol_type(), None);
        assert_eq!(config.codec_mode().unwrap(), None);
        assert_eq!(config.station.symbol, "/[");
        assert_eq!(config.kiss.tx_delay, 50);
    }

    #[test]
    fn unknown_types_are_not_errors() {
        let mut config = Config::default();
        config.transport.kind = Some("carrier_pigeon".to_string());
        config.protocol.kind = Some("morse".to_string());
        assert_eq!(config.transport_type(), None);
        assert_eq!(config.protocol_type(), None);
    }

    #[test]
    fn bad_codec_mode_is_rejected() {
        let mut config = Config::default();
        config.protocol.codec2_mode = 450;
        assert!(matches!(
            config.codec_mode(),
            Err(LinkError::InvalidSetting(_))
        ));
    }
}
