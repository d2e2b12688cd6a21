//! Protocol selection. Like transport selection this never fails: an absent or
//! unknown framing yields [`Raw`], logged at `warn`.

use super::{Kiss, KissParrot, Protocol, ProtocolType, Raw};
use crate::config::{KissConfig, StationConfig};
use log::{debug, warn};

pub struct ProtocolFactory;

impl ProtocolFactory {
    pub fn create(
        protocol_type: Option<ProtocolType>,
        station: &StationConfig,
        kiss: &KissConfig,
    ) -> Box<dyn Protocol> {
        let Some(protocol_type) = protocol_type else {
            warn!("No protocol type configured; using raw");
            return Box::new(Raw::new());
        };
        debug!("Creating {} protocol", protocol_type);
        match protocol_type {
            ProtocolType::Raw => Box::new(Raw::new()),
            ProtocolType::Kiss => Box::new(Kiss::new(station.clone(), kiss.clone())),
            ProtocolType::KissParrot => Box::new(KissParrot::new(station.clone(), kiss.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn build(protocol_type: Option<ProtocolType>) -> Box<dyn Protocol> {
        ProtocolFactory::create(
            protocol_type,
            &StationConfig::default(),
            &KissConfig::default(),
        )
    }

    #[test]
    fn missing_type_falls_back_to_raw() {
        let mock = MockTransport::new();
        let mut protocol = build(None);
        protocol.initialize(Box::new(mock.clone())).unwrap();
        // Raw writes unframed and has no position support
        protocol.send_data("A", "B", b"xyz").unwrap();
        assert_eq!(mock.written(), b"xyz");
        assert!(protocol
            .send_position(0.0, 0.0, 0.0, 0.0, "")
            .unwrap_err()
            .is_unsupported());
    }

    #[test]
    fn kiss_frames_data() {
        let mock = MockTransport::new();
        let mut protocol = build(Some(ProtocolType::Kiss));
        protocol.initialize(Box::new(mock.clone())).unwrap();
        protocol.send_data("A", "B", b"xyz").unwrap();
        assert_eq!(mock.written().first(), Some(&0xC0));
        assert!(protocol.send_position(1.0, 1.0, 0.0, 0.0, "").unwrap());
    }
}
