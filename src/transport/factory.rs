//! Transport selection.
//!
//! [`TransportFactory::create`] is a total dispatch over [`TransportType`]: it never
//! fails. An absent type, or a medium whose handle the platform never supplied,
//! yields a [`Loopback`], which carries no traffic off the device. The fallback is
//! logged at `warn` so a misconfigured link does not go unnoticed.

use super::{
    BleTransport, Loopback, SoundModem, SoundModemFsk, TcpIpTransport, Transport, TransportType,
};
use crate::config::TransportConfig;
use crate::connect::DeviceHandles;
use log::warn;

pub struct TransportFactory;

impl TransportFactory {
    pub fn create(
        transport_type: Option<TransportType>,
        config: &TransportConfig,
        handles: &mut DeviceHandles,
    ) -> Box<dyn Transport> {
        match transport_type {
            Some(TransportType::Usb) => Self::usb(handles),
            Some(TransportType::Bluetooth) => Self::bluetooth(handles),
            Some(TransportType::TcpIp) => match handles.take_tcp() {
                Some(h) => Box::new(TcpIpTransport::new(h.handle, &h.name)),
                None => Self::fallback("no TCP/IP connection"),
            },
            Some(TransportType::Ble) => match handles.take_ble() {
                Some(h) => Box::new(BleTransport::new(h.handle, &h.name)),
                None => Self::fallback("no BLE link"),
            },
            Some(TransportType::SoundModem) => {
                let port = handles.modem_port();
                if is_freedv(&config.sound_modem_type) {
                    Box::new(SoundModem::new(&config.sound_modem_type, port))
                } else {
                    Box::new(SoundModemFsk::new(&config.sound_modem_type, port))
                }
            }
            Some(TransportType::Loopback) => Box::new(Loopback::new()),
            None => Self::fallback("no transport type configured"),
        }
    }

    #[cfg(feature = "serial")]
    fn usb(handles: &mut DeviceHandles) -> Box<dyn Transport> {
        match handles.take_usb() {
            Some(h) => match super::SerialTransport::usb(h.handle, &h.name) {
                Ok(t) => Box::new(t),
                Err(e) => Self::fallback(&format!("USB port {} unusable: {}", h.name, e)),
            },
            None => Self::fallback("no USB serial port"),
        }
    }

    #[cfg(not(feature = "serial"))]
    fn usb(_handles: &mut DeviceHandles) -> Box<dyn Transport> {
        Self::fallback("serial support not compiled in")
    }

    #[cfg(feature = "serial")]
    fn bluetooth(handles: &mut DeviceHandles) -> Box<dyn Transport> {
        match handles.take_bluetooth() {
            Some(h) => match super::SerialTransport::bluetooth(h.handle, &h.name) {
                Ok(t) => Box::new(t),
                Err(e) => Self::fallback(&format!("Bluetooth tty {} unusable: {}", h.name, e)),
            },
            None => Self::fallback("no Bluetooth socket"),
        }
    }

    #[cfg(not(feature = "serial"))]
    fn bluetooth(_handles: &mut DeviceHandles) -> Box<dyn Transport> {
        Self::fallback("serial support not compiled in")
    }

    fn fallback(reason: &str) -> Box<dyn Transport> {
        warn!("{}; using loopback transport", reason);
        Box::new(Loopback::new())
    }
}

/// FreeDV modem sub-types start with `F` (`F1600`, `F700D`); the rest are FSK bauds.
pub fn is_freedv(sound_modem_type: &str) -> bool {
    sound_modem_type.starts_with('F')
}
