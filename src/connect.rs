//! Per-medium device handlers.
//!
//! Discovery and pairing happen outside the link stack. Whatever the platform
//! opens (a serial port, an RFCOMM tty, a TCP connection, a GATT link, the sound
//! modem DSP port) is parked in [`DeviceHandles`] under a display name, and the
//! [`TransportFactory`](crate::transport::TransportFactory) takes it from there.
//!
//! [`DeviceHandles::connect`] is the desktop handler: it opens the handle for the
//! configured medium from the `[transport]` settings.

use crate::config::TransportConfig;
use crate::error::{LinkError, Result};
use crate::transport::{GattLink, ModemPort, TransportType};
use log::{debug, info, warn};
use std::net::TcpStream;

#[cfg(feature = "serial")]
use serialport::SerialPort;
#[cfg(feature = "serial")]
use tokio::time::{sleep, Duration};

/// An opened handle and the name it is known by.
pub struct NamedHandle<T> {
    pub name: String,
    pub handle: T,
}

impl<T> NamedHandle<T> {
    pub fn new(name: impl Into<String>, handle: T) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }
}

#[derive(Default)]
pub struct DeviceHandles {
    #[cfg(feature = "serial")]
    usb: Option<NamedHandle<Box<dyn SerialPort>>>,
    #[cfg(feature = "serial")]
    bluetooth: Option<NamedHandle<Box<dyn SerialPort>>>,
    tcp: Option<NamedHandle<TcpStream>>,
    ble: Option<NamedHandle<Box<dyn GattLink>>>,
    modem: Option<ModemPort>,
}

impl DeviceHandles {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(feature = "serial")]
    pub fn set_usb(&mut self, name: &str, port: Box<dyn SerialPort>) {
        self.usb = Some(NamedHandle::new(name, port));
    }

    #[cfg(feature = "serial")]
    pub fn take_usb(&mut self) -> Option<NamedHandle<Box<dyn SerialPort>>> {
        self.usb.take()
    }

    #[cfg(feature = "serial")]
    pub fn set_bluetooth(&mut self, name: &str, port: Box<dyn SerialPort>) {
        self.bluetooth = Some(NamedHandle::new(name, port));
    }

    #[cfg(feature = "serial")]
    pub fn take_bluetooth(&mut self) -> Option<NamedHandle<Box<dyn SerialPort>>> {
        self.bluetooth.take()
    }

    pub fn set_tcp(&mut self, name: &str, stream: TcpStream) {
        self.tcp = Some(NamedHandle::new(name, stream));
    }

    pub fn take_tcp(&mut self) -> Option<NamedHandle<TcpStream>> {
        self.tcp.take()
    }

    pub fn set_ble(&mut self, name: &str, link: Box<dyn GattLink>) {
        self.ble = Some(NamedHandle::new(name, link));
    }

    pub fn take_ble(&mut self) -> Option<NamedHandle<Box<dyn GattLink>>> {
        self.ble.take()
    }

    /// DSP-facing port for the sound modem, created on first use. The DSP keeps a
    /// clone; the transport built by the factory gets another.
    pub fn modem_port(&mut self) -> ModemPort {
        self.modem.get_or_insert_with(ModemPort::new).clone()
    }

    /// Open the handle for `transport_type` using the `[transport]` settings.
    pub async fn connect(
        transport_type: Option<TransportType>,
        config: &TransportConfig,
    ) -> Result<Self> {
        let mut handles = DeviceHandles::new();
        match transport_type {
            Some(TransportType::Usb) => {
                #[cfg(feature = "serial")]
                {
                    let port = open_serial(&config.serial_port, config.baud_rate).await?;
                    handles.set_usb(&config.serial_port, port);
                }
                #[cfg(not(feature = "serial"))]
                warn!("Serial support not compiled in; USB transport unavailable");
            }
            Some(TransportType::Bluetooth) => {
                #[cfg(feature = "serial")]
                {
                    let port = open_serial(&config.bluetooth_device, config.baud_rate).await?;
                    handles.set_bluetooth(&config.bluetooth_device, port);
                }
                #[cfg(not(feature = "serial"))]
                warn!("Serial support not compiled in; Bluetooth transport unavailable");
            }
            Some(TransportType::TcpIp) => {
                if config.tcp_address.is_empty() {
                    return Err(LinkError::InvalidSetting(
                        "tcp_address is empty".to_string(),
                    ));
                }
                let stream = tokio::net::TcpStream::connect(&config.tcp_address).await?;
                let stream = stream.into_std()?;
                stream.set_nonblocking(false)?;
                info!("Connected to TNC at {}", config.tcp_address);
                handles.set_tcp(&config.tcp_address, stream);
            }
            Some(TransportType::Ble) => {
                warn!("BLE links must be supplied by the host platform; none registered");
            }
            Some(TransportType::SoundModem) => {
                handles.modem_port();
                debug!("Sound modem port created for '{}'", config.sound_modem_type);
            }
            Some(TransportType::Loopback) | None => {}
        }
        Ok(handles)
    }
}

#[cfg(feature = "serial")]
async fn open_serial(port_name: &str, baud_rate: u32) -> Result<Box<dyn SerialPort>> {
    use std::io::Read;

    debug!("Opening serial port {} at {} baud", port_name, baud_rate);

    let mut builder = serialport::new(port_name, baud_rate).timeout(Duration::from_millis(200));
    #[cfg(unix)]
    {
        builder = builder
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None);
    }
    let mut port = builder.open()?;

    // Raise DTR/RTS; some KISS modems stay silent until the host asserts them
    let _ = port.write_data_terminal_ready(true);
    let _ = port.write_request_to_send(true);
    sleep(Duration::from_millis(150)).await;

    // Drop boot banners or stale bytes before the first frame
    let mut purge_buf = [0u8; 512];
    if let Ok(available) = port.bytes_to_read() {
        if available > 0 {
            let _ = port.read(&mut purge_buf);
        }
    }

    info!("Serial port {} ready", port_name);
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{SoundModemFsk, Transport};

    #[test]
    fn modem_port_is_shared() {
        let mut handles = DeviceHandles::new();
        let dsp = handles.modem_port();
        let modem = SoundModemFsk::new("1200", handles.modem_port());
        assert!(dsp.push_demodulated(b"x"));
        let mut buf = [0u8; 4];
        assert_eq!(modem.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], b'x');
    }

    #[tokio::test]
    async fn loopback_needs_no_handles() {
        let config = crate::config::Config::default().transport;
        let mut handles = DeviceHandles::connect(Some(TransportType::Loopback), &config)
            .await
            .unwrap();
        assert!(handles.take_tcp().is_none());
        assert!(handles.take_ble().is_none());
    }

    #[tokio::test]
    async fn empty_tcp_address_is_rejected() {
        let mut config = crate::config::Config::default().transport;
        config.tcp_address.clear();
        let result = DeviceHandles::connect(Some(TransportType::TcpIp), &config).await;
        assert!(matches!(result, Err(LinkError::InvalidSetting(_))));
    }
}
