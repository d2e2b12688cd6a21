//! TCP/IP transport, e.g. a KISS-over-TCP TNC such as Direwolf on port 8001.

use super::{Transport, TransportKind};
use crate::error::{LinkError, Result};
use log::{debug, info};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct TcpIpTransport {
    name: String,
    stream: TcpStream,
    closed: AtomicBool,
}

impl TcpIpTransport {
    /// Wrap an already connected, blocking stream.
    pub fn new(stream: TcpStream, name: &str) -> Self {
        let _ = stream.set_nodelay(true);
        info!("Opened TCP/IP transport to {}", name);
        Self {
            name: name.to_string(),
            stream,
            closed: AtomicBool::new(false),
        }
    }
}

impl Transport for TcpIpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::TcpIp
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buffer: &mut [u8]) -> Result<usize> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Ok(0);
            }
            match (&self.stream).read(buffer) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                // shutdown() from close() can surface as an error on some platforms
                Err(_) if self.closed.load(Ordering::Acquire) => return Ok(0),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LinkError::Closed);
        }
        Ok((&self.stream).write(data)?)
    }

    fn flush(&self) -> Result<()> {
        (&self.stream).flush()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotConnected => {}
            Err(e) => return Err(e.into()),
        }
        debug!("Closed TCP/IP transport to {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn close_unblocks_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (_server_side, _) = listener.accept().unwrap();

        let transport = std::sync::Arc::new(TcpIpTransport::new(client, &addr.to_string()));
        let reader = {
            let t = transport.clone();
            thread::spawn(move || {
                let mut buf = [0u8; 32];
                t.read(&mut buf)
            })
        };
        thread::sleep(Duration::from_millis(50));
        transport.close().unwrap();
        transport.close().unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), 0);
        assert!(matches!(transport.write(b"x"), Err(LinkError::Closed)));
    }

    #[test]
    fn bytes_cross_the_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        let transport = TcpIpTransport::new(client, "tnc");
        super::super::write_all(&transport, b"\xc0\x00ping\xc0").unwrap();
        let mut got = [0u8; 7];
        server_side.read_exact(&mut got).unwrap();
        assert_eq!(&got, b"\xc0\x00ping\xc0");

        server_side.write_all(b"pong").unwrap();
        let mut buf = [0u8; 16];
        let n = transport.read(&mut buf).unwrap();
        assert!(n > 0 && b"pong".starts_with(&buf[..n]));
    }
}
