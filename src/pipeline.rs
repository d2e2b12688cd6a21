//! # Pipeline assembly
//!
//! Builds the stack the application talks to:
//!
//! ```text
//! TransportFactory -> ProtocolFactory -> (codec2 enabled) AudioCodec2 -> initialize
//! ```
//!
//! and runs the blocking receive loop on tokio's blocking pool, turning callback
//! invocations into [`LinkEvent`]s on an unbounded channel.
//!
//! ```rust,no_run
//! use c2link::config::Config;
//! use c2link::connect::DeviceHandles;
//! use c2link::pipeline::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("c2link.toml").await?;
//!     let mut handles = DeviceHandles::connect(config.transport_type(), &config.transport).await?;
//!     let mut pipeline = Pipeline::from_config(&config, &mut handles)?;
//!     let mut events = pipeline.spawn_receiver();
//!     pipeline.protocol().send_data("", "CQ", b"hello")?;
//!     if let Some(event) = events.recv().await {
//!         println!("{:?}", event);
//!     }
//!     pipeline.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::codec::CodecMode;
use crate::config::Config;
use crate::connect::DeviceHandles;
use crate::error::{LinkError, Result};
use crate::protocol::{AudioCodec2, EventSink, LinkEvent, Protocol, ProtocolFactory};
use crate::transport::{Transport, TransportFactory, TransportKind};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct Pipeline {
    protocol: Arc<dyn Protocol>,
    transport_kind: TransportKind,
    transport_name: String,
    worker: Option<JoinHandle<Result<()>>>,
}

impl Pipeline {
    /// Compose a pipeline from already created parts.
    pub fn assemble(
        transport: Box<dyn Transport>,
        framing: Box<dyn Protocol>,
        codec_mode: Option<CodecMode>,
    ) -> Result<Self> {
        let transport_kind = transport.kind();
        let transport_name = transport.name().to_string();
        let mut protocol = match codec_mode {
            Some(mode) => Box::new(AudioCodec2::new(framing, mode)?) as Box<dyn Protocol>,
            None => framing,
        };
        if let Err(e) = protocol.initialize(transport) {
            error!("Failed to initialize link on {}: {}", transport_name, e);
            let _ = protocol.close();
            return Err(e);
        }
        info!(
            "Link ready on {} ({:?}){}",
            transport_name,
            transport_kind,
            codec_mode
                .map(|m| format!(", codec2 {}", m))
                .unwrap_or_default()
        );
        Ok(Self {
            protocol: Arc::from(protocol),
            transport_kind,
            transport_name,
            worker: None,
        })
    }

    /// Build the pipeline described by `config`, taking device handles as needed.
    pub fn from_config(config: &Config, handles: &mut DeviceHandles) -> Result<Self> {
        let codec_mode = config.codec_mode()?;
        let transport =
            TransportFactory::create(config.transport_type(), &config.transport, handles);
        let framing =
            ProtocolFactory::create(config.protocol_type(), &config.station, &config.kiss);
        Self::assemble(transport, framing, codec_mode)
    }

    /// Top-level protocol handle; every send goes through it.
    pub fn protocol(&self) -> Arc<dyn Protocol> {
        Arc::clone(&self.protocol)
    }

    pub fn transport_kind(&self) -> TransportKind {
        self.transport_kind
    }

    pub fn transport_name(&self) -> &str {
        &self.transport_name
    }

    /// PCM samples per frame when codec2 is enabled
    pub fn pcm_frame_size(&self) -> Option<usize> {
        self.protocol.pcm_frame_size()
    }

    /// Start the receive loop. Must be called from within a tokio runtime, once.
    pub fn spawn_receiver(&mut self) -> mpsc::UnboundedReceiver<LinkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.worker.is_some() {
            warn!("Receive loop already running on {}", self.transport_name);
            return rx;
        }
        let protocol = Arc::clone(&self.protocol);
        let sink = EventSink::new(tx);
        self.worker = Some(tokio::task::spawn_blocking(move || {
            receive_loop(protocol, sink)
        }));
        rx
    }

    /// Close the stack and wait for the receive loop to stop.
    pub async fn shutdown(mut self) -> Result<()> {
        let closed = self.protocol.close();
        if let Some(worker) = self.worker.take() {
            match worker.await {
                Ok(Ok(())) => debug!("Receive loop joined"),
                // Reads racing the close may fail; the stack is going away regardless
                Ok(Err(e)) => debug!("Receive loop ended with error during shutdown: {}", e),
                Err(e) => {
                    return Err(LinkError::Io(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("receive loop panicked: {}", e),
                    )))
                }
            }
        }
        info!("Link on {} shut down", self.transport_name);
        closed
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if let Err(e) = self.protocol.close() {
            warn!("Closing link on {} failed: {}", self.transport_name, e);
        }
    }
}

fn receive_loop(protocol: Arc<dyn Protocol>, mut sink: EventSink) -> Result<()> {
    debug!("Receive loop started");
    loop {
        if sink.is_closed() {
            debug!("Event receiver dropped; stopping receive loop");
            return Ok(());
        }
        match protocol.receive(&mut sink) {
            Ok(true) => {}
            Ok(false) => {
                info!("End of stream; receive loop stopping");
                return Ok(());
            }
            Err(e) => {
                error!("Receive failed: {}", e);
                return Err(e);
            }
        }
    }
}
