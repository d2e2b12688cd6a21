//! # c2link - Codec2 voice and APRS data over radio links
//!
//! c2link moves voice and data between an application and a remote station over a
//! choice of physical media, framed by a choice of link protocols, with optional
//! Codec2 speech compression layered transparently on top.
//!
//! ## Features
//!
//! - **One send/receive contract** regardless of medium and framing: the
//!   application holds a single [`Protocol`](protocol::Protocol) handle.
//! - **Media**: USB serial, Bluetooth RFCOMM, BLE (Nordic UART), KISS over TCP/IP,
//!   sound card modems (FreeDV and FSK) and an in-process loopback.
//! - **Framing**: raw pass-through, KISS, and a KISS parrot that decodes its own
//!   transmissions for self-test.
//! - **Voice**: the [`AudioCodec2`](protocol::AudioCodec2) decorator encodes PCM on
//!   the way out and decodes on the way in.
//! - **Positions**: APRS position reports, plain or compressed, with ambiguity.
//!
//! ## Quick Start
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
//!     let pipeline = Pipeline::from_config(&config, &mut handles)?;
//!     pipeline.protocol().send_position(48.137, 11.575, 520.0, 0.0, "on the air")?;
//!     pipeline.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`transport`] - byte channels over each medium, plus the transport factory
//! - [`protocol`] - framing, the callback contract, the codec decorator, the protocol factory
//! - [`codec`] - Codec2 modes and codec sessions
//! - [`position`] - position reports and their APRS encoding
//! - [`pipeline`] - assembly from configuration and the async receive bridge
//! - [`connect`] - opening device handles for the configured medium
//! - [`config`] - TOML configuration
//! - [`error`] - the shared error type
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐  send_pcm_audio   ┌──────────────┐  send_compressed_audio
//! │  Application  │ ────────────────▶ │ AudioCodec2  │ ──────────────────────┐
//! │               │ ◀──────────────── │ (optional)   │ ◀──────────────┐      │
//! └───────────────┘   Callback (PCM)  └──────────────┘  Callback      │      ▼
//!                                                                ┌─────────────────┐
//!                                                                │ Raw / Kiss /    │
//!                                                                │ KissParrot      │
//!                                                                └─────────────────┘
//!                                                                   │ bytes   ▲
//!                                                                   ▼         │
//!                                                                ┌─────────────────┐
//!                                                                │   Transport     │
//!                                                                └─────────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod connect;
pub mod error;
pub mod logutil;
pub mod pipeline;
pub mod position;
pub mod protocol;
pub mod transport;
