//! Binary entrypoint for the c2link CLI.
//!
//! Commands:
//! - `init` - write a starter `c2link.toml`
//! - `monitor` - open the configured link and print every received event as JSON
//! - `beacon --lat <deg> --lon <deg> [--alt <m>] [--bearing <deg>] [--comment <text>]`
//!   - send one position report
//! - `send --to <call> <text>` - send one data packet
//! - `selftest` - run the KISS parrot over an idle sound modem, no radio needed
//!
//! See the library crate docs for module-level details: `c2link::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde_json::json;

use c2link::codec::CodecMode;
use c2link::config::Config;
use c2link::connect::DeviceHandles;
use c2link::pipeline::Pipeline;
use c2link::protocol::{AudioCodec2, KissParrot, LinkEvent, Protocol};
use c2link::transport::{ModemPort, SoundModemFsk};

#[derive(Parser)]
#[command(name = "c2link")]
#[command(about = "Codec2 voice and APRS data over KISS radio links")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "c2link.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Print received events until interrupted
    Monitor,
    /// Send one position report
    Beacon {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Altitude in meters
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        alt: f64,
        /// Bearing in degrees
        #[arg(long, default_value_t = 0.0)]
        bearing: f32,
        /// Comment text; defaults to the station comment from the config
        #[arg(long)]
        comment: Option<String>,
    },
    /// Send one data packet
    Send {
        /// Destination callsign
        #[arg(short, long)]
        to: String,
        /// Packet text
        text: String,
    },
    /// Loop frames through the KISS parrot and check they decode
    Selftest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init | Commands::Selftest => Config::load(&cli.config).await.ok(),
        _ => Some(Config::load(&cli.config).await?),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            if std::path::Path::new(&cli.config).exists() {
                return Err(anyhow!("{} already exists; not overwriting", cli.config));
            }
            Config::create_default(&cli.config).await?;
            println!("Wrote default configuration to {}", cli.config);
            println!("Edit [station].callsign before going on the air.");
        }
        Commands::Monitor => {
            let config = require(pre_config)?;
            let mut pipeline = open(&config).await?;
            let mut events = pipeline.spawn_receiver();
            info!(
                "Monitoring {}; press Ctrl-C to stop",
                pipeline.transport_name()
            );
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => println!("{}", event_json(&event)),
                        None => {
                            warn!("Link closed");
                            break;
                        }
                    },
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted");
                        break;
                    }
                }
            }
            pipeline.shutdown().await?;
        }
        Commands::Beacon {
            lat,
            lon,
            alt,
            bearing,
            comment,
        } => {
            let config = require(pre_config)?;
            let comment = comment.unwrap_or_else(|| config.station.comment.clone());
            // The codec decorator refuses positions; beacons go out on the bare framing
            let mut framing_only = config.clone();
            framing_only.protocol.codec2_enabled = false;
            let pipeline = open(&framing_only).await?;
            let protocol = pipeline.protocol();
            protocol.send_position(lat, lon, alt, bearing, &comment)?;
            protocol.flush()?;
            info!("Position sent: {:.5},{:.5}", lat, lon);
            pipeline.shutdown().await?;
        }
        Commands::Send { to, text } => {
            let config = require(pre_config)?;
            let pipeline = open(&config).await?;
            let protocol = pipeline.protocol();
            protocol.send_data(&config.station.callsign, &to, text.as_bytes())?;
            protocol.flush()?;
            info!("Sent {} bytes to {}", text.len(), to);
            pipeline.shutdown().await?;
        }
        Commands::Selftest => {
            let config = pre_config.unwrap_or_default();
            let report = tokio::task::spawn_blocking(move || selftest(&config)).await?;
            match report {
                Ok(lines) => {
                    for line in lines {
                        println!("ok   {}", line);
                    }
                    println!("Self-test passed");
                }
                Err(e) => {
                    error!("Self-test failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn require(config: Option<Config>) -> Result<Config> {
    config.ok_or_else(|| anyhow!("no configuration loaded"))
}

async fn open(config: &Config) -> Result<Pipeline> {
    let mut handles = DeviceHandles::connect(config.transport_type(), &config.transport).await?;
    Ok(Pipeline::from_config(config, &mut handles)?)
}

/// Audio events print their shape, not their samples.
fn event_json(event: &LinkEvent) -> serde_json::Value {
    let ts = chrono::Utc::now().to_rfc3339();
    match event {
        LinkEvent::PcmAudio {
            src,
            dst,
            codec_mode,
            pcm,
        } => json!({
            "ts": ts, "event": event.name(), "src": src, "dst": dst,
            "codec_mode": codec_mode.map(|m| m.bitrate()), "samples": pcm.len(),
        }),
        LinkEvent::CompressedAudio {
            src,
            dst,
            codec_mode,
            frame,
        } => json!({
            "ts": ts, "event": event.name(), "src": src, "dst": dst,
            "codec_mode": codec_mode.map(|m| m.bitrate()), "bytes": frame.len(),
        }),
        LinkEvent::Data { src, dst, data } => json!({
            "ts": ts, "event": event.name(), "src": src, "dst": dst,
            "text": String::from_utf8_lossy(data),
        }),
        LinkEvent::Position(p) => json!({
            "ts": ts, "event": event.name(), "position": p, "locator": p.maidenhead(),
        }),
        other => {
            let mut value = serde_json::to_value(other).unwrap_or_default();
            if let Some(obj) = value.as_object_mut() {
                obj.insert("ts".to_string(), json!(ts));
            }
            value
        }
    }
}

/// Blocking self-test: KISS parrot over an FSK modem whose DSP side stays idle.
fn selftest(config: &Config) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mode = config
        .codec_mode()
        .ok()
        .flatten()
        .unwrap_or(CodecMode::Mode1300);

    let port = ModemPort::new();
    let mut parrot = KissParrot::new(config.station.clone(), config.kiss.clone());
    parrot.initialize(Box::new(SoundModemFsk::new("1200", port.clone())))?;

    let mut events: Vec<LinkEvent> = Vec::new();
    parrot.send_data("", "CQ", b"c2link self-test")?;
    parrot.receive(&mut events)?;
    match events.pop() {
        Some(LinkEvent::Data { data, .. }) if data == b"c2link self-test" => {
            lines.push("data frame".to_string())
        }
        other => return Err(anyhow!("data frame came back as {:?}", other)),
    }

    parrot.send_position(48.1372, 11.5756, 519.0, 90.0, "self-test")?;
    parrot.receive(&mut events)?;
    match events.pop() {
        Some(LinkEvent::Position(p)) if (p.latitude - 48.1372).abs() < 0.01 => {
            lines.push(format!("position report ({})", p.maidenhead()))
        }
        other => return Err(anyhow!("position came back as {:?}", other)),
    }

    let on_air = port.drain_to_modulate();
    if on_air.is_empty() {
        return Err(anyhow!("nothing was queued for the modulator"));
    }
    lines.push(format!("{} bytes queued for modulation", on_air.len()));

    let voice = AudioCodec2::new(Box::new(parrot), mode)?;
    // Already initialized underneath; the decorator only needs its session
    let samples = voice
        .pcm_frame_size()
        .ok_or_else(|| anyhow!("codec2 session missing"))?;
    let tone: Vec<i16> = (0..samples)
        .map(|i| ((i as f32 * 0.3).sin() * 6000.0) as i16)
        .collect();
    voice.send_pcm_audio("", "CQ", &tone)?;
    voice.receive(&mut events)?;
    match events.pop() {
        Some(LinkEvent::PcmAudio { pcm, .. }) if pcm.len() == samples => {
            lines.push(format!("codec2 {} voice frame ({} samples)", mode, samples))
        }
        other => return Err(anyhow!("voice frame came back as {:?}", other)),
    }
    voice.close()?;
    Ok(lines)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Mirror to the console only when someone is watching it
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
    }
    let _ = builder.try_init();
}
