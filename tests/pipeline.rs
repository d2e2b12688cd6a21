use c2link::codec::CodecMode;
use c2link::config::Config;
use c2link::connect::DeviceHandles;
use c2link::pipeline::Pipeline;
use c2link::protocol::LinkEvent;
use c2link::transport::TransportKind;
use std::time::Duration;

async fn load(toml: &str) -> Config {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("c2link.toml");
    std::fs::write(&path, toml).unwrap();
    Config::load(path.to_str().unwrap()).await.expect("load config")
}

async fn next(events: &mut tokio::sync::mpsc::UnboundedReceiver<LinkEvent>) -> LinkEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("receive loop ended")
}

const VOICE_LOOPBACK: &str = r#"
[transport]
type = "loopback"

[protocol]
type = "kiss"
codec2_enabled = true
codec2_mode = 1600

[station]
callsign = "DL1ABC"
digipath = ""

[logging]
level = "debug"
"#;

#[tokio::test]
async fn voice_and_data_from_config_file() {
    let config = load(VOICE_LOOPBACK).await;
    assert_eq!(config.codec_mode().unwrap(), Some(CodecMode::Mode1600));
    let mut handles = DeviceHandles::connect(config.transport_type(), &config.transport)
        .await
        .unwrap();
    let mut pipeline = Pipeline::from_config(&config, &mut handles).unwrap();
    assert_eq!(pipeline.transport_kind(), TransportKind::Loopback);
    let samples = pipeline.pcm_frame_size().unwrap();
    let mut events = pipeline.spawn_receiver();

    let protocol = pipeline.protocol();
    protocol.send_data("", "CQ", b"hello").unwrap();
    protocol.send_pcm_audio("", "CQ", &vec![0i16; samples]).unwrap();

    match next(&mut events).await {
        LinkEvent::Data { src, data, .. } => {
            assert_eq!(src, "DL1ABC");
            assert_eq!(data, b"hello");
        }
        other => panic!("expected data, got {other:?}"),
    }
    match next(&mut events).await {
        LinkEvent::PcmAudio {
            codec_mode, pcm, ..
        } => {
            assert_eq!(codec_mode, Some(CodecMode::Mode1600));
            assert_eq!(pcm.len(), samples);
        }
        other => panic!("expected pcm audio, got {other:?}"),
    }
    pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_types_fall_back_to_loopback_and_raw() {
    let config = load(
        r#"
[transport]
type = "carrier_pigeon"

[protocol]
type = "smoke_signals"

[station]
callsign = "N0CALL"

[logging]
level = "info"
"#,
    )
    .await;
    assert_eq!(config.transport_type(), None);
    assert_eq!(config.protocol_type(), None);
    let mut handles = DeviceHandles::new();
    let mut pipeline = Pipeline::from_config(&config, &mut handles).unwrap();
    assert_eq!(pipeline.transport_kind(), TransportKind::Loopback);
    let mut events = pipeline.spawn_receiver();

    // Raw framing delivers whatever arrives as one unaddressed audio frame
    pipeline.protocol().send_data("", "", &[1, 2, 3]).unwrap();
    assert_eq!(
        next(&mut events).await,
        LinkEvent::CompressedAudio {
            src: String::new(),
            dst: String::new(),
            codec_mode: None,
            frame: vec![1, 2, 3],
        }
    );
    pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn bad_codec_mode_is_rejected() {
    let mut config = Config::default();
    config.protocol.codec2_mode = 1234;
    let mut handles = DeviceHandles::new();
    assert!(Pipeline::from_config(&config, &mut handles).is_err());
}

#[tokio::test]
async fn dropping_the_event_receiver_does_not_wedge_shutdown() {
    let mut config = Config::default();
    config.protocol.codec2_enabled = false;
    let mut handles = DeviceHandles::new();
    let mut pipeline = Pipeline::from_config(&config, &mut handles).unwrap();
    drop(pipeline.spawn_receiver());
    pipeline.protocol().send_data("", "CQ", b"nobody listens").unwrap();
    tokio::time::timeout(Duration::from_secs(5), pipeline.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();
}
