use c2link::codec::CodecMode;
use c2link::config::{KissConfig, StationConfig};
use c2link::protocol::{AudioCodec2, Kiss, LinkEvent, Protocol};
use c2link::transport::mock::MockTransport;
use c2link::transport::Loopback;

fn kiss() -> Box<dyn Protocol> {
    Box::new(Kiss::new(StationConfig::default(), KissConfig::default()))
}

fn tone(samples: usize) -> Vec<i16> {
    (0..samples)
        .map(|i| ((i as f32 * 0.2).sin() * 8000.0) as i16)
        .collect()
}

#[test]
fn voice_round_trip_over_loopback() {
    let mut voice = AudioCodec2::new(kiss(), CodecMode::Mode3200).unwrap();
    voice.initialize(Box::new(Loopback::new())).unwrap();
    let samples = voice.pcm_frame_size().unwrap();
    assert_eq!(samples, 160);

    assert!(voice.send_pcm_audio("", "CQ", &tone(samples)).unwrap());
    let mut events = Vec::new();
    assert!(voice.receive(&mut events).unwrap());
    match events.as_slice() {
        [LinkEvent::PcmAudio {
            src,
            dst,
            codec_mode,
            pcm,
        }] => {
            assert_eq!(src, "N0CALL");
            assert_eq!(dst, "CQ");
            assert_eq!(*codec_mode, Some(CodecMode::Mode3200));
            assert_eq!(pcm.len(), samples);
        }
        other => panic!("unexpected events: {other:?}"),
    }
    voice.close().unwrap();
}

#[test]
fn data_passes_through_the_decorator() {
    let mut voice = AudioCodec2::new(kiss(), CodecMode::Mode1300).unwrap();
    voice.initialize(Box::new(Loopback::new())).unwrap();
    voice.send_data("", "CQ", b"not voice").unwrap();
    let mut events = Vec::new();
    voice.receive(&mut events).unwrap();
    assert!(matches!(&events[..], [LinkEvent::Data { data, .. }] if data == b"not voice"));
}

#[test]
fn refuses_precompressed_audio_and_positions() {
    let mock = MockTransport::new();
    let mut voice = AudioCodec2::new(kiss(), CodecMode::Mode1300).unwrap();
    voice.initialize(Box::new(mock.clone())).unwrap();
    assert!(voice
        .send_compressed_audio("", "", CodecMode::Mode1300, &[0; 7])
        .unwrap_err()
        .is_unsupported());
    assert!(voice
        .send_position(1.0, 2.0, 3.0, 4.0, "")
        .unwrap_err()
        .is_unsupported());
    assert!(mock.written().is_empty());
}

#[test]
fn wrong_frame_length_is_rejected_before_sending() {
    let mock = MockTransport::new();
    let mut voice = AudioCodec2::new(kiss(), CodecMode::Mode1300).unwrap();
    voice.initialize(Box::new(mock.clone())).unwrap();
    assert!(voice.send_pcm_audio("", "", &tone(100)).is_err());
    assert!(mock.written().is_empty());
}

#[test]
fn mode_switch_changes_frame_size() {
    let voice = AudioCodec2::new(kiss(), CodecMode::Mode3200).unwrap();
    assert_eq!(voice.pcm_frame_size(), Some(160));
    voice.set_codec_mode(CodecMode::Mode1200).unwrap();
    assert_eq!(voice.codec_mode(), Some(CodecMode::Mode1200));
    assert_eq!(voice.pcm_frame_size(), Some(320));
}

#[test]
fn close_releases_everything_once() {
    let mock = MockTransport::new();
    let mut voice = AudioCodec2::new(kiss(), CodecMode::Mode1300).unwrap();
    voice.initialize(Box::new(mock.clone())).unwrap();
    voice.close().unwrap();
    voice.close().unwrap();
    assert_eq!(mock.close_count(), 1);
    assert_eq!(voice.codec_mode(), None);
    assert_eq!(voice.pcm_frame_size(), None);
    assert!(voice.send_pcm_audio("", "", &tone(320)).is_err());
}
