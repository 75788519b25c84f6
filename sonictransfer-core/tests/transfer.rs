//! End-to-end integration tests covering the testable properties in spec.md §8.

use rand::SeedableRng;
use rand::rngs::StdRng;
use sonictransfer_core::audio_io::{BufferSink, BufferSource};
use sonictransfer_core::calibration::CalibrationResult;
use sonictransfer_core::channel::apply_audio_noise;
use sonictransfer_core::codec::{checksum, compress, crc16, decompress};
use sonictransfer_core::config::{AudioParams, PowerConfig, Profile, SenderConfig};
use sonictransfer_core::logging::{SessionEvent, SignalLogger, TransferStatus};
use sonictransfer_core::protocol::preamble_sample_count;
use sonictransfer_core::session::{ReceiverSession, SenderSession};
use sonictransfer_core::utils::{deinterleave, interleave};

fn flat_calibration(profile: &Profile, audio: &AudioParams) -> CalibrationResult {
    CalibrationResult {
        frequencies_hz: (0..profile.num_channels as u32)
            .map(|i| audio.freq_min_hz + i * profile.channel_spacing_hz)
            .collect(),
        noise_floor: vec![0.0; audio.fft_size / 2],
    }
}

fn run_transfer(profile: Profile, data: &[u8]) -> sonictransfer_core::session::receiver::ReceivedFile {
    let audio = AudioParams::default();
    let calib = flat_calibration(&profile, &audio);

    let mut sender = SenderSession::new(
        profile.clone(),
        audio,
        calib.clone(),
        SenderConfig::default(),
        PowerConfig::default(),
    );
    let mut sink = BufferSink::default();
    let mut logger = SignalLogger::default();
    sender
        .send(data, "payload.bin", 1_700_000_000, &mut sink, &mut logger, |_| {})
        .unwrap();

    let mut source = BufferSource::aligned_to_symbol(
        sink.samples,
        audio.sample_rate_hz,
        audio.fft_size,
        profile.symbol_duration_ms,
        preamble_sample_count(&audio),
    );
    let mut receiver = ReceiverSession::new(profile, audio, calib);
    receiver.run(&mut source, &mut logger, |_| {}).expect("transfer should complete")
}

#[test]
fn checksum_matches_additive_sum_for_nonempty_input() {
    let data = b"the quick brown fox";
    let expected: u16 = data.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
    assert_eq!(checksum(data), expected);
}

#[test]
fn crc_of_empty_is_initial_value() {
    assert_eq!(crc16(&[]), 0xFFFF);
}

#[test]
fn lz77_round_trips_arbitrary_bytes_including_marker() {
    let data: Vec<u8> = (0..300).map(|i| (i % 256) as u8).collect();
    let compressed = compress(&data);
    assert_eq!(decompress(&compressed).unwrap(), data);
}

#[test]
fn interleave_round_trip_recovers_bit_string_for_any_channel_count() {
    for num_channels in [4usize, 8, 12, 16] {
        let bits: Vec<u8> = (0..137).map(|i| (i % 3 == 0) as u8).collect();
        let streams = interleave(&bits, num_channels);
        let recovered = deinterleave(&streams, bits.len());
        assert_eq!(recovered, bits);
    }
}

#[test]
fn clean_channel_transfer_round_trips_on_fast_profile() {
    let received = run_transfer(Profile::fast(), b"SonicTransfer end-to-end payload");
    assert_eq!(received.bytes, b"SonicTransfer end-to-end payload".to_vec());
    assert_eq!(received.status, TransferStatus::Verified);
}

#[test]
fn clean_channel_transfer_round_trips_on_standard_profile() {
    let received = run_transfer(Profile::standard(), b"short");
    assert_eq!(received.bytes, b"short".to_vec());
    assert_eq!(received.status, TransferStatus::Verified);
}

#[test]
fn compressible_payload_round_trips_through_compression() {
    let data = vec![b'A'; 500];
    let received = run_transfer(Profile::standard(), &data);
    assert_eq!(received.bytes, data);
    assert!(received.metadata.compressed);
    assert_eq!(received.status, TransferStatus::Verified);
}

#[test]
fn clean_channel_transfer_survives_light_awgn() {
    let profile = Profile::robust();
    let audio = AudioParams::default();
    let calib = flat_calibration(&profile, &audio);

    let mut sender = SenderSession::new(
        profile.clone(),
        audio,
        calib.clone(),
        SenderConfig { use_compression: false, ..SenderConfig::default() },
        PowerConfig::default(),
    );
    let mut sink = BufferSink::default();
    let mut logger = SignalLogger::default();
    sender
        .send(b"robust profile over a noisy line", "f.bin", 0, &mut sink, &mut logger, |_| {})
        .unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let noisy = apply_audio_noise(&sink.samples, 0.001, &mut rng);

    let mut source = BufferSource::aligned_to_symbol(
        noisy,
        audio.sample_rate_hz,
        audio.fft_size,
        profile.symbol_duration_ms,
        preamble_sample_count(&audio),
    );
    let mut receiver = ReceiverSession::new(profile, audio, calib);
    let received = receiver.run(&mut source, &mut logger, |_| {}).expect("transfer should complete");

    assert_eq!(received.bytes, b"robust profile over a noisy line".to_vec());
    assert_eq!(received.status, TransferStatus::Verified);
}

#[test]
fn sync_recovers_after_leading_noise() {
    use sonictransfer_core::signal_processing::Synchronizer;

    let mut sync = Synchronizer::new();
    let noise = vec![1u8; 200];
    assert!(sync.feed(&noise).is_empty());

    let mut bits: Vec<u8> = "10101010".bytes().map(|b| b - b'0').collect();
    for &byte in b"END:COMPLETE\0" {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    let delivered = sync.feed(&bits);
    assert_eq!(delivered, vec![b"END:COMPLETE".to_vec()]);
}

#[test]
fn chunk_sent_events_cover_every_chunk() {
    let profile = Profile::standard();
    let audio = AudioParams::default();
    let calib = flat_calibration(&profile, &audio);
    let mut sender = SenderSession::new(
        profile.clone(),
        audio,
        calib,
        SenderConfig { use_compression: false, ..SenderConfig::default() },
        PowerConfig::default(),
    );
    let mut sink = BufferSink::default();
    let mut logger = SignalLogger::default();
    let data = vec![7u8; 150];
    let mut sent_indices = Vec::new();

    sender
        .send(&data, "f.bin", 0, &mut sink, &mut logger, |e| {
            if let SessionEvent::ChunkSent { index, .. } = e {
                sent_indices.push(index);
            }
        })
        .unwrap();

    let expected_chunks = (data.len() + profile.chunk_size - 1) / profile.chunk_size;
    assert_eq!(sent_indices.len(), expected_chunks);
}
