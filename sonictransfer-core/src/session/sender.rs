//! Sender-side session state machine (spec.md §4.6).

use crate::audio_io::AudioSink;
use crate::calibration::CalibrationResult;
use crate::codec;
use crate::config::{AudioParams, PowerConfig, Profile, SenderConfig};
use crate::errors::SessionError;
use crate::logging::{SessionEvent, SignalLogger};
use crate::protocol::{frame_bits, FileMetadata, Packet, PREAMBLE_CHORD_MS, PREAMBLE_REPEATS, PREAMBLE_SILENCE_MS};
use crate::signal_processing::{Modulator, PowerController};

const END_REPEATS: usize = 2;
const END_GAP_MS: u64 = 100;

pub struct SenderSession {
    profile: Profile,
    audio: AudioParams,
    calibration: CalibrationResult,
    sender_config: SenderConfig,
    power: PowerController,
    modulator: Modulator,
}

impl SenderSession {
    pub fn new(
        profile: Profile,
        audio: AudioParams,
        calibration: CalibrationResult,
        sender_config: SenderConfig,
        power_config: PowerConfig,
    ) -> Self {
        let modulator = Modulator::new(profile.clone(), audio, calibration.clone());
        Self {
            profile,
            audio,
            calibration,
            sender_config,
            power: PowerController::new(power_config),
            modulator,
        }
    }

    /// Runs the full sender session over `file_bytes`, driving `sink` and
    /// reporting lifecycle events through `on_event`. `timestamp` is a
    /// caller-supplied Unix timestamp (the core has no wall-clock
    /// dependency).
    pub fn send(
        &mut self,
        file_bytes: &[u8],
        filename: &str,
        timestamp: u64,
        sink: &mut impl AudioSink,
        logger: &mut SignalLogger,
        mut on_event: impl FnMut(SessionEvent),
    ) -> Result<(), SessionError> {
        let original_size = file_bytes.len() as u64;

        let (payload, compressed) = if self.sender_config.use_compression
            && file_bytes.len() > self.sender_config.compression_min_size
        {
            let candidate = codec::compress(file_bytes);
            if candidate.len() < file_bytes.len() {
                (candidate, true)
            } else {
                (file_bytes.to_vec(), false)
            }
        } else {
            (file_bytes.to_vec(), false)
        };

        let checksum = codec::checksum(&payload);
        let crc = codec::crc16(&payload);
        let chunk_size = self.profile.chunk_size;
        let chunks = ((payload.len() + chunk_size - 1) / chunk_size).max(1) as u32;
        let encoding = self.profile.payload_encoding();

        let metadata = FileMetadata {
            filename: filename.to_string(),
            size: payload.len() as u64,
            original_size,
            compressed,
            checksum,
            crc,
            chunks,
            timestamp,
            encoding: encoding.as_str().to_string(),
        };

        logger.info("SESSION", format!("sending {} ({} chunks)", filename, chunks));

        self.play_preamble(sink);

        let meta_packet = Packet::meta(&metadata).map_err(|e| SessionError::AudioUnavailable {
            reason: e.to_string(),
        })?;
        self.play_packet(&meta_packet, sink);

        let mut failed = Vec::new();
        for index in 0..chunks {
            let start = index as usize * chunk_size;
            let end = (start + chunk_size).min(payload.len());
            let chunk_bytes = &payload[start..end];
            let encoded = encoding.encode(chunk_bytes);

            match self.send_chunk_with_retries(index, encoded.clone(), sink, logger) {
                Ok(()) => on_event(SessionEvent::ChunkSent { index, total: chunks }),
                Err(_) => failed.push(index),
            }
        }

        for index in failed.clone() {
            let start = index as usize * chunk_size;
            let end = (start + chunk_size).min(payload.len());
            let encoded = encoding.encode(&payload[start..end]);
            if self.send_chunk_with_retries(index, encoded, sink, logger).is_ok() {
                on_event(SessionEvent::ChunkSent { index, total: chunks });
            }
        }

        for i in 0..END_REPEATS {
            let end_packet = Packet::end("COMPLETE");
            self.play_packet(&end_packet, sink);
            if i + 1 < END_REPEATS {
                self.play_silence(sink, END_GAP_MS as u32);
            }
        }

        Ok(())
    }

    fn send_chunk_with_retries(
        &mut self,
        index: u32,
        encoded: Vec<u8>,
        sink: &mut impl AudioSink,
        logger: &mut SignalLogger,
    ) -> Result<(), SessionError> {
        for attempt in 0..self.sender_config.max_retries.max(1) {
            match self.send_packet_with_ack(index, &encoded, sink) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    logger.warn("SESSION", format!("chunk {} attempt {} failed: {}", index, attempt, e));
                }
            }
        }
        Err(SessionError::AudioUnavailable {
            reason: format!("chunk {} exhausted retries", index),
        })
    }

    /// One-shot transmit: current revision never awaits an acknowledgement
    /// and always reports success (spec.md §4.6 "ACK semantics").
    fn send_packet_with_ack(
        &mut self,
        index: u32,
        encoded: &[u8],
        sink: &mut impl AudioSink,
    ) -> Result<(), SessionError> {
        let packet = Packet::data(index, encoded.to_vec()).map_err(|e| SessionError::AudioUnavailable {
            reason: e.to_string(),
        })?;
        self.play_packet(&packet, sink);
        self.play_silence(sink, self.sender_config.packet_delay_ms as u32);
        Ok(())
    }

    fn play_packet(&mut self, packet: &Packet, sink: &mut impl AudioSink) {
        let bits = frame_bits(&packet.to_body());
        let pcm = self.modulator.modulate(&bits, &self.power);
        sink.play_samples(&pcm, self.audio.sample_rate_hz);
    }

    fn play_preamble(&self, sink: &mut impl AudioSink) {
        for i in 0..PREAMBLE_REPEATS {
            sink.play_samples(&self.chord(PREAMBLE_CHORD_MS), self.audio.sample_rate_hz);
            if i + 1 < PREAMBLE_REPEATS {
                self.play_silence(sink, PREAMBLE_SILENCE_MS);
            }
        }
    }

    fn play_silence(&self, sink: &mut impl AudioSink, duration_ms: u32) {
        let n = self.audio.samples_for_ms(duration_ms);
        sink.play_samples(&vec![0.0f32; n], self.audio.sample_rate_hz);
    }

    fn chord(&self, duration_ms: u32) -> Vec<f32> {
        let n = self.audio.samples_for_ms(duration_ms);
        let dt = 1.0 / self.audio.sample_rate_hz as f64;
        let amplitude = self.power.power() as f64 / self.profile.num_channels as f64;
        let mut pcm = vec![0.0f32; n];
        for &freq_hz in &self.calibration.frequencies_hz {
            for (i, sample) in pcm.iter_mut().enumerate() {
                let t = i as f64 * dt;
                *sample += (amplitude * (std::f64::consts::TAU * freq_hz as f64 * t).cos()) as f32;
            }
        }
        pcm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_io::BufferSink;

    fn calibration(profile: &Profile, audio: &AudioParams) -> CalibrationResult {
        CalibrationResult {
            frequencies_hz: (0..profile.num_channels as u32)
                .map(|i| audio.freq_min_hz + i * profile.channel_spacing_hz)
                .collect(),
            noise_floor: vec![0.0; audio.fft_size / 2],
        }
    }

    #[test]
    fn send_produces_nonempty_pcm_stream() {
        let profile = Profile::standard();
        let audio = AudioParams::default();
        let calib = calibration(&profile, &audio);
        let mut session = SenderSession::new(
            profile,
            audio,
            calib,
            SenderConfig::default(),
            PowerConfig::default(),
        );
        let mut sink = BufferSink::default();
        let mut logger = SignalLogger::default();
        let mut events = Vec::new();

        session
            .send(b"hello world", "greeting.txt", 1_700_000_000, &mut sink, &mut logger, |e| events.push(e))
            .unwrap();

        assert!(!sink.samples.is_empty());
        assert!(events.iter().any(|e| matches!(e, SessionEvent::ChunkSent { .. })));
    }

    #[test]
    fn send_chunks_match_expected_count() {
        let profile = Profile::standard();
        let audio = AudioParams::default();
        let calib = calibration(&profile, &audio);
        let mut session = SenderSession::new(
            profile.clone(),
            audio,
            calib,
            SenderConfig { use_compression: false, ..SenderConfig::default() },
            PowerConfig::default(),
        );
        let mut sink = BufferSink::default();
        let mut logger = SignalLogger::default();
        let mut sent = 0;

        let data = vec![0x42u8; 200];
        session
            .send(&data, "f.bin", 0, &mut sink, &mut logger, |e| {
                if matches!(e, SessionEvent::ChunkSent { .. }) {
                    sent += 1;
                }
            })
            .unwrap();

        let expected_chunks = (data.len() + profile.chunk_size - 1) / profile.chunk_size;
        assert_eq!(sent, expected_chunks);
    }
}
