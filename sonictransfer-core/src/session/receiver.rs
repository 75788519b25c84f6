//! Receiver-side session state machine (spec.md §4.7).

use crate::audio_io::AudioSource;
use crate::calibration::CalibrationResult;
use crate::codec;
use crate::config::{AudioParams, Profile};
use crate::logging::{SessionEvent, SignalLogger, TransferStatus};
use crate::protocol::{FileMetadata, Packet};
use crate::session::ChunkStore;
use crate::signal_processing::{decide_fsk_channels, decide_psk_channel, reinterleave_slot, Synchronizer};
use crate::config::ModulationScheme;

/// Result of a completed receive: the reassembled bytes (post-decompress,
/// if the sender compressed) and whether they passed integrity checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedFile {
    pub metadata: FileMetadata,
    pub bytes: Vec<u8>,
    pub status: TransferStatus,
}

pub struct ReceiverSession {
    audio: AudioParams,
    calibration: CalibrationResult,
    profile: Profile,
    synchronizer: Synchronizer,
    metadata: Option<FileMetadata>,
    chunks: ChunkStore,
    done: bool,
}

impl ReceiverSession {
    pub fn new(profile: Profile, audio: AudioParams, calibration: CalibrationResult) -> Self {
        Self {
            audio,
            calibration,
            profile,
            synchronizer: Synchronizer::new(),
            metadata: None,
            chunks: ChunkStore::new(),
            done: false,
        }
    }

    /// Drains `source` one tick at a time, demodulating and synchronizing
    /// until the source is exhausted or an `End` packet triggers
    /// reassembly. Returns `Some` once the transfer completes.
    pub fn run(
        &mut self,
        source: &mut impl AudioSource,
        logger: &mut SignalLogger,
        mut on_event: impl FnMut(SessionEvent),
    ) -> Option<ReceivedFile> {
        loop {
            let bits = match self.profile.modulation {
                ModulationScheme::Fsk => {
                    let Some(spectrum) = source.next_spectrum() else { break };
                    let decisions = decide_fsk_channels(&spectrum, &self.calibration, &self.audio);
                    reinterleave_slot(&decisions)
                }
                ModulationScheme::Qpsk | ModulationScheme::Psk8 => {
                    // PSK demodulation correlates raw audio for phase, which
                    // an FFT magnitude spectrum discards (DESIGN.md, Open
                    // Question 3), so this path reads the raw window.
                    let Some(window) = source.next_window() else { break };
                    let decisions: Vec<_> = self
                        .calibration
                        .frequencies_hz
                        .iter()
                        .map(|&freq| {
                            decide_psk_channel(
                                &window,
                                freq as f64,
                                self.audio.sample_rate_hz,
                                self.profile.modulation,
                                self.audio.signal_threshold,
                            )
                        })
                        .collect();
                    reinterleave_slot(&decisions)
                }
            };

            for body in self.synchronizer.feed(&bits) {
                if let Some(received) = self.handle_packet(&body, logger, &mut on_event) {
                    self.done = true;
                    return Some(received);
                }
            }
        }
        None
    }

    fn handle_packet(
        &mut self,
        body: &[u8],
        logger: &mut SignalLogger,
        on_event: &mut impl FnMut(SessionEvent),
    ) -> Option<ReceivedFile> {
        let packet = match Packet::parse(body) {
            Ok(p) => p,
            Err(e) => {
                logger.warn("PACKET", format!("dropped unparseable packet: {}", e));
                return None;
            }
        };

        match packet {
            Packet::Meta { json_metadata } => match serde_json::from_str::<FileMetadata>(&json_metadata) {
                Ok(metadata) => {
                    logger.info("SESSION", format!("metadata received: {} chunks", metadata.chunks));
                    self.metadata = Some(metadata);
                    None
                }
                Err(e) => {
                    logger.warn("PACKET", format!("invalid metadata JSON: {}", e));
                    None
                }
            },
            Packet::Data { index, payload } => {
                if self.chunks.insert(index, payload) {
                    on_event(SessionEvent::ChunkReceived { index });
                }
                None
            }
            Packet::End { .. } => {
                if self.chunks.is_empty() {
                    None
                } else {
                    Some(self.reassemble(logger, on_event))
                }
            }
        }
    }

    fn reassemble(
        &mut self,
        logger: &mut SignalLogger,
        on_event: &mut impl FnMut(SessionEvent),
    ) -> ReceivedFile {
        let metadata = self
            .metadata
            .clone()
            .unwrap_or_else(|| FileMetadata {
                filename: "unknown".to_string(),
                size: 0,
                original_size: 0,
                compressed: false,
                checksum: 0,
                crc: 0,
                chunks: self.chunks.len() as u32,
                timestamp: 0,
                encoding: "binary".to_string(),
            });

        let encoding = metadata.payload_encoding().unwrap_or(crate::config::PayloadEncoding::Binary);
        let (decoded, missing) = self.chunks.reassemble(metadata.chunks, encoding);
        for index in &missing {
            logger.warn("SESSION", format!("missing or undecodable chunk {} in reassembly", index));
        }

        let reconstructed = if metadata.compressed {
            match codec::decompress(&decoded) {
                Ok(bytes) => bytes,
                Err(e) => {
                    logger.error("CODEC", format!("decompress failed: {}", e));
                    decoded
                }
            }
        } else {
            decoded
        };

        let checksum_ok = codec::checksum(&reconstructed) == metadata.checksum
            && codec::crc16(&reconstructed) == metadata.crc;
        let status = if checksum_ok {
            TransferStatus::Verified
        } else {
            TransferStatus::IntegrityMismatch
        };

        on_event(SessionEvent::TransferDone { status });

        ReceivedFile {
            metadata,
            bytes: reconstructed,
            status,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_io::BufferSource;
    use crate::config::{PowerConfig, Profile, SenderConfig};
    use crate::session::SenderSession;
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
    fn receiver_reassembles_clean_fsk_transfer() {
        let profile = Profile::standard();
        let audio = AudioParams::default();
        let calib = calibration(&profile, &audio);

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
            .send(b"abcdefgh", "f.bin", 0, &mut sink, &mut logger, |_| {})
            .unwrap();

        let mut source = BufferSource::aligned_to_symbol(
            sink.samples,
            audio.sample_rate_hz,
            audio.fft_size,
            profile.symbol_duration_ms,
            crate::protocol::preamble_sample_count(&audio),
        );
        let mut receiver = ReceiverSession::new(profile, audio, calib);
        let result = receiver.run(&mut source, &mut logger, |_| {});

        assert!(result.is_some());
        let received = result.unwrap();
        assert_eq!(received.bytes, b"abcdefgh".to_vec());
        assert_eq!(received.status, TransferStatus::Verified);
    }
}
