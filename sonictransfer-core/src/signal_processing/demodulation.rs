//! Recovers per-channel symbol bits from one microphone magnitude spectrum
//! tick (FSK) or from a raw audio window (QPSK/8-PSK via I/Q correlation).

use std::f64::consts::TAU;

use crate::calibration::CalibrationResult;
use crate::config::{AudioParams, ModulationScheme, Profile};
use crate::utils::deinterleave;

/// One tick's worth of per-channel decisions. `None` means the channel
/// reported silence (spec.md §4.4).
pub type ChannelDecisions = Vec<Option<Vec<u8>>>;

/// Stateless per-tick FSK channel decision over a magnitude spectrum.
pub fn decide_fsk_channels(
    spectrum: &[u8],
    calibration: &CalibrationResult,
    audio: &AudioParams,
) -> ChannelDecisions {
    calibration
        .frequencies_hz
        .iter()
        .map(|&carrier_hz| {
            let bin0 = audio.bin_for_freq(carrier_hz as f64 - audio.fsk_deviation_hz);
            let bin1 = audio.bin_for_freq(carrier_hz as f64 + audio.fsk_deviation_hz);
            let m0 = spectrum.get(bin0).copied().unwrap_or(0);
            let m1 = spectrum.get(bin1).copied().unwrap_or(0);
            if m0.max(m1) < audio.signal_threshold {
                None
            } else {
                Some(vec![if m1 > m0 { 1 } else { 0 }])
            }
        })
        .collect()
}

/// I/Q correlation of one symbol-duration audio window against a channel's
/// carrier, bucketed to the nearest constellation phase (Open Question 3).
/// No carrier-recovery loop: sender and receiver share a sample clock, so a
/// single correlation per symbol window is sufficient.
pub fn decide_psk_channel(
    window: &[f32],
    carrier_hz: f64,
    sample_rate_hz: u32,
    scheme: ModulationScheme,
    signal_threshold: u8,
) -> Option<Vec<u8>> {
    if window.is_empty() {
        return None;
    }
    let dt = 1.0 / sample_rate_hz as f64;
    let (mut i_acc, mut q_acc) = (0.0f64, 0.0f64);
    for (n, &sample) in window.iter().enumerate() {
        let angle = TAU * carrier_hz * (n as f64 * dt);
        i_acc += sample as f64 * angle.cos();
        q_acc += -(sample as f64) * angle.sin();
    }
    let count = window.len() as f64;
    i_acc /= count;
    q_acc /= count;

    let magnitude = (i_acc * i_acc + q_acc * q_acc).sqrt();
    if (magnitude * 255.0) as u8 + 1 < signal_threshold {
        return None;
    }

    let bits_per_symbol = scheme.bits_per_symbol();
    let levels = 1usize << bits_per_symbol;
    let step_deg = 360.0 / levels as f64;
    let mut phase_deg = i_acc.atan2(-q_acc).to_degrees();
    if phase_deg < 0.0 {
        phase_deg += 360.0;
    }
    let code = ((phase_deg / step_deg).round() as usize) % levels;

    Some((0..bits_per_symbol).rev().map(|k| ((code >> k) & 1) as u8).collect())
}

/// Synchronization states for the per-session receive pipeline (spec.md
/// §4.4 "Synchronization state machine").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Hunting,
    Framed,
}

const SYNC_PATTERN: &str = "10101010";
const HUNTING_TRIM_LEN: usize = 1000;
const HUNTING_KEEP_LEN: usize = 100;
const PACKET_BUFFER_MAX_BITS: usize = 5_000;

/// Per-session bitstream synchronizer: finds the sync pattern, then collects
/// 8-bit bytes into a packet buffer until a tag-terminated record or an
/// overflow resets it to `Hunting`.
pub struct Synchronizer {
    state: SyncState,
    bit_buffer: Vec<u8>,
    packet_buffer: Vec<u8>,
}

impl Default for Synchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer {
    pub fn new() -> Self {
        Self {
            state: SyncState::Hunting,
            bit_buffer: Vec::new(),
            packet_buffer: Vec::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Feed newly re-interleaved bits. Returns any complete packet bodies
    /// recovered from this call.
    pub fn feed(&mut self, bits: &[u8]) -> Vec<Vec<u8>> {
        let mut delivered = Vec::new();
        self.bit_buffer.extend_from_slice(bits);

        loop {
            match self.state {
                SyncState::Hunting => {
                    if let Some(pos) = find_sync_pattern(&self.bit_buffer) {
                        self.bit_buffer.drain(..pos + SYNC_PATTERN.len());
                        self.packet_buffer.clear();
                        self.state = SyncState::Framed;
                        continue;
                    }
                    if self.bit_buffer.len() > HUNTING_TRIM_LEN {
                        let keep_from = self.bit_buffer.len() - HUNTING_KEEP_LEN;
                        self.bit_buffer.drain(..keep_from);
                    }
                    break;
                }
                SyncState::Framed => {
                    if self.bit_buffer.len() < 8 {
                        break;
                    }
                    let byte_bits: Vec<u8> = self.bit_buffer.drain(..8).collect();
                    let byte = byte_bits.iter().fold(0u8, |acc, &b| (acc << 1) | b);
                    self.packet_buffer.push(byte);

                    if self.packet_buffer.len() > PACKET_BUFFER_MAX_BITS / 8 {
                        self.packet_buffer.clear();
                        self.state = SyncState::Hunting;
                        continue;
                    }

                    if let Some(end) = find_record_terminator(&self.packet_buffer) {
                        delivered.push(self.packet_buffer[..end].to_vec());
                        self.packet_buffer.clear();
                        self.state = SyncState::Hunting;
                        continue;
                    }
                }
            }
        }

        delivered
    }
}

fn find_sync_pattern(bits: &[u8]) -> Option<usize> {
    let pattern: Vec<u8> = SYNC_PATTERN.bytes().map(|b| b - b'0').collect();
    if bits.len() < pattern.len() {
        return None;
    }
    bits.windows(pattern.len()).position(|w| w == pattern.as_slice())
}

/// A record is complete once the buffer contains a NUL terminator, or once
/// it carries a recognized tag and a trailing terminator past the minimum
/// tag length (spec.md §4.4).
fn find_record_terminator(buffer: &[u8]) -> Option<usize> {
    if let Some(pos) = buffer.iter().position(|&b| b == 0) {
        return Some(pos);
    }
    if buffer.len() > 10 {
        let text = String::from_utf8_lossy(buffer);
        let has_tag = text.starts_with("META:") || text.starts_with("DATA:") || text.starts_with("END:");
        if has_tag {
            if let Some(pos) = buffer.iter().rposition(|&b| b == b'\n') {
                return Some(pos);
            }
        }
    }
    None
}

/// Re-interleaves one slot's worth of per-channel decisions into the
/// session bit stream, skipping silent channels (spec.md §4.4 "Slot
/// aggregation" + "Re-interleaving").
pub fn reinterleave_slot(decisions: &ChannelDecisions) -> Vec<u8> {
    let present: Vec<&Vec<u8>> = decisions.iter().filter_map(|d| d.as_ref()).collect();
    if present.is_empty() {
        return Vec::new();
    }
    let total: usize = present.iter().map(|v| v.len()).sum();
    deinterleave(
        &present.iter().map(|v| (*v).clone()).collect::<Vec<_>>(),
        total,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;

    fn calibration_for(profile: &Profile, audio: &AudioParams) -> CalibrationResult {
        CalibrationResult {
            frequencies_hz: (0..profile.num_channels as u32)
                .map(|i| audio.freq_min_hz + i * profile.channel_spacing_hz)
                .collect(),
            noise_floor: vec![0.0; audio.fft_size / 2],
        }
    }

    #[test]
    fn fsk_decision_reports_silence_below_threshold() {
        let profile = Profile::standard();
        let audio = AudioParams::default();
        let calib = calibration_for(&profile, &audio);
        let spectrum = vec![0u8; audio.fft_size / 2];
        let decisions = decide_fsk_channels(&spectrum, &calib, &audio);
        assert!(decisions.iter().all(|d| d.is_none()));
    }

    #[test]
    fn fsk_decision_reports_one_when_upper_bin_stronger() {
        let profile = Profile::standard();
        let audio = AudioParams::default();
        let calib = calibration_for(&profile, &audio);
        let mut spectrum = vec![0u8; audio.fft_size / 2];
        let bin1 = audio.bin_for_freq(calib.frequencies_hz[0] as f64 + audio.fsk_deviation_hz);
        spectrum[bin1] = 200;
        let decisions = decide_fsk_channels(&spectrum, &calib, &audio);
        assert_eq!(decisions[0], Some(vec![1]));
    }

    #[test]
    fn synchronizer_finds_frame_and_delivers_nul_terminated_packet() {
        let mut sync = Synchronizer::new();
        let mut bits: Vec<u8> = SYNC_PATTERN.bytes().map(|b| b - b'0').collect();
        for &byte in b"hi\0" {
            for i in (0..8).rev() {
                bits.push((byte >> i) & 1);
            }
        }
        let delivered = sync.feed(&bits);
        assert_eq!(delivered, vec![b"hi".to_vec()]);
        assert_eq!(sync.state(), SyncState::Hunting);
    }

    #[test]
    fn synchronizer_overflows_back_to_hunting() {
        let mut sync = Synchronizer::new();
        let mut bits: Vec<u8> = SYNC_PATTERN.bytes().map(|b| b - b'0').collect();
        bits.extend(std::iter::repeat(1u8).take(PACKET_BUFFER_MAX_BITS + 16));
        let delivered = sync.feed(&bits);
        assert!(delivered.is_empty());
        assert_eq!(sync.state(), SyncState::Hunting);
    }

    #[test]
    fn synchronizer_trims_long_hunting_buffer() {
        let mut sync = Synchronizer::new();
        let bits = vec![1u8; HUNTING_TRIM_LEN + 1];
        sync.feed(&bits);
        assert!(sync.bit_buffer.len() <= HUNTING_KEEP_LEN);
    }

    #[test]
    fn reinterleave_skips_silent_channels() {
        let decisions: ChannelDecisions = vec![Some(vec![1]), None, Some(vec![0])];
        let bits = reinterleave_slot(&decisions);
        assert_eq!(bits, vec![1, 0]);
    }

    #[test]
    fn synchronizer_delivers_a_frame_bits_packet_without_manual_nul() {
        use crate::protocol::{frame_bits, Packet};

        let packet = Packet::end("COMPLETE");
        let bits = frame_bits(&packet.to_body());

        let mut sync = Synchronizer::new();
        let delivered = sync.feed(&bits);
        assert_eq!(delivered, vec![packet.to_body()]);
    }
}
