//! Turns an interleaved bit string into an audible multi-carrier chord stream.

use std::f64::consts::TAU;

use crate::calibration::CalibrationResult;
use crate::config::{AudioParams, ModulationScheme, PowerConfig, Profile};
use crate::utils::interleave;

/// Tracks transmit power across a session, adjusted from reported SNR
/// feedback (spec.md §4.3 "Power controller").
#[derive(Debug, Clone, Copy)]
pub struct PowerController {
    power: f32,
    config: PowerConfig,
}

impl PowerController {
    pub fn new(config: PowerConfig) -> Self {
        let power = if config.adaptive { config.min_power } else { config.fixed_power };
        Self { power, config }
    }

    pub fn power(&self) -> f32 {
        self.power
    }

    /// Apply one SNR feedback sample. No-op when adaptive power is disabled.
    pub fn report_snr(&mut self, snr_db: f32) {
        if !self.config.adaptive {
            return;
        }
        let delta = self.config.target_snr_db - snr_db;
        if delta.abs() < 2.0 {
            return;
        }
        let factor = if delta > 0.0 { 1.1 } else { 0.9 };
        self.power = (self.power * factor).clamp(self.config.min_power, self.config.max_power);
    }
}

/// Converts bit strings into playable PCM chords for one calibrated session.
pub struct Modulator {
    profile: Profile,
    audio: AudioParams,
    calibration: CalibrationResult,
}

impl Modulator {
    pub fn new(profile: Profile, audio: AudioParams, calibration: CalibrationResult) -> Self {
        Self { profile, audio, calibration }
    }

    /// Modulates `bits` into mono f32 PCM at `audio.sample_rate_hz`, with
    /// per-oscillator amplitude `power / num_channels` (spec.md §4.3 step 4).
    pub fn modulate(&self, bits: &[u8], power: &PowerController) -> Vec<f32> {
        let streams = interleave(bits, self.profile.num_channels);
        let bps = self.profile.modulation.bits_per_symbol();
        let longest_stream = streams.iter().map(|s| s.len()).max().unwrap_or(0);
        let num_symbols = (longest_stream + bps.max(1) - 1) / bps.max(1);
        let samples_per_symbol =
            (self.audio.sample_rate_hz as u64 * self.profile.symbol_duration_ms as u64 / 1000) as usize;

        let mut pcm = Vec::with_capacity(num_symbols * samples_per_symbol);
        let amplitude = power.power() / self.profile.num_channels as f32;

        for symbol_idx in 0..num_symbols {
            let mut slot = vec![0.0f32; samples_per_symbol];
            for (channel, stream) in streams.iter().enumerate() {
                let carrier_hz = self.calibration.frequencies_hz[channel] as f64;
                self.render_symbol(
                    &mut slot,
                    stream,
                    symbol_idx,
                    bps,
                    carrier_hz,
                    amplitude,
                    symbol_idx * samples_per_symbol,
                );
            }
            pcm.extend(slot);
        }

        pcm
    }

    fn render_symbol(
        &self,
        slot: &mut [f32],
        stream: &[u8],
        symbol_idx: usize,
        bps: usize,
        carrier_hz: f64,
        amplitude: f32,
        slot_start_sample: usize,
    ) {
        let dt = 1.0 / self.audio.sample_rate_hz as f64;

        match self.profile.modulation {
            ModulationScheme::Fsk => {
                let bit = stream.get(symbol_idx).copied().unwrap_or(0);
                let freq = if bit == 1 {
                    carrier_hz + self.audio.fsk_deviation_hz
                } else {
                    carrier_hz - self.audio.fsk_deviation_hz
                };
                for (i, sample) in slot.iter_mut().enumerate() {
                    let t = (slot_start_sample + i) as f64 * dt;
                    *sample += (amplitude as f64 * (TAU * freq * t).cos()) as f32;
                }
            }
            ModulationScheme::Qpsk | ModulationScheme::Psk8 => {
                let start = symbol_idx * bps;
                let code: usize = (0..bps)
                    .map(|k| stream.get(start + k).copied().unwrap_or(0) as usize)
                    .fold(0, |acc, bit| (acc << 1) | bit);
                let phase = phase_for_code(self.profile.modulation, code);
                for (i, sample) in slot.iter_mut().enumerate() {
                    let t = (slot_start_sample + i) as f64 * dt;
                    *sample += (amplitude as f64 * (TAU * carrier_hz * t + phase).cos()) as f32;
                }
            }
        }
    }
}

/// Gray-coded phase map from spec.md §4.3 step 2.
fn phase_for_code(scheme: ModulationScheme, code: usize) -> f64 {
    let step_deg = match scheme {
        ModulationScheme::Qpsk => 90.0,
        ModulationScheme::Psk8 => 45.0,
        ModulationScheme::Fsk => unreachable!("FSK has no phase mapping"),
    };
    (code as f64 * step_deg).to_radians()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationKind;

    fn calibration(profile: &Profile, audio: &AudioParams) -> CalibrationResult {
        CalibrationResult {
            frequencies_hz: (0..profile.num_channels as u32)
                .map(|i| audio.freq_min_hz + i * profile.channel_spacing_hz)
                .collect(),
            noise_floor: vec![0.0; audio.fft_size / 2],
        }
    }

    #[test]
    fn modulate_fsk_produces_nonempty_pcm() {
        let profile = Profile::standard();
        let audio = AudioParams::default();
        let calib = calibration(&profile, &audio);
        let modulator = Modulator::new(profile, audio, calib);
        let power = PowerController::new(PowerConfig::default());

        let pcm = modulator.modulate(&[1, 0, 1, 1, 0, 0, 1, 0], &power);
        assert!(!pcm.is_empty());
        assert!(pcm.iter().all(|s| s.abs() <= 1.0));
    }

    #[test]
    fn modulate_qpsk_consumes_two_bits_per_symbol() {
        let profile = Profile::fast();
        let audio = AudioParams::default();
        let calib = calibration(&profile, &audio);
        let modulator = Modulator::new(profile.clone(), audio, calib);
        let power = PowerController::new(PowerConfig::default());

        let bits = vec![1u8; profile.num_channels * 2 * 3];
        let pcm = modulator.modulate(&bits, &power);
        let samples_per_symbol =
            (audio.sample_rate_hz as u64 * profile.symbol_duration_ms as u64 / 1000) as usize;
        assert_eq!(pcm.len() % samples_per_symbol, 0);
    }

    #[test]
    fn power_controller_holds_fixed_power_when_not_adaptive() {
        let mut power = PowerController::new(PowerConfig { adaptive: false, ..PowerConfig::default() });
        let before = power.power();
        power.report_snr(0.0);
        assert_eq!(power.power(), before);
    }

    #[test]
    fn power_controller_increases_power_below_target_snr() {
        let mut power = PowerController::new(PowerConfig { adaptive: true, ..PowerConfig::default() });
        let before = power.power();
        power.report_snr(0.0);
        assert!(power.power() > before);
    }

    #[test]
    fn power_controller_decreases_power_above_target_snr() {
        let mut power = PowerController::new(PowerConfig {
            adaptive: true,
            fixed_power: 0.2,
            ..PowerConfig::default()
        });
        power.power = 0.2;
        let before = power.power();
        power.report_snr(30.0);
        assert!(power.power() < before);
    }

    #[test]
    fn power_controller_clamps_to_bounds() {
        let mut power = PowerController::new(PowerConfig {
            adaptive: true,
            min_power: 0.02,
            max_power: 0.05,
            fixed_power: 0.05,
            target_snr_db: 15.0,
        });
        power.power = 0.05;
        for _ in 0..50 {
            power.report_snr(0.0);
        }
        assert!(power.power() <= 0.05);
    }
}
