//! Channel probing: picks carrier frequencies from the measured noise floor.

use serde::{Deserialize, Serialize};

use crate::config::{AudioParams, CalibrationKind, Profile};
use crate::errors::CalibrationError;

const SCAN_STEP_HZ: u32 = 50;

/// Result of a calibration run: the chosen carriers and the noise floor they
/// were selected against (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Ordered, ascending, contiguous at `channel_spacing_hz`.
    pub frequencies_hz: Vec<u32>,
    /// Per-bin mean magnitude across every sample taken during the probe.
    pub noise_floor: Vec<f32>,
}

impl CalibrationResult {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Probes the channel for `duration_ms` (use [`CalibrationKind::duration_ms`]
/// for the standard presets) and selects the quietest contiguous carrier
/// band for `profile`.
///
/// `sample_spectrum` is called roughly every 50 ms and must return a
/// magnitude spectrum (0..255) with one bin per `audio.bin_for_freq` step;
/// the caller (a host audio driver, or a synthetic source in tests) owns the
/// actual sampling cadence.
pub struct Calibrator {
    audio: AudioParams,
}

impl Calibrator {
    pub fn new(audio: AudioParams) -> Self {
        Self { audio }
    }

    /// Runs the probe, calling `sample_spectrum` once per tick until
    /// `duration_ms` worth of ~50 ms ticks have been collected.
    pub fn calibrate(
        &self,
        duration_ms: u64,
        profile: &Profile,
        mut sample_spectrum: impl FnMut() -> Vec<u8>,
    ) -> Result<CalibrationResult, CalibrationError> {
        let ticks = (duration_ms / 50).max(1);
        let mut sum: Vec<f64> = vec![0.0; self.audio.fft_size / 2];
        let mut count = 0u64;

        for _ in 0..ticks {
            let spectrum = sample_spectrum();
            for (bin, &mag) in spectrum.iter().enumerate() {
                if bin < sum.len() {
                    sum[bin] += mag as f64;
                }
            }
            count += 1;
        }

        let noise_floor: Vec<f32> = sum.iter().map(|&s| (s / count as f64) as f32).collect();
        let frequencies_hz = self.select_band(&noise_floor, profile)?;

        Ok(CalibrationResult {
            frequencies_hz,
            noise_floor,
        })
    }

    fn select_band(&self, noise_floor: &[f32], profile: &Profile) -> Result<Vec<u32>, CalibrationError> {
        let span = (profile.num_channels as u32 - 1) * profile.channel_spacing_hz;
        if self.audio.freq_min_hz + span > self.audio.freq_max_hz {
            return Err(CalibrationError::NoViableBand {
                num_channels: profile.num_channels,
                channel_spacing_hz: profile.channel_spacing_hz,
                freq_min: self.audio.freq_min_hz,
                freq_max: self.audio.freq_max_hz,
            });
        }

        let mut best_base: Option<u32> = None;
        let mut best_mean = f64::INFINITY;

        let mut base = self.audio.freq_min_hz;
        while base + span <= self.audio.freq_max_hz {
            let mean = self.mean_noise_for_base(noise_floor, base, profile);
            if mean < best_mean {
                best_mean = mean;
                best_base = Some(base);
            }
            base += SCAN_STEP_HZ;
        }

        let base = best_base.ok_or(CalibrationError::NoViableBand {
            num_channels: profile.num_channels,
            channel_spacing_hz: profile.channel_spacing_hz,
            freq_min: self.audio.freq_min_hz,
            freq_max: self.audio.freq_max_hz,
        })?;

        Ok((0..profile.num_channels as u32)
            .map(|i| base + i * profile.channel_spacing_hz)
            .collect())
    }

    fn mean_noise_for_base(&self, noise_floor: &[f32], base: u32, profile: &Profile) -> f64 {
        let mut total = 0.0;
        for i in 0..profile.num_channels as u32 {
            let freq = base + i * profile.channel_spacing_hz;
            let bin = self.audio.bin_for_freq(freq as f64);
            total += noise_floor.get(bin).copied().unwrap_or(0.0) as f64;
        }
        total / profile.num_channels as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_lowest_mean_band() {
        let audio = AudioParams::default();
        let calibrator = Calibrator::new(audio);
        let profile = Profile::fast();

        let result = calibrator
            .calibrate(CalibrationKind::Quick.duration_ms(), &profile, || {
                let mut spectrum = vec![200u8; audio.fft_size / 2];
                // Make a quiet notch right at a plausible carrier band so the
                // scan has an unambiguous minimum to find.
                let quiet_bin = audio.bin_for_freq(3_000.0);
                for b in quiet_bin..(quiet_bin + 64).min(spectrum.len()) {
                    spectrum[b] = 5;
                }
                spectrum
            })
            .unwrap();

        assert_eq!(result.frequencies_hz.len(), profile.num_channels);
        for window in result.frequencies_hz.windows(2) {
            assert_eq!(window[1] - window[0], profile.channel_spacing_hz);
        }
    }

    #[test]
    fn rejects_band_that_cannot_fit() {
        let audio = AudioParams {
            freq_min_hz: 2_000,
            freq_max_hz: 2_100,
            ..AudioParams::default()
        };
        let calibrator = Calibrator::new(audio);
        let profile = Profile::robust();

        let result = calibrator.calibrate(2_000, &profile, || vec![100u8; audio.fft_size / 2]);
        assert!(matches!(result, Err(CalibrationError::NoViableBand { .. })));
    }

    #[test]
    fn frequencies_stay_within_search_range() {
        let audio = AudioParams::default();
        let calibrator = Calibrator::new(audio);
        let profile = Profile::standard();

        let result = calibrator
            .calibrate(2_000, &profile, || vec![100u8; audio.fft_size / 2])
            .unwrap();

        assert!(*result.frequencies_hz.first().unwrap() >= audio.freq_min_hz);
        assert!(*result.frequencies_hz.last().unwrap() <= audio.freq_max_hz);
    }

    #[test]
    fn json_round_trips() {
        let result = CalibrationResult {
            frequencies_hz: vec![2000, 2300, 2600],
            noise_floor: vec![1.0, 2.0, 3.0],
        };
        let json = result.to_json().unwrap();
        assert_eq!(CalibrationResult::from_json(&json).unwrap(), result);
    }
}
