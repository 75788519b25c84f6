//! FFT magnitude spectrum computation, used by calibration and the FSK
//! demodulator's per-channel decision (spec.md §6's external audio-source
//! contract: an 8,192-point FFT of real-valued mono PCM, scaled to 0..255).

use rustfft::{num_complex::Complex32, FftPlanner};

/// Computes a magnitude spectrum over `pcm`, zero-padded or truncated to
/// `fft_size` samples, scaled to the 0..255 range the rest of the crate
/// expects from [`crate::config::AudioParams::bin_for_freq`]. Returns
/// `fft_size / 2` bins (the real-signal half-spectrum).
pub fn compute_magnitude_spectrum(pcm: &[f32], fft_size: usize) -> Vec<u8> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);

    let mut buffer: Vec<Complex32> = pcm
        .iter()
        .take(fft_size)
        .map(|&s| Complex32::new(s, 0.0))
        .collect();
    buffer.resize(fft_size, Complex32::new(0.0, 0.0));

    apply_hamming_window(&mut buffer);
    fft.process(&mut buffer);

    let half = fft_size / 2;
    let magnitudes: Vec<f32> = buffer[..half].iter().map(|c| c.norm()).collect();
    let peak = magnitudes.iter().copied().fold(0.0f32, f32::max).max(1e-6);

    magnitudes
        .iter()
        .map(|&m| ((m / peak) * 255.0).round().clamp(0.0, 255.0) as u8)
        .collect()
}

fn apply_hamming_window(buffer: &mut [Complex32]) {
    let n = buffer.len();
    for (i, sample) in buffer.iter_mut().enumerate() {
        let w = 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / (n as f32 - 1.0)).cos();
        *sample = *sample * w;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq_hz: f64, sample_rate_hz: f64, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f64::consts::PI * freq_hz * i as f64 / sample_rate_hz).sin() as f32)
            .collect()
    }

    #[test]
    fn spectrum_has_half_fft_size_bins() {
        let pcm = tone(3000.0, 44_100.0, 8192);
        let spectrum = compute_magnitude_spectrum(&pcm, 8192);
        assert_eq!(spectrum.len(), 4096);
    }

    #[test]
    fn spectrum_peaks_near_tone_bin() {
        let sample_rate = 44_100.0;
        let fft_size = 8192;
        let freq = 3000.0;
        let pcm = tone(freq, sample_rate, fft_size);
        let spectrum = compute_magnitude_spectrum(&pcm, fft_size);
        let expected_bin = (freq * fft_size as f64 / sample_rate).round() as usize;
        let (peak_bin, _) = spectrum.iter().enumerate().max_by_key(|(_, &m)| m).unwrap();
        assert!((peak_bin as i64 - expected_bin as i64).abs() <= 2);
    }

    #[test]
    fn silence_produces_low_uniform_spectrum() {
        let pcm = vec![0.0f32; 8192];
        let spectrum = compute_magnitude_spectrum(&pcm, 8192);
        assert!(spectrum.iter().all(|&m| m == 0));
    }
}
