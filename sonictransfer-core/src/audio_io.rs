//! Host-provided audio boundary (spec.md §6 "External interfaces").
//!
//! The core never touches a sound device directly; a host supplies PCM in
//! and magnitude spectra out through these traits.

/// Sender-side sink: the host plays back 44,100 Hz mono f32 PCM.
pub trait AudioSink {
    fn play_samples(&mut self, pcm: &[f32], sample_rate_hz: u32);
}

/// Receiver-side source: the host delivers, at ~50 Hz, a magnitude spectrum
/// (0..255) derived from an 8,192-point FFT of 44,100 Hz mono PCM.
///
/// `next_window` additionally exposes the raw time-domain samples behind
/// that same tick. The magnitude-spectrum contract (spec.md §6) is enough
/// for the FSK decision, but PSK demodulation needs phase, which an FFT
/// magnitude discards — so the PSK path correlates against `next_window`
/// instead (see DESIGN.md, Open Question 3).
pub trait AudioSource {
    /// Returns `None` when no new tick is available yet.
    fn next_spectrum(&mut self) -> Option<Vec<u8>>;

    /// Raw samples behind the most recent `next_spectrum` tick.
    fn next_window(&mut self) -> Option<Vec<f32>>;
}

/// In-memory sink used by the CLI and by tests: accumulates every played
/// buffer into one PCM stream.
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
}

impl AudioSink for BufferSink {
    fn play_samples(&mut self, pcm: &[f32], sample_rate_hz: u32) {
        self.sample_rate_hz = sample_rate_hz;
        self.samples.extend_from_slice(pcm);
    }
}

/// In-memory source that replays a PCM buffer as successive FFT windows,
/// used by the CLI to decode a WAV file and by tests to drive the
/// demodulator deterministically.
pub struct BufferSource {
    pcm: Vec<f32>,
    cursor: usize,
    window_samples: usize,
    fft_size: usize,
}

impl BufferSource {
    /// Ticks at the normative ~50 Hz host cadence (spec.md §6).
    pub fn new(pcm: Vec<f32>, sample_rate_hz: u32, fft_size: usize) -> Self {
        let window_samples = (sample_rate_hz as u64 / 50) as usize;
        Self {
            pcm,
            cursor: 0,
            window_samples: window_samples.max(1),
            fft_size,
        }
    }

    /// Ticks once per symbol slot instead of at the fixed 50 Hz cadence.
    /// Used for offline decode of a recording produced at a known profile,
    /// where the caller can align windows to symbol boundaries instead of
    /// relying on a live host's sampling cadence.
    ///
    /// `skip_samples` positions the first window after the preamble: the
    /// preamble's duration (three chords plus two gaps) is not itself a
    /// whole number of symbols for any profile, so starting the symbol
    /// clock at sample 0 would leave every post-preamble window straddling
    /// two transmitted symbols. Callers pass
    /// `protocol::preamble_sample_count(&audio)` to align instead to where
    /// the preamble actually ends.
    pub fn aligned_to_symbol(
        pcm: Vec<f32>,
        sample_rate_hz: u32,
        fft_size: usize,
        symbol_duration_ms: u32,
        skip_samples: usize,
    ) -> Self {
        let window_samples = (sample_rate_hz as u64 * symbol_duration_ms as u64 / 1000) as usize;
        let cursor = skip_samples.min(pcm.len());
        Self {
            pcm,
            cursor,
            window_samples: window_samples.max(1),
            fft_size,
        }
    }
}

impl AudioSource for BufferSource {
    fn next_spectrum(&mut self) -> Option<Vec<u8>> {
        if self.cursor >= self.pcm.len() {
            return None;
        }
        let end = (self.cursor + self.window_samples).min(self.pcm.len());
        let window = &self.pcm[self.cursor..end];
        let spectrum = crate::signal_processing::compute_magnitude_spectrum(window, self.fft_size);
        self.cursor = end;
        Some(spectrum)
    }

    fn next_window(&mut self) -> Option<Vec<f32>> {
        if self.cursor >= self.pcm.len() {
            return None;
        }
        let end = (self.cursor + self.window_samples).min(self.pcm.len());
        let window = self.pcm[self.cursor..end].to_vec();
        self.cursor = end;
        Some(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_sink_accumulates_played_samples() {
        let mut sink = BufferSink::default();
        sink.play_samples(&[0.1, 0.2], 44_100);
        sink.play_samples(&[0.3], 44_100);
        assert_eq!(sink.samples, vec![0.1, 0.2, 0.3]);
        assert_eq!(sink.sample_rate_hz, 44_100);
    }

    #[test]
    fn buffer_source_yields_ticks_until_exhausted() {
        let pcm = vec![0.0f32; 44_100 / 50 * 3];
        let mut source = BufferSource::new(pcm, 44_100, 8192);
        assert!(source.next_spectrum().is_some());
        assert!(source.next_spectrum().is_some());
        assert!(source.next_spectrum().is_some());
        assert!(source.next_spectrum().is_none());
    }
}
