//! Signal processing functions for modulation, demodulation, and spectrum analysis
//!
//! This module provides core DSP functions for:
//! - Converting interleaved bit streams to multi-carrier audio chords
//! - Demodulating a microphone spectrum (FSK) or raw audio window (PSK)
//!   back to per-channel bits, with frame synchronization
//! - Computing FFT magnitude spectra for calibration and FSK decisions

pub mod demodulation;
pub mod modulation;
pub mod spectrum;

pub use demodulation::{decide_fsk_channels, decide_psk_channel, reinterleave_slot, Synchronizer, SyncState};
pub use modulation::{Modulator, PowerController};
pub use spectrum::compute_magnitude_spectrum;
