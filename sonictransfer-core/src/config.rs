//! Physical-layer configuration for the SonicTransfer modem.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Modulation order selectable per profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModulationScheme {
    /// 1 bit/symbol: mark/space frequency shift keying.
    Fsk,
    /// 2 bits/symbol: quadrature phase shift keying.
    Qpsk,
    /// 3 bits/symbol: 8-ary phase shift keying.
    Psk8,
}

impl ModulationScheme {
    /// Number of payload bits carried by one symbol under this scheme.
    pub fn bits_per_symbol(self) -> usize {
        match self {
            ModulationScheme::Fsk => 1,
            ModulationScheme::Qpsk => 2,
            ModulationScheme::Psk8 => 3,
        }
    }
}

/// How packet payload bytes are turned into ASCII before framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    Base64,
    Binary,
}

impl PayloadEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            PayloadEncoding::Base64 => "base64",
            PayloadEncoding::Binary => "binary",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "base64" => Some(PayloadEncoding::Base64),
            "binary" => Some(PayloadEncoding::Binary),
            _ => None,
        }
    }

    /// Turns raw bytes into the ASCII representation carried in a `Data:`
    /// packet body (spec.md §4.5).
    pub fn encode(self, bytes: &[u8]) -> Vec<u8> {
        match self {
            PayloadEncoding::Base64 => BASE64.encode(bytes).into_bytes(),
            PayloadEncoding::Binary => bytes
                .iter()
                .flat_map(|&b| (0..8).rev().map(move |i| if (b >> i) & 1 == 1 { b'1' } else { b'0' }))
                .collect(),
        }
    }

    /// Inverse of [`encode`]: recovers raw bytes from an ASCII payload.
    pub fn decode(self, ascii: &[u8]) -> Option<Vec<u8>> {
        match self {
            PayloadEncoding::Base64 => BASE64.decode(ascii).ok(),
            PayloadEncoding::Binary => {
                if ascii.len() % 8 != 0 {
                    return None;
                }
                Some(
                    ascii
                        .chunks(8)
                        .map(|chunk| {
                            chunk.iter().fold(0u8, |acc, &c| (acc << 1) | if c == b'1' { 1 } else { 0 })
                        })
                        .collect(),
                )
            }
        }
    }
}

/// Immutable physical-layer configuration describing one transfer.
///
/// Constructed once per session and shared by value between the sender's
/// modulator and the receiver's demodulator; two peers MUST agree on a
/// `Profile` out of band since the protocol carries no negotiation (see
/// `DESIGN.md`, Open Question 4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub num_channels: usize,
    pub channel_spacing_hz: u32,
    pub symbol_duration_ms: u32,
    pub modulation: ModulationScheme,
    pub use_binary_payload: bool,
    pub chunk_size: usize,
}

impl Profile {
    /// `num_channels` must be one of {4, 8, 12, 16}; `bits_per_symbol` in
    /// {1, 2, 3} is guaranteed by construction through `ModulationScheme`,
    /// so this only validates the field user-supplied TOML can get wrong.
    pub fn is_valid(&self) -> bool {
        matches!(self.num_channels, 4 | 8 | 12 | 16) && self.channel_spacing_hz > 0
    }

    pub fn payload_encoding(&self) -> PayloadEncoding {
        if self.use_binary_payload {
            PayloadEncoding::Binary
        } else {
            PayloadEncoding::Base64
        }
    }

    /// 8 channels, 20 ms symbols, QPSK, binary payload — optimized for
    /// throughput on a clean channel.
    pub fn fast() -> Self {
        Self {
            num_channels: 8,
            channel_spacing_hz: 200,
            symbol_duration_ms: 20,
            modulation: ModulationScheme::Qpsk,
            use_binary_payload: true,
            chunk_size: 128,
        }
    }

    /// 4 channels, 40 ms symbols, FSK, base64 payload, 64-byte chunks — the
    /// conservative default profile.
    pub fn standard() -> Self {
        Self {
            num_channels: 4,
            channel_spacing_hz: 300,
            symbol_duration_ms: 40,
            modulation: ModulationScheme::Fsk,
            use_binary_payload: false,
            chunk_size: 64,
        }
    }

    /// 16 channels, 60 ms symbols, FSK, binary payload — maximum robustness
    /// at the cost of throughput.
    pub fn robust() -> Self {
        Self {
            num_channels: 16,
            channel_spacing_hz: 150,
            symbol_duration_ms: 60,
            modulation: ModulationScheme::Fsk,
            use_binary_payload: true,
            chunk_size: 128,
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "fast" => Some(Self::fast()),
            "standard" => Some(Self::standard()),
            "robust" => Some(Self::robust()),
            _ => None,
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::standard()
    }
}

/// Fixed audio parameters. Unlike `Profile` these are normative constants
/// of the physical layer, not something a caller tunes per transfer —
/// changing them invalidates an existing calibration (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    pub sample_rate_hz: u32,
    pub fft_size: usize,
    pub fsk_deviation_hz: f64,
    pub freq_min_hz: u32,
    pub freq_max_hz: u32,
    pub signal_threshold: u8,
}

impl AudioParams {
    pub const SAMPLE_RATE_HZ: u32 = 44_100;
    pub const FFT_SIZE: usize = 8192;
    pub const FSK_DEVIATION_HZ: f64 = 100.0;
    pub const FREQ_MIN_HZ: u32 = 2_000;
    pub const FREQ_MAX_HZ: u32 = 10_000;
    pub const SIGNAL_THRESHOLD: u8 = 80;

    /// Magnitude bins are spaced `sample_rate / fft_size` Hz apart.
    pub fn bin_width_hz(&self) -> f64 {
        self.sample_rate_hz as f64 / self.fft_size as f64
    }

    pub fn bin_for_freq(&self, freq_hz: f64) -> usize {
        (freq_hz / self.bin_width_hz()).round() as usize
    }

    /// Number of samples spanning `duration_ms` at this sample rate.
    pub fn samples_for_ms(&self, duration_ms: u32) -> usize {
        (self.sample_rate_hz as u64 * duration_ms as u64 / 1000) as usize
    }
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            sample_rate_hz: Self::SAMPLE_RATE_HZ,
            fft_size: Self::FFT_SIZE,
            fsk_deviation_hz: Self::FSK_DEVIATION_HZ,
            freq_min_hz: Self::FREQ_MIN_HZ,
            freq_max_hz: Self::FREQ_MAX_HZ,
            signal_threshold: Self::SIGNAL_THRESHOLD,
        }
    }
}

/// Sender-side power controller bounds and target (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerConfig {
    pub min_power: f32,
    pub max_power: f32,
    pub target_snr_db: f32,
    pub fixed_power: f32,
    pub adaptive: bool,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            min_power: 0.02,
            max_power: 0.5,
            target_snr_db: 15.0,
            fixed_power: 0.10,
            adaptive: false,
        }
    }
}

/// Calibration duration presets (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationKind {
    Quick,
    Full,
}

impl CalibrationKind {
    pub fn duration_ms(self) -> u64 {
        match self {
            CalibrationKind::Quick => 2_000,
            CalibrationKind::Full => 3_000,
        }
    }
}

/// Sender retry/pacing defaults (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SenderConfig {
    pub max_retries: u32,
    pub packet_delay_ms: u64,
    pub compression_min_size: usize,
    pub use_compression: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            packet_delay_ms: 8,
            compression_min_size: 64,
            use_compression: true,
        }
    }
}
