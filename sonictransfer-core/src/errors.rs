//! SonicTransfer error types with granular categories, one enum per subsystem.

use thiserror::Error;

/// Top-level error type for all SonicTransfer operations.
#[derive(Debug, Error)]
pub enum SonicTransferError {
    #[error("calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

/// Errors raised while probing the channel and selecting carriers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("no viable frequency band for {num_channels} channels at {channel_spacing_hz} Hz spacing within [{freq_min}, {freq_max}] Hz")]
    NoViableBand {
        num_channels: usize,
        channel_spacing_hz: u32,
        freq_min: u32,
        freq_max: u32,
    },
}

/// Errors raised by the LZ77 codec and integrity checks.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("corrupt compressed stream: {reason}")]
    CorruptStream { reason: String },
}

/// Errors raised while parsing a packet out of the recovered bit stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("unrecognized packet tag: {tag:?}")]
    UnknownTag { tag: String },

    #[error("malformed packet body: {reason}")]
    Malformed { reason: String },

    #[error("chunk index {index} exceeds the maximum of {max}")]
    ChunkIndexOutOfRange { index: u64, max: u64 },

    #[error("metadata JSON could not be parsed: {reason}")]
    InvalidMetadata { reason: String },

    #[error("demodulator sync buffer overflowed at {len} bits without finding a frame")]
    BufferOverflow { len: usize },
}

/// Errors surfaced at the session level (sender or receiver).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("audio device unavailable: {reason}")]
    AudioUnavailable { reason: String },

    #[error("a session of this direction is already active on this device")]
    AlreadyActive,

    #[error("session was canceled")]
    Canceled,
}

/// Result type alias for SonicTransfer operations.
pub type Result<T> = std::result::Result<T, SonicTransferError>;
