//! SonicTransfer packet protocol definition.
//!
//! This module defines the canonical on-air packet framing that is shared
//! across the framer, the sender session, and the receiver session.
//!
//! # Wire format
//!
//! Every frame is `10101010` ∥ MSB-first bytes of the ASCII packet body ∥
//! a NUL delivery terminator ∥ `01010101`. The packet body is one of three
//! ASCII-tagged records, none of which ever contain a NUL byte themselves:
//!
//! - `META:<json>`
//! - `DATA:<decimal index>:<payload>`
//! - `END:<token>`

use serde::{Deserialize, Serialize};

use crate::config::{AudioParams, PayloadEncoding};
use crate::errors::PacketError;

/// Sync pattern opening every frame.
pub const SYNC_PREFIX: &str = "10101010";
/// Sync pattern closing every frame.
pub const SYNC_SUFFIX: &str = "01010101";

/// Preamble chord timing shared by the sender (chord playback, §4.6) and
/// the receiver (symbol-clock alignment, §4.4): `PREAMBLE_REPEATS` chords
/// of `PREAMBLE_CHORD_MS` separated by `PREAMBLE_REPEATS - 1` silences of
/// `PREAMBLE_SILENCE_MS`.
pub const PREAMBLE_CHORD_MS: u32 = 150;
pub const PREAMBLE_SILENCE_MS: u32 = 50;
pub const PREAMBLE_REPEATS: u32 = 3;

/// Total preamble duration in milliseconds.
pub fn preamble_duration_ms() -> u32 {
    PREAMBLE_REPEATS * PREAMBLE_CHORD_MS + (PREAMBLE_REPEATS - 1) * PREAMBLE_SILENCE_MS
}

/// Number of preamble samples at `audio`'s sample rate. The receiver skips
/// this many samples before starting symbol-aligned demodulation, since the
/// preamble's duration is not itself a whole number of symbols for any
/// profile.
pub fn preamble_sample_count(audio: &AudioParams) -> usize {
    audio.samples_for_ms(preamble_duration_ms())
}

/// Maximum chunk index accepted by the wire format (spec.md §9 Open
/// Question 5 — the ASCII decimal encoding is otherwise unbounded).
pub const MAX_CHUNK_INDEX: u64 = 1 << 24;

/// Metadata describing the file being transferred, carried JSON-encoded in
/// the `Meta` packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    /// Size in bytes after compression (the size actually transmitted).
    pub size: u64,
    /// Size in bytes before compression.
    pub original_size: u64,
    pub compressed: bool,
    /// 16-bit additive checksum over the post-compression byte stream.
    pub checksum: u16,
    /// CRC-16/IBM over the post-compression byte stream.
    pub crc: u16,
    pub chunks: u32,
    pub timestamp: u64,
    pub encoding: String,
}

impl FileMetadata {
    pub fn payload_encoding(&self) -> Option<PayloadEncoding> {
        PayloadEncoding::from_str(&self.encoding)
    }
}

/// A typed application-layer record.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Meta { json_metadata: String },
    Data { index: u32, payload: Vec<u8> },
    End { reason: String },
}

impl Packet {
    pub fn meta(metadata: &FileMetadata) -> Result<Self, PacketError> {
        let json_metadata = serde_json::to_string(metadata).map_err(|e| PacketError::InvalidMetadata {
            reason: e.to_string(),
        })?;
        Ok(Packet::Meta { json_metadata })
    }

    pub fn data(index: u32, payload: Vec<u8>) -> Result<Self, PacketError> {
        if index as u64 >= MAX_CHUNK_INDEX {
            return Err(PacketError::ChunkIndexOutOfRange {
                index: index as u64,
                max: MAX_CHUNK_INDEX,
            });
        }
        Ok(Packet::Data { index, payload })
    }

    pub fn end(reason: impl Into<String>) -> Self {
        Packet::End { reason: reason.into() }
    }

    /// Serialize to the ASCII packet body (without sync prefix/suffix).
    pub fn to_body(&self) -> Vec<u8> {
        match self {
            Packet::Meta { json_metadata } => format!("META:{}", json_metadata).into_bytes(),
            Packet::Data { index, payload } => {
                let mut body = format!("DATA:{}:", index).into_bytes();
                body.extend_from_slice(payload);
                body
            }
            Packet::End { reason } => format!("END:{}", reason).into_bytes(),
        }
    }

    /// Parse an ASCII packet body (without sync prefix/suffix) into a typed
    /// packet. Never routes on string content beyond this single dispatch
    /// step (spec.md §9: "never route by string prefix beyond the single
    /// dispatch step").
    pub fn parse(body: &[u8]) -> Result<Self, PacketError> {
        let text = String::from_utf8_lossy(body);

        if let Some(rest) = text.strip_prefix("META:") {
            return Ok(Packet::Meta {
                json_metadata: rest.to_string(),
            });
        }

        if let Some(rest) = text.strip_prefix("DATA:") {
            let mut parts = rest.splitn(2, ':');
            let index_str = parts.next().ok_or_else(|| PacketError::Malformed {
                reason: "DATA packet missing index".to_string(),
            })?;
            let payload_str = parts.next().ok_or_else(|| PacketError::Malformed {
                reason: "DATA packet missing payload".to_string(),
            })?;
            let index: u64 = index_str.parse().map_err(|_| PacketError::Malformed {
                reason: format!("DATA index {:?} is not a decimal integer", index_str),
            })?;
            if index >= MAX_CHUNK_INDEX {
                return Err(PacketError::ChunkIndexOutOfRange {
                    index,
                    max: MAX_CHUNK_INDEX,
                });
            }
            return Ok(Packet::Data {
                index: index as u32,
                payload: payload_str.as_bytes().to_vec(),
            });
        }

        if let Some(rest) = text.strip_prefix("END:") {
            return Ok(Packet::End {
                reason: rest.to_string(),
            });
        }

        Err(PacketError::UnknownTag {
            tag: text.chars().take(16).collect(),
        })
    }
}

/// Convert an ASCII packet body into the frame's bit string: sync prefix,
/// MSB-first bits of every body byte, a NUL delivery terminator, sync
/// suffix. The terminator is what lets the receiver's `Synchronizer` find
/// the end of a record without counting bytes (spec.md §4.4).
pub fn frame_bits(body: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(SYNC_PREFIX.len() + (body.len() + 1) * 8 + SYNC_SUFFIX.len());
    bits.extend(SYNC_PREFIX.bytes().map(|b| b - b'0'));
    for &byte in body {
        for i in (0..8).rev() {
            bits.push((byte >> i) & 1);
        }
    }
    for i in (0..8).rev() {
        bits.push((0u8 >> i) & 1);
    }
    bits.extend(SYNC_SUFFIX.bytes().map(|b| b - b'0'));
    bits
}
