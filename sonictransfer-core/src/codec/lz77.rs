//! LZ77-style sliding-window compression applied to the payload before framing.
//!
//! Window: 4,096 bytes preceding the cursor. Lookahead: up to 18 bytes.
//! Matches shorter than 3 bytes are not worth the 4-byte quadruplet they'd
//! cost, so only literals are emitted below that length. Ties between
//! equal-length matches are broken by nearest (smallest) distance, which
//! is what a naive backward scan finds first.

use crate::errors::CodecError;

const WINDOW_SIZE: usize = 4096;
const MAX_LOOKAHEAD: usize = 18;
const MIN_MATCH_LEN: usize = 3;
const MARKER: u8 = 0xFF;

struct Match {
    distance: usize,
    length: usize,
}

fn longest_match(data: &[u8], cursor: usize) -> Option<Match> {
    let window_start = cursor.saturating_sub(WINDOW_SIZE);
    let lookahead_end = (cursor + MAX_LOOKAHEAD).min(data.len());
    let max_len = lookahead_end - cursor;
    if max_len < MIN_MATCH_LEN {
        return None;
    }

    let mut best: Option<Match> = None;
    for start in window_start..cursor {
        let mut len = 0;
        while len < max_len && data[start + len] == data[cursor + len] {
            len += 1;
        }
        if len >= MIN_MATCH_LEN {
            let distance = cursor - start;
            // `start` increases toward `cursor` as the scan proceeds, so a
            // later `start` is always nearer (smaller distance); `>=` lets a
            // later equal-length match overwrite an earlier, farther one.
            let better = match &best {
                None => true,
                Some(current) => len >= current.length,
            };
            if better {
                best = Some(Match { distance, length: len });
            }
        }
    }
    best
}

/// Compress `data`, returning a 4-byte big-endian length header followed by
/// the literal/match stream. A literal byte equal to `0xFF` is escaped as
/// the quadruplet `(0xFF, 0x00, 0x00, 0x00)` — a zero-distance, zero-length
/// "match" that the decompressor recognizes as "emit one literal 0xFF"
/// rather than a copy (see DESIGN.md, Open Question 1).
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 4);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());

    let mut cursor = 0;
    while cursor < data.len() {
        if data[cursor] == MARKER {
            match longest_match(data, cursor) {
                Some(m) if m.length >= MIN_MATCH_LEN => {
                    emit_match(&mut out, m.distance, m.length);
                    cursor += m.length;
                }
                _ => {
                    // Escape the literal 0xFF byte itself.
                    out.push(MARKER);
                    out.push(0);
                    out.push(0);
                    out.push(0);
                    cursor += 1;
                }
            }
            continue;
        }

        match longest_match(data, cursor) {
            Some(m) => {
                emit_match(&mut out, m.distance, m.length);
                cursor += m.length;
            }
            None => {
                out.push(data[cursor]);
                cursor += 1;
            }
        }
    }

    out
}

fn emit_match(out: &mut Vec<u8>, distance: usize, length: usize) {
    let distance = distance as u16;
    out.push(MARKER);
    out.push((distance >> 8) as u8);
    out.push((distance & 0xFF) as u8);
    out.push(length as u8);
}

/// Decompress a stream produced by [`compress`]. Stops once the declared
/// original length is reached; returns [`CodecError::CorruptStream`] if the
/// input runs out first or a copy references data before the start of the
/// output buffer.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < 4 {
        return Err(CodecError::CorruptStream {
            reason: "missing length header".to_string(),
        });
    }
    let original_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let mut out = Vec::with_capacity(original_len);
    let mut cursor = 4;

    while out.len() < original_len {
        if cursor >= data.len() {
            return Err(CodecError::CorruptStream {
                reason: "input exhausted before reaching declared length".to_string(),
            });
        }
        let byte = data[cursor];
        cursor += 1;

        if byte == MARKER {
            if cursor + 3 > data.len() {
                return Err(CodecError::CorruptStream {
                    reason: "truncated match quadruplet".to_string(),
                });
            }
            let distance = u16::from_be_bytes([data[cursor], data[cursor + 1]]) as usize;
            let length = data[cursor + 2] as usize;
            cursor += 3;

            if distance == 0 && length == 0 {
                out.push(MARKER);
                continue;
            }

            if distance == 0 || distance > out.len() {
                return Err(CodecError::CorruptStream {
                    reason: format!("match distance {} invalid at output length {}", distance, out.len()),
                });
            }

            let start = out.len() - distance;
            for i in 0..length {
                let b = out[start + i];
                out.push(b);
            }
        } else {
            out.push(byte);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_repetitive_input() {
        let data = b"ABABABABAB".to_vec();
        let compressed = compress(&data);
        assert!(compressed.len() <= data.len() + 4);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn round_trips_empty_input() {
        let compressed = compress(&[]);
        let decompressed = decompress(&compressed).unwrap();
        assert!(decompressed.is_empty());
    }

    #[test]
    fn round_trips_byte_containing_marker() {
        let data = vec![0x41, 0xFF, 0x42, 0xFF, 0xFF, 0x43];
        let compressed = compress(&data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn round_trips_random_like_input() {
        let data: Vec<u8> = (0..512u32).map(|i| (i * 37 + 11) as u8).collect();
        let compressed = compress(&data);
        let decompressed = decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn decompress_rejects_truncated_stream() {
        let mut compressed = compress(b"ABABABABAB");
        compressed.truncate(compressed.len() - 2);
        assert!(decompress(&compressed).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trip_any_bytes(data: Vec<u8>) {
            let compressed = compress(&data);
            let decompressed = decompress(&compressed).unwrap();
            proptest::prop_assert_eq!(decompressed, data);
        }
    }
}
