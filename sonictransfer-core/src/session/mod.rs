//! Session state machines tying the codec, protocol, and signal-processing
//! layers together into a sender and a receiver (spec.md §4.6, §4.7).

pub mod receiver;
pub mod sender;

pub use receiver::ReceiverSession;
pub use sender::SenderSession;

use std::collections::BTreeMap;

use crate::config::PayloadEncoding;

/// Mapping from chunk index to encoded payload bytes. A given index is
/// written at most once: first wins, duplicates are silently ignored
/// (spec.md §3 "ChunkStore").
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: BTreeMap<u32, Vec<u8>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call actually recorded the chunk (i.e. the
    /// index was not already present).
    pub fn insert(&mut self, index: u32, payload: Vec<u8>) -> bool {
        if self.chunks.contains_key(&index) {
            false
        } else {
            self.chunks.insert(index, payload);
            true
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, index: u32) -> bool {
        self.chunks.contains_key(&index)
    }

    /// Decodes each chunk's payload with `encoding` and concatenates the
    /// results for `0..expected_chunks`, skipping any missing or
    /// undecodable index and returning those indices for logging. Each
    /// chunk is decoded independently rather than concatenated-then-decoded
    /// once, since an encoding like base64 pads each chunk on its own
    /// (spec.md §4.7 "concatenate decoded payloads").
    pub fn reassemble(&self, expected_chunks: u32, encoding: PayloadEncoding) -> (Vec<u8>, Vec<u32>) {
        let mut out = Vec::new();
        let mut missing = Vec::new();
        for i in 0..expected_chunks {
            match self.chunks.get(&i).and_then(|payload| encoding.decode(payload)) {
                Some(decoded) => out.extend_from_slice(&decoded),
                None => missing.push(i),
            }
        }
        (out, missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_duplicate_index() {
        let encoding = PayloadEncoding::Binary;
        let mut store = ChunkStore::new();
        assert!(store.insert(0, encoding.encode(&[1, 2])));
        assert!(!store.insert(0, encoding.encode(&[9, 9])));
        assert_eq!(store.reassemble(1, encoding).0, vec![1, 2]);
    }

    #[test]
    fn reassemble_reports_missing_indices() {
        let encoding = PayloadEncoding::Binary;
        let mut store = ChunkStore::new();
        store.insert(0, encoding.encode(&[1]));
        store.insert(2, encoding.encode(&[3]));
        let (bytes, missing) = store.reassemble(3, encoding);
        assert_eq!(bytes, vec![1, 3]);
        assert_eq!(missing, vec![1]);
    }

    #[test]
    fn reassemble_decodes_each_chunk_independently() {
        let encoding = PayloadEncoding::Base64;
        let mut store = ChunkStore::new();
        store.insert(0, encoding.encode(&[1, 2, 3]));
        store.insert(1, encoding.encode(&[4, 5, 6]));
        let (bytes, missing) = store.reassemble(2, encoding);
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6]);
        assert!(missing.is_empty());
    }
}
