//! LZ77-style compression and integrity checks applied before framing.

pub mod checksum;
pub mod lz77;

pub use checksum::{checksum, crc16};
pub use lz77::{compress, decompress};
