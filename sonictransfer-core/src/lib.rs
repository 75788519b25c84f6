//! SonicTransfer core library.
//!
//! A Rust-native implementation of the acoustic file-transfer protocol
//! stack: calibration, LZ77 compression with integrity checks, multi-carrier
//! modulation/demodulation, packet framing, and sender/receiver session
//! state machines. The modules are organized by pipeline stage and expose a
//! fully typed, host-agnostic API — the host supplies audio in and out
//! through the traits in `audio_io`.

pub mod audio_io;
pub mod calibration;
pub mod channel;
pub mod codec;
pub mod config;
pub mod errors;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod signal_processing;
pub mod utils;

pub use calibration::{CalibrationResult, Calibrator};
pub use config::{AudioParams, CalibrationKind, ModulationScheme, PayloadEncoding, PowerConfig, Profile, SenderConfig};
pub use errors::{CalibrationError, CodecError, PacketError, Result, SessionError, SonicTransferError};
pub use logging::{LogConfig, LogLevel, SessionEvent, SignalLogger, TransferStatus};
pub use protocol::{FileMetadata, Packet};
pub use session::{ChunkStore, ReceiverSession, SenderSession};
