//! Error types for uhfrust-core

use crate::session::ReaderState;

/// Result type alias for uhfrust-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame is too short to be valid
    #[error("Packet too short: expected at least {expected} bytes, got {actual} bytes")]
    PacketTooShort {
        expected: usize,
        actual: usize,
    },

    /// Frame does not start with the header byte
    #[error("Invalid header byte: 0x{0:02X}")]
    InvalidHeader(u8),

    /// Frame size disagrees with its length field
    #[error("Length mismatch: length field requires {declared} bytes, frame has {actual}")]
    LengthMismatch {
        declared: usize,
        actual: usize,
    },

    /// Unknown command code
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Scan command issued before the reader reached application mode
    #[error("Reader not ready (state: {state:?})")]
    ReaderNotReady {
        state: ReaderState,
    },

    /// Catalog text could not be used
    #[error("Catalog error: {0}")]
    Catalog(#[from] uhfrust_types::Error),
}
