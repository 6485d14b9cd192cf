//! Error types for sealing and opening signcrypted streams.
//!
//! Caller bugs (negative receiver counts, writing to a finalized stream) are
//! panics, not variants here.

use std::io;

use thiserror::Error;

/// Failure while building or writing a sealed stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SealError {
    /// No receivers at all: nobody could open the message.
    #[error("message must have at least one receiver")]
    BadReceivers,

    /// The random source failed while permuting receivers.
    #[error("failed to shuffle receivers")]
    Shuffle,

    /// Key agreement, derivation or encryption failed while wrapping the payload key.
    #[error("failed to wrap payload key for receiver")]
    KeyWrap,

    /// A header or packet could not be encoded.
    #[error("encoding error")]
    Encoding,

    /// The seal configuration was rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The output sink failed.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<io::Error> for SealError {
    fn from(e: io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<SealError> for io::Error {
    fn from(e: SealError) -> Self {
        match e {
            SealError::Io(msg) => io::Error::new(io::ErrorKind::Other, msg),
            other => io::Error::new(io::ErrorKind::InvalidInput, other),
        }
    }
}

/// Failure while reading or verifying a sealed stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// A frame or record could not be decoded, or was not canonical.
    #[error("malformed input: {0}")]
    Malformed(&'static str),

    /// Wrong format name, version or mode.
    #[error("unsupported format")]
    UnsupportedFormat,

    /// None of the keyring's keys unwraps any receiver entry.
    #[error("no matching receiver key")]
    NoMatchingReceiver,

    /// An AEAD tag did not verify.
    #[error("authentication failed")]
    Authentication,

    /// A chunk signature did not verify.
    #[error("bad chunk signature")]
    BadSignature,

    /// Chunk index differs from the expected position.
    #[error("chunk out of order: expected {expected}, found {found}")]
    OutOfOrderChunk { expected: u64, found: u64 },

    /// The stream ended without a final chunk.
    #[error("stream ended without a final chunk")]
    MissingFinalChunk,

    /// Bytes follow the final chunk.
    #[error("trailing data after final chunk")]
    TrailingData,

    /// The input source failed.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<OpenError> for io::Error {
    fn from(e: OpenError) -> Self {
        match e {
            OpenError::Io(msg) => io::Error::new(io::ErrorKind::Other, msg),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
