//! Seal-side configuration.

use crate::error::SealError;
use crate::wire::{DEFAULT_CHUNK_BYTES, MAX_CHUNK_BYTES};

/// Tunables for one seal operation.
///
/// Readers need no matching configuration: packets carry their own lengths
/// and any chunk size up to `MAX_CHUNK_BYTES` is accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealConfig {
    chunk_size: usize,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_BYTES,
        }
    }
}

impl SealConfig {
    pub fn with_chunk_size(chunk_size: usize) -> Result<Self, SealError> {
        if chunk_size == 0 {
            return Err(SealError::InvalidConfig("chunk size must be non-zero"));
        }
        if chunk_size > MAX_CHUNK_BYTES {
            return Err(SealError::InvalidConfig("chunk size exceeds maximum"));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}
