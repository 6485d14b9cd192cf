//! Signcryption header: record layout, canonical encoding and validation.
//!
//! The header is encoded once per message as a CBOR map with a fixed field
//! order. Its SHA-512 is the authentication context for every payload chunk,
//! so a single flipped bit anywhere in the header invalidates the stream.

use serde::{Deserialize, Serialize};

use crate::error::{OpenError, SealError};
use crate::wire::{
    FORMAT_NAME, FORMAT_VERSION, MAX_FRAME_BYTES, MODE_SIGNCRYPTION, SENDER_SECRETBOX_BYTES,
    WRAPPED_KEY_BYTES, X25519_KEY_BYTES,
};

/// One receiver's wrapped copy of the payload key.
///
/// `identifier` is empty for box receivers and for symmetric receivers that
/// chose not to publish an identifier.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiverEntry {
    #[serde(with = "serde_bytes")]
    pub identifier: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub wrapped_payload_key: Vec<u8>,
}

/// The first frame of every sealed stream.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SigncryptionHeader {
    pub format_name: String,
    pub format_version: u8,
    pub mode: u8,
    #[serde(with = "serde_bytes")]
    pub ephemeral_public_key: Vec<u8>,
    /// Sender's Ed25519 verifying key (or zeros) encrypted under the payload key.
    #[serde(with = "serde_bytes")]
    pub sender_secretbox: Vec<u8>,
    /// Wrapped payload keys in shuffled wire order.
    pub receivers: Vec<ReceiverEntry>,
}

pub fn build_header(
    ephemeral_public_key: &[u8; X25519_KEY_BYTES],
    sender_secretbox: Vec<u8>,
    receivers: Vec<ReceiverEntry>,
) -> SigncryptionHeader {
    SigncryptionHeader {
        format_name: FORMAT_NAME.to_string(),
        format_version: FORMAT_VERSION,
        mode: MODE_SIGNCRYPTION,
        ephemeral_public_key: ephemeral_public_key.to_vec(),
        sender_secretbox,
        receivers,
    }
}

/// Canonical encoding. An empty receiver list is an internal-consistency
/// failure: the receiver count gate runs before any header is built. Headers
/// larger than a reader accepts (`MAX_FRAME_BYTES`) are refused.
pub fn encode_header(header: &SigncryptionHeader) -> Result<Vec<u8>, SealError> {
    if header.receivers.is_empty() {
        return Err(SealError::Encoding);
    }
    let mut out = Vec::with_capacity(128 + header.receivers.len() * (WRAPPED_KEY_BYTES + 8));
    ciborium::ser::into_writer(header, &mut out).map_err(|_| SealError::Encoding)?;
    if out.len() > MAX_FRAME_BYTES {
        return Err(SealError::Encoding);
    }
    Ok(out)
}

/// Decode and validate a header frame.
///
/// Rejects input that decodes but does not re-encode to the same bytes, so
/// that every accepted header has exactly one byte representation.
pub fn decode_header(bytes: &[u8]) -> Result<SigncryptionHeader, OpenError> {
    let header: SigncryptionHeader =
        ciborium::de::from_reader(bytes).map_err(|_| OpenError::Malformed("header"))?;

    if header.format_name != FORMAT_NAME
        || header.format_version != FORMAT_VERSION
        || header.mode != MODE_SIGNCRYPTION
    {
        return Err(OpenError::UnsupportedFormat);
    }
    if header.ephemeral_public_key.len() != X25519_KEY_BYTES {
        return Err(OpenError::Malformed("ephemeral public key length"));
    }
    if header.sender_secretbox.len() != SENDER_SECRETBOX_BYTES {
        return Err(OpenError::Malformed("sender secretbox length"));
    }
    if header.receivers.is_empty() {
        return Err(OpenError::Malformed("no receivers"));
    }
    if header
        .receivers
        .iter()
        .any(|r| r.wrapped_payload_key.len() != WRAPPED_KEY_BYTES)
    {
        return Err(OpenError::Malformed("wrapped key length"));
    }

    let reencoded = encode_header(&header).map_err(|_| OpenError::Malformed("header"))?;
    if reencoded != bytes {
        return Err(OpenError::Malformed("non-canonical header"));
    }
    Ok(header)
}
