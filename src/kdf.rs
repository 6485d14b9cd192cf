//! KDF and hashes (v1 signcryption)
//!
//! box wrap key = HKDF-SHA256(x25519_shared, salt=None,
//!                            info = PROTOCOL_ID || b"|box|"
//!                                   || SHA3-256(ephemeral_pk || receiver_pk))
//! sym wrap key = HKDF-SHA256(symmetric_key, salt=None,
//!                            info = PROTOCOL_ID || b"|sym|" || SHA3-256(ephemeral_pk))
//! header hash  = SHA-512(encoded_header)
//! chunk digest = SHA-512(nonce || final_byte || plaintext)

use hkdf::Hkdf;
use sha2::{Sha256, Sha512};
use sha3::{Digest, Sha3_256};
use zeroize::Zeroizing;

use crate::error::SealError;
use crate::wire::{HEADER_HASH_BYTES, NONCE_BYTES, PROTOCOL_ID, SIGNATURE_CONTEXT};

const BOX_LABEL: &[u8] = b"|box|";
const SYM_LABEL: &[u8] = b"|sym|";

/// SHA3-256 over the concatenation of `parts`; binds public key material into the KDF info.
pub fn binding_hash(parts: &[&[u8]]) -> [u8; 32] {
    let mut h = Sha3_256::new();
    for part in parts {
        h.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&h.finalize());
    out
}

fn expand(ikm: &[u8], label: &[u8], binding: &[u8; 32]) -> Result<Zeroizing<[u8; 32]>, SealError> {
    let mut info = Vec::with_capacity(PROTOCOL_ID.len() + label.len() + binding.len());
    info.extend_from_slice(PROTOCOL_ID);
    info.extend_from_slice(label);
    info.extend_from_slice(binding);

    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut out = Zeroizing::new([0u8; 32]);
    hk.expand(&info, &mut out[..]).map_err(|_| SealError::KeyWrap)?;
    Ok(out)
}

pub fn derive_box_wrap_key(
    shared_secret: &[u8; 32],
    ephemeral_pk: &[u8; 32],
    receiver_pk: &[u8; 32],
) -> Result<Zeroizing<[u8; 32]>, SealError> {
    let binding = binding_hash(&[&ephemeral_pk[..], &receiver_pk[..]]);
    expand(shared_secret, BOX_LABEL, &binding)
}

pub fn derive_symmetric_wrap_key(
    symmetric_key: &[u8; 32],
    ephemeral_pk: &[u8; 32],
) -> Result<Zeroizing<[u8; 32]>, SealError> {
    let binding = binding_hash(&[&ephemeral_pk[..]]);
    expand(symmetric_key, SYM_LABEL, &binding)
}

pub fn header_hash(encoded_header: &[u8]) -> [u8; HEADER_HASH_BYTES] {
    let mut out = [0u8; HEADER_HASH_BYTES];
    out.copy_from_slice(&Sha512::digest(encoded_header));
    out
}

/// Message signed for each chunk:
/// `SIGNATURE_CONTEXT || header_hash || SHA-512(nonce || final_byte || plaintext)`
pub fn chunk_signature_input(
    header_hash: &[u8; HEADER_HASH_BYTES],
    nonce: &[u8; NONCE_BYTES],
    is_final: bool,
    plaintext: &[u8],
) -> Vec<u8> {
    let mut h = Sha512::new();
    h.update(nonce);
    h.update([u8::from(is_final)]);
    h.update(plaintext);
    let digest = h.finalize();

    let mut msg = Vec::with_capacity(SIGNATURE_CONTEXT.len() + HEADER_HASH_BYTES + digest.len());
    msg.extend_from_slice(SIGNATURE_CONTEXT);
    msg.extend_from_slice(header_hash);
    msg.extend_from_slice(&digest);
    msg
}
