//! AEAD: AES-256-GCM

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use getrandom::getrandom;
use zeroize::Zeroizing;

use crate::error::{OpenError, SealError};
use crate::wire::{NONCE_BYTES, PAYLOAD_KEY_BYTES};

/// Draw a fresh random payload key for one message.
pub fn payload_key() -> Result<Zeroizing<[u8; PAYLOAD_KEY_BYTES]>, SealError> {
    let mut k = Zeroizing::new([0u8; PAYLOAD_KEY_BYTES]);
    getrandom(&mut k[..]).map_err(|_| SealError::KeyWrap)?;
    Ok(k)
}

/// AEAD seal (encrypt path). Returns SealError::Encoding on failure.
pub fn aead_seal(
    key: &[u8; 32],
    nonce: &[u8; NONCE_BYTES],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, SealError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| SealError::Encoding)?;
    let n = Nonce::from_slice(nonce);
    let payload = Payload { msg: plaintext, aad };
    cipher.encrypt(n, payload).map_err(|_| SealError::Encoding)
}

/// AEAD open (decrypt path). Every failure is OpenError::Authentication.
pub fn aead_open(
    key: &[u8; 32],
    nonce: &[u8; NONCE_BYTES],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, OpenError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| OpenError::Authentication)?;
    let n = Nonce::from_slice(nonce);
    let payload = Payload { msg: ciphertext, aad };
    cipher
        .decrypt(n, payload)
        .map(Zeroizing::new)
        .map_err(|_| OpenError::Authentication)
}
