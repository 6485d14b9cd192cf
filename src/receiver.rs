//! Receiver pipeline: count gate, normalization, anonymizing shuffle, and
//! per-receiver payload key wrapping.
//!
//! Box receivers and symmetric receivers are merged into one list and
//! permuted uniformly at random before any key is wrapped, so the wire order
//! of entries says nothing about receiver kind or submission order.

use rand_core::{CryptoRng, RngCore};

use crate::aead;
use crate::error::SealError;
use crate::header::ReceiverEntry;
use crate::kdf;
use crate::keys::{BoxPublicKey, BoxSecretKey, ReceiverSymmetricKey};
use crate::wire::{self, PAYLOAD_KEY_BYTES};

/// Reject messages nobody could open.
///
/// # Panics
///
/// Panics if either count is negative.
pub fn check_receiver_count(box_count: isize, symmetric_count: isize) -> Result<(), SealError> {
    assert!(box_count >= 0, "negative box receiver count: {box_count}");
    assert!(symmetric_count >= 0, "negative symmetric receiver count: {symmetric_count}");

    if box_count == 0 && symmetric_count == 0 {
        return Err(SealError::BadReceivers);
    }
    Ok(())
}

/// A receiver of either kind, borrowed from the caller for one seal operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Receiver<'a> {
    Box(&'a BoxPublicKey),
    Symmetric(&'a ReceiverSymmetricKey),
}

impl Receiver<'_> {
    /// Wrap `payload_key` for this receiver at wire position `index`.
    pub fn wrap_payload_key(
        &self,
        payload_key: &[u8; PAYLOAD_KEY_BYTES],
        ephemeral: &BoxSecretKey,
        index: u64,
    ) -> Result<ReceiverEntry, SealError> {
        let ephemeral_pk = ephemeral.public_key();
        let nonce = wire::wrap_nonce(index);

        match self {
            Receiver::Box(pk) => {
                let shared = ephemeral.shared_secret(pk).ok_or(SealError::KeyWrap)?;
                let wrap_key =
                    kdf::derive_box_wrap_key(&shared, ephemeral_pk.as_bytes(), pk.as_bytes())?;
                let wrapped = aead::aead_seal(&wrap_key, &nonce, payload_key, b"")
                    .map_err(|_| SealError::KeyWrap)?;
                Ok(ReceiverEntry {
                    identifier: Vec::new(),
                    wrapped_payload_key: wrapped,
                })
            }
            Receiver::Symmetric(r) => {
                let wrap_key =
                    kdf::derive_symmetric_wrap_key(r.key.as_bytes(), ephemeral_pk.as_bytes())?;
                let wrapped = aead::aead_seal(&wrap_key, &nonce, payload_key, b"")
                    .map_err(|_| SealError::KeyWrap)?;
                Ok(ReceiverEntry {
                    identifier: r.identifier.clone().unwrap_or_default(),
                    wrapped_payload_key: wrapped,
                })
            }
        }
    }
}

/// Box receivers first, then symmetric receivers. No keys are touched.
pub fn normalize<'a>(
    box_receivers: &'a [BoxPublicKey],
    symmetric_receivers: &'a [ReceiverSymmetricKey],
) -> Vec<Receiver<'a>> {
    box_receivers
        .iter()
        .map(Receiver::Box)
        .chain(symmetric_receivers.iter().map(Receiver::Symmetric))
        .collect()
}

/// Uniform draw from `0..bound` by rejection sampling over 32-bit values.
fn uniform_index<R: RngCore + CryptoRng>(rng: &mut R, bound: usize) -> Result<usize, SealError> {
    let bound = u32::try_from(bound).map_err(|_| SealError::Shuffle)?;
    debug_assert!(bound > 0);

    // 2^32 mod bound: draws below this would bias small indices.
    let threshold = bound.wrapping_neg() % bound;
    loop {
        let mut buf = [0u8; 4];
        rng.try_fill_bytes(&mut buf).map_err(|_| SealError::Shuffle)?;
        let x = u32::from_le_bytes(buf);
        if x >= threshold {
            return Ok((x % bound) as usize);
        }
    }
}

/// In-place Fisher–Yates shuffle.
pub fn shuffle<T, R: RngCore + CryptoRng>(items: &mut [T], rng: &mut R) -> Result<(), SealError> {
    for i in (1..items.len()).rev() {
        let j = uniform_index(rng, i + 1)?;
        items.swap(i, j);
    }
    Ok(())
}

/// Normalize both receiver lists and shuffle the result.
pub fn shuffle_signcrypt_receivers<'a, R: RngCore + CryptoRng>(
    box_receivers: &'a [BoxPublicKey],
    symmetric_receivers: &'a [ReceiverSymmetricKey],
    rng: &mut R,
) -> Result<Vec<Receiver<'a>>, SealError> {
    let mut receivers = normalize(box_receivers, symmetric_receivers);
    shuffle(&mut receivers, rng)?;
    Ok(receivers)
}
