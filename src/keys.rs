//! Key types
//!
//! Box keys are X25519. Symmetric receiver keys are 32 raw bytes shared out of
//! band. Sender keys are Ed25519 (`SigningKey` / `VerifyingKey`, re-exported
//! from `ed25519-dalek`).
//!
//! Key serialization:
//!   BoxPublicKey  = x25519_pk[32]
//!   BoxSecretKey  = x25519_sk[32]
//!   SymmetricKey  = key[32]

use core::fmt;

use rand_core::OsRng;
use subtle::ConstantTimeEq;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::OpenError;
use crate::wire::{SYMMETRIC_KEY_BYTES, X25519_KEY_BYTES};

pub use ed25519_dalek::{SigningKey, VerifyingKey};

// ---------------------------------------------------------------------------
// Box keys
// ---------------------------------------------------------------------------

/// Long-term or ephemeral X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BoxPublicKey {
    inner: X25519PublicKey,
}

impl BoxPublicKey {
    pub fn from_bytes(bytes: [u8; X25519_KEY_BYTES]) -> Self {
        Self {
            inner: X25519PublicKey::from(bytes),
        }
    }

    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, OpenError> {
        let arr: [u8; X25519_KEY_BYTES] = bytes
            .try_into()
            .map_err(|_| OpenError::Malformed("box public key length"))?;
        Ok(Self::from_bytes(arr))
    }

    pub fn as_bytes(&self) -> &[u8; X25519_KEY_BYTES] {
        self.inner.as_bytes()
    }

    pub(crate) fn x25519(&self) -> &X25519PublicKey {
        &self.inner
    }
}

impl fmt::Debug for BoxPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoxPublicKey(")?;
        for b in &self.as_bytes()[..4] {
            write!(f, "{b:02x}")?;
        }
        write!(f, "..)")
    }
}

/// X25519 secret key. Used both for receivers' long-term keys and for the
/// per-message ephemeral key, which must survive one DH per box receiver.
#[derive(Clone)]
pub struct BoxSecretKey {
    inner: StaticSecret,
}

impl BoxSecretKey {
    pub fn generate() -> Self {
        Self {
            inner: StaticSecret::random_from_rng(OsRng),
        }
    }

    pub fn from_bytes(bytes: [u8; X25519_KEY_BYTES]) -> Self {
        Self {
            inner: StaticSecret::from(bytes),
        }
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; X25519_KEY_BYTES]> {
        Zeroizing::new(self.inner.to_bytes())
    }

    pub fn public_key(&self) -> BoxPublicKey {
        BoxPublicKey {
            inner: X25519PublicKey::from(&self.inner),
        }
    }

    /// X25519 with `peer`. Returns `None` for a non-contributory (all-zero)
    /// shared secret, e.g. when `peer` is a low-order point.
    pub(crate) fn shared_secret(&self, peer: &BoxPublicKey) -> Option<Zeroizing<[u8; 32]>> {
        let shared = self.inner.diffie_hellman(peer.x25519());
        if !shared.was_contributory() {
            return None;
        }
        Some(Zeroizing::new(shared.to_bytes()))
    }
}

impl fmt::Debug for BoxSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxSecretKey").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Symmetric receiver keys
// ---------------------------------------------------------------------------

/// Shared 32-byte key for a symmetric receiver.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SYMMETRIC_KEY_BYTES]);

impl SymmetricKey {
    pub fn new(bytes: [u8; SYMMETRIC_KEY_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn generate() -> Self {
        let mut k = [0u8; SYMMETRIC_KEY_BYTES];
        rand_core::RngCore::fill_bytes(&mut OsRng, &mut k);
        Self(k)
    }

    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_BYTES] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SymmetricKey").finish_non_exhaustive()
    }
}

/// A symmetric receiver: the shared key plus an optional lookup identifier.
///
/// The identifier travels in the clear next to the wrapped key so the
/// receiver can find its entry without trial decryption. Leave it `None`
/// to hide which symmetric receivers were addressed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiverSymmetricKey {
    pub key: SymmetricKey,
    pub identifier: Option<Vec<u8>>,
}

impl ReceiverSymmetricKey {
    pub fn new(key: SymmetricKey, identifier: Option<Vec<u8>>) -> Self {
        Self { key, identifier }
    }
}

// ---------------------------------------------------------------------------
// Ephemeral key creation
// ---------------------------------------------------------------------------

/// Produces the fresh ephemeral key pair used for one seal operation.
///
/// Substitutable so tests can pin the ephemeral key.
pub trait EphemeralKeyCreator {
    fn create_ephemeral_key(&self) -> BoxSecretKey;
}

/// Draws ephemeral keys from the OS CSPRNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEphemeralKeyCreator;

impl EphemeralKeyCreator for OsEphemeralKeyCreator {
    fn create_ephemeral_key(&self) -> BoxSecretKey {
        BoxSecretKey::generate()
    }
}

/// Generate a sender signing key from the OS CSPRNG.
pub fn generate_signing_key() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}
