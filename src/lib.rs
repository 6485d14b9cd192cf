//! # Citadel Signcrypt
//!
//! Multi-receiver anonymous signcryption for streams.
//!
//! ## Quick Start
//!
//! ```rust
//! use citadel_signcrypt::{
//!     generate_signing_key, open, seal, BoxSecretKey, Keyring, ReceiverSymmetricKey, Sender,
//!     SymmetricKey,
//! };
//!
//! let alice = BoxSecretKey::generate();
//! let team_key = SymmetricKey::generate();
//! let sender = generate_signing_key();
//!
//! let ciphertext = seal(
//!     b"secret",
//!     Some(&sender),
//!     &[alice.public_key()],
//!     &[ReceiverSymmetricKey::new(team_key.clone(), Some(b"team".to_vec()))],
//! )
//! .unwrap();
//!
//! let mut keyring = Keyring::new();
//! keyring.add_box_key(alice);
//! let (from, plaintext) = open(&ciphertext, &keyring).unwrap();
//!
//! assert_eq!(plaintext, b"secret");
//! assert_eq!(from, Sender::Signed(sender.verifying_key()));
//! ```
//!
//! ## Security Properties
//!
//! - **Receiver anonymity**: receivers are shuffled uniformly before their
//!   keys are wrapped; box receivers carry no identifier on the wire
//! - **Sender anonymity**: the sender's key and signatures are only visible
//!   to receivers
//! - **Header binding**: every chunk is authenticated against the SHA-512 of
//!   the encoded header
//! - **Truncation / reordering resistance**: chunk nonces and signatures
//!   cover the chunk index and an explicit final flag
//!
//! ## What's NOT Provided
//!
//! - Key management or key exchange
//! - Armoring / text encoding
//! - A command-line interface

#![deny(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/citadel-signcrypt/0.1.0")]

// ---------------------------------------------------------------------------
// Internal modules (not part of public API)
// ---------------------------------------------------------------------------

mod aead;
mod kdf;

// ---------------------------------------------------------------------------
// Public modules
// ---------------------------------------------------------------------------

pub mod config;
pub mod error;
pub mod header;
pub mod keys;
pub mod open;
pub mod receiver;
pub mod seal;
pub mod wire;

pub use config::SealConfig;
pub use error::{OpenError, SealError};
pub use header::{ReceiverEntry, SigncryptionHeader};
pub use keys::{
    generate_signing_key, BoxPublicKey, BoxSecretKey, EphemeralKeyCreator, OsEphemeralKeyCreator,
    ReceiverSymmetricKey, SigningKey, SymmetricKey, VerifyingKey,
};
pub use open::{open, Keyring, Sender, SigncryptOpenStream};
pub use receiver::check_receiver_count;
pub use seal::{seal, seal_stream, seal_stream_with_config, SigncryptSealStream};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
