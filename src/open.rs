//! Opening signcrypted streams.
//!
//! The reader finds its receiver entry, recovers the payload key and the
//! sender, then verifies every chunk against the header hash, its index and
//! its finality. A stream is only complete once the final chunk has been
//! verified and nothing follows it.

use std::io::{self, Read};

use ed25519_dalek::Signature;
use subtle::ConstantTimeEq;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::aead;
use crate::error::OpenError;
use crate::header::{decode_header, SigncryptionHeader};
use crate::kdf;
use crate::keys::{BoxPublicKey, BoxSecretKey, ReceiverSymmetricKey, VerifyingKey};
use crate::wire::{
    self, HEADER_HASH_BYTES, PAYLOAD_KEY_BYTES, SENDER_KEY_NONCE, SIGNATURE_BYTES,
    SIGNING_PUBLIC_KEY_BYTES,
};

/// Who produced a stream, as far as the receiver can tell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sender {
    /// The sender chose not to sign.
    Anonymous,
    /// Every chunk carried a valid signature by this key.
    Signed(VerifyingKey),
}

/// Keys a reader may use to open streams.
///
/// Entries carrying an identifier are matched only against symmetric keys
/// with the same identifier. Entries without one are trial-decrypted with
/// every key. An empty identifier is the same as none.
#[derive(Clone, Debug, Default)]
pub struct Keyring {
    box_keys: Vec<BoxSecretKey>,
    symmetric_keys: Vec<ReceiverSymmetricKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_box_key(&mut self, key: BoxSecretKey) -> &mut Self {
        self.box_keys.push(key);
        self
    }

    pub fn add_symmetric_key(&mut self, key: ReceiverSymmetricKey) -> &mut Self {
        self.symmetric_keys.push(key);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.box_keys.is_empty() && self.symmetric_keys.is_empty()
    }

    /// Wrap keys this keyring can derive for `ephemeral`, with the identifier
    /// each one answers to.
    fn candidate_wrap_keys(
        &self,
        ephemeral: &BoxPublicKey,
    ) -> Vec<(Zeroizing<[u8; 32]>, Option<&[u8]>)> {
        let mut out = Vec::with_capacity(self.box_keys.len() + self.symmetric_keys.len());

        for sk in &self.box_keys {
            let Some(shared) = sk.shared_secret(ephemeral) else {
                continue;
            };
            let receiver_pk = sk.public_key();
            let derived =
                kdf::derive_box_wrap_key(&shared, ephemeral.as_bytes(), receiver_pk.as_bytes());
            if let Ok(k) = derived {
                out.push((k, None));
            }
        }

        for sym in &self.symmetric_keys {
            let derived = kdf::derive_symmetric_wrap_key(sym.key.as_bytes(), ephemeral.as_bytes());
            if let Ok(k) = derived {
                let identifier = sym.identifier.as_deref().filter(|id| !id.is_empty());
                out.push((k, identifier));
            }
        }
        out
    }
}

fn find_payload_key(
    header: &SigncryptionHeader,
    keyring: &Keyring,
) -> Result<(usize, Zeroizing<[u8; PAYLOAD_KEY_BYTES]>), OpenError> {
    let ephemeral = BoxPublicKey::try_from_slice(&header.ephemeral_public_key)?;
    let candidates = keyring.candidate_wrap_keys(&ephemeral);

    for (i, entry) in header.receivers.iter().enumerate() {
        let nonce = wire::wrap_nonce(i as u64);

        for (wrap_key, identifier) in &candidates {
            let applies = match identifier {
                _ if entry.identifier.is_empty() => true,
                Some(id) => bool::from(id.ct_eq(&entry.identifier[..])),
                None => false,
            };
            if !applies {
                continue;
            }

            if let Ok(opened) = aead::aead_open(wrap_key, &nonce, &entry.wrapped_payload_key, b"") {
                let key: [u8; PAYLOAD_KEY_BYTES] = opened[..]
                    .try_into()
                    .map_err(|_| OpenError::Malformed("payload key length"))?;
                return Ok((i, Zeroizing::new(key)));
            }
        }
    }
    Err(OpenError::NoMatchingReceiver)
}

fn open_sender(
    header: &SigncryptionHeader,
    payload_key: &[u8; PAYLOAD_KEY_BYTES],
) -> Result<Sender, OpenError> {
    let opened = aead::aead_open(payload_key, &SENDER_KEY_NONCE, &header.sender_secretbox, b"")?;
    let bytes: [u8; SIGNING_PUBLIC_KEY_BYTES] = opened[..]
        .try_into()
        .map_err(|_| OpenError::Malformed("sender key length"))?;

    if bytes == [0u8; SIGNING_PUBLIC_KEY_BYTES] {
        return Ok(Sender::Anonymous);
    }
    VerifyingKey::from_bytes(&bytes)
        .map(Sender::Signed)
        .map_err(|_| OpenError::Malformed("sender key"))
}

/// Reader side of a sealed stream.
///
/// Implements [`std::io::Read`]; integrity failures surface as
/// `io::ErrorKind::InvalidData` wrapping an [`OpenError`].
pub struct SigncryptOpenStream<R: Read> {
    input: R,
    payload_key: Zeroizing<[u8; PAYLOAD_KEY_BYTES]>,
    header_hash: [u8; HEADER_HASH_BYTES],
    sender: Sender,
    receiver_index: usize,
    next_index: u64,
    done: bool,
    pending: Zeroizing<Vec<u8>>,
    pending_pos: usize,
}

impl<R: Read> SigncryptOpenStream<R> {
    /// Read and validate the header, and recover the payload key.
    pub fn new(mut input: R, keyring: &Keyring) -> Result<Self, OpenError> {
        let frame = wire::read_frame(&mut input)?.ok_or(OpenError::Malformed("missing header"))?;
        let header = decode_header(&frame)?;
        let header_hash = kdf::header_hash(&frame);

        let (receiver_index, payload_key) = find_payload_key(&header, keyring)?;
        let sender = open_sender(&header, &payload_key)?;

        debug!(
            entry = receiver_index,
            receivers = header.receivers.len(),
            anonymous = matches!(sender, Sender::Anonymous),
            "matched receiver entry"
        );

        Ok(Self {
            input,
            payload_key,
            header_hash,
            sender,
            receiver_index,
            next_index: 0,
            done: false,
            pending: Zeroizing::new(Vec::new()),
            pending_pos: 0,
        })
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    /// Position of the entry that opened for this reader, in wire order.
    pub fn receiver_index(&self) -> usize {
        self.receiver_index
    }

    /// True once the final chunk has been verified.
    pub fn is_complete(&self) -> bool {
        self.done
    }

    /// Read, decrypt and verify the next chunk. `Ok(None)` after the final chunk.
    pub fn next_chunk(&mut self) -> Result<Option<Zeroizing<Vec<u8>>>, OpenError> {
        if self.done {
            return Ok(None);
        }

        let frame = wire::read_frame(&mut self.input)?.ok_or(OpenError::MissingFinalChunk)?;
        let packet = wire::decode_packet(&frame)?;

        if packet.index != self.next_index {
            return Err(OpenError::OutOfOrderChunk {
                expected: self.next_index,
                found: packet.index,
            });
        }

        let nonce = wire::chunk_nonce(&self.header_hash, packet.index, packet.is_final);
        let inner =
            aead::aead_open(&self.payload_key, &nonce, &packet.ciphertext, &self.header_hash)?;
        let (sig, plaintext) = inner.split_at(SIGNATURE_BYTES);

        match &self.sender {
            Sender::Anonymous => {
                if sig.iter().any(|&b| b != 0) {
                    return Err(OpenError::BadSignature);
                }
            }
            Sender::Signed(vk) => {
                let sig: [u8; SIGNATURE_BYTES] =
                    sig.try_into().map_err(|_| OpenError::BadSignature)?;
                let msg = kdf::chunk_signature_input(
                    &self.header_hash,
                    &nonce,
                    packet.is_final,
                    plaintext,
                );
                vk.verify_strict(&msg, &Signature::from_bytes(&sig))
                    .map_err(|_| OpenError::BadSignature)?;
            }
        }

        trace!(
            index = packet.index,
            is_final = packet.is_final,
            len = plaintext.len(),
            "opened chunk"
        );

        self.next_index += 1;
        if packet.is_final {
            if wire::read_frame(&mut self.input)?.is_some() {
                return Err(OpenError::TrailingData);
            }
            self.done = true;
        }
        Ok(Some(Zeroizing::new(plaintext.to_vec())))
    }

    pub fn into_inner(self) -> R {
        self.input
    }
}

impl<R: Read> Read for SigncryptOpenStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.pending_pos < self.pending.len() {
                let available = &self.pending[self.pending_pos..];
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                self.pending_pos += n;
                return Ok(n);
            }
            match self.next_chunk()? {
                None => return Ok(0),
                Some(chunk) => {
                    self.pending = chunk;
                    self.pending_pos = 0;
                }
            }
        }
    }
}

/// Open a complete in-memory stream.
pub fn open(ciphertext: &[u8], keyring: &Keyring) -> Result<(Sender, Vec<u8>), OpenError> {
    let mut stream = SigncryptOpenStream::new(ciphertext, keyring)?;
    let mut plaintext = Vec::new();
    while let Some(chunk) = stream.next_chunk()? {
        plaintext.extend_from_slice(&chunk);
    }
    Ok((*stream.sender(), plaintext))
}
