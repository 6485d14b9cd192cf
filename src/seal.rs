//! Streaming signcryption: header construction and chunked payload encryption.
//!
//! Chunk layout (before framing):
//!   PayloadPacket { index, is_final, ciphertext }
//!   ciphertext = AES-GCM(payload_key, nonce, sig[64] || plaintext, aad = header_hash)
//!
//! `sig` is Ed25519 over
//! `SIGNATURE_CONTEXT || header_hash || SHA-512(nonce || final || plaintext)`,
//! or 64 zero bytes for anonymous senders. It sits inside the AEAD so that
//! only receivers can learn who signed.

use std::io::{self, Write};

use ed25519_dalek::Signer;
use rand_core::OsRng;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::aead;
use crate::config::SealConfig;
use crate::error::SealError;
use crate::header::{build_header, encode_header};
use crate::kdf;
use crate::keys::{
    BoxPublicKey, EphemeralKeyCreator, OsEphemeralKeyCreator, ReceiverSymmetricKey, SigningKey,
};
use crate::receiver::{check_receiver_count, shuffle_signcrypt_receivers};
use crate::wire::{
    self, PayloadPacket, HEADER_HASH_BYTES, PAYLOAD_KEY_BYTES, SENDER_KEY_NONCE, SIGNATURE_BYTES,
    SIGNING_PUBLIC_KEY_BYTES,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum StreamState {
    Streaming,
    Finalized,
    /// A chunk could not be written. Holds the error every later call returns.
    Failed(SealError),
}

/// Handle for an in-progress sealed stream.
///
/// The header frame has already been written when this is returned. Plaintext
/// goes in through [`push`](Self::push) or [`std::io::Write`]; each full chunk
/// is sealed and written immediately, so at most one chunk of plaintext is
/// held in memory. [`close`](Self::close) (or [`finish`](Self::finish)) emits
/// the final chunk.
///
/// Dropping the handle without closing leaves a stream with no final chunk,
/// which every reader rejects.
///
/// A sink error is sticky. Input already taken when it happens stays taken,
/// and every later write, push or close returns the same error without
/// touching the sink again.
pub struct SigncryptSealStream<W: Write> {
    output: W,
    payload_key: Zeroizing<[u8; PAYLOAD_KEY_BYTES]>,
    header_hash: [u8; HEADER_HASH_BYTES],
    signing_key: Option<SigningKey>,
    buffer: Zeroizing<Vec<u8>>,
    chunk_size: usize,
    next_index: u64,
    state: StreamState,
}

/// Start a sealed stream with the default configuration.
pub fn seal_stream<W, E>(
    output: W,
    ephemeral_key_creator: &E,
    sender: Option<&SigningKey>,
    box_receivers: &[BoxPublicKey],
    symmetric_receivers: &[ReceiverSymmetricKey],
) -> Result<SigncryptSealStream<W>, SealError>
where
    W: Write,
    E: EphemeralKeyCreator + ?Sized,
{
    seal_stream_with_config(
        output,
        ephemeral_key_creator,
        sender,
        box_receivers,
        symmetric_receivers,
        &SealConfig::default(),
    )
}

/// Start a sealed stream.
///
/// Validates the receiver count, shuffles receivers, wraps the payload key
/// for each of them and writes the header frame. Nothing is written unless
/// all of that succeeds.
pub fn seal_stream_with_config<W, E>(
    mut output: W,
    ephemeral_key_creator: &E,
    sender: Option<&SigningKey>,
    box_receivers: &[BoxPublicKey],
    symmetric_receivers: &[ReceiverSymmetricKey],
    config: &SealConfig,
) -> Result<SigncryptSealStream<W>, SealError>
where
    W: Write,
    E: EphemeralKeyCreator + ?Sized,
{
    check_receiver_count(box_receivers.len() as isize, symmetric_receivers.len() as isize)?;

    let receivers = shuffle_signcrypt_receivers(box_receivers, symmetric_receivers, &mut OsRng)?;

    let ephemeral = ephemeral_key_creator.create_ephemeral_key();
    let payload_key = aead::payload_key()?;

    let entries = receivers
        .iter()
        .enumerate()
        .map(|(i, r)| r.wrap_payload_key(&payload_key, &ephemeral, i as u64))
        .collect::<Result<Vec<_>, _>>()?;

    let sender_pk = sender.map_or([0u8; SIGNING_PUBLIC_KEY_BYTES], |k| {
        k.verifying_key().to_bytes()
    });
    let sender_secretbox = aead::aead_seal(&payload_key, &SENDER_KEY_NONCE, &sender_pk, b"")
        .map_err(|_| SealError::KeyWrap)?;

    let header = build_header(ephemeral.public_key().as_bytes(), sender_secretbox, entries);
    let encoded = encode_header(&header)?;
    let header_hash = kdf::header_hash(&encoded);

    wire::write_frame(&mut output, &encoded)?;

    debug!(
        receivers = receivers.len(),
        chunk_size = config.chunk_size(),
        anonymous = sender.is_none(),
        "opened signcryption seal stream"
    );

    Ok(SigncryptSealStream {
        output,
        payload_key,
        header_hash,
        signing_key: sender.cloned(),
        buffer: Zeroizing::new(Vec::with_capacity(config.chunk_size())),
        chunk_size: config.chunk_size(),
        next_index: 0,
        state: StreamState::Streaming,
    })
}

/// Seal `plaintext` in one call with OS-drawn ephemeral keys.
pub fn seal(
    plaintext: &[u8],
    sender: Option<&SigningKey>,
    box_receivers: &[BoxPublicKey],
    symmetric_receivers: &[ReceiverSymmetricKey],
) -> Result<Vec<u8>, SealError> {
    let mut stream = seal_stream(
        Vec::new(),
        &OsEphemeralKeyCreator,
        sender,
        box_receivers,
        symmetric_receivers,
    )?;
    stream.push(plaintext)?;
    stream.finish()
}

impl<W: Write> SigncryptSealStream<W> {
    /// Feed plaintext, sealing every chunk that fills up.
    ///
    /// # Panics
    ///
    /// Panics if the stream was already finalized.
    pub fn push(&mut self, mut data: &[u8]) -> Result<(), SealError> {
        while !data.is_empty() {
            let n = self.absorb(data)?;
            data = &data[n..];
        }
        Ok(())
    }

    /// Emit the final chunk and flush the sink.
    ///
    /// # Panics
    ///
    /// Panics if called after a successful close.
    pub fn close(&mut self) -> Result<(), SealError> {
        self.ensure_streaming("seal stream already finalized")?;

        let result = self
            .seal_chunk(true)
            .and_then(|()| self.output.flush().map_err(SealError::from));
        self.state = match &result {
            Ok(()) => StreamState::Finalized,
            Err(err) => StreamState::Failed(err.clone()),
        };
        result
    }

    /// Close the stream and hand back the sink.
    pub fn finish(mut self) -> Result<W, SealError> {
        self.close()?;
        Ok(self.output)
    }

    pub fn is_finalized(&self) -> bool {
        self.state == StreamState::Finalized
    }

    /// Number of chunks written so far.
    pub fn chunks_written(&self) -> u64 {
        self.next_index
    }

    pub fn get_ref(&self) -> &W {
        &self.output
    }

    fn ensure_streaming(&self, finalized_msg: &str) -> Result<(), SealError> {
        match &self.state {
            StreamState::Streaming => Ok(()),
            StreamState::Failed(err) => Err(err.clone()),
            StreamState::Finalized => panic!("{finalized_msg}"),
        }
    }

    /// Take up to one chunk's worth of `data`. Returns an error only when
    /// nothing was taken.
    fn absorb(&mut self, data: &[u8]) -> Result<usize, SealError> {
        self.ensure_streaming("write after seal stream was finalized")?;

        let room = self.chunk_size - self.buffer.len();
        let n = room.min(data.len());
        self.buffer.extend_from_slice(&data[..n]);
        if self.buffer.len() == self.chunk_size {
            // The bytes are taken either way; the next call reports a failure.
            if let Err(err) = self.seal_chunk(false) {
                self.state = StreamState::Failed(err);
            }
        }
        Ok(n)
    }

    fn seal_chunk(&mut self, is_final: bool) -> Result<(), SealError> {
        let index = self.next_index;
        let nonce = wire::chunk_nonce(&self.header_hash, index, is_final);

        let signature = match &self.signing_key {
            Some(key) => {
                let msg =
                    kdf::chunk_signature_input(&self.header_hash, &nonce, is_final, &self.buffer);
                key.sign(&msg).to_bytes()
            }
            None => [0u8; SIGNATURE_BYTES],
        };

        let mut inner = Zeroizing::new(Vec::with_capacity(SIGNATURE_BYTES + self.buffer.len()));
        inner.extend_from_slice(&signature);
        inner.extend_from_slice(&self.buffer);

        let ciphertext = aead::aead_seal(&self.payload_key, &nonce, &inner, &self.header_hash)?;
        let packet = PayloadPacket {
            index,
            is_final,
            ciphertext,
        };
        wire::write_frame(&mut self.output, &wire::encode_packet(&packet)?)?;

        trace!(index, is_final, len = self.buffer.len(), "sealed chunk");

        self.buffer.clear();
        self.next_index += 1;
        Ok(())
    }
}

impl<W: Write> Write for SigncryptSealStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        Ok(self.absorb(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}
