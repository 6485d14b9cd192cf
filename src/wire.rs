//! Wire format (v1 signcryption)
//!
//! Outer stream:
//!   frame(header) || frame(packet_0) || ... || frame(packet_n)
//!
//!   frame = len[4, big-endian] || bytes[len]
//!
//! The header frame carries the canonical CBOR encoding of
//! [`SigncryptionHeader`](crate::header::SigncryptionHeader). Every following
//! frame carries a CBOR [`PayloadPacket`]; exactly one packet, the last, has
//! `is_final` set.
//!
//! Chunk nonce:
//!   header_hash[0..4] || u64_be((index << 1) | final_bit)
//!
//! Receiver wrap nonce:
//!   b"rcpt" || u64_be(receiver_index)

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{OpenError, SealError};

/// Format name carried in every header.
pub const FORMAT_NAME: &str = "citadel-signcrypt";

/// Version of the header / packet layout.
pub const FORMAT_VERSION: u8 = 0x01;

/// Mode tag for signcryption messages.
pub const MODE_SIGNCRYPTION: u8 = 0x03;

/// Protocol identifier for KDF domain separation.
pub const PROTOCOL_ID: &[u8] = b"citadel-signcrypt-v1";

/// Domain separation prefix for chunk signatures.
pub const SIGNATURE_CONTEXT: &[u8] = b"citadel-signcrypt chunk signature\0";

/// Nonce for the sender secretbox (encrypted under the payload key).
pub const SENDER_KEY_NONCE: [u8; NONCE_BYTES] = *b"citadel-sndr";

/// Prefix of the per-entry receiver wrap nonce.
pub const WRAP_NONCE_PREFIX: [u8; 4] = *b"rcpt";

// ---------------------------------------------------------------------------
// Component sizes
// ---------------------------------------------------------------------------

/// X25519 public / secret key size
pub const X25519_KEY_BYTES: usize = 32;

/// Shared symmetric receiver key size
pub const SYMMETRIC_KEY_BYTES: usize = 32;

/// Per-message payload key size (AES-256)
pub const PAYLOAD_KEY_BYTES: usize = 32;

pub const NONCE_BYTES: usize = 12;
pub const AEAD_TAG_BYTES: usize = 16;

/// Ed25519 verifying key / signature sizes
pub const SIGNING_PUBLIC_KEY_BYTES: usize = 32;
pub const SIGNATURE_BYTES: usize = 64;

/// SHA-512 of the encoded header
pub const HEADER_HASH_BYTES: usize = 64;

/// Bytes of the header hash used as the per-message chunk nonce prefix.
pub const PAYLOAD_NONCE_PREFIX_BYTES: usize = 4;

/// Wrapped payload key: AES-GCM(payload_key) = 32 + 16
pub const WRAPPED_KEY_BYTES: usize = PAYLOAD_KEY_BYTES + AEAD_TAG_BYTES;

/// Sender secretbox: AES-GCM(verifying_key or zeros) = 32 + 16
pub const SENDER_SECRETBOX_BYTES: usize = SIGNING_PUBLIC_KEY_BYTES + AEAD_TAG_BYTES;

/// Frame length prefix (u32 big-endian)
pub const FRAME_LEN_BYTES: usize = 4;

// ---------------------------------------------------------------------------
// Chunking limits
// ---------------------------------------------------------------------------

pub const DEFAULT_CHUNK_BYTES: usize = 1 << 20;
pub const MAX_CHUNK_BYTES: usize = 16 << 20;

/// Largest frame a reader accepts: a full chunk plus signature, tag and CBOR overhead.
pub const MAX_FRAME_BYTES: usize = MAX_CHUNK_BYTES + 1024;

// ---------------------------------------------------------------------------
// Payload packets
// ---------------------------------------------------------------------------

/// One framed chunk of the payload stream.
///
/// `ciphertext` is `AES-GCM(payload_key, nonce, signature || plaintext, aad = header_hash)`,
/// tag included.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayloadPacket {
    pub index: u64,
    pub is_final: bool,
    #[serde(with = "serde_bytes")]
    pub ciphertext: Vec<u8>,
}

pub fn encode_packet(packet: &PayloadPacket) -> Result<Vec<u8>, SealError> {
    let mut out = Vec::with_capacity(packet.ciphertext.len() + 32);
    ciborium::ser::into_writer(packet, &mut out).map_err(|_| SealError::Encoding)?;
    Ok(out)
}

pub fn decode_packet(bytes: &[u8]) -> Result<PayloadPacket, OpenError> {
    let packet: PayloadPacket =
        ciborium::de::from_reader(bytes).map_err(|_| OpenError::Malformed("payload packet"))?;
    if packet.ciphertext.len() < SIGNATURE_BYTES + AEAD_TAG_BYTES {
        return Err(OpenError::Malformed("payload packet too short"));
    }
    Ok(packet)
}

// ---------------------------------------------------------------------------
// Nonces
// ---------------------------------------------------------------------------

/// Nonce for chunk `index`. The final bit occupies the low bit so that a
/// final and a non-final chunk at the same index never share a nonce.
///
/// Panics if `index` does not fit in 63 bits.
pub fn chunk_nonce(
    header_hash: &[u8; HEADER_HASH_BYTES],
    index: u64,
    is_final: bool,
) -> [u8; NONCE_BYTES] {
    assert!(index < (1 << 63), "chunk index overflow");
    let counter = (index << 1) | u64::from(is_final);

    let mut nonce = [0u8; NONCE_BYTES];
    nonce[..PAYLOAD_NONCE_PREFIX_BYTES].copy_from_slice(&header_hash[..PAYLOAD_NONCE_PREFIX_BYTES]);
    nonce[PAYLOAD_NONCE_PREFIX_BYTES..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// Nonce for the wrapped payload key at wire position `index`.
pub fn wrap_nonce(index: u64) -> [u8; NONCE_BYTES] {
    let mut nonce = [0u8; NONCE_BYTES];
    nonce[..WRAP_NONCE_PREFIX.len()].copy_from_slice(&WRAP_NONCE_PREFIX);
    nonce[WRAP_NONCE_PREFIX.len()..].copy_from_slice(&index.to_be_bytes());
    nonce
}

// ---------------------------------------------------------------------------
// Framing
// ---------------------------------------------------------------------------

pub fn write_frame<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
    out.write_all(&len.to_be_bytes())?;
    out.write_all(bytes)
}

/// Read one frame. Returns `Ok(None)` on a clean EOF at a frame boundary.
pub fn read_frame<R: Read>(input: &mut R) -> Result<Option<Vec<u8>>, OpenError> {
    let mut len_buf = [0u8; FRAME_LEN_BYTES];
    let mut filled = 0;
    while filled < FRAME_LEN_BYTES {
        match input.read(&mut len_buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(OpenError::Malformed("truncated frame length")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(OpenError::Io(e.to_string())),
        }
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(OpenError::Malformed("frame too large"));
    }

    let mut body = vec![0u8; len];
    input.read_exact(&mut body).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => OpenError::Malformed("truncated frame"),
        _ => OpenError::Io(e.to_string()),
    })?;
    Ok(Some(body))
}

/// Split an in-memory stream into its frames, borrowing from `data`.
pub fn split_frames(mut data: &[u8]) -> Result<Vec<&[u8]>, OpenError> {
    let mut frames = Vec::new();
    while !data.is_empty() {
        if data.len() < FRAME_LEN_BYTES {
            return Err(OpenError::Malformed("truncated frame length"));
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let rest = &data[FRAME_LEN_BYTES..];
        if len > rest.len() {
            return Err(OpenError::Malformed("truncated frame"));
        }
        frames.push(&rest[..len]);
        data = &rest[len..];
    }
    Ok(frames)
}

/// Join frames back into an outer stream.
pub fn join_frames<'a, I>(frames: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut out = Vec::new();
    for frame in frames {
        out.extend_from_slice(&(frame.len() as u32).to_be_bytes());
        out.extend_from_slice(frame);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_nonce_layout() {
        let hash = [0xAB; HEADER_HASH_BYTES];
        let n = chunk_nonce(&hash, 5, false);
        assert_eq!(&n[..4], &[0xAB; 4]);
        assert_eq!(u64::from_be_bytes(n[4..].try_into().unwrap()), 10);

        let f = chunk_nonce(&hash, 5, true);
        assert_eq!(u64::from_be_bytes(f[4..].try_into().unwrap()), 11);
        assert_ne!(n, f);
    }

    #[test]
    #[should_panic(expected = "chunk index overflow")]
    fn chunk_nonce_rejects_overflow() {
        chunk_nonce(&[0u8; HEADER_HASH_BYTES], 1 << 63, false);
    }

    #[test]
    fn wrap_nonce_layout() {
        let n = wrap_nonce(0x0102);
        assert_eq!(&n[..4], b"rcpt");
        assert_eq!(&n[4..], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
    }

    #[test]
    fn frames_split_and_join() {
        let joined = join_frames([&b"abc"[..], &b""[..], &b"de"[..]]);
        assert_eq!(joined.len(), 3 * FRAME_LEN_BYTES + 5);

        let frames = split_frames(&joined).unwrap();
        assert_eq!(frames, vec![&b"abc"[..], &b""[..], &b"de"[..]]);

        let mut reader = &joined[..];
        assert_eq!(read_frame(&mut reader).unwrap().unwrap(), b"abc");
        assert_eq!(read_frame(&mut reader).unwrap().unwrap(), b"");
        assert_eq!(read_frame(&mut reader).unwrap().unwrap(), b"de");
        assert_eq!(read_frame(&mut reader).unwrap(), None);
    }

    #[test]
    fn truncated_frames_rejected() {
        let joined = join_frames([&b"abcdef"[..]]);
        assert!(split_frames(&joined[..joined.len() - 1]).is_err());
        assert!(split_frames(&joined[..2]).is_err());

        let mut reader = &joined[..joined.len() - 1];
        assert_eq!(read_frame(&mut reader), Err(OpenError::Malformed("truncated frame")));
    }

    #[test]
    fn oversized_frame_rejected() {
        let len = (MAX_FRAME_BYTES as u32 + 1).to_be_bytes();
        let mut reader = &len[..];
        assert_eq!(read_frame(&mut reader), Err(OpenError::Malformed("frame too large")));
    }

    #[test]
    fn short_packet_rejected() {
        let packet = PayloadPacket { index: 0, is_final: true, ciphertext: vec![0u8; 10] };
        let bytes = encode_packet(&packet).unwrap();
        assert!(decode_packet(&bytes).is_err());
    }
}
