use std::io::{Read, Write};

use citadel_signcrypt::wire::{self, decode_packet, encode_packet, join_frames, split_frames};
use citadel_signcrypt::{
    generate_signing_key, open, seal, seal_stream_with_config, BoxSecretKey, Keyring,
    OpenError, OsEphemeralKeyCreator, ReceiverSymmetricKey, SealConfig, Sender,
    SigncryptOpenStream, SigningKey, SymmetricKey,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Setup {
    box_sk: BoxSecretKey,
    sym: ReceiverSymmetricKey,
}

fn setup() -> Setup {
    init_tracing();
    Setup {
        box_sk: BoxSecretKey::generate(),
        sym: ReceiverSymmetricKey::new(SymmetricKey::generate(), Some(b"ops-team".to_vec())),
    }
}

fn box_keyring(sk: &BoxSecretKey) -> Keyring {
    let mut k = Keyring::new();
    k.add_box_key(sk.clone());
    k
}

/// Seal with a small chunk size so messages span several chunks.
fn seal_chunked(
    s: &Setup,
    plaintext: &[u8],
    chunk_size: usize,
    signed: bool,
) -> (Vec<u8>, Option<SigningKey>) {
    let signer = signed.then(generate_signing_key);
    let config = SealConfig::with_chunk_size(chunk_size).unwrap();
    let mut stream = seal_stream_with_config(
        Vec::new(),
        &OsEphemeralKeyCreator,
        signer.as_ref(),
        &[s.box_sk.public_key()],
        std::slice::from_ref(&s.sym),
        &config,
    )
    .unwrap();
    stream.write_all(plaintext).unwrap();
    (stream.finish().unwrap(), signer)
}

#[test]
fn roundtrip_basic() {
    let s = setup();
    let ct = seal(b"hello signcryption", None, &[s.box_sk.public_key()], &[]).unwrap();
    let (sender, pt) = open(&ct, &box_keyring(&s.box_sk)).unwrap();
    assert_eq!(pt, b"hello signcryption");
    assert_eq!(sender, Sender::Anonymous);
}

#[test]
fn roundtrip_empty_plaintext() {
    let s = setup();
    let ct = seal(b"", None, &[s.box_sk.public_key()], &[]).unwrap();
    let (_, pt) = open(&ct, &box_keyring(&s.box_sk)).unwrap();
    assert!(pt.is_empty());
}

#[test]
fn roundtrip_signed_multi_chunk() {
    let s = setup();
    let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let (ct, signer) = seal_chunked(&s, &plaintext, 333, true);

    let (sender, pt) = open(&ct, &box_keyring(&s.box_sk)).unwrap();
    assert_eq!(pt, plaintext);
    assert_eq!(sender, Sender::Signed(signer.unwrap().verifying_key()));
}

#[test]
fn exact_boundary_ends_with_empty_final_chunk() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, &[7u8; 64], 16, false);

    let frames = split_frames(&ct).unwrap();
    // header + 4 full chunks + empty final chunk
    assert_eq!(frames.len(), 6);
    let last = decode_packet(frames[5]).unwrap();
    assert!(last.is_final);
    assert_eq!(last.index, 4);
    for (i, frame) in frames[1..5].iter().enumerate() {
        let p = decode_packet(frame).unwrap();
        assert!(!p.is_final);
        assert_eq!(p.index, i as u64);
    }

    let (_, pt) = open(&ct, &box_keyring(&s.box_sk)).unwrap();
    assert_eq!(pt, vec![7u8; 64]);
}

#[test]
fn symmetric_receiver_opens_by_identifier() {
    let s = setup();
    let (ct, signer) = seal_chunked(&s, b"shared with the team", 8, true);

    let mut keyring = Keyring::new();
    keyring.add_symmetric_key(s.sym.clone());
    let (sender, pt) = open(&ct, &keyring).unwrap();
    assert_eq!(pt, b"shared with the team");
    assert_eq!(sender, Sender::Signed(signer.unwrap().verifying_key()));
}

#[test]
fn symmetric_receiver_without_identifier_trial_decrypts() {
    init_tracing();
    let sym = ReceiverSymmetricKey::new(SymmetricKey::generate(), None);
    let others: Vec<BoxSecretKey> = (0..5).map(|_| BoxSecretKey::generate()).collect();
    let box_pks: Vec<_> = others.iter().map(BoxSecretKey::public_key).collect();

    let ct = seal(b"hidden", None, &box_pks, std::slice::from_ref(&sym)).unwrap();

    let mut keyring = Keyring::new();
    keyring.add_symmetric_key(sym);
    assert_eq!(open(&ct, &keyring).unwrap().1, b"hidden");
}

#[test]
fn empty_identifier_is_treated_as_none() {
    init_tracing();
    let sym = ReceiverSymmetricKey::new(SymmetricKey::generate(), Some(Vec::new()));
    let others: Vec<_> = (0..3).map(|_| BoxSecretKey::generate().public_key()).collect();

    let ct = seal(b"no label", None, &others, std::slice::from_ref(&sym)).unwrap();

    let mut keyring = Keyring::new();
    keyring.add_symmetric_key(sym);
    assert_eq!(open(&ct, &keyring).unwrap().1, b"no label");
}

#[test]
fn labelled_key_opens_unlabelled_entry() {
    init_tracing();
    let key = SymmetricKey::generate();
    let sealed_to = ReceiverSymmetricKey::new(key.clone(), None);
    let ct = seal(b"unlabelled", None, &[], std::slice::from_ref(&sealed_to)).unwrap();

    let mut keyring = Keyring::new();
    keyring.add_symmetric_key(ReceiverSymmetricKey::new(key, Some(b"ops-team".to_vec())));
    assert_eq!(open(&ct, &keyring).unwrap().1, b"unlabelled");
}

#[test]
fn wrong_identifier_does_not_match() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, b"data", 8, false);

    let mut keyring = Keyring::new();
    let renamed = ReceiverSymmetricKey::new(s.sym.key.clone(), Some(b"other".to_vec()));
    keyring.add_symmetric_key(renamed);
    assert_eq!(open(&ct, &keyring), Err(OpenError::NoMatchingReceiver));
}

#[test]
fn wrong_key_fails() {
    let s = setup();
    let ct = seal(b"data", None, &[s.box_sk.public_key()], &[]).unwrap();
    let stranger = BoxSecretKey::generate();
    assert_eq!(open(&ct, &box_keyring(&stranger)), Err(OpenError::NoMatchingReceiver));
    assert_eq!(open(&ct, &Keyring::new()), Err(OpenError::NoMatchingReceiver));
}

#[test]
fn tamper_non_final_chunk_fails_authentication() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, &[1u8; 100], 32, true);

    let frames = split_frames(&ct).unwrap();
    let mut packet = decode_packet(frames[1]).unwrap();
    assert!(!packet.is_final);
    packet.ciphertext[10] ^= 0x01;
    let tampered_frame = encode_packet(&packet).unwrap();

    let mut rebuilt: Vec<&[u8]> = frames.clone();
    rebuilt[1] = &tampered_frame[..];
    let tampered = join_frames(rebuilt);

    assert_eq!(open(&tampered, &box_keyring(&s.box_sk)), Err(OpenError::Authentication));
}

#[test]
fn dropped_final_chunk_is_detected() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, &[2u8; 100], 32, false);

    let frames = split_frames(&ct).unwrap();
    let truncated = join_frames(frames[..frames.len() - 1].iter().copied());

    assert_eq!(open(&truncated, &box_keyring(&s.box_sk)), Err(OpenError::MissingFinalChunk));
}

#[test]
fn header_only_stream_is_detected() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, b"abc", 32, false);
    let frames = split_frames(&ct).unwrap();
    let header_only = join_frames([frames[0]]);
    assert_eq!(open(&header_only, &box_keyring(&s.box_sk)), Err(OpenError::MissingFinalChunk));
}

#[test]
fn reordered_chunks_are_detected() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, &[3u8; 100], 32, true);

    let mut frames = split_frames(&ct).unwrap();
    frames.swap(1, 2);
    let reordered = join_frames(frames);

    assert_eq!(
        open(&reordered, &box_keyring(&s.box_sk)),
        Err(OpenError::OutOfOrderChunk { expected: 0, found: 1 })
    );
}

#[test]
fn replayed_chunk_cannot_become_final() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, &[4u8; 100], 32, true);

    let frames = split_frames(&ct).unwrap();
    let mut forged = decode_packet(frames[1]).unwrap();
    forged.is_final = true;
    let forged_frame = encode_packet(&forged).unwrap();

    let stream = join_frames([frames[0], &forged_frame[..]]);
    assert_eq!(open(&stream, &box_keyring(&s.box_sk)), Err(OpenError::Authentication));
}

#[test]
fn trailing_data_is_rejected() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, b"abc", 32, false);
    let frames = split_frames(&ct).unwrap();
    let last = *frames.last().unwrap();

    let mut extended = frames.clone();
    extended.push(last);
    assert_eq!(open(&join_frames(extended), &box_keyring(&s.box_sk)), Err(OpenError::TrailingData));
}

#[test]
fn chunks_cannot_move_between_messages() {
    let s = setup();
    let (a, _) = seal_chunked(&s, &[5u8; 64], 32, false);
    let (b, _) = seal_chunked(&s, &[6u8; 64], 32, false);

    let fa = split_frames(&a).unwrap();
    let fb = split_frames(&b).unwrap();
    let spliced = join_frames([fa[0], fb[1], fa[2], fa[3]]);
    assert_eq!(open(&spliced, &box_keyring(&s.box_sk)), Err(OpenError::Authentication));
}

#[test]
fn altered_header_fails() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, b"abc", 32, false);
    let frames = split_frames(&ct).unwrap();
    let keyring = box_keyring(&s.box_sk);

    for pos in [0, frames[0].len() / 2, frames[0].len() - 1] {
        let mut header = frames[0].to_vec();
        header[pos] ^= 0x01;
        let mut altered = frames.clone();
        altered[0] = &header[..];
        assert!(open(&join_frames(altered), &keyring).is_err(), "flip at {pos} accepted");
    }
}

#[test]
fn read_interface_streams_plaintext() {
    let s = setup();
    let plaintext: Vec<u8> = (0..5_000u32).map(|i| (i * 7) as u8).collect();
    let (ct, _) = seal_chunked(&s, &plaintext, 100, true);

    let keyring = box_keyring(&s.box_sk);
    let mut reader = SigncryptOpenStream::new(&ct[..], &keyring).unwrap();
    assert!(!reader.is_complete());

    let mut out = Vec::new();
    let mut buf = [0u8; 37];
    loop {
        let n = reader.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, plaintext);
    assert!(reader.is_complete());
}

#[test]
fn read_interface_reports_truncation() {
    let s = setup();
    let (ct, _) = seal_chunked(&s, &[9u8; 300], 100, false);
    let frames = split_frames(&ct).unwrap();
    let truncated = join_frames(frames[..frames.len() - 1].iter().copied());

    let keyring = box_keyring(&s.box_sk);
    let mut reader = SigncryptOpenStream::new(&truncated[..], &keyring).unwrap();
    let mut out = Vec::new();
    let err = reader.read_to_end(&mut out).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[test]
fn every_receiver_can_open() {
    init_tracing();
    let box_sks: Vec<BoxSecretKey> = (0..4).map(|_| BoxSecretKey::generate()).collect();
    let syms: Vec<ReceiverSymmetricKey> = (0..4u8)
        .map(|i| ReceiverSymmetricKey::new(SymmetricKey::generate(), Some(vec![i])))
        .collect();
    let box_pks: Vec<_> = box_sks.iter().map(BoxSecretKey::public_key).collect();
    let signer = generate_signing_key();

    let ct = seal(b"broadcast", Some(&signer), &box_pks, &syms).unwrap();
    let header = citadel_signcrypt::header::decode_header(split_frames(&ct).unwrap()[0]).unwrap();
    assert_eq!(header.receivers.len(), 8);

    for sk in &box_sks {
        let (sender, pt) = open(&ct, &box_keyring(sk)).unwrap();
        assert_eq!(pt, b"broadcast");
        assert_eq!(sender, Sender::Signed(signer.verifying_key()));
    }
    for sym in &syms {
        let mut keyring = Keyring::new();
        keyring.add_symmetric_key(sym.clone());
        assert_eq!(open(&ct, &keyring).unwrap().1, b"broadcast");
    }
}

#[test]
fn sealing_twice_differs() {
    let s = setup();
    let a = seal(b"same", None, &[s.box_sk.public_key()], &[]).unwrap();
    let b = seal(b"same", None, &[s.box_sk.public_key()], &[]).unwrap();
    assert_ne!(a, b);
    assert_eq!(wire::split_frames(&a).unwrap().len(), 2);
}
