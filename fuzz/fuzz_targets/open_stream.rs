#![no_main]

use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

use citadel_signcrypt::{BoxSecretKey, Keyring, ReceiverSymmetricKey, SymmetricKey};

static KEYRING: Lazy<Keyring> = Lazy::new(|| {
    let mut keyring = Keyring::new();
    keyring.add_box_key(BoxSecretKey::from_bytes([7u8; 32]));
    keyring.add_symmetric_key(ReceiverSymmetricKey::new(
        SymmetricKey::new([9u8; 32]),
        Some(b"fuzz".to_vec()),
    ));
    keyring
});

fuzz_target!(|data: &[u8]| {
    let _ = citadel_signcrypt::open(data, &KEYRING);
});
