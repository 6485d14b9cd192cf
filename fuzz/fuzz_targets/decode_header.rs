#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = citadel_signcrypt::header::decode_header(data) {
        // Anything accepted must be canonical.
        let bytes = citadel_signcrypt::header::encode_header(&header).unwrap();
        assert_eq!(bytes, data);
    }
});
