#![no_main]

use libfuzzer_sys::fuzz_target;
use sigvault_core::crypto::EncryptedSecret;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must parse to Ok or Err, never panic
    if let Ok(secret) = EncryptedSecret::from_bytes(data) {
        let bytes = secret.to_bytes();
        assert_eq!(bytes, data);

        let encoded = secret.to_base64();
        let _ = EncryptedSecret::from_base64(&encoded);
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = EncryptedSecret::from_base64(text);
    }
});
