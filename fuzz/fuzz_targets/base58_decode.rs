#![no_main]

use libfuzzer_sys::fuzz_target;
use sigvault_core::base58;

fuzz_target!(|data: &[u8]| {
    let encoded = base58::encode(data);
    let decoded = base58::decode(&encoded).expect("encoder output must decode");
    assert_eq!(decoded, data);

    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(bytes) = base58::decode(text) {
            assert_eq!(base58::encode(&bytes), text);
        }
    }
});
