#![no_main]

use libfuzzer_sys::fuzz_target;
use sigvault_core::transaction::Transaction;

fuzz_target!(|data: &[u8]| {
    if let Ok(tx) = Transaction::from_slice(data) {
        let _ = tx.required_signers();
        let _ = tx.transaction_id();
        assert_eq!(tx.as_bytes(), data);
        assert_eq!(tx.signatures().count(), tx.slot_count());
    }

    // Signing must fail cleanly on malformed input
    let _ = sigvault_core::sign_as_signer(data, &[7u8; 32]);
});
