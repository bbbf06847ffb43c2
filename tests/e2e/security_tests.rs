//! Security-specific tests.
//!
//! These tests verify:
//! 1. The encrypted blob rejects wrong passwords and any tampering
//! 2. Unlocked secrets are wiped and cannot be read back
//! 3. Malformed inputs don't panic
//! 4. Errors and debug output never carry secret material

use rand::{Rng, RngCore};
use sigvault_core::crypto::{self, EncryptedSecret, KdfParams, NONCE_LEN, SALT_LEN};
use sigvault_core::transaction::Transaction;
use sigvault_core::{base58, MemoryStore, SecretBuffer, Vault, VaultConfig, VaultError};
use zeroize::Zeroize;

const PASSWORD: &str = "correct horse battery staple";

fn seal(secret: &[u8], password: &str) -> EncryptedSecret {
    crypto::seal(secret, password, &KdfParams::default(), &mut rand::rngs::OsRng).unwrap()
}

fn open(encrypted: &EncryptedSecret, password: &str) -> Result<Vec<u8>, crypto::CryptoError> {
    crypto::open(encrypted, password, &KdfParams::default()).map(|s| s.to_vec())
}

// ============================================================================
// 1. Secret Encryption Security Tests
// ============================================================================

#[test]
fn test_wrong_password_fails_decryption() {
    let secret = [0xABu8; 32];
    let encrypted = seal(&secret, PASSWORD);

    let result = open(&encrypted, "wrong horse battery staple");
    assert!(result.is_err(), "Decryption with wrong password should fail");
    assert_eq!(open(&encrypted, PASSWORD).unwrap(), secret);
}

#[test]
fn test_password_is_case_and_whitespace_sensitive() {
    let encrypted = seal(&[0x42u8; 32], PASSWORD);
    assert!(open(&encrypted, "Correct horse battery staple").is_err());
    assert!(open(&encrypted, " correct horse battery staple").is_err());
}

#[test]
fn test_tampered_salt_fails_decryption() {
    let mut bytes = seal(&[0x42u8; 32], PASSWORD).to_bytes();
    bytes[0] ^= 0xFF;

    let tampered = EncryptedSecret::from_bytes(&bytes).unwrap();
    assert!(open(&tampered, PASSWORD).is_err(), "Tampered salt should fail");
}

#[test]
fn test_tampered_nonce_fails_decryption() {
    let mut bytes = seal(&[0x42u8; 32], PASSWORD).to_bytes();
    bytes[SALT_LEN] ^= 0xFF;

    let tampered = EncryptedSecret::from_bytes(&bytes).unwrap();
    assert!(open(&tampered, PASSWORD).is_err(), "Tampered nonce should fail");
}

#[test]
fn test_tampered_ciphertext_fails_decryption() {
    let mut bytes = seal(&[0x42u8; 32], PASSWORD).to_bytes();
    bytes[SALT_LEN + NONCE_LEN + 2] ^= 0x01;

    let tampered = EncryptedSecret::from_bytes(&bytes).unwrap();
    assert!(
        open(&tampered, PASSWORD).is_err(),
        "Tampered ciphertext should fail (GCM auth tag)"
    );
}

#[test]
fn test_tampered_tag_fails_decryption() {
    let mut bytes = seal(&[0x42u8; 32], PASSWORD).to_bytes();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x80;

    let tampered = EncryptedSecret::from_bytes(&bytes).unwrap();
    assert!(open(&tampered, PASSWORD).is_err(), "Tampered tag should fail");
}

#[test]
fn test_encrypted_secret_min_length() {
    // 16 (salt) + 12 (nonce) + 17 (1 byte ct + 16 byte tag) = 45
    assert!(EncryptedSecret::from_bytes(&[0u8; 44]).is_err());
    assert!(EncryptedSecret::from_bytes(&[0u8; 45]).is_ok());

    let bytes = seal(&[0x42u8; 32], PASSWORD).to_bytes();
    assert!(EncryptedSecret::from_bytes(&bytes[..SALT_LEN + NONCE_LEN]).is_err());
}

#[test]
fn test_fresh_salt_and_nonce_per_encryption() {
    let a = seal(&[0x42u8; 32], PASSWORD);
    let b = seal(&[0x42u8; 32], PASSWORD);
    assert_ne!(a.salt(), b.salt());
    assert_ne!(a.nonce(), b.nonce());
    assert_ne!(a.ciphertext(), b.ciphertext());
}

#[test]
fn test_weak_kdf_rejected() {
    let result = crypto::seal(
        &[0x42u8; 32],
        PASSWORD,
        &KdfParams::Pbkdf2 { iterations: 1000 },
        &mut rand::rngs::OsRng,
    );
    assert!(result.is_err(), "Iteration counts below the floor must be refused");
}

// ============================================================================
// 2. Wipe Flow Tests
// ============================================================================

#[test]
fn test_zeroize_works_on_vec() {
    let mut secret = vec![0xAB_u8; 32];
    secret.zeroize();
    assert!(
        secret.is_empty() || secret.iter().all(|&b| b == 0),
        "Zeroize should clear the vector"
    );
}

#[test]
fn test_secret_buffer_wipe_clears_contents() {
    let mut buffer = SecretBuffer::from_slice(&[0xCD; 64]);
    buffer.wipe();
    assert!(buffer.as_slice().iter().all(|&b| b == 0));
    buffer.wipe();
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn test_wiped_vault_refuses_every_read() {
    let vault = Vault::new(MemoryStore::new(), VaultConfig::default());
    vault.store_secret(&[0x11u8; 32], PASSWORD).await.unwrap();
    let handle = vault.unlock(PASSWORD).await.unwrap();

    vault.wipe().await;
    vault.wipe().await;

    assert!(matches!(
        vault.with_secret(|s| s.to_vec()).await,
        Err(VaultError::Locked)
    ));
    assert!(matches!(
        handle.with_secret(|s| s.to_vec()).await,
        Err(VaultError::Locked)
    ));
    assert!(matches!(
        vault.sign_transaction(&[1u8; 80]).await,
        Err(VaultError::Locked)
    ));
}

#[tokio::test]
async fn test_handle_outliving_vault_is_dead() {
    let vault = Vault::new(MemoryStore::new(), VaultConfig::default());
    vault.store_secret(&[0x11u8; 32], PASSWORD).await.unwrap();
    let handle = vault.unlock(PASSWORD).await.unwrap();

    drop(vault);

    assert!(!handle.is_live().await);
    assert!(handle.with_secret(|s| s.len()).await.is_err());
}

// ============================================================================
// 3. Malformed Input Tests (must not panic)
// ============================================================================

#[test]
fn test_encrypted_secret_from_garbage_does_not_panic() {
    let mut rng = rand::thread_rng();
    for _ in 0..500 {
        let len = rng.gen_range(0..200);
        let mut bytes = vec![0u8; len];
        rng.fill_bytes(&mut bytes);
        let _ = EncryptedSecret::from_bytes(&bytes);
    }

    for garbage in ["", "!!!!", "====", "AAAA", "not base64 at all"] {
        assert!(EncryptedSecret::from_base64(garbage).is_err());
    }
}

#[test]
fn test_base58_fuzz_random_strings() {
    let mut rng = rand::thread_rng();
    let charset: Vec<char> = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz0OIl+/ "
        .chars()
        .collect();

    for _ in 0..1000 {
        let len = rng.gen_range(0..90);
        let input: String = (0..len)
            .map(|_| charset[rng.gen_range(0..charset.len())])
            .collect();

        if let Ok(decoded) = base58::decode(&input) {
            assert_eq!(base58::encode(&decoded), input);
        }
    }
}

#[test]
fn test_base58_random_bytes_roundtrip() {
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let len = rng.gen_range(0..80);
        let mut bytes = vec![0u8; len];
        rng.fill_bytes(&mut bytes);
        if len > 0 && rng.gen_bool(0.3) {
            bytes[0] = 0;
        }
        assert_eq!(base58::decode(&base58::encode(&bytes)).unwrap(), bytes);
    }
}

#[test]
fn test_transaction_parse_garbage_does_not_panic() {
    let mut rng = rand::thread_rng();
    for _ in 0..1000 {
        let len = rng.gen_range(0..300);
        let mut bytes = vec![0u8; len];
        rng.fill_bytes(&mut bytes);

        if let Ok(tx) = Transaction::parse(bytes) {
            let _ = tx.required_signers();
            let _ = tx.transaction_id();
            assert!(tx.slot_count() > 0);
        }
    }
}

#[tokio::test]
async fn test_vault_with_garbage_blob_reports_invalid_password() {
    let store = MemoryStore::new();
    store.put("this is not a vault blob");
    let vault = Vault::new(store, VaultConfig::default());

    assert!(matches!(
        vault.unlock(PASSWORD).await,
        Err(VaultError::InvalidPassword)
    ));
}

// ============================================================================
// 4. Leak Tests
// ============================================================================

#[tokio::test]
async fn test_errors_do_not_echo_password() {
    let vault = Vault::new(MemoryStore::new(), VaultConfig::default());

    let err = vault.store_secret(&[0x11u8; 32], "hunter2").await.unwrap_err();
    assert!(!err.to_string().contains("hunter2"));

    vault.store_secret(&[0x11u8; 32], PASSWORD).await.unwrap();
    let err = vault.unlock("tr0ub4dor&3").await.err().unwrap();
    assert!(!err.to_string().contains("tr0ub4dor"));
}

#[test]
fn test_debug_output_hides_secret() {
    let buffer = SecretBuffer::from_slice(&[0x5A; 32]);
    let shown = format!("{:?}", buffer);
    assert!(!shown.contains("90"), "Debug must not print buffer bytes");
}
