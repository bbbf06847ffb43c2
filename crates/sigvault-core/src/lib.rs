//! SigVault Core
//!
//! Password-protected storage for a single Ed25519 signing key, and the
//! transaction signer that uses it.
//!
//! # Encrypted Storage
//!
//! The secret is encrypted at rest with PBKDF2-HMAC-SHA256 (or Argon2id) +
//! AES-256-GCM and persisted as one base64 blob through a [`SecretStore`].
//!
//! # Unlock Sessions
//!
//! An unlocked secret lives in a locked, zeroing [`SecretBuffer`] and is
//! wiped after a period of inactivity, on explicit lock, or when the
//! [`Vault`] is dropped.
//!
//! # Signing
//!
//! Transactions use the Solana wire layout: a compact-u16 signature count,
//! 64-byte signature slots, then the message that gets signed.

pub mod base58;
pub mod crypto;
pub mod keys;
pub mod memory;
pub mod password;
pub mod store;
pub mod submission;
pub mod transaction;
pub mod vault;

pub use crypto::{CryptoError, EncryptedSecret, KdfParams};
pub use keys::{parse_secret, public_key_of, KeyError};
pub use memory::{disable_core_dumps, SecretBuffer};
pub use password::{PasswordPolicy, PasswordWarning};
pub use store::{FileStore, MemoryStore, SecretStore, StoreError};
pub use submission::{
    prepare_submission, sign_and_submit, SignedSubmission, SubmissionError, SubmissionGateway,
    SubmissionResult, TxMetadata, TxStatus, TxType, UnsignedTxEnvelope,
};
pub use transaction::{sign, sign_as_signer, SignError, Transaction};
pub use vault::{UnlockHandle, Vault, VaultConfig, VaultError, VaultState, DEFAULT_AUTO_LOCK};
