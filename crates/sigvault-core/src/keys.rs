//! Signing keys from stored secret material
//!
//! A stored secret is either a 32-byte ed25519 seed or a 64-byte
//! `seed || public key` keypair (the Solana wallet export format).

use crate::base58;
use ed25519_dalek::SigningKey;
use thiserror::Error;
use zeroize::Zeroizing;

/// Length of a bare ed25519 seed
pub const SEED_LEN: usize = 32;

/// Length of a `seed || public key` keypair
pub const KEYPAIR_LEN: usize = 64;

/// Length of an ed25519 public key
pub const PUBLIC_KEY_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid secret key length: expected 32 or 64 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("Public key half of keypair does not match its secret")]
    KeypairMismatch,
    #[error("Unrecognized secret key encoding")]
    UnrecognizedEncoding,
}

/// Build the ed25519 signing key for a stored secret.
pub fn signing_key_from_secret(secret: &[u8]) -> Result<SigningKey, KeyError> {
    match secret.len() {
        KEYPAIR_LEN => {
            let mut bytes = Zeroizing::new([0u8; KEYPAIR_LEN]);
            bytes.copy_from_slice(secret);
            SigningKey::from_keypair_bytes(&bytes).map_err(|_| KeyError::KeypairMismatch)
        }
        SEED_LEN => {
            let mut seed = Zeroizing::new([0u8; SEED_LEN]);
            seed.copy_from_slice(secret);
            Ok(SigningKey::from_bytes(&seed))
        }
        other => Err(KeyError::InvalidKeyLength(other)),
    }
}

/// Raw public key for a stored secret
pub fn public_key_bytes(secret: &[u8]) -> Result<[u8; PUBLIC_KEY_LEN], KeyError> {
    Ok(signing_key_from_secret(secret)?.verifying_key().to_bytes())
}

/// Base-58 public key (the account address) for a stored secret
pub fn public_key_of(secret: &[u8]) -> Result<String, KeyError> {
    Ok(base58::encode(&public_key_bytes(secret)?))
}

/// Parse an exported secret key.
///
/// Accepts, in order:
/// - a JSON byte array (`solana-keygen` keypair file),
/// - hex (64 or 128 characters),
/// - base-58 (wallet "export private key" format).
///
/// The decoded length is validated against [`SEED_LEN`] / [`KEYPAIR_LEN`].
pub fn parse_secret(text: &str) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let text = text.trim();

    let bytes = if text.starts_with('[') {
        let parsed: Vec<u8> =
            serde_json::from_str(text).map_err(|_| KeyError::UnrecognizedEncoding)?;
        Zeroizing::new(parsed)
    } else if (text.len() == SEED_LEN * 2 || text.len() == KEYPAIR_LEN * 2)
        && text.bytes().all(|b| b.is_ascii_hexdigit())
    {
        Zeroizing::new(decode_hex(text).ok_or(KeyError::UnrecognizedEncoding)?)
    } else {
        Zeroizing::new(base58::decode(text).map_err(|_| KeyError::UnrecognizedEncoding)?)
    };

    match bytes.len() {
        SEED_LEN | KEYPAIR_LEN => Ok(bytes),
        other => Err(KeyError::InvalidKeyLength(other)),
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    text.as_bytes()
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}
