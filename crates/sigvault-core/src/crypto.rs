//! Cryptographic utilities
//!
//! Password-based encryption for the stored signing secret.
//!
//! # Security Notes
//!
//! - Key derivation is deliberately slow: PBKDF2-HMAC-SHA256 with at least
//!   100,000 iterations by default, or Argon2id (memory-hard) when configured
//! - AES-256-GCM provides authenticated encryption; any modified byte in the
//!   blob makes decryption fail
//! - Each encryption uses a fresh random salt and nonce
//! - Password and derived key are never stored

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Salt length for key derivation
pub const SALT_LEN: usize = 16;

/// Nonce length for AES-256-GCM
pub const NONCE_LEN: usize = 12;

/// Authentication tag length for AES-256-GCM
pub const TAG_LEN: usize = 16;

/// Derived key length (256 bits for AES-256)
pub const KEY_LEN: usize = 32;

/// Lowest PBKDF2 iteration count accepted for a vault key
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Argon2id defaults (OWASP recommendations for 2024+)
/// - m_cost: 64 MiB memory
/// - t_cost: 3 iterations
/// - p_cost: 4 parallel lanes
pub const ARGON2_M_COST: u32 = 65536;
pub const ARGON2_T_COST: u32 = 3;
pub const ARGON2_P_COST: u32 = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),
    /// Wrong key, or ciphertext/tag/nonce/salt was modified.
    #[error("Authentication failed")]
    AuthenticationFailure,
    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
    #[error("Key derivation parameters too weak: {0}")]
    WeakKdfParams(String),
    #[error("Invalid ciphertext format")]
    InvalidFormat,
}

/// Password key-derivation function and its cost parameters.
///
/// The stored blob does not record which function was used, so the same
/// parameters must be supplied for every unlock of a given vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfParams {
    /// PBKDF2-HMAC-SHA256
    Pbkdf2 { iterations: u32 },
    /// Argon2id v0x13, `m_cost` in KiB
    Argon2id { m_cost: u32, t_cost: u32, p_cost: u32 },
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams::Pbkdf2 {
            iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    /// PBKDF2-HMAC-SHA256 with the given iteration count.
    ///
    /// # Errors
    /// [`CryptoError::WeakKdfParams`] below [`MIN_PBKDF2_ITERATIONS`].
    pub fn pbkdf2(iterations: u32) -> Result<Self, CryptoError> {
        let params = KdfParams::Pbkdf2 { iterations };
        params.validate()?;
        Ok(params)
    }

    /// Argon2id with explicit costs.
    pub fn argon2id(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, CryptoError> {
        let params = KdfParams::Argon2id {
            m_cost,
            t_cost,
            p_cost,
        };
        params.validate()?;
        Ok(params)
    }

    /// Argon2id with the default 64 MiB / 3 / 4 costs
    pub fn argon2id_default() -> Self {
        KdfParams::Argon2id {
            m_cost: ARGON2_M_COST,
            t_cost: ARGON2_T_COST,
            p_cost: ARGON2_P_COST,
        }
    }

    pub fn validate(&self) -> Result<(), CryptoError> {
        match *self {
            KdfParams::Pbkdf2 { iterations } => {
                if iterations < MIN_PBKDF2_ITERATIONS {
                    return Err(CryptoError::WeakKdfParams(format!(
                        "PBKDF2 needs at least {} iterations, got {}",
                        MIN_PBKDF2_ITERATIONS, iterations
                    )));
                }
                Ok(())
            }
            KdfParams::Argon2id {
                m_cost,
                t_cost,
                p_cost,
            } => {
                if m_cost < ARGON2_M_COST / 4 {
                    return Err(CryptoError::WeakKdfParams(format!(
                        "Argon2id needs at least {} KiB of memory, got {}",
                        ARGON2_M_COST / 4,
                        m_cost
                    )));
                }
                Params::new(m_cost, t_cost, p_cost, Some(KEY_LEN))
                    .map(|_| ())
                    .map_err(|e| CryptoError::WeakKdfParams(e.to_string()))
            }
        }
    }
}

/// A 256-bit symmetric key, zeroed on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Random source for salts and nonces.
///
/// Production code uses `OsRng`; tests may inject a seeded `StdRng`.
pub trait SecureRandom: RngCore + CryptoRng + Send {}

impl<T: RngCore + CryptoRng + Send> SecureRandom for T {}

/// Encrypted secret format:
/// [salt (16 bytes)][nonce (12 bytes)][ciphertext + tag (len + 16 bytes)]
/// Total: 108 bytes for a 64-byte keypair, 76 bytes for a 32-byte seed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedSecret {
    /// Salt used for key derivation
    salt: [u8; SALT_LEN],
    /// Nonce used for AES-256-GCM
    nonce: [u8; NONCE_LEN],
    /// Encrypted secret + authentication tag
    ciphertext: Vec<u8>,
}

impl EncryptedSecret {
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    pub fn nonce(&self) -> &[u8; NONCE_LEN] {
        &self.nonce
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serialize to bytes: salt || nonce || ciphertext
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SALT_LEN + NONCE_LEN + self.ciphertext.len());
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        // Minimum size: salt + nonce + at least 1 byte ciphertext + tag
        if bytes.len() < SALT_LEN + NONCE_LEN + TAG_LEN + 1 {
            return Err(CryptoError::InvalidFormat);
        }

        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];

        salt.copy_from_slice(&bytes[0..SALT_LEN]);
        nonce.copy_from_slice(&bytes[SALT_LEN..SALT_LEN + NONCE_LEN]);
        let ciphertext = bytes[SALT_LEN + NONCE_LEN..].to_vec();

        Ok(Self {
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Storage transport form (standard base64 of [`Self::to_bytes`])
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| CryptoError::InvalidFormat)?;
        Self::from_bytes(&bytes)
    }
}

/// Derive an encryption key from a password
pub fn derive_key(
    password: &str,
    salt: &[u8; SALT_LEN],
    params: &KdfParams,
) -> Result<SymmetricKey, CryptoError> {
    params.validate()?;

    let mut key = SymmetricKey([0u8; KEY_LEN]);
    match *params {
        KdfParams::Pbkdf2 { iterations } => {
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key.0);
        }
        KdfParams::Argon2id {
            m_cost,
            t_cost,
            p_cost,
        } => {
            let params = Params::new(m_cost, t_cost, p_cost, Some(KEY_LEN))
                .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(password.as_bytes(), salt, &mut key.0)
                .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
        }
    }

    Ok(key)
}

/// AES-256-GCM encrypt, returning ciphertext with the 16-byte tag appended
pub fn encrypt(
    plaintext: &[u8],
    key: &SymmetricKey,
    nonce: &[u8; NONCE_LEN],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// AES-256-GCM decrypt. Fails closed: no plaintext is returned unless the tag verifies.
pub fn decrypt(
    ciphertext: &[u8],
    key: &SymmetricKey,
    nonce: &[u8; NONCE_LEN],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::AuthenticationFailure)
}

/// Encrypt a secret with a password.
///
/// Draws a new salt and nonce from `rng` on every call.
pub fn seal<R>(
    secret: &[u8],
    password: &str,
    params: &KdfParams,
    rng: &mut R,
) -> Result<EncryptedSecret, CryptoError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    let mut salt = [0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt, params)?;
    let ciphertext = encrypt(secret, &key, &nonce)?;

    Ok(EncryptedSecret {
        salt,
        nonce,
        ciphertext,
    })
}

/// Decrypt a sealed secret with a password.
///
/// # Errors
/// [`CryptoError::AuthenticationFailure`] for a wrong password or a
/// tampered blob; the two cases are indistinguishable.
pub fn open(
    encrypted: &EncryptedSecret,
    password: &str,
    params: &KdfParams,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let key = derive_key(password, &encrypted.salt, params)?;
    decrypt(&encrypted.ciphertext, &key, &encrypted.nonce)
}
