//! Secret vault
//!
//! Owns the encrypted-at-rest signing secret and the window during which its
//! decrypted form lives in memory.
//!
//! ```text
//! Empty ──store──▶ Locked ──unlock──▶ Unlocked
//!   ▲                ▲ ◀──wipe/expiry──┘  │
//!   └────delete──────┴────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! All state sits behind one async mutex. Public operations take it with
//! `try_lock` and report [`VaultError::VaultBusy`] instead of interleaving.
//! The auto-lock timer is a spawned task that waits for the lock, so an
//! in-flight operation finishes before the wipe, and nothing after it can
//! read the secret. Every access also checks the deadline itself, so a late
//! timer never extends the exposure window.

use crate::crypto::{self, CryptoError, EncryptedSecret, KdfParams, SecureRandom};
use crate::keys;
use crate::memory::SecretBuffer;
use crate::password::PasswordPolicy;
use crate::store::{SecretStore, StoreError};
use crate::transaction::{self, SignError};
use rand::rngs::OsRng;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default inactivity window before the unlocked secret is wiped
pub const DEFAULT_AUTO_LOCK: Duration = Duration::from_secs(5 * 60);

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("No secret stored")]
    NoSecretStored,
    /// Wrong password or corrupted blob; deliberately not distinguished.
    #[error("Invalid password")]
    InvalidPassword,
    #[error("Vault is busy with another operation")]
    VaultBusy,
    #[error("Vault is locked")]
    Locked,
    #[error(transparent)]
    Signing(#[from] SignError),
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("Crypto error: {0}")]
    Crypto(CryptoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultState {
    /// No secret persisted
    Empty,
    /// Secret persisted, not in memory
    Locked,
    /// Secret decrypted in memory, auto-lock timer running
    Unlocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultConfig {
    pub kdf: KdfParams,
    /// Inactivity window; every access to the secret restarts it
    pub auto_lock: Duration,
    pub password_policy: PasswordPolicy,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            auto_lock: DEFAULT_AUTO_LOCK,
            password_policy: PasswordPolicy::default(),
        }
    }
}

/// The decrypted secret and its expiry bookkeeping
struct UnlockedSecret {
    secret: SecretBuffer,
    deadline: Instant,
    generation: u64,
    timer: JoinHandle<()>,
}

struct Session {
    rng: Box<dyn SecureRandom>,
    unlocked: Option<UnlockedSecret>,
    /// Bumped on every unlock so stale timers and handles can tell they are stale
    generation: u64,
}

impl Session {
    /// Wipe the unlocked secret and cancel its timer. Returns whether anything was wiped.
    fn clear(&mut self) -> bool {
        match self.unlocked.take() {
            Some(mut unlocked) => {
                unlocked.timer.abort();
                unlocked.secret.wipe();
                true
            }
            None => false,
        }
    }
}

struct Shared<S> {
    store: S,
    config: VaultConfig,
    session: Mutex<Session>,
}

/// Password-protected store for one signing secret.
///
/// Must be used from within a tokio runtime (unlocking spawns the auto-lock
/// timer). Share between tasks with `Arc<Vault<S>>`.
pub struct Vault<S: SecretStore + 'static> {
    shared: Arc<Shared<S>>,
}

impl<S: SecretStore + 'static> Vault<S> {
    /// Vault drawing salts and nonces from the OS RNG
    pub fn new(store: S, config: VaultConfig) -> Self {
        Self::with_rng(store, config, Box::new(OsRng))
    }

    /// Vault with an injected random source
    pub fn with_rng(store: S, config: VaultConfig, rng: Box<dyn SecureRandom>) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                config,
                session: Mutex::new(Session {
                    rng,
                    unlocked: None,
                    generation: 0,
                }),
            }),
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &S {
        &self.shared.store
    }

    fn session(&self) -> Result<MutexGuard<'_, Session>, VaultError> {
        self.shared
            .session
            .try_lock()
            .map_err(|_| VaultError::VaultBusy)
    }

    /// Whether an encrypted secret is persisted
    pub async fn has_secret(&self) -> Result<bool, VaultError> {
        Ok(self.shared.store.load().await?.is_some())
    }

    pub async fn state(&self) -> Result<VaultState, VaultError> {
        let session = self.session()?;
        let now = Instant::now();
        if session.unlocked.as_ref().is_some_and(|u| now < u.deadline) {
            return Ok(VaultState::Unlocked);
        }
        drop(session);

        Ok(if self.has_secret().await? {
            VaultState::Locked
        } else {
            VaultState::Empty
        })
    }

    /// Encrypt and persist `secret`, replacing any stored one.
    ///
    /// Wipes any unlocked secret first.
    ///
    /// # Errors
    /// [`VaultError::InvalidInput`] if `secret` is not a 32-byte seed or a
    /// consistent 64-byte keypair, or the password is too short.
    pub async fn store_secret(&self, secret: &[u8], password: &str) -> Result<(), VaultError> {
        let mut session = self.session()?;
        if session.clear() {
            log::info!("Unlocked secret wiped before storing a new one");
        }
        self.store_inner(&mut session, secret, password).await
    }

    /// Decrypt the stored secret and start the auto-lock timer.
    ///
    /// A previously unlocked secret is wiped first, whatever the outcome.
    /// Dropping the returned future before it resolves leaves the vault locked.
    pub async fn unlock(&self, password: &str) -> Result<UnlockHandle<S>, VaultError> {
        let mut session = self.session()?;
        if session.clear() {
            log::debug!("Previous unlock session wiped");
        }

        let secret = self.decrypt_stored(password).await?;

        session.generation += 1;
        let generation = session.generation;
        let deadline = Instant::now() + self.shared.config.auto_lock;
        let timer = spawn_auto_lock(Arc::downgrade(&self.shared), generation, deadline);

        session.unlocked = Some(UnlockedSecret {
            secret,
            deadline,
            generation,
            timer,
        });

        log::info!(
            "Vault unlocked; auto-lock after {}s of inactivity",
            self.shared.config.auto_lock.as_secs()
        );

        Ok(UnlockHandle {
            shared: Arc::downgrade(&self.shared),
            generation,
        })
    }

    /// Run `f` over the unlocked secret. The secret never leaves the closure.
    ///
    /// Restarts the inactivity window.
    pub async fn with_secret<T>(&self, f: impl FnOnce(&[u8]) -> T) -> Result<T, VaultError> {
        let mut session = self.session()?;
        access(&self.shared.config, &mut session, None, f)
    }

    /// Zero the in-memory secret and cancel the timer. Idempotent.
    ///
    /// Waits for an in-flight operation rather than failing as busy.
    pub async fn wipe(&self) {
        let mut session = self.shared.session.lock().await;
        if session.clear() {
            log::info!("Vault locked");
        }
    }

    /// Remove the persisted secret and wipe any unlocked copy
    pub async fn delete(&self) -> Result<(), VaultError> {
        let mut session = self.session()?;
        session.clear();
        self.shared.store.remove().await?;
        log::info!("Stored secret deleted");
        Ok(())
    }

    /// Re-encrypt the stored secret under a new password.
    ///
    /// The stored blob is only replaced once the new one is fully encrypted.
    /// No unlocked secret survives the call, whether it succeeds or not.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), VaultError> {
        let mut session = self.session()?;
        session.clear();

        let secret = self.decrypt_stored(old_password).await?;
        self.store_inner(&mut session, secret.as_slice(), new_password)
            .await?;
        drop(secret);

        log::info!("Vault password changed");
        Ok(())
    }

    /// Sign into the first signature slot with the unlocked secret
    pub async fn sign_transaction(&self, unsigned: &[u8]) -> Result<Vec<u8>, VaultError> {
        self.with_secret(|secret| transaction::sign(unsigned, secret))
            .await?
            .map_err(VaultError::from)
    }

    /// Sign into the slot matching the unlocked key's declared signer position
    pub async fn sign_as_signer(&self, unsigned: &[u8]) -> Result<Vec<u8>, VaultError> {
        self.with_secret(|secret| transaction::sign_as_signer(unsigned, secret))
            .await?
            .map_err(VaultError::from)
    }

    /// Base-58 public key of the unlocked secret
    pub async fn public_key(&self) -> Result<String, VaultError> {
        self.with_secret(keys::public_key_of)
            .await?
            .map_err(|e| VaultError::Signing(e.into()))
    }

    async fn decrypt_stored(&self, password: &str) -> Result<SecretBuffer, VaultError> {
        let blob = self
            .shared
            .store
            .load()
            .await?
            .ok_or(VaultError::NoSecretStored)?;

        let encrypted =
            EncryptedSecret::from_base64(&blob).map_err(|_| VaultError::InvalidPassword)?;

        let plaintext = crypto::open(&encrypted, password, &self.shared.config.kdf)
            .map_err(|e| match e {
                CryptoError::AuthenticationFailure => VaultError::InvalidPassword,
                other => VaultError::Crypto(other),
            })?;

        Ok(SecretBuffer::from_slice(&plaintext))
    }

    async fn store_inner(
        &self,
        session: &mut Session,
        secret: &[u8],
        password: &str,
    ) -> Result<(), VaultError> {
        keys::signing_key_from_secret(secret)
            .map_err(|e| VaultError::InvalidInput(e.to_string()))?;

        let policy = &self.shared.config.password_policy;
        policy.check(password).map_err(VaultError::InvalidInput)?;
        for warning in policy.warnings(password) {
            log::warn!("Weak vault password: {}", warning.description());
        }

        let encrypted = crypto::seal(secret, password, &self.shared.config.kdf, &mut *session.rng)
            .map_err(VaultError::Crypto)?;
        self.shared.store.save(&encrypted.to_base64()).await?;

        log::info!("Encrypted secret stored ({} bytes)", secret.len());
        Ok(())
    }
}

impl<S: SecretStore + 'static> Drop for Vault<S> {
    fn drop(&mut self) {
        // The timer only holds a weak reference; if it currently holds the
        // lock it is about to wipe anyway, and the buffer zeroes on drop.
        if let Ok(mut session) = self.shared.session.try_lock() {
            if session.clear() {
                log::debug!("Vault dropped; unlocked secret wiped");
            }
        }
    }
}

/// Accessor returned by [`Vault::unlock`].
///
/// Carries no secret bytes. It goes stale when the vault locks or is
/// unlocked again; a stale handle reports [`VaultError::Locked`].
pub struct UnlockHandle<S: SecretStore + 'static> {
    shared: Weak<Shared<S>>,
    generation: u64,
}

impl<S: SecretStore + 'static> UnlockHandle<S> {
    /// Whether this handle's unlock session is still active
    pub async fn is_live(&self) -> bool {
        self.expires_at().await.is_some()
    }

    /// Current auto-lock deadline for this session
    pub async fn expires_at(&self) -> Option<Instant> {
        let shared = self.shared.upgrade()?;
        let session = shared.session.lock().await;
        session
            .unlocked
            .as_ref()
            .filter(|u| u.generation == self.generation && Instant::now() < u.deadline)
            .map(|u| u.deadline)
    }

    pub async fn with_secret<T>(&self, f: impl FnOnce(&[u8]) -> T) -> Result<T, VaultError> {
        let shared = self.shared.upgrade().ok_or(VaultError::Locked)?;
        let mut session = shared
            .session
            .try_lock()
            .map_err(|_| VaultError::VaultBusy)?;
        access(&shared.config, &mut session, Some(self.generation), f)
    }

    pub async fn sign_transaction(&self, unsigned: &[u8]) -> Result<Vec<u8>, VaultError> {
        self.with_secret(|secret| transaction::sign(unsigned, secret))
            .await?
            .map_err(VaultError::from)
    }
}

fn access<T>(
    config: &VaultConfig,
    session: &mut Session,
    generation: Option<u64>,
    f: impl FnOnce(&[u8]) -> T,
) -> Result<T, VaultError> {
    let now = Instant::now();

    let expired = match session.unlocked.as_ref() {
        None => return Err(VaultError::Locked),
        Some(u) if generation.is_some_and(|g| g != u.generation) => {
            return Err(VaultError::Locked)
        }
        Some(u) => now >= u.deadline,
    };
    if expired {
        session.clear();
        log::info!("Vault auto-locked after inactivity");
        return Err(VaultError::Locked);
    }

    let unlocked = session.unlocked.as_mut().ok_or(VaultError::Locked)?;
    unlocked.deadline = now + config.auto_lock;
    Ok(f(unlocked.secret.as_slice()))
}

/// Sleep until the session's deadline, following extensions, then wipe.
fn spawn_auto_lock<S: SecretStore + 'static>(
    shared: Weak<Shared<S>>,
    generation: u64,
    deadline: Instant,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut deadline = deadline;
        loop {
            tokio::time::sleep_until(deadline).await;

            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut session = shared.session.lock().await;

            match session.unlocked.as_ref() {
                Some(u) if u.generation == generation => {
                    if Instant::now() < u.deadline {
                        deadline = u.deadline;
                        continue;
                    }
                }
                // Superseded or already wiped
                _ => return,
            }

            // Take the secret out without aborting ourselves
            if let Some(mut unlocked) = session.unlocked.take() {
                unlocked.secret.wipe();
            }
            log::info!("Vault auto-locked after inactivity");
            return;
        }
    })
}
