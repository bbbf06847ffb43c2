//! Persistence for the encrypted secret blob
//!
//! The vault owns exactly one storage slot holding the base64 transport
//! form of an [`EncryptedSecret`](crate::crypto::EncryptedSecret). Stores only
//! ever see ciphertext.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from secret stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A single named slot for the encrypted blob.
///
/// `save` must replace any previous blob atomically: a reader sees either
/// the old blob or the new one, never a mix or nothing.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read the stored blob, `None` when the slot is empty
    async fn load(&self) -> Result<Option<String>, StoreError>;

    /// Write the blob, replacing any previous one
    async fn save(&self, blob: &str) -> Result<(), StoreError>;

    /// Empty the slot. Removing an empty slot is not an error.
    async fn remove(&self) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral sessions.
///
/// Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw contents of the slot
    pub fn peek(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Overwrite the slot directly, bypassing the vault
    pub fn put(&self, blob: impl Into<String>) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(blob.into());
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.peek())
    }

    async fn save(&self, blob: &str) -> Result<(), StoreError> {
        self.put(blob);
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// File-backed store.
///
/// Writes go to a sibling temp file which is synced and then renamed over
/// the target, so a crash mid-write leaves the previous blob intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<dir>/secret.vault`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join("secret.vault"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SecretStore for FileStore {
    async fn load(&self) -> Result<Option<String>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // A damaged file is still a stored blob; it just won't decrypt
        let contents = match String::from_utf8(bytes) {
            Ok(contents) => contents,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        let blob = contents.trim();
        Ok((!blob.is_empty()).then(|| blob.to_string()))
    }

    async fn save(&self, blob: &str) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&parent).await?;

        // A leftover temp file keeps its old mode if reopened
        let temp = self.temp_path();
        match tokio::fs::remove_file(&temp).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&temp).await?;
        file.write_all(blob.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp, &self.path).await?;
        sync_dir(&parent).await?;
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Persist a rename by syncing the directory entry
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
