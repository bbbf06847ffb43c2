//! Memory hygiene for decrypted key material
//!
//! - **Core dump prevention**: `setrlimit(RLIMIT_CORE, 0)` so a crash while
//!   the vault is unlocked never writes the secret to disk.
//! - **Memory locking**: [`SecretBuffer`] `mlock`s its allocation so the OS
//!   does not swap the secret out, and zeroes it before release.
//!
//! Both are best-effort. Containers and unprivileged users often cannot lock
//! memory; failures are logged and the buffer still zeroes itself.

use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroize;

static CORE_DUMPS_DISABLED: AtomicBool = AtomicBool::new(false);

/// Disable core dumps for the current process.
///
/// Returns `true` if core dumps are disabled (including by an earlier call).
pub fn disable_core_dumps() -> bool {
    if CORE_DUMPS_DISABLED.swap(true, Ordering::SeqCst) {
        return true;
    }

    #[cfg(unix)]
    {
        unix::disable_core_dumps()
    }

    #[cfg(not(unix))]
    {
        log::warn!("core dump prevention not supported on this platform");
        false
    }
}

/// Heap buffer for a decrypted secret.
///
/// The allocation is sized once and never grows, so no stale copies are left
/// behind by reallocation. Contents are zeroed on [`wipe`](Self::wipe) and on drop.
pub struct SecretBuffer {
    data: Vec<u8>,
    locked: bool,
}

impl SecretBuffer {
    /// Copy `bytes` into a new locked buffer
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut data = vec![0u8; bytes.len()];
        data.copy_from_slice(bytes);

        let locked = data.is_empty() || lock_region(&data);
        if !locked {
            log::warn!(
                "failed to mlock {} secret bytes; they may be swapped to disk",
                data.len()
            );
        }

        Self { data, locked }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the pages are pinned in RAM
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Zero the contents and release the lock. Safe to call repeatedly.
    pub fn wipe(&mut self) {
        self.data.as_mut_slice().zeroize();
        if self.locked && !self.data.is_empty() {
            unlock_region(&self.data);
        }
        self.locked = false;
        self.data.zeroize();
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl std::fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBuffer")
            .field("len", &self.data.len())
            .field("locked", &self.locked)
            .finish()
    }
}

fn lock_region(data: &[u8]) -> bool {
    #[cfg(unix)]
    {
        // SAFETY: `data` is a live allocation of `data.len()` bytes.
        unsafe { unix::mlock(data.as_ptr(), data.len()) }
    }

    #[cfg(not(unix))]
    {
        let _ = data;
        false
    }
}

fn unlock_region(data: &[u8]) {
    #[cfg(unix)]
    {
        // SAFETY: same region previously passed to `lock_region`.
        unsafe {
            unix::munlock(data.as_ptr(), data.len());
        }
    }

    #[cfg(not(unix))]
    {
        let _ = data;
    }
}

#[cfg(unix)]
mod unix {
    pub fn disable_core_dumps() -> bool {
        let rlim = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        // SAFETY: setrlimit with RLIMIT_CORE=0 is a standard POSIX operation
        let result = unsafe { libc::setrlimit(libc::RLIMIT_CORE, &rlim) };
        if result != 0 {
            log::warn!(
                "failed to disable core dumps: {}",
                std::io::Error::last_os_error()
            );
            return false;
        }
        true
    }

    pub unsafe fn mlock(ptr: *const u8, len: usize) -> bool {
        libc::mlock(ptr as *const libc::c_void, len) == 0
    }

    pub unsafe fn munlock(ptr: *const u8, len: usize) -> bool {
        libc::munlock(ptr as *const libc::c_void, len) == 0
    }
}
