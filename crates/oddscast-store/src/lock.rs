//! Advisory file locks shared by store writers and leader election.

use crate::error::StoreResult;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use tracing::warn;

/// An exclusive advisory lock over a sidecar lock file.
///
/// Held for the lifetime of the value, released on drop. Advisory locks
/// coordinate cooperating processes only; the lock file itself carries no
/// data.
#[derive(Debug)]
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Acquire the lock, blocking until it becomes available.
    pub fn acquire(path: &Path) -> StoreResult<Self> {
        let file = Self::open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    /// Try to acquire the lock without blocking.
    ///
    /// Returns `Ok(None)` when another process already holds it.
    pub fn try_acquire(path: &Path) -> StoreResult<Option<Self>> {
        let file = Self::open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn open(path: &Path) -> std::io::Result<File> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(?e, "Failed to release file lock");
        }
    }
}
