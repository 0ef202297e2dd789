//! streams/lock: advisory lock over a stream directory.
//!
//! Cross-platform (fs2) locks:
//! - Exclusive: writers (save).
//! - Shared: readers (open).
//!
//! Lock file path: <root>/LOCK
//! Lock is released on Drop.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::Result;

pub const LOCK_FILE: &str = "LOCK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

pub struct LockGuard {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(root: &Path) -> Result<(File, PathBuf)> {
    let path = root.join(LOCK_FILE);
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)?;
    Ok((f, path))
}

/// Block until the lock is held.
pub fn acquire_lock(root: &Path, mode: LockMode) -> Result<LockGuard> {
    let (file, path) = open_lock_file(root)?;
    match mode {
        LockMode::Shared => FileExt::lock_shared(&file)?,
        LockMode::Exclusive => FileExt::lock_exclusive(&file)?,
    }
    Ok(LockGuard { file, path, mode })
}

/// Fails immediately if another handle holds a conflicting lock.
pub fn try_acquire_lock(root: &Path, mode: LockMode) -> Result<LockGuard> {
    let (file, path) = open_lock_file(root)?;
    match mode {
        LockMode::Shared => FileExt::try_lock_shared(&file)?,
        LockMode::Exclusive => FileExt::try_lock_exclusive(&file)?,
    }
    Ok(LockGuard { file, path, mode })
}
