//! Advisory lock on the per-configuration sidecar file.

use crate::IndexerError;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    fn as_str(self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

/// A held lock; released on drop.
///
/// The lock file itself is never removed: deleting it while another
/// process holds or is opening it would let two writers in at once.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl CacheLock {
    /// Block until the lock is granted.
    pub fn acquire(path: &Path, mode: LockMode) -> Result<Self, IndexerError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|e| IndexerError::io(path, e))?;

        lock(&file, mode).map_err(|e| {
            IndexerError::io(
                path,
                std::io::Error::new(
                    e.kind(),
                    format!("Unable to acquire {} lock: {}", mode.as_str(), e),
                ),
            )
        })?;

        debug!(path = ?path, mode = mode.as_str(), "Lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            mode,
        })
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = unlock(&self.file) {
            debug!(path = ?self.path, error = %e, "Unlock failed");
        }
    }
}

#[cfg(unix)]
fn lock(file: &File, mode: LockMode) -> std::io::Result<()> {
    let op = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    };
    flock(file, op)
}

#[cfg(unix)]
fn unlock(file: &File) -> std::io::Result<()> {
    flock(file, libc::LOCK_UN)
}

#[cfg(unix)]
fn flock(file: &File, op: libc::c_int) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;

    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        if unsafe { libc::flock(file.as_raw_fd(), op) } == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn lock(file: &File, mode: LockMode) -> std::io::Result<()> {
    match mode {
        LockMode::Shared => file.lock_shared(),
        LockMode::Exclusive => file.lock(),
    }
}

#[cfg(not(unix))]
fn unlock(file: &File) -> std::io::Result<()> {
    file.unlock()
}
