//! Persistence layer for the symbol index.
//!
//! One JSON artifact per configuration, named after a hash of that
//! configuration, written atomically and guarded by a sidecar lock file
//! so concurrent processes can share it.

mod lock;
mod snapshot;

pub use lock::{CacheLock, LockMode};
pub use snapshot::{CacheSnapshot, SymbolEntry};

use crate::index::SourceSet;
use crate::IndexerError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bumped whenever the artifact layout changes.
pub const FORMAT_VERSION: &str = "v2";

/// The configuration tuple a cache artifact belongs to.
#[derive(Serialize)]
struct CacheKey<'a> {
    ignore_dirs: &'a [String],
    accept_files: &'a [String],
    roots: &'a [PathBuf],
    exclude_paths: &'a [PathBuf],
    version: &'static str,
}

/// Compute the cache identifier for a source configuration.
pub fn cache_key(sources: &SourceSet) -> String {
    let key = CacheKey {
        ignore_dirs: &sources.ignore_dirs,
        accept_files: &sources.accept_files,
        roots: &sources.roots,
        exclude_paths: &sources.exclude_paths,
        version: FORMAT_VERSION,
    };
    // Plain data with string keys; encoding cannot fail.
    let encoded = serde_json::to_vec(&key).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    format!("{:x}", hasher.finalize())[..32].to_string()
}

/// How a snapshot was obtained by [`CacheStore::load_or_build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Read without taking any lock
    Warm,
    /// Read while holding the shared lock
    AfterSharedLock,
    /// Read after waiting for the exclusive lock
    AfterExclusiveLock,
    /// Nothing usable on disk; built and persisted by this process
    Built,
}

/// Cache artifact storage for one configuration.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    key: String,
}

impl CacheStore {
    /// Create a store under `dir` for the given sources.
    pub fn new(dir: impl Into<PathBuf>, sources: &SourceSet) -> Self {
        Self {
            dir: dir.into(),
            key: cache_key(sources),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Path of the cache artifact.
    pub fn cache_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    /// Path of the sidecar lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json.lock", self.key))
    }

    fn temp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json.tmp", self.key))
    }

    /// Read the artifact without locking. Any failure reads as absent.
    pub fn load(&self) -> Option<CacheSnapshot> {
        let path = self.cache_path();
        let data = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!(path = ?path, error = %e, "Discarding unreadable cache");
                None
            }
        }
    }

    /// Load the snapshot, escalating locks as needed, or build it.
    ///
    /// `build` runs only when no other process produced the artifact while
    /// this one waited for the exclusive lock; its result is persisted
    /// before that lock is released.
    pub fn load_or_build<F>(&self, build: F) -> Result<(CacheSnapshot, LoadOutcome), IndexerError>
    where
        F: FnOnce() -> Result<CacheSnapshot, IndexerError>,
    {
        if let Some(snapshot) = self.load() {
            debug!(key = %self.key, "Cache loaded");
            return Ok((snapshot, LoadOutcome::Warm));
        }

        let shared = CacheLock::acquire(&self.lock_path(), LockMode::Shared)?;
        if let Some(snapshot) = self.load() {
            debug!(key = %self.key, "Cache loaded under shared lock");
            return Ok((snapshot, LoadOutcome::AfterSharedLock));
        }
        drop(shared);

        let _exclusive = CacheLock::acquire(&self.lock_path(), LockMode::Exclusive)?;
        if let Some(snapshot) = self.load() {
            debug!(key = %self.key, "Cache loaded under exclusive lock");
            return Ok((snapshot, LoadOutcome::AfterExclusiveLock));
        }

        let snapshot = build()?;
        self.write(&snapshot)?;
        Ok((snapshot, LoadOutcome::Built))
    }

    /// Persist a snapshot under the exclusive lock.
    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<(), IndexerError> {
        let _lock = CacheLock::acquire(&self.lock_path(), LockMode::Exclusive)?;
        self.write(snapshot)
    }

    /// Write to a temporary sibling and rename it over the artifact.
    /// Callers must hold the exclusive lock.
    fn write(&self, snapshot: &CacheSnapshot) -> Result<(), IndexerError> {
        let target = self.cache_path();
        let temp = self.temp_path();

        let mut data = serde_json::to_vec_pretty(snapshot)?;
        data.push(b'\n');

        let result = std::fs::write(&temp, &data).and_then(|_| std::fs::rename(&temp, &target));
        if let Err(e) = result {
            let _ = std::fs::remove_file(&temp);
            return Err(IndexerError::io(
                &target,
                std::io::Error::new(e.kind(), format!("Unable to create cache: {}", e)),
            ));
        }

        info!(path = ?target, size = data.len(), symbols = snapshot.symbols.len(), "Saved cache");
        Ok(())
    }
}

/// Make sure a cache directory exists, creating parents as needed.
pub fn ensure_cache_dir(dir: &Path) -> Result<(), IndexerError> {
    std::fs::create_dir_all(dir).map_err(|e| {
        IndexerError::Config(format!(
            "Unable to create directory '{}': {}",
            dir.display(),
            e
        ))
    })
}
