//! Snapshot of a single filesystem entry seen during traversal.

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Type of a filesystem entry as far as masks are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Dir,
}

/// An immutable record of one entry, taken when the walker listed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path as reached from the search base
    pub path: PathBuf,
    /// Directory part relative to the search base ("" at the base itself)
    pub relative_dir: PathBuf,
    /// Entry type (symlinks are followed)
    pub kind: EntryKind,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime: u64,
}

impl FileRecord {
    /// Build a record by stat-ing `path`. Returns `None` when the entry
    /// vanished between listing and stat.
    pub fn from_path(path: PathBuf, relative_dir: PathBuf) -> Option<Self> {
        // Follow symlinks, but keep broken links visible as files.
        let metadata = std::fs::metadata(&path)
            .or_else(|_| std::fs::symlink_metadata(&path))
            .ok()?;

        let kind = if metadata.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };

        Some(Self {
            mtime: mtime_of(&metadata),
            path,
            relative_dir,
            kind,
        })
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }

    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Relative path including the entry name, always with forward slashes.
    pub fn relative_pathname(&self) -> String {
        let dir = normalize_slashes(&self.relative_dir.to_string_lossy());
        if dir.is_empty() {
            self.file_name().to_string()
        } else {
            format!("{}/{}", dir, self.file_name())
        }
    }
}

/// Modification time of `metadata` in nanoseconds since the epoch.
pub fn mtime_of(metadata: &Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Current modification time of `path`, or `None` if it cannot be stat-ed.
pub fn file_mtime(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| mtime_of(&m))
}

pub(crate) fn normalize_slashes(path: &str) -> String {
    path.replace('\\', "/")
}
