//! The set of files an index is built from.

use crate::finder::{file_mtime, Finder};
use crate::IndexerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Default accept masks.
pub fn default_accept_files() -> Vec<String> {
    vec!["*.php".to_string()]
}

/// Default ignore masks, applied as exclusions while walking roots.
pub fn default_ignore_dirs() -> Vec<String> {
    [".*", "*.old", "*.bak", "*.tmp", "temp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// One file produced by [`SourceSet::visit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Modification time in nanoseconds since the Unix epoch
    pub mtime: u64,
    /// Listed as a standalone file; its stem is indexed as a symbol too
    pub single_file: bool,
}

/// Roots, standalone files and the masks used to walk them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSet {
    /// Directories to walk or individual files to scan
    pub roots: Vec<PathBuf>,
    /// Files indexed in single-file mode
    pub files: Vec<PathBuf>,
    pub accept_files: Vec<String>,
    pub ignore_dirs: Vec<String>,
    /// Paths never entered nor yielded, compared in canonical form
    pub exclude_paths: Vec<PathBuf>,
    pub ignore_unreadable_dirs: bool,
}

impl Default for SourceSet {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            files: Vec::new(),
            accept_files: default_accept_files(),
            ignore_dirs: default_ignore_dirs(),
            exclude_paths: Vec::new(),
            ignore_unreadable_dirs: true,
        }
    }
}

impl SourceSet {
    /// Whether `path` is one of the standalone files.
    pub fn is_single_file(&self, path: &Path) -> bool {
        self.files.iter().any(|f| f == path)
    }

    /// Finder walking one directory root.
    pub fn finder_for(&self, dir: &Path) -> Result<Finder, IndexerError> {
        let mut finder = Finder::find_files(&self.accept_files)?
            .from([dir])?
            .exclude(&self.ignore_dirs)?
            .sort_by_name()
            .ignore_unreadable_dirs(self.ignore_unreadable_dirs);

        let disallow: HashSet<PathBuf> = self
            .exclude_paths
            .iter()
            .filter_map(|p| std::fs::canonicalize(p).ok())
            .collect();

        if !disallow.is_empty() {
            let disallow = Rc::new(disallow);
            let leaves = Rc::clone(&disallow);
            finder = finder
                .filter(move |r| allowed(&leaves, &r.path))
                .descent_filter(move |r| allowed(&disallow, &r.path));
        }

        Ok(finder)
    }

    /// Feed every source file to `visit`, roots first, then standalone files.
    ///
    /// Directory roots are walked lazily; an error from `visit` stops the walk.
    pub fn visit<F>(&self, mut visit: F) -> Result<(), IndexerError>
    where
        F: FnMut(SourceFile) -> Result<(), IndexerError>,
    {
        for root in &self.roots {
            if root.is_file() {
                if let Some(mtime) = file_mtime(root) {
                    visit(SourceFile {
                        path: root.clone(),
                        mtime,
                        single_file: false,
                    })?;
                }
                continue;
            }

            if !root.is_dir() {
                return Err(IndexerError::Config(format!(
                    "File or directory '{}' not found.",
                    root.display()
                )));
            }

            let dir = std::fs::canonicalize(root).unwrap_or_else(|_| root.clone());
            debug!(root = ?dir, "Walking root");
            let finder = self.finder_for(&dir)?;
            for record in finder.iter()? {
                let record = record?;
                visit(SourceFile {
                    path: record.path,
                    mtime: record.mtime,
                    single_file: false,
                })?;
            }
        }

        for file in &self.files {
            if !file.exists() {
                debug!(path = ?file, "Skipping missing standalone file");
                continue;
            }
            if let Some(mtime) = file_mtime(file) {
                visit(SourceFile {
                    path: file.clone(),
                    mtime,
                    single_file: true,
                })?;
            }
        }

        Ok(())
    }
}

fn allowed(disallow: &HashSet<PathBuf>, path: &Path) -> bool {
    match std::fs::canonicalize(path) {
        Ok(real) => !disallow.contains(&real),
        Err(_) => true,
    }
}
