//! Configuration for a Symdex loader.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use symdex_indexer::index::{default_accept_files, default_ignore_dirs};
use symdex_indexer::storage::ensure_cache_dir;
use symdex_indexer::SourceSet;

/// Loader configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Directories to walk, or single files to scan
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Standalone files, also resolvable by their base name
    #[serde(default)]
    pub files: Vec<PathBuf>,

    /// Masks a file name must match to be scanned
    #[serde(default = "default_accept_files")]
    pub accept_files: Vec<String>,

    /// Masks of entries skipped while walking
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Concrete paths never entered nor scanned
    #[serde(default)]
    pub exclude_paths: Vec<PathBuf>,

    /// Where cache artifacts live
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Rescan on lookups that miss or hit a modified file
    #[serde(default = "default_true")]
    pub auto_rebuild: bool,

    /// Fail on unparsable files instead of treating them as empty
    #[serde(default = "default_true")]
    pub report_parse_errors: bool,

    /// Skip directories that cannot be listed instead of failing
    #[serde(default = "default_true")]
    pub ignore_unreadable_dirs: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            files: Vec::new(),
            accept_files: default_accept_files(),
            ignore_dirs: default_ignore_dirs(),
            exclude_paths: Vec::new(),
            cache_dir: None,
            auto_rebuild: true,
            report_parse_errors: true,
            ignore_unreadable_dirs: true,
        }
    }
}

impl LoaderConfig {
    /// Per-user cache location
    pub fn default_cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("symdex"))
    }

    /// Load configuration from a YAML file.
    ///
    /// Relative paths in the file are taken relative to the file's directory.
    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_yaml::from_str(&content).map_err(|e| {
            CoreError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if let Some(base) = path.parent() {
            config.anchor(base);
        }
        Ok(config)
    }

    fn anchor(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.roots.iter_mut().for_each(join);
        self.files.iter_mut().for_each(join);
        self.exclude_paths.iter_mut().for_each(join);
        if let Some(dir) = self.cache_dir.as_mut() {
            join(dir);
        }
    }

    /// Add directories (or files) to scan
    pub fn add_directory<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Add standalone files
    pub fn add_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files.extend(files.into_iter().map(Into::into));
        self
    }

    /// Exclude concrete paths from scanning
    pub fn exclude_directory<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.exclude_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn set_auto_rebuild(mut self, on: bool) -> Self {
        self.auto_rebuild = on;
        self
    }

    pub fn report_parse_errors(mut self, on: bool) -> Self {
        self.report_parse_errors = on;
        self
    }

    /// Set the cache directory, creating it if needed
    pub fn set_cache_dir(mut self, dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let dir = dir.into();
        ensure_cache_dir(&dir)?;
        self.cache_dir = Some(dir);
        Ok(self)
    }

    /// The part of the configuration that decides what gets indexed
    pub fn sources(&self) -> SourceSet {
        SourceSet {
            roots: self.roots.clone(),
            files: self.files.clone(),
            accept_files: self.accept_files.clone(),
            ignore_dirs: self.ignore_dirs.clone(),
            exclude_paths: self.exclude_paths.clone(),
            ignore_unreadable_dirs: self.ignore_unreadable_dirs,
        }
    }
}
