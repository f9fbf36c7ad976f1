//! Filesystem search engine.
//!
//! A [`Finder`] collects glob masks, root directories and filters, resolves
//! them into a search plan when iterated, and walks the plan lazily:
//!
//! ```no_run
//! use symdex_indexer::finder::Finder;
//!
//! let finder = Finder::find_files(["*.php"])?
//!     .from(["src"])?
//!     .exclude(["vendor/**"])?;
//!
//! for record in finder.iter()? {
//!     println!("{}", record?.path.display());
//! }
//! # Ok::<(), symdex_indexer::IndexerError>(())
//! ```

mod pattern;
mod plan;
mod record;
mod walker;

pub use pattern::Matcher;
pub use plan::{is_absolute, split_recursive_part, ExcludeMask, ExcludeScope, Search, SearchPlan};
pub use record::{file_mtime, mtime_of, EntryKind, FileRecord};
pub use walker::FinderIter;

use crate::IndexerError;
use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

type Filter = Box<dyn Fn(&FileRecord) -> bool>;
type Comparator = Box<dyn Fn(&FileRecord, &FileRecord) -> Ordering>;

/// Builder and entry point for file searches.
pub struct Finder {
    masks: Vec<(String, EntryKind)>,
    roots: Vec<String>,
    filters: Vec<Filter>,
    leaf_filters: Vec<usize>,
    descent_filters: Vec<usize>,
    child_first: bool,
    sort: Option<Comparator>,
    max_depth: Option<usize>,
    ignore_unreadable_dirs: bool,
}

impl Finder {
    fn new() -> Self {
        Self {
            masks: Vec::new(),
            roots: Vec::new(),
            filters: Vec::new(),
            leaf_filters: Vec::new(),
            descent_filters: Vec::new(),
            child_first: false,
            sort: None,
            max_depth: None,
            ignore_unreadable_dirs: true,
        }
    }

    /// Search for files matching any of `masks`.
    pub fn find_files<I, S>(masks: I) -> Result<Self, IndexerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new().add_masks(masks, EntryKind::File)
    }

    /// Search for directories matching any of `masks`.
    pub fn find_directories<I, S>(masks: I) -> Result<Self, IndexerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new().add_masks(masks, EntryKind::Dir)
    }

    fn add_masks<I, S>(mut self, masks: I, mode: EntryKind) -> Result<Self, IndexerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for mask in masks {
            let orig = mask.as_ref();
            let trimmed = match mode {
                EntryKind::Dir => orig.trim_end_matches(['/', '\\']),
                EntryKind::File => orig,
            };

            if trimmed.is_empty() || (mode == EntryKind::File && orig.ends_with(['/', '\\'])) {
                return Err(IndexerError::Config(format!("Invalid mask '{}'", orig)));
            }

            let stripped = trimmed
                .strip_prefix("**/")
                .or_else(|| trimmed.strip_prefix("**\\"))
                .unwrap_or(trimmed);
            self.masks.push((stripped.to_string(), mode));
        }

        Ok(self)
    }

    /// Search recursively below each of `paths`.
    pub fn from<I, P>(self, paths: I) -> Result<Self, IndexerError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.add_roots(paths, "/**")
    }

    /// Search only the direct children of each of `paths`.
    pub fn in_dirs<I, P>(self, paths: I) -> Result<Self, IndexerError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.add_roots(paths, "")
    }

    fn add_roots<I, P>(mut self, paths: I, suffix: &str) -> Result<Self, IndexerError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        for path in paths {
            let root = plan::clean_root(path.as_ref())?;
            self.roots.push(format!("{}{}", plan::escape_root(&root), suffix));
        }
        Ok(self)
    }

    /// Skip entries matching any of `masks`.
    ///
    /// A trailing `/**`, `/*` or `/` restricts the mask to directories;
    /// see [`ExcludeScope`] for which of them also filter matched entries.
    pub fn exclude<I, S>(mut self, masks: I) -> Result<Self, IndexerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for mask in masks {
            let exclude = ExcludeMask::parse(mask.as_ref())?;
            let leaves = exclude.applies_to_leaves();
            let idx = self.push_filter(Box::new(move |r| exclude.accepts(r)));
            self.descent_filters.push(idx);
            if leaves {
                self.leaf_filters.push(idx);
            }
        }
        Ok(self)
    }

    /// Only yield entries for which `predicate` returns `true`.
    pub fn filter(mut self, predicate: impl Fn(&FileRecord) -> bool + 'static) -> Self {
        let idx = self.push_filter(Box::new(predicate));
        self.leaf_filters.push(idx);
        self
    }

    /// Only descend into directories for which `predicate` returns `true`.
    pub fn descent_filter(mut self, predicate: impl Fn(&FileRecord) -> bool + 'static) -> Self {
        let idx = self.push_filter(Box::new(predicate));
        self.descent_filters.push(idx);
        self
    }

    fn push_filter(&mut self, filter: Filter) -> usize {
        self.filters.push(filter);
        self.filters.len() - 1
    }

    /// Do not list directories more than `depth` levels below a base.
    pub fn limit_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Sort the children of each directory with `cmp`.
    pub fn sort_by(
        mut self,
        cmp: impl Fn(&FileRecord, &FileRecord) -> Ordering + 'static,
    ) -> Self {
        self.sort = Some(Box::new(cmp));
        self
    }

    /// Sort the children of each directory by name.
    pub fn sort_by_name(self) -> Self {
        self.sort_by(|a, b| a.file_name().cmp(b.file_name()))
    }

    /// Yield descendants before the directory's own matches.
    pub fn child_first(mut self, on: bool) -> Self {
        self.child_first = on;
        self
    }

    /// Whether an unreadable directory is skipped (default) or an error.
    pub fn ignore_unreadable_dirs(mut self, on: bool) -> Self {
        self.ignore_unreadable_dirs = on;
        self
    }

    /// Resolve the plan and start a fresh traversal.
    pub fn iter(&self) -> Result<FinderIter<'_>, IndexerError> {
        let plan = plan::build_plan(&self.masks, &self.roots)?;
        debug!(dirs = plan.dirs.len(), masks = self.masks.len(), "Search plan built");
        Ok(FinderIter::new(self, plan.dirs))
    }

    /// Run the whole traversal and collect every match.
    pub fn collect(&self) -> Result<Vec<FileRecord>, IndexerError> {
        self.iter()?.collect()
    }
}
