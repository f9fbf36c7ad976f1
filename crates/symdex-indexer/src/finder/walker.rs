//! Lazy depth-first traversal of a search plan.

use super::plan::Search;
use super::record::FileRecord;
use super::Finder;
use crate::IndexerError;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Per-entry memo of filter results, keyed by filter index.
///
/// The same exclusion filter is usually registered as both a descent filter
/// and a leaf filter; the memo makes sure it runs once per entry.
pub(crate) struct FilterMemo {
    results: Vec<Option<bool>>,
}

impl FilterMemo {
    fn new(filters: usize) -> Self {
        Self {
            results: vec![None; filters],
        }
    }
}

/// One directory on the traversal stack.
struct Frame {
    dir: PathBuf,
    relative: PathBuf,
    depth: usize,
    searches: Vec<Rc<Search>>,
    /// `None` until the directory is listed on first visit.
    entries: Option<std::vec::IntoIter<FileRecord>>,
    /// Own match held back until the subtree below it is exhausted.
    deferred: Option<FileRecord>,
}

impl Frame {
    fn new(dir: PathBuf, relative: PathBuf, depth: usize, searches: Vec<Rc<Search>>) -> Self {
        Self {
            dir,
            relative,
            depth,
            searches,
            entries: None,
            deferred: None,
        }
    }
}

/// Pull-based iterator over matched entries.
///
/// Directories are listed only when the walk reaches them, so dropping the
/// iterator early leaves the rest of the tree untouched.
pub struct FinderIter<'a> {
    finder: &'a Finder,
    plan: std::vec::IntoIter<(PathBuf, Vec<Rc<Search>>)>,
    stack: Vec<Frame>,
}

impl<'a> FinderIter<'a> {
    pub(crate) fn new(finder: &'a Finder, plan: Vec<(PathBuf, Vec<Rc<Search>>)>) -> Self {
        Self {
            finder,
            plan: plan.into_iter(),
            stack: Vec::new(),
        }
    }
}

impl Iterator for FinderIter<'_> {
    type Item = Result<FileRecord, IndexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        let finder = self.finder;

        loop {
            let Some(frame) = self.stack.last_mut() else {
                let (dir, searches) = self.plan.next()?;
                self.stack
                    .push(Frame::new(dir, PathBuf::new(), 0, searches));
                continue;
            };

            if let Some(record) = frame.deferred.take() {
                return Some(Ok(record));
            }

            if frame.entries.is_none() {
                match list_dir(finder, &frame.dir, &frame.relative, frame.depth) {
                    Ok(Some(entries)) => frame.entries = Some(entries.into_iter()),
                    Ok(None) => {
                        self.stack.pop();
                        continue;
                    }
                    Err(e) => {
                        self.stack.pop();
                        return Some(Err(e));
                    }
                }
            }

            let Some(record) = frame.entries.as_mut().and_then(Iterator::next) else {
                self.stack.pop();
                continue;
            };

            let mut memo = FilterMemo::new(finder.filters.len());

            let sub_searches: Vec<Rc<Search>> = if record.is_dir() {
                frame
                    .searches
                    .iter()
                    .filter(|s| {
                        s.recursive && finder.prove(&finder.descent_filters, &record, &mut memo)
                    })
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };

            let relative_pathname = record.relative_pathname();
            let matched = frame.searches.iter().any(|s| {
                s.mode == record.kind
                    && s.matcher.is_match(&relative_pathname)
                    && finder.prove(&finder.leaf_filters, &record, &mut memo)
            });

            if sub_searches.is_empty() {
                if matched {
                    return Some(Ok(record));
                }
                continue;
            }

            let child = Frame::new(
                record.path.clone(),
                frame.relative.join(record.file_name()),
                frame.depth + 1,
                sub_searches,
            );

            if finder.child_first {
                if matched {
                    frame.deferred = Some(record);
                }
                self.stack.push(child);
                continue;
            }

            self.stack.push(child);
            if matched {
                return Some(Ok(record));
            }
        }
    }
}

/// List the direct children of `dir`, honouring depth limit, unreadable
/// directory policy and the per-level sort.
fn list_dir(
    finder: &Finder,
    dir: &Path,
    relative: &Path,
    depth: usize,
) -> Result<Option<Vec<FileRecord>>, IndexerError> {
    if finder.max_depth.is_some_and(|max| depth > max) {
        return Ok(None);
    }

    let read = match std::fs::read_dir(dir) {
        Ok(read) => read,
        Err(e) if finder.ignore_unreadable_dirs => {
            debug!(path = ?dir, error = %e, "Skipping unreadable directory");
            return Ok(None);
        }
        Err(source) => {
            return Err(IndexerError::UnreadableDirectory {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let absolute = dir.is_absolute();
    let mut records: Vec<FileRecord> = read
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let joined = dir.join(entry.file_name());
            let path = if absolute {
                joined
            } else {
                joined
                    .strip_prefix(".")
                    .map(Path::to_path_buf)
                    .unwrap_or(joined)
            };
            FileRecord::from_path(path, relative.to_path_buf())
        })
        .collect();

    if let Some(cmp) = &finder.sort {
        records.sort_by(|a, b| cmp(a, b));
    }

    Ok(Some(records))
}

impl Finder {
    /// Run `filters` against `record`, reusing results already in `memo`.
    pub(crate) fn prove(&self, filters: &[usize], record: &FileRecord, memo: &mut FilterMemo) -> bool {
        filters.iter().all(|&idx| {
            *memo.results[idx].get_or_insert_with(|| (self.filters[idx])(record))
        })
    }
}
