//! Incremental symbol index.
//!
//! [`SymbolIndex`] maps every declared symbol to the file defining it and
//! keeps that map in step with the filesystem: full rebuilds reuse the
//! results for files whose mtime did not move, single stale files are
//! rescanned on lookup, and names that never resolve stop costing
//! filesystem work after [`RETRY_LIMIT`] attempts.
//!
//! The index holds no hidden per-process state. Whether this process has
//! already refreshed, and whether there is unsaved work, lives in a
//! [`Session`] owned by the caller.

mod sources;

pub use sources::{default_accept_files, default_ignore_dirs, SourceFile, SourceSet};

use crate::finder::file_mtime;
use crate::scanner::SymbolScanner;
use crate::storage::{CacheSnapshot, SymbolEntry};
use crate::IndexerError;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Consecutive failed lookups after which a name is no longer searched for.
pub const RETRY_LIMIT: u32 = 3;

/// Everything the index needs to (re)scan sources.
pub struct IndexContext {
    pub sources: SourceSet,
    pub scanner: SymbolScanner,
    /// Rescan on lookups that miss or hit a stale file
    pub auto_rebuild: bool,
}

impl IndexContext {
    pub fn new(sources: SourceSet, scanner: SymbolScanner) -> Self {
        Self {
            sources,
            scanner,
            auto_rebuild: true,
        }
    }
}

/// Per-process state of one index user.
///
/// Starts empty; whoever owns it is expected to persist the index when
/// the session ends dirty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    refreshed: bool,
    dirty: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a full rebuild already ran in this session.
    pub fn is_refreshed(&self) -> bool {
        self.refreshed
    }

    /// Whether the index changed since it was last persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

/// Work counters, not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Full rebuilds performed
    pub walks: usize,
    /// Files handed to the scanner
    pub scanned_files: usize,
}

/// In-memory symbol map with miss counters and empty-file records.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    symbols: BTreeMap<String, SymbolEntry>,
    missing: BTreeMap<String, u32>,
    empty_files: BTreeMap<PathBuf, u64>,
    stats: IndexStats,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: CacheSnapshot) -> Self {
        Self {
            symbols: snapshot.symbols,
            missing: snapshot.missing,
            empty_files: snapshot.empty_files,
            stats: IndexStats::default(),
        }
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            symbols: self.symbols.clone(),
            missing: self.missing.clone(),
            empty_files: self.empty_files.clone(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&SymbolEntry> {
        self.symbols.get(name)
    }

    pub fn symbols(&self) -> &BTreeMap<String, SymbolEntry> {
        &self.symbols
    }

    /// Symbol name -> owning file.
    pub fn indexed_symbols(&self) -> BTreeMap<String, PathBuf> {
        self.symbols
            .iter()
            .map(|(name, entry)| (name.clone(), entry.file.clone()))
            .collect()
    }

    pub fn miss_count(&self, name: &str) -> u32 {
        self.missing.get(name).copied().unwrap_or(0)
    }

    pub fn empty_files(&self) -> &BTreeMap<PathBuf, u64> {
        &self.empty_files
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    /// Walk every source again and rebuild the symbol map.
    ///
    /// Files whose path and mtime match the previous state are not
    /// rescanned. Miss counters survive, except for names found again.
    /// On error the previous state is kept and the session is not marked
    /// refreshed.
    pub fn rebuild(
        &mut self,
        ctx: &IndexContext,
        session: &mut Session,
    ) -> Result<(), IndexerError> {
        let started = Instant::now();
        self.stats.walks += 1;

        // File -> (mtime, symbols) as of the previous state.
        let mut known: HashMap<&Path, (u64, Vec<&str>)> = self
            .empty_files
            .iter()
            .map(|(file, mtime)| (file.as_path(), (*mtime, Vec::new())))
            .collect();
        for (name, entry) in &self.symbols {
            known
                .entry(entry.file.as_path())
                .or_insert_with(|| (entry.mtime, Vec::new()))
                .1
                .push(name);
        }

        let mut symbols: BTreeMap<String, SymbolEntry> = BTreeMap::new();
        let mut missing = self.missing.clone();
        let mut empty_files: BTreeMap<PathBuf, u64> = BTreeMap::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut scanned = 0usize;

        let walked = ctx.sources.visit(|file| {
            if !seen.insert(file.path.clone()) {
                return Ok(());
            }

            let found: Vec<String> = match known.remove(file.path.as_path()) {
                Some((mtime, names)) if mtime == file.mtime => {
                    names.into_iter().map(str::to_string).collect()
                }
                _ => {
                    scanned += 1;
                    ctx.scanner.scan_file(&file.path, file.single_file)?
                }
            };

            if found.is_empty() {
                empty_files.insert(file.path, file.mtime);
                return Ok(());
            }

            for symbol in found {
                if let Some(existing) = symbols.get(&symbol) {
                    return Err(IndexerError::AmbiguousSymbol {
                        symbol,
                        first: existing.file.clone(),
                        second: file.path,
                    });
                }
                missing.remove(&symbol);
                symbols.insert(
                    symbol,
                    SymbolEntry {
                        file: file.path.clone(),
                        mtime: file.mtime,
                    },
                );
            }
            Ok(())
        });

        self.stats.scanned_files += scanned;
        walked?;

        self.symbols = symbols;
        self.missing = missing;
        self.empty_files = empty_files;
        session.refreshed = true;
        session.dirty = true;
        info!(
            files = seen.len(),
            scanned,
            symbols = self.symbols.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Index rebuilt"
        );
        Ok(())
    }

    /// Rebuild without reusing anything: every file is rescanned and all
    /// miss counters are dropped. The previous state survives a failure.
    pub fn rebuild_clean(
        &mut self,
        ctx: &IndexContext,
        session: &mut Session,
    ) -> Result<(), IndexerError> {
        let previous = std::mem::replace(
            self,
            Self {
                stats: self.stats,
                ..Self::default()
            },
        );
        if let Err(e) = self.rebuild(ctx, session) {
            let stats = self.stats;
            *self = Self { stats, ..previous };
            return Err(e);
        }
        Ok(())
    }

    /// Rebuild unless this session already did. Returns whether it ran.
    pub fn refresh(
        &mut self,
        ctx: &IndexContext,
        session: &mut Session,
    ) -> Result<bool, IndexerError> {
        if session.refreshed {
            return Ok(false);
        }
        self.rebuild(ctx, session)?;
        Ok(true)
    }

    /// Rescan a single file whose recorded mtime went stale.
    ///
    /// A symbol now claimed by another file whose own mtime drifted causes
    /// that file to be rescanned first; only a conflict that survives this
    /// is reported.
    pub fn update_file(&mut self, file: &Path, ctx: &IndexContext) -> Result<(), IndexerError> {
        self.symbols.retain(|_, entry| entry.file != file);
        self.empty_files.remove(file);

        let mtime = if file.is_file() { file_mtime(file) } else { None };
        let Some(mtime) = mtime else {
            debug!(path = ?file, "Dropped vanished file");
            return Ok(());
        };

        self.stats.scanned_files += 1;
        let found = ctx
            .scanner
            .scan_file(file, ctx.sources.is_single_file(file))?;
        debug!(path = ?file, symbols = found.len(), "Rescanned stale file");

        if found.is_empty() {
            self.empty_files.insert(file.to_path_buf(), mtime);
            return Ok(());
        }

        for symbol in found {
            if let Some(prev) = self.symbols.get(&symbol).cloned() {
                if file_mtime(&prev.file) != Some(prev.mtime) {
                    self.update_file(&prev.file, ctx)?;
                }
                if let Some(prev) = self.symbols.get(&symbol) {
                    return Err(IndexerError::AmbiguousSymbol {
                        symbol,
                        first: prev.file.clone(),
                        second: file.to_path_buf(),
                    });
                }
            }
            self.missing.remove(&symbol);
            self.symbols.insert(
                symbol,
                SymbolEntry {
                    file: file.to_path_buf(),
                    mtime,
                },
            );
        }
        Ok(())
    }

    /// Locate the file defining `name`, rescanning as needed.
    ///
    /// Returns `Ok(None)` when the name cannot be resolved. Once a name has
    /// missed [`RETRY_LIMIT`] times it is answered from memory alone.
    pub fn resolve(
        &mut self,
        name: &str,
        ctx: &IndexContext,
        session: &mut Session,
    ) -> Result<Option<PathBuf>, IndexerError> {
        let misses = self.miss_count(name);
        if misses >= RETRY_LIMIT {
            return Ok(None);
        }

        let mut entry = self.symbols.get(name).cloned();

        if ctx.auto_rebuild {
            let current = entry
                .as_ref()
                .and_then(|e| if e.file.is_file() { file_mtime(&e.file) } else { None });

            match (&entry, current) {
                (Some(e), Some(mtime)) if mtime == e.mtime => {}
                (Some(e), Some(_)) => {
                    let file = e.file.clone();
                    self.update_file(&file, ctx)?;
                    session.dirty = true;
                    entry = self.symbols.get(name).cloned();
                }
                _ => {
                    if self.refresh(ctx, session)? {
                        entry = self.symbols.get(name).cloned();
                    }
                }
            }

            if !entry.as_ref().is_some_and(|e| e.file.is_file()) {
                let count = (misses + 1).min(RETRY_LIMIT);
                self.symbols.remove(name);
                self.missing.insert(name.to_string(), count);
                session.dirty = true;
                debug!(symbol = name, misses = count, "Symbol not resolved");
                return Ok(None);
            }
        }

        let Some(entry) = entry else {
            return Ok(None);
        };
        if self.missing.remove(name).is_some() {
            session.dirty = true;
        }
        Ok(Some(entry.file))
    }
}
