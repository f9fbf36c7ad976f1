//! Persisted form of the symbol index.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Owning file of a symbol and its mtime when it was scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub file: PathBuf,
    pub mtime: u64,
}

/// The index state as written to and read from the cache artifact.
///
/// Sorted maps keep the encoding stable, so an unchanged index always
/// serializes to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Symbol name -> owning file
    pub symbols: BTreeMap<String, SymbolEntry>,
    /// Symbol name -> consecutive failed lookups
    pub missing: BTreeMap<String, u32>,
    /// Files that declare nothing -> mtime when scanned
    pub empty_files: BTreeMap<PathBuf, u64>,
}

impl CacheSnapshot {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.missing.is_empty() && self.empty_files.is_empty()
    }
}
