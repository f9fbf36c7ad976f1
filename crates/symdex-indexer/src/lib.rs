//! Symdex Indexer
//!
//! This crate provides the indexing engine for Symdex, including:
//! - Glob mask compilation and lazy, filterable directory traversal
//! - Symbol extraction from source token streams
//! - An incremental symbol -> file index with conflict and miss tracking
//! - Lock-protected persistence of the index across processes

mod error;
pub mod finder;
pub mod index;
pub mod scanner;
pub mod storage;

pub use error::IndexerError;
pub use finder::{EntryKind, FileRecord, Finder, FinderIter, Matcher};
pub use index::{IndexContext, IndexStats, Session, SourceSet, SymbolIndex, RETRY_LIMIT};
pub use scanner::{Lexer, SourceLexer, SymbolScanner};
pub use storage::{CacheSnapshot, CacheStore, LoadOutcome, SymbolEntry};
