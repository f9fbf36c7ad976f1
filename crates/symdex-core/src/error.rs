//! Core error types for Symdex.

use symdex_indexer::IndexerError;
use thiserror::Error;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error raised by the indexing engine
    #[error(transparent)]
    Indexer(#[from] IndexerError),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}
