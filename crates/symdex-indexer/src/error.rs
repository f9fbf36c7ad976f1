//! Indexer error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during search, scanning and indexing operations.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Invalid mask, missing base directory or otherwise unusable setup
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source file could not be tokenized
    #[error("Scan error in {}: {message}", path.display())]
    Scan { path: PathBuf, message: String },

    /// Two distinct files declare the same symbol
    #[error(
        "Ambiguous symbol {symbol} resolution; defined in {} and in {}",
        first.display(),
        second.display()
    )]
    AmbiguousSymbol {
        symbol: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// I/O error tied to a specific path
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory could not be listed during traversal
    #[error("Unable to read directory {}: {source}", path.display())]
    UnreadableDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error without path context
    #[error("I/O error: {0}")]
    Other(#[from] std::io::Error),
}

impl IndexerError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexerError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for IndexerError {
    fn from(e: serde_json::Error) -> Self {
        IndexerError::Serialization(e.to_string())
    }
}
