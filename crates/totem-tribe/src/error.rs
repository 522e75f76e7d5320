//! Error types for the tribe store.

use thiserror::Error;

/// Result type for tribe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tribe operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Local storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Initial connection to a tribe failed
    #[error("Could not connect to tribe: {0}")]
    Connect(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// An operation needs a local member and none is selected
    #[error("No local member selected")]
    NoLocalMember,

    /// Rejected by the domain model
    #[error(transparent)]
    Domain(#[from] totem_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(e: rocksdb::Error) -> Self {
        Error::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(e.to_string())
    }
}
