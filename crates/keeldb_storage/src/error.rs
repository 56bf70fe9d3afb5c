//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur at the KV engine boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The engine rejected its configuration string.
    #[error("invalid engine configuration: {0}")]
    BadValue(String),

    /// The requested ident does not exist in the engine.
    #[error("ident not found: {ident}")]
    IdentNotFound {
        /// The ident that was requested.
        ident: String,
    },

    /// An ident with this name already exists.
    #[error("ident already exists: {ident}")]
    IdentExists {
        /// The ident that collided.
        ident: String,
    },

    /// The requested record does not exist in its record store.
    #[error("record not found: {id} in ident {ident}")]
    RecordNotFound {
        /// The ident of the record store.
        ident: String,
        /// The raw record id.
        id: u64,
    },

    /// Stored data failed validation.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// The engine does not implement the requested operation.
    #[error("operation not supported by this engine: {0}")]
    Unsupported(&'static str),
}
