//! Error types for the catalog coordination layer.

use crate::namespace::Namespace;
use keeldb_storage::StorageError;
use thiserror::Error;

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors that can occur in the catalog coordination layer.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// KV engine error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The caller requested directory-per-database but the engine cannot
    /// provide it.
    #[error("storage engine does not support one directory per database")]
    DirectoryPerDbUnsupported,

    /// The engine rejected its configuration while the catalog record store
    /// was being created. Usually caused by an invalid configuration
    /// string; there is no point in a stack trace.
    #[error("invalid engine configuration: {message}")]
    InvalidEngineConfig {
        /// The engine's diagnostic.
        message: String,
    },

    /// Bootstrap could not bring up the catalog. The process cannot run
    /// without one; the embedder decides how to terminate.
    #[error("storage engine startup failed: {message}")]
    Startup {
        /// Description of the failure.
        message: String,
    },

    /// The coordination layer has been shut down.
    #[error("storage engine is shut down")]
    ShutDown,

    /// No database with this name is registered.
    #[error("database not found: {name}")]
    DatabaseNotFound {
        /// Name of the database.
        name: String,
    },

    /// The catalog has no entry for this namespace.
    #[error("collection not found: {namespace}")]
    CollectionNotFound {
        /// The namespace that was requested.
        namespace: Namespace,
    },

    /// The collection exists but has no index with this name.
    #[error("index not found: {name} on {namespace}")]
    IndexNotFound {
        /// The namespace that was searched.
        namespace: Namespace,
        /// Name of the index.
        name: String,
    },

    /// The catalog references collection data the engine no longer holds.
    /// The engine is the source of truth for data, so the collection cannot
    /// be reconstructed.
    #[error("expected collection does not exist, ns: {namespace} ident: {ident}")]
    UnrecoverableRollback {
        /// The catalog-declared namespace.
        namespace: Namespace,
        /// The missing ident.
        ident: String,
    },

    /// `begin_backup` was called while a backup was already in progress.
    #[error("already in backup mode")]
    AlreadyInBackup,

    /// A catalog record failed to decode.
    #[error("corrupt catalog entry: {message}")]
    CorruptCatalogEntry {
        /// Description of the decode failure.
        message: String,
    },
}

impl CatalogError {
    /// Creates an invalid-engine-configuration error.
    pub fn invalid_engine_config(message: impl Into<String>) -> Self {
        Self::InvalidEngineConfig {
            message: message.into(),
        }
    }

    /// Creates a startup error.
    pub fn startup(message: impl Into<String>) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }

    /// Creates a database-not-found error.
    pub fn database_not_found(name: impl Into<String>) -> Self {
        Self::DatabaseNotFound { name: name.into() }
    }

    /// Creates a collection-not-found error.
    pub fn collection_not_found(namespace: Namespace) -> Self {
        Self::CollectionNotFound { namespace }
    }

    /// Creates an index-not-found error.
    pub fn index_not_found(namespace: Namespace, name: impl Into<String>) -> Self {
        Self::IndexNotFound {
            namespace,
            name: name.into(),
        }
    }

    /// Creates an unrecoverable-rollback error.
    pub fn unrecoverable_rollback(namespace: Namespace, ident: impl Into<String>) -> Self {
        Self::UnrecoverableRollback {
            namespace,
            ident: ident.into(),
        }
    }

    /// Creates a corrupt-catalog-entry error.
    pub fn corrupt_entry(message: impl Into<String>) -> Self {
        Self::CorruptCatalogEntry {
            message: message.into(),
        }
    }
}
