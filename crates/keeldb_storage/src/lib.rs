//! # KeelDB Storage
//!
//! KV engine contract and implementations for KeelDB.
//!
//! This crate defines the boundary between KeelDB's catalog coordination
//! layer and the underlying key/value engine. Engines expose **idents**:
//! opaque, named containers holding record streams or index data. The
//! coordination layer above reasons about databases and collections; this
//! crate only knows about idents, record stores, and transactions.
//!
//! ## Design Principles
//!
//! - Engines are black boxes behind the [`KvEngine`] trait; the layer above
//!   never assumes anything about on-disk layout.
//! - Every mutating operation runs inside a [`WriteUnitOfWork`] scoped to an
//!   [`OperationContext`]; dropping the unit without committing aborts it.
//! - Engines must be `Send + Sync` for concurrent access.
//!
//! ## Available Engines
//!
//! - [`InMemoryEngine`] - For testing and ephemeral databases.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod engine;
mod error;
mod memory;
mod record_store;
mod recovery;
mod types;

pub use engine::{JournalListener, KvEngine, SnapshotManager};
pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryEngine, MemoryRecoveryUnit};
pub use record_store::RecordStore;
pub use recovery::{OperationContext, RecoveryUnit, TxnChange, WriteUnitOfWork};
pub use types::{CollectionConfig, Prefix, RecordId, Timestamp};
