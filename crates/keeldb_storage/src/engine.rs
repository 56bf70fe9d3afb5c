//! KV engine trait definition.

use crate::error::StorageResult;
use crate::record_store::RecordStore;
use crate::recovery::{OperationContext, RecoveryUnit};
use crate::types::{CollectionConfig, Prefix, Timestamp};
use std::sync::Arc;

/// Observer of journal durability.
///
/// The engine notifies the listener each time writes up to a timestamp
/// become durable.
pub trait JournalListener: Send + Sync {
    /// Called when every write at or below `token` has reached the journal.
    fn on_durable(&self, token: Timestamp);
}

/// Access to the engine's committed-snapshot machinery.
pub trait SnapshotManager: Send + Sync {
    /// Returns the timestamp of the latest snapshot known committed on a
    /// majority of the replica set, if one has been established.
    fn committed_snapshot(&self) -> Option<Timestamp>;
}

/// A low-level key/value engine.
///
/// Engines expose **idents**: opaque, named containers capable of holding
/// record streams or index data. The catalog coordination layer composes
/// idents into databases and collections; engines never see those concepts.
///
/// # Invariants
///
/// - Idents are stable across restarts.
/// - `all_idents` and `has_ident` agree with each other within one
///   operation's snapshot.
/// - Engines must be `Send + Sync` for concurrent access.
pub trait KvEngine: Send + Sync {
    /// Returns true if `ident` exists in the engine.
    fn has_ident(&self, ctx: &OperationContext, ident: &str) -> bool;

    /// Returns every ident known to the engine.
    fn all_idents(&self, ctx: &OperationContext) -> Vec<String>;

    /// Removes `ident` and all data it holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the ident does not exist or cannot be dropped.
    fn drop_ident(&self, ctx: &OperationContext, ident: &str) -> StorageResult<()>;

    /// Attempts salvage of a damaged ident.
    ///
    /// # Errors
    ///
    /// Returns an error if the ident does not exist or repair fails.
    fn repair_ident(&self, ctx: &OperationContext, ident: &str) -> StorageResult<()>;

    /// Creates a record store inside a shared (grouped) table.
    ///
    /// `prefix` distinguishes this store's records within the table;
    /// [`Prefix::NOT_PREFIXED`] requests a dedicated table.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::BadValue`](crate::StorageError::BadValue) if
    /// the engine rejects its configuration, or another error if creation
    /// fails.
    fn create_grouped_record_store(
        &self,
        ctx: &OperationContext,
        ns: &str,
        ident: &str,
        config: &CollectionConfig,
        prefix: Prefix,
    ) -> StorageResult<()>;

    /// Opens an existing grouped record store.
    ///
    /// # Errors
    ///
    /// Returns an error if the ident does not exist.
    fn get_grouped_record_store(
        &self,
        ctx: &OperationContext,
        ns: &str,
        ident: &str,
        config: &CollectionConfig,
        prefix: Prefix,
    ) -> StorageResult<Arc<dyn RecordStore>>;

    /// Creates a fresh transaction handle.
    fn new_recovery_unit(&self) -> Box<dyn RecoveryUnit>;

    /// Flushes buffered writes, returning the number of files flushed.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush_all_files(&self, ctx: &OperationContext, sync: bool) -> StorageResult<usize>;

    /// Puts the engine into backup mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot enter backup mode.
    fn begin_backup(&self, ctx: &OperationContext) -> StorageResult<()>;

    /// Takes the engine out of backup mode.
    fn end_backup(&self, ctx: &OperationContext);

    /// Returns true if committed writes survive process death.
    fn is_durable(&self) -> bool;

    /// Returns true if all data lives in memory only.
    fn is_ephemeral(&self) -> bool;

    /// Returns the engine's snapshot manager, if it has one.
    fn snapshot_manager(&self) -> Option<Arc<dyn SnapshotManager>>;

    /// Installs the journal durability listener.
    fn set_journal_listener(&self, listener: Box<dyn JournalListener>);

    /// Advances the latest timestamp guaranteed not to be rolled back.
    fn set_stable_timestamp(&self, ts: Timestamp);

    /// Sets the timestamp at which initial data sync completed.
    fn set_initial_data_timestamp(&self, ts: Timestamp);

    /// Advances the oldest timestamp readable by snapshots.
    fn set_oldest_timestamp(&self, ts: Timestamp);

    /// Returns true if the engine can rewind to the stable timestamp.
    fn supports_recover_to_stable_timestamp(&self) -> bool;

    /// Rewinds all data to the stable timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine does not support the operation or the
    /// rewind fails.
    fn recover_to_stable_timestamp(&self) -> StorageResult<()>;

    /// Returns true if the engine serves reads from the committed snapshot.
    fn supports_read_concern_snapshot(&self) -> bool;

    /// Notifies the engine that a replication batch has been fully applied.
    fn replication_batch_complete(&self);

    /// Returns true if the engine locks at document granularity.
    fn supports_doc_locking(&self) -> bool;

    /// Returns true if the engine locks at database granularity.
    fn supports_db_locking(&self) -> bool;

    /// Returns true if the engine can place each database in its own
    /// directory.
    fn supports_directory_per_db(&self) -> bool;

    /// Flushes and quiesces the engine ahead of process exit. The engine
    /// object itself stays alive; its owner decides when to drop it.
    fn clean_shutdown(&self);
}
