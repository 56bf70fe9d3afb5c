//! Storage engine facade.
//!
//! Composes the KV engine, the durable catalog, and the database registry
//! into the surface the database service runs against: bootstrap and
//! recovery, catalog/ident reconciliation, database drops, backup
//! lifecycle, and timestamp pass-through.

use crate::catalog::{DurableCatalog, CATALOG_IDENT};
use crate::clock::ClusterClock;
use crate::config::EngineOptions;
use crate::error::{CatalogError, CatalogResult};
use crate::namespace::Namespace;
use crate::registry::{DatabaseCatalogEntry, DatabaseCatalogEntryFactory, DatabaseRegistry};
use keeldb_storage::{
    CollectionConfig, JournalListener, KvEngine, OperationContext, Prefix, RecordStore,
    RecoveryUnit, SnapshotManager, StorageError, Timestamp, WriteUnitOfWork,
};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Restores a saved commit timestamp when the scope exits.
struct RestoreCommitTimestamp<'a> {
    ctx: &'a OperationContext,
    saved: Timestamp,
}

impl Drop for RestoreCommitTimestamp<'_> {
    fn drop(&mut self) {
        if !self.saved.is_null() {
            self.ctx.set_commit_timestamp(self.saved);
        }
    }
}

/// Clears the commit timestamp when the scope exits, if armed.
struct ClearCommitTimestamp<'a> {
    ctx: &'a OperationContext,
    armed: bool,
}

impl Drop for ClearCommitTimestamp<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.ctx.clear_commit_timestamp();
        }
    }
}

/// The catalog coordination layer over a KV engine.
///
/// Construction bootstraps the durable catalog and the database registry;
/// the service then opens databases on demand, reconciles once after
/// startup (and after recovering to the stable timestamp), and eventually
/// drops databases or shuts down cleanly.
///
/// The engine reference is shared, not owned:
/// [`StorageEngine::clean_shutdown`] quiesces the engine but leaves its
/// lifetime to the caller.
pub struct StorageEngine {
    engine: Arc<dyn KvEngine>,
    clock: Arc<dyn ClusterClock>,
    options: EngineOptions,
    factory: DatabaseCatalogEntryFactory,
    catalog: RwLock<Option<Arc<DurableCatalog>>>,
    catalog_record_store: RwLock<Option<Arc<dyn RecordStore>>>,
    registry: DatabaseRegistry,
    supports_doc_locking: bool,
    supports_db_locking: bool,
    in_backup: Mutex<bool>,
    initial_data_ts: AtomicU64,
}

impl StorageEngine {
    /// Bootstraps the coordination layer.
    ///
    /// Ensures the catalog record store exists (creating it inside a write
    /// unit of work if not), optionally repairs it, loads every collection
    /// through its database handle, and seeds the global prefix allocator
    /// with the largest persisted prefix.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DirectoryPerDbUnsupported`] on a
    /// configuration mismatch, [`CatalogError::InvalidEngineConfig`] if the
    /// engine rejects its configuration string while the catalog is being
    /// created, and [`CatalogError::Startup`] for any other failure to
    /// bring up the catalog. All of these leave the system unusable; the
    /// embedder decides how to terminate.
    pub fn new(
        engine: Arc<dyn KvEngine>,
        clock: Arc<dyn ClusterClock>,
        options: EngineOptions,
        factory: DatabaseCatalogEntryFactory,
    ) -> CatalogResult<Self> {
        if options.directory_per_db && !engine.supports_directory_per_db() {
            return Err(CatalogError::DirectoryPerDbUnsupported);
        }

        let supports_doc_locking = engine.supports_doc_locking();
        let supports_db_locking = engine.supports_db_locking();

        let ctx = OperationContext::new(engine.new_recovery_unit());
        let catalog_exists = engine.has_ident(&ctx, CATALOG_IDENT);

        if options.for_repair && catalog_exists {
            info!("repairing catalog metadata");
            if let Err(error) = engine.repair_ident(&ctx, CATALOG_IDENT) {
                // Best effort; real damage surfaces through reconciliation.
                warn!(%error, "catalog repair failed");
            }
        }

        if !catalog_exists {
            let wuow = WriteUnitOfWork::new(&ctx);
            match engine.create_grouped_record_store(
                &ctx,
                CATALOG_IDENT,
                CATALOG_IDENT,
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            ) {
                Ok(()) => {}
                Err(StorageError::BadValue(message)) => {
                    return Err(CatalogError::invalid_engine_config(message));
                }
                Err(error) => {
                    return Err(CatalogError::startup(format!(
                        "creating catalog record store: {error}"
                    )));
                }
            }
            wuow.commit().map_err(|error| {
                CatalogError::startup(format!("committing catalog creation: {error}"))
            })?;
        }

        let record_store = engine
            .get_grouped_record_store(
                &ctx,
                CATALOG_IDENT,
                CATALOG_IDENT,
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .map_err(|error| {
                CatalogError::startup(format!("opening catalog record store: {error}"))
            })?;

        let catalog = Arc::new(DurableCatalog::new(
            Arc::clone(&record_store),
            options.directory_per_db,
            options.directory_for_indexes,
        ));
        catalog.init(&ctx)?;

        let registry = DatabaseRegistry::new();
        let mut max_seen_prefix = Prefix::NOT_PREFIXED;
        for ns in catalog.all_collections() {
            // No rollback staging here: these databases are all committed.
            let entry = registry.get_or_create(ns.db(), &factory);
            entry.init_collection(&ctx, &ns, options.for_repair)?;
            max_seen_prefix = max_seen_prefix.max(catalog.metadata(&ns)?.max_prefix());
        }
        Prefix::observe_largest(max_seen_prefix);

        ctx.abandon_snapshot();

        Ok(Self {
            engine,
            clock,
            options,
            factory,
            catalog: RwLock::new(Some(catalog)),
            catalog_record_store: RwLock::new(Some(record_store)),
            registry,
            supports_doc_locking,
            supports_db_locking,
            in_backup: Mutex::new(false),
            initial_data_ts: AtomicU64::new(Timestamp::NULL.as_u64()),
        })
    }

    /// Returns the bootstrap options.
    #[must_use]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Returns the durable catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ShutDown`] after `clean_shutdown`.
    pub fn durable_catalog(&self) -> CatalogResult<Arc<DurableCatalog>> {
        self.catalog.read().clone().ok_or(CatalogError::ShutDown)
    }

    /// Returns the record store backing the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ShutDown`] after `clean_shutdown`.
    pub fn catalog_record_store(&self) -> CatalogResult<Arc<dyn RecordStore>> {
        self.catalog_record_store
            .read()
            .clone()
            .ok_or(CatalogError::ShutDown)
    }

    /// Reconciles the engine's ident set against the catalog.
    ///
    /// Three divergences are considered. A user-data ident unknown to the
    /// catalog is dropped: creates and drops are two steps (engine table,
    /// then catalog record), and replication rollback can also leave the
    /// engine ahead of the stable catalog. A catalog collection whose ident
    /// the engine lacks is unrecoverable: the engine is the source of truth
    /// for data. A catalog index whose ident the engine lacks is returned
    /// for the caller to rebuild.
    ///
    /// Idempotent once the engine has converged. Not safe against
    /// concurrent creates and drops; callers serialize it within startup or
    /// recover-to-stable contexts.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnrecoverableRollback`] for a missing
    /// collection ident, or the engine's error if an orphan drop fails.
    pub fn reconcile_catalog_and_idents(
        &self,
        ctx: &OperationContext,
    ) -> CatalogResult<Vec<(Namespace, String)>> {
        let catalog = self.durable_catalog()?;

        let mut engine_idents: BTreeSet<String> =
            self.engine.all_idents(ctx).into_iter().collect();
        engine_idents.remove(CATALOG_IDENT);

        let catalog_idents: BTreeSet<String> = catalog.all_idents().into_iter().collect();

        for ident in &engine_idents {
            if catalog_idents.contains(ident) {
                continue;
            }
            if !catalog.is_user_data_ident(ident) {
                continue;
            }
            info!(%ident, "dropping unknown ident");
            let wuow = WriteUnitOfWork::new(ctx);
            self.engine.drop_ident(ctx, ident)?;
            wuow.commit()?;
        }

        // Startup already opened every collection; this catches divergence
        // from other contexts such as recover-to-stable.
        for ns in catalog.all_collections() {
            let ident = catalog.collection_ident(&ns)?;
            if !engine_idents.contains(&ident) {
                return Err(CatalogError::unrecoverable_rollback(ns, ident));
            }
        }

        let mut to_rebuild = Vec::new();
        for ns in catalog.all_collections() {
            let metadata = catalog.metadata(&ns)?;
            for index in &metadata.indexes {
                let index_ident = catalog.index_ident(&ns, &index.name)?;
                if engine_idents.contains(&index_ident) {
                    continue;
                }
                warn!(
                    namespace = %ns,
                    index = %index.name,
                    ident = %index_ident,
                    "expected index data is missing, rebuilding"
                );
                to_rebuild.push((ns.clone(), index.name.clone()));
            }
        }

        Ok(to_rebuild)
    }

    /// Names of databases that currently hold collections.
    #[must_use]
    pub fn list_databases(&self) -> Vec<String> {
        self.registry.list_databases()
    }

    /// Returns the catalog handle for `name`, creating one if absent.
    /// Database existence is implicit; creation is never rolled back.
    #[must_use]
    pub fn database_catalog_entry(&self, name: &str) -> Arc<dyn DatabaseCatalogEntry> {
        self.registry.get_or_create(name, &self.factory)
    }

    /// Closing a database is a no-op: there is no database layer beneath
    /// the registry.
    ///
    /// # Errors
    ///
    /// Never fails; the `Result` mirrors the service-facing contract.
    pub fn close_database(&self, _ctx: &OperationContext, _name: &str) -> CatalogResult<()> {
        Ok(())
    }

    /// Drops every collection in a database and removes it from the
    /// registry.
    ///
    /// Collections are partitioned into untimestamped drops (everything
    /// except drop-pending namespaces) followed by timestamped drops. Both
    /// phases are attempted even if one fails; the first error observed is
    /// returned after both complete.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DatabaseNotFound`] if no such database is
    /// registered, otherwise the first per-collection drop failure.
    pub fn drop_database(&self, ctx: &OperationContext, name: &str) -> CatalogResult<()> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| CatalogError::database_not_found(name))?;

        // Timestamped collections have already been renamed to drop-pending
        // namespaces; without replication every collection lands in the
        // untimestamped group.
        let (untimestamped, timestamped): (Vec<_>, Vec<_>) = entry
            .collection_namespaces()
            .into_iter()
            .partition(|ns| !ns.is_drop_pending());

        let first = self.drop_collections_untimestamped(ctx, &entry, &untimestamped);
        let second = self.drop_collections_timestamped(ctx, &entry, &timestamped);

        match (first, second) {
            (Err(error), _) => Err(error),
            (Ok(()), second) => second,
        }
    }

    /// Drops collections whose removal must not carry a commit timestamp.
    ///
    /// Returns the first `drop_collection` error; every collection is
    /// attempted regardless.
    fn drop_collections_untimestamped(
        &self,
        ctx: &OperationContext,
        entry: &Arc<dyn DatabaseCatalogEntry>,
        namespaces: &[Namespace],
    ) -> CatalogResult<()> {
        // On primaries no commit timestamp is set here. On secondaries the
        // enclosing oplog application has set one; save it aside so these
        // writes go through without it, and restore it on every exit.
        let saved = ctx.commit_timestamp();
        if !saved.is_null() {
            ctx.clear_commit_timestamp();
        }
        let _restore = RestoreCommitTimestamp { ctx, saved };

        let mut first_error = None;
        let wuow = WriteUnitOfWork::new(ctx);
        for ns in namespaces {
            // In steady-state replication, after drop-pending namespaces are
            // filtered out, only non-replicated collections, `tmp.mr`
            // temporaries, and the legacy `system.indexes` may appear here.
            if self.initial_data_timestamp() != Timestamp::ALLOW_UNSTABLE_CHECKPOINTS {
                assert!(
                    !ns.is_replicated() || ns.is_tmp_map_reduce() || ns.is_system_dot_indexes(),
                    "collection drop is not being timestamped, ns: {ns}"
                );
            }

            if let Err(error) = entry.drop_collection(ctx, ns) {
                first_error.get_or_insert(error);
            }
        }
        wuow.commit()?;

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Drops the remaining (drop-pending) collections under a commit
    /// timestamp and removes the database from the registry.
    fn drop_collections_timestamped(
        &self,
        ctx: &OperationContext,
        entry: &Arc<dyn DatabaseCatalogEntry>,
        namespaces: &[Namespace],
    ) -> CatalogResult<()> {
        // Secondaries arrive with a commit timestamp already set; these
        // drops inherit it. Primaries consult the cluster clock. A null
        // cluster time means no replication; leave the writes untimestamped.
        let existing = ctx.commit_timestamp();
        let chosen = self.clock.cluster_time();
        let set_ts = existing.is_null() && !chosen.is_null();
        if set_ts {
            ctx.set_commit_timestamp(chosen);
        }
        let _clear = ClearCommitTimestamp { ctx, armed: set_ts };

        let wuow = WriteUnitOfWork::new(ctx);
        let mut first_error = None;
        for ns in namespaces {
            if let Err(error) = entry.drop_collection(ctx, ns) {
                first_error.get_or_insert(error);
            }
        }

        let leftover = entry.collection_namespaces();
        assert!(
            leftover.is_empty(),
            "dropping database {} left namespaces behind: {leftover:?}",
            entry.name()
        );

        self.registry.stage_removal(ctx, entry);
        wuow.commit()?;

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Repairs the ident behind `ns` and reopens the collection.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CollectionNotFound`] if the namespace has no
    /// catalog entry, the engine's repair failure, or
    /// [`CatalogError::DatabaseNotFound`] if the catalog knows the
    /// collection but its database is not registered.
    pub fn repair_record_store(&self, ctx: &OperationContext, ns: &Namespace) -> CatalogResult<()> {
        let catalog = self.durable_catalog()?;
        self.engine.repair_ident(ctx, &catalog.collection_ident(ns)?)?;

        let entry = self
            .registry
            .get(ns.db())
            .ok_or_else(|| CatalogError::database_not_found(ns.db()))?;
        entry.reinit_collection_after_repair(ctx, ns)
    }

    /// Flushes buffered engine writes.
    ///
    /// # Errors
    ///
    /// Returns the engine's flush failure.
    pub fn flush_all_files(&self, ctx: &OperationContext, sync: bool) -> CatalogResult<usize> {
        Ok(self.engine.flush_all_files(ctx, sync)?)
    }

    /// Puts the engine into backup mode.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::AlreadyInBackup`] if a backup is already in
    /// progress, or the engine's failure to enter backup mode.
    pub fn begin_backup(&self, ctx: &OperationContext) -> CatalogResult<()> {
        let mut in_backup = self.in_backup.lock();
        if *in_backup {
            return Err(CatalogError::AlreadyInBackup);
        }
        self.engine.begin_backup(ctx)?;
        *in_backup = true;
        Ok(())
    }

    /// Takes the engine out of backup mode.
    ///
    /// # Panics
    ///
    /// Panics if no backup is in progress.
    pub fn end_backup(&self, ctx: &OperationContext) {
        let mut in_backup = self.in_backup.lock();
        assert!(*in_backup, "end_backup called outside backup mode");
        self.engine.end_backup(ctx);
        *in_backup = false;
    }

    /// Advances the latest timestamp guaranteed not to be rolled back.
    pub fn set_stable_timestamp(&self, ts: Timestamp) {
        self.engine.set_stable_timestamp(ts);
    }

    /// Sets the timestamp at which initial data sync completed. Cached
    /// locally to gate the untimestamped-drop invariant.
    pub fn set_initial_data_timestamp(&self, ts: Timestamp) {
        self.initial_data_ts.store(ts.as_u64(), Ordering::SeqCst);
        self.engine.set_initial_data_timestamp(ts);
    }

    /// Advances the oldest timestamp readable by snapshots.
    pub fn set_oldest_timestamp(&self, ts: Timestamp) {
        self.engine.set_oldest_timestamp(ts);
    }

    fn initial_data_timestamp(&self) -> Timestamp {
        Timestamp::new(self.initial_data_ts.load(Ordering::SeqCst))
    }

    /// Returns true if the engine can rewind to the stable timestamp.
    #[must_use]
    pub fn supports_recover_to_stable_timestamp(&self) -> bool {
        self.engine.supports_recover_to_stable_timestamp()
    }

    /// Rewinds all data to the stable timestamp.
    ///
    /// # Errors
    ///
    /// Returns the engine's failure.
    pub fn recover_to_stable_timestamp(&self) -> CatalogResult<()> {
        Ok(self.engine.recover_to_stable_timestamp()?)
    }

    /// Returns true if the engine serves reads from the committed snapshot.
    #[must_use]
    pub fn supports_read_concern_snapshot(&self) -> bool {
        self.engine.supports_read_concern_snapshot()
    }

    /// Returns true if committed writes survive process death.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.engine.is_durable()
    }

    /// Returns true if all data lives in memory only.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.engine.is_ephemeral()
    }

    /// Returns the engine's snapshot manager, if it has one.
    #[must_use]
    pub fn snapshot_manager(&self) -> Option<Arc<dyn SnapshotManager>> {
        self.engine.snapshot_manager()
    }

    /// Installs the journal durability listener.
    pub fn set_journal_listener(&self, listener: Box<dyn JournalListener>) {
        self.engine.set_journal_listener(listener);
    }

    /// Creates a fresh transaction handle.
    #[must_use]
    pub fn new_recovery_unit(&self) -> Box<dyn RecoveryUnit> {
        self.engine.new_recovery_unit()
    }

    /// Notifies the engine that a replication batch has been fully applied.
    pub fn replication_batch_complete(&self) {
        self.engine.replication_batch_complete();
    }

    /// Returns true if the engine locks at document granularity.
    #[must_use]
    pub fn supports_doc_locking(&self) -> bool {
        self.supports_doc_locking
    }

    /// Returns true if the engine locks at database granularity.
    #[must_use]
    pub fn supports_db_locking(&self) -> bool {
        self.supports_db_locking
    }

    /// Releases every database handle and the catalog, then quiesces the
    /// engine. The engine reference itself belongs to the caller and is
    /// not dropped here.
    pub fn clean_shutdown(&self) {
        self.registry.clear();
        *self.catalog.write() = None;
        *self.catalog_record_store.write() = None;
        self.engine.clean_shutdown();
    }
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("databases", &self.list_databases())
            .field("is_ephemeral", &self.is_ephemeral())
            .finish_non_exhaustive()
    }
}
