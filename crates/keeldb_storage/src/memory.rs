//! In-memory KV engine for testing and ephemeral databases.

use crate::engine::{JournalListener, KvEngine, SnapshotManager};
use crate::error::{StorageError, StorageResult};
use crate::record_store::RecordStore;
use crate::recovery::{OperationContext, RecoveryUnit, TxnChange};
use crate::types::{CollectionConfig, Prefix, RecordId, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Recovery unit backing [`InMemoryEngine`] transactions.
///
/// Tracks unit-of-work nesting depth, the commit timestamp, and the queue
/// of registered changes. Record writes are applied to tables immediately;
/// the transactional surface of this engine is its change callbacks and
/// timestamp state, not record-level MVCC.
#[derive(Default)]
pub struct MemoryRecoveryUnit {
    depth: u32,
    aborted: bool,
    changes: Vec<Box<dyn TxnChange>>,
    commit_ts: Timestamp,
}

impl RecoveryUnit for MemoryRecoveryUnit {
    fn begin_unit_of_work(&mut self) {
        self.depth += 1;
    }

    fn commit_unit_of_work(&mut self) -> StorageResult<()> {
        assert!(self.depth > 0, "commit outside a unit of work");
        self.depth -= 1;
        if self.depth == 0 {
            let changes = std::mem::take(&mut self.changes);
            if self.aborted {
                for change in changes.into_iter().rev() {
                    change.rollback();
                }
            } else {
                for change in changes {
                    change.commit();
                }
            }
            self.aborted = false;
        }
        Ok(())
    }

    fn abort_unit_of_work(&mut self) {
        assert!(self.depth > 0, "abort outside a unit of work");
        self.aborted = true;
        self.depth -= 1;
        if self.depth == 0 {
            let changes = std::mem::take(&mut self.changes);
            for change in changes.into_iter().rev() {
                change.rollback();
            }
            self.aborted = false;
        }
    }

    fn commit_timestamp(&self) -> Timestamp {
        self.commit_ts
    }

    fn set_commit_timestamp(&mut self, ts: Timestamp) {
        self.commit_ts = ts;
    }

    fn clear_commit_timestamp(&mut self) {
        self.commit_ts = Timestamp::NULL;
    }

    fn register_change(&mut self, change: Box<dyn TxnChange>) {
        assert!(self.depth > 0, "change registered outside a unit of work");
        self.changes.push(change);
    }

    fn abandon_snapshot(&mut self) {
        debug_assert!(self.depth == 0, "snapshot abandoned inside a unit of work");
    }
}

struct MemTable {
    ident: String,
    records: RwLock<BTreeMap<u64, Vec<u8>>>,
    next_record_id: AtomicU64,
}

impl MemTable {
    fn new(ident: &str) -> Self {
        Self {
            ident: ident.to_string(),
            records: RwLock::new(BTreeMap::new()),
            next_record_id: AtomicU64::new(1),
        }
    }
}

impl RecordStore for MemTable {
    fn ident(&self) -> &str {
        &self.ident
    }

    fn all_records(&self, _ctx: &OperationContext) -> StorageResult<Vec<(RecordId, Vec<u8>)>> {
        Ok(self
            .records
            .read()
            .iter()
            .map(|(&id, data)| (RecordId::new(id), data.clone()))
            .collect())
    }

    fn insert_record(&self, _ctx: &OperationContext, data: &[u8]) -> StorageResult<RecordId> {
        let id = self.next_record_id.fetch_add(1, Ordering::SeqCst);
        self.records.write().insert(id, data.to_vec());
        Ok(RecordId::new(id))
    }

    fn update_record(
        &self,
        _ctx: &OperationContext,
        id: RecordId,
        data: &[u8],
    ) -> StorageResult<()> {
        match self.records.write().get_mut(&id.as_u64()) {
            Some(slot) => {
                *slot = data.to_vec();
                Ok(())
            }
            None => Err(StorageError::RecordNotFound {
                ident: self.ident.clone(),
                id: id.as_u64(),
            }),
        }
    }

    fn delete_record(&self, _ctx: &OperationContext, id: RecordId) -> StorageResult<()> {
        match self.records.write().remove(&id.as_u64()) {
            Some(_) => Ok(()),
            None => Err(StorageError::RecordNotFound {
                ident: self.ident.clone(),
                id: id.as_u64(),
            }),
        }
    }
}

/// An in-memory KV engine.
///
/// Keeps every ident in a process-local map. Suitable for:
/// - Unit and integration tests
/// - Ephemeral databases that never touch disk
///
/// Reports `is_ephemeral() == true` and `is_durable() == false`; repair is
/// a no-op because there is no disk state to salvage.
///
/// # Example
///
/// ```rust
/// use keeldb_storage::{CollectionConfig, InMemoryEngine, KvEngine, OperationContext, Prefix};
///
/// let engine = InMemoryEngine::new();
/// let ctx = OperationContext::new(engine.new_recovery_unit());
/// engine
///     .create_grouped_record_store(&ctx, "app.events", "collection-1", &CollectionConfig::default(), Prefix::NOT_PREFIXED)
///     .unwrap();
/// assert!(engine.has_ident(&ctx, "collection-1"));
/// ```
pub struct InMemoryEngine {
    tables: RwLock<BTreeMap<String, Arc<MemTable>>>,
    journal_listener: Mutex<Option<Box<dyn JournalListener>>>,
    stable_ts: AtomicU64,
    initial_data_ts: AtomicU64,
    oldest_ts: AtomicU64,
    fail_next_create: Mutex<Option<StorageError>>,
    directory_per_db_supported: AtomicBool,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            journal_listener: Mutex::new(None),
            stable_ts: AtomicU64::new(0),
            initial_data_ts: AtomicU64::new(0),
            oldest_ts: AtomicU64::new(0),
            fail_next_create: Mutex::new(None),
            directory_per_db_supported: AtomicBool::new(true),
        }
    }
}

impl InMemoryEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles the directory-per-database capability report.
    ///
    /// Useful for exercising configuration-mismatch paths.
    pub fn set_supports_directory_per_db(&self, value: bool) {
        self.directory_per_db_supported
            .store(value, Ordering::SeqCst);
    }

    /// Makes the next `create_grouped_record_store` call fail with `err`.
    ///
    /// Useful for exercising bootstrap failure paths.
    pub fn fail_next_create(&self, err: StorageError) {
        *self.fail_next_create.lock() = Some(err);
    }

    /// Creates an ident with records pre-loaded, bypassing the transactional
    /// surface.
    ///
    /// Useful for staging on-"disk" state ahead of a bootstrap in tests.
    pub fn seed_table(&self, ident: &str, records: Vec<Vec<u8>>) {
        let table = MemTable::new(ident);
        {
            let mut map = table.records.write();
            for (i, data) in records.into_iter().enumerate() {
                map.insert(i as u64 + 1, data);
            }
            table
                .next_record_id
                .store(map.len() as u64 + 1, Ordering::SeqCst);
        }
        self.tables.write().insert(ident.to_string(), Arc::new(table));
    }

    /// Returns the last value given to `set_stable_timestamp`.
    #[must_use]
    pub fn stable_timestamp(&self) -> Timestamp {
        Timestamp::new(self.stable_ts.load(Ordering::SeqCst))
    }

    /// Returns the last value given to `set_initial_data_timestamp`.
    #[must_use]
    pub fn initial_data_timestamp(&self) -> Timestamp {
        Timestamp::new(self.initial_data_ts.load(Ordering::SeqCst))
    }

    /// Returns the last value given to `set_oldest_timestamp`.
    #[must_use]
    pub fn oldest_timestamp(&self) -> Timestamp {
        Timestamp::new(self.oldest_ts.load(Ordering::SeqCst))
    }
}

impl KvEngine for InMemoryEngine {
    fn has_ident(&self, _ctx: &OperationContext, ident: &str) -> bool {
        self.tables.read().contains_key(ident)
    }

    fn all_idents(&self, _ctx: &OperationContext) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    fn drop_ident(&self, _ctx: &OperationContext, ident: &str) -> StorageResult<()> {
        match self.tables.write().remove(ident) {
            Some(_) => Ok(()),
            None => Err(StorageError::IdentNotFound {
                ident: ident.to_string(),
            }),
        }
    }

    fn repair_ident(&self, _ctx: &OperationContext, ident: &str) -> StorageResult<()> {
        if self.tables.read().contains_key(ident) {
            Ok(())
        } else {
            Err(StorageError::IdentNotFound {
                ident: ident.to_string(),
            })
        }
    }

    fn create_grouped_record_store(
        &self,
        _ctx: &OperationContext,
        _ns: &str,
        ident: &str,
        _config: &CollectionConfig,
        _prefix: Prefix,
    ) -> StorageResult<()> {
        if let Some(err) = self.fail_next_create.lock().take() {
            return Err(err);
        }
        let mut tables = self.tables.write();
        if tables.contains_key(ident) {
            return Err(StorageError::IdentExists {
                ident: ident.to_string(),
            });
        }
        tables.insert(ident.to_string(), Arc::new(MemTable::new(ident)));
        Ok(())
    }

    fn get_grouped_record_store(
        &self,
        _ctx: &OperationContext,
        _ns: &str,
        ident: &str,
        _config: &CollectionConfig,
        _prefix: Prefix,
    ) -> StorageResult<Arc<dyn RecordStore>> {
        match self.tables.read().get(ident) {
            Some(table) => Ok(Arc::clone(table) as Arc<dyn RecordStore>),
            None => Err(StorageError::IdentNotFound {
                ident: ident.to_string(),
            }),
        }
    }

    fn new_recovery_unit(&self) -> Box<dyn RecoveryUnit> {
        Box::<MemoryRecoveryUnit>::default()
    }

    fn flush_all_files(&self, _ctx: &OperationContext, _sync: bool) -> StorageResult<usize> {
        Ok(self.tables.read().len())
    }

    fn begin_backup(&self, _ctx: &OperationContext) -> StorageResult<()> {
        Ok(())
    }

    fn end_backup(&self, _ctx: &OperationContext) {}

    fn is_durable(&self) -> bool {
        false
    }

    fn is_ephemeral(&self) -> bool {
        true
    }

    fn snapshot_manager(&self) -> Option<Arc<dyn SnapshotManager>> {
        None
    }

    fn set_journal_listener(&self, listener: Box<dyn JournalListener>) {
        *self.journal_listener.lock() = Some(listener);
    }

    fn set_stable_timestamp(&self, ts: Timestamp) {
        self.stable_ts.store(ts.as_u64(), Ordering::SeqCst);
    }

    fn set_initial_data_timestamp(&self, ts: Timestamp) {
        self.initial_data_ts.store(ts.as_u64(), Ordering::SeqCst);
    }

    fn set_oldest_timestamp(&self, ts: Timestamp) {
        self.oldest_ts.store(ts.as_u64(), Ordering::SeqCst);
    }

    fn supports_recover_to_stable_timestamp(&self) -> bool {
        false
    }

    fn recover_to_stable_timestamp(&self) -> StorageResult<()> {
        Err(StorageError::Unsupported("recover_to_stable_timestamp"))
    }

    fn supports_read_concern_snapshot(&self) -> bool {
        false
    }

    fn replication_batch_complete(&self) {}

    fn supports_doc_locking(&self) -> bool {
        true
    }

    fn supports_db_locking(&self) -> bool {
        false
    }

    fn supports_directory_per_db(&self) -> bool {
        self.directory_per_db_supported.load(Ordering::SeqCst)
    }

    fn clean_shutdown(&self) {
        *self.journal_listener.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(engine: &InMemoryEngine) -> OperationContext {
        OperationContext::new(engine.new_recovery_unit())
    }

    #[test]
    fn create_and_drop_ident() {
        let engine = InMemoryEngine::new();
        let ctx = ctx(&engine);

        engine
            .create_grouped_record_store(
                &ctx,
                "app.users",
                "collection-1",
                &CollectionConfig::default(),
                Prefix::new(1),
            )
            .unwrap();
        assert!(engine.has_ident(&ctx, "collection-1"));
        assert_eq!(engine.all_idents(&ctx), vec!["collection-1".to_string()]);

        engine.drop_ident(&ctx, "collection-1").unwrap();
        assert!(!engine.has_ident(&ctx, "collection-1"));
    }

    #[test]
    fn drop_missing_ident_fails() {
        let engine = InMemoryEngine::new();
        let ctx = ctx(&engine);

        let result = engine.drop_ident(&ctx, "collection-9");
        assert!(matches!(result, Err(StorageError::IdentNotFound { .. })));
    }

    #[test]
    fn create_existing_ident_fails() {
        let engine = InMemoryEngine::new();
        let ctx = ctx(&engine);

        engine
            .create_grouped_record_store(
                &ctx,
                "app.users",
                "collection-1",
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();
        let result = engine.create_grouped_record_store(
            &ctx,
            "app.users",
            "collection-1",
            &CollectionConfig::default(),
            Prefix::NOT_PREFIXED,
        );
        assert!(matches!(result, Err(StorageError::IdentExists { .. })));
    }

    #[test]
    fn injected_create_error_fires_once() {
        let engine = InMemoryEngine::new();
        let ctx = ctx(&engine);

        engine.fail_next_create(StorageError::BadValue("bad config string".into()));
        let result = engine.create_grouped_record_store(
            &ctx,
            "app.users",
            "collection-1",
            &CollectionConfig::default(),
            Prefix::NOT_PREFIXED,
        );
        assert!(matches!(result, Err(StorageError::BadValue(_))));

        // The next attempt goes through.
        engine
            .create_grouped_record_store(
                &ctx,
                "app.users",
                "collection-1",
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();
    }

    #[test]
    fn record_store_crud() {
        let engine = InMemoryEngine::new();
        let ctx = ctx(&engine);

        engine
            .create_grouped_record_store(
                &ctx,
                "app.users",
                "collection-1",
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();
        let store = engine
            .get_grouped_record_store(
                &ctx,
                "app.users",
                "collection-1",
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();

        let a = store.insert_record(&ctx, b"alpha").unwrap();
        let b = store.insert_record(&ctx, b"beta").unwrap();
        assert!(a < b);

        store.update_record(&ctx, a, b"alpha2").unwrap();
        let records = store.all_records(&ctx).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1, b"alpha2");

        store.delete_record(&ctx, b).unwrap();
        assert_eq!(store.all_records(&ctx).unwrap().len(), 1);

        let missing = store.delete_record(&ctx, b);
        assert!(matches!(missing, Err(StorageError::RecordNotFound { .. })));
    }

    #[test]
    fn seeded_table_is_readable() {
        let engine = InMemoryEngine::new();
        let ctx = ctx(&engine);

        engine.seed_table("collection-7", vec![b"one".to_vec(), b"two".to_vec()]);
        let store = engine
            .get_grouped_record_store(
                &ctx,
                "app.seeded",
                "collection-7",
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();

        let records = store.all_records(&ctx).unwrap();
        assert_eq!(records.len(), 2);

        // Inserts continue past the seeded ids.
        let id = store.insert_record(&ctx, b"three").unwrap();
        assert_eq!(id.as_u64(), 3);
    }

    #[test]
    fn timestamps_are_cached() {
        let engine = InMemoryEngine::new();
        engine.set_stable_timestamp(Timestamp::new(10));
        engine.set_initial_data_timestamp(Timestamp::new(5));
        engine.set_oldest_timestamp(Timestamp::new(2));

        assert_eq!(engine.stable_timestamp(), Timestamp::new(10));
        assert_eq!(engine.initial_data_timestamp(), Timestamp::new(5));
        assert_eq!(engine.oldest_timestamp(), Timestamp::new(2));
    }

    #[test]
    fn recover_to_stable_unsupported() {
        let engine = InMemoryEngine::new();
        assert!(!engine.supports_recover_to_stable_timestamp());
        assert!(matches!(
            engine.recover_to_stable_timestamp(),
            Err(StorageError::Unsupported(_))
        ));
    }
}
