//! In-memory database registry.

use crate::error::CatalogResult;
use crate::namespace::Namespace;
use keeldb_storage::{OperationContext, TxnChange};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-database catalog handle.
///
/// Opens and drops collections belonging to one database. Produced by a
/// caller-provided factory; the registry owns the handles and hands out
/// shared references.
pub trait DatabaseCatalogEntry: Send + Sync {
    /// Returns the database name.
    fn name(&self) -> &str;

    /// Returns true if the database holds no collections.
    fn is_empty(&self) -> bool;

    /// Returns the database's live collection namespaces.
    fn collection_namespaces(&self) -> Vec<Namespace>;

    /// Opens a collection discovered in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be opened.
    fn init_collection(
        &self,
        ctx: &OperationContext,
        ns: &Namespace,
        for_repair: bool,
    ) -> CatalogResult<()>;

    /// Drops one collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the drop fails; the namespace must still leave
    /// the live set.
    fn drop_collection(&self, ctx: &OperationContext, ns: &Namespace) -> CatalogResult<()>;

    /// Reopens a collection whose ident was just repaired.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be reopened.
    fn reinit_collection_after_repair(
        &self,
        ctx: &OperationContext,
        ns: &Namespace,
    ) -> CatalogResult<()>;
}

/// Factory producing the handle for a named database.
pub type DatabaseCatalogEntryFactory =
    Box<dyn Fn(&str) -> Arc<dyn DatabaseCatalogEntry> + Send + Sync>;

type DbMap = HashMap<String, Arc<dyn DatabaseCatalogEntry>>;

/// Transaction change staged by a database drop: commit releases the
/// handle, rollback reinstalls the original handle object under its name.
struct RemoveDbChange {
    dbs: Arc<Mutex<DbMap>>,
    name: String,
    entry: Arc<dyn DatabaseCatalogEntry>,
}

impl TxnChange for RemoveDbChange {
    fn commit(self: Box<Self>) {
        // Dropping the captured reference lets the handle go away.
    }

    fn rollback(self: Box<Self>) {
        self.dbs.lock().insert(self.name, self.entry);
    }
}

/// Process-wide mapping from database name to catalog handle.
///
/// All mutations are serialized by one mutex. Database creation is
/// implicit and never rolled back; removal is staged against the enclosing
/// transaction so an abort restores the original handle.
pub(crate) struct DatabaseRegistry {
    dbs: Arc<Mutex<DbMap>>,
}

impl DatabaseRegistry {
    pub(crate) fn new() -> Self {
        Self {
            dbs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Names of databases whose handle reports non-empty, sorted.
    pub(crate) fn list_databases(&self) -> Vec<String> {
        let dbs = self.dbs.lock();
        let mut names: Vec<String> = dbs
            .iter()
            .filter(|(_, entry)| !entry.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Returns the handle for `name`, if registered.
    pub(crate) fn get(&self, name: &str) -> Option<Arc<dyn DatabaseCatalogEntry>> {
        self.dbs.lock().get(name).cloned()
    }

    /// Returns the handle for `name`, creating one through `factory` if
    /// absent. No rollback change is registered: database existence is
    /// implicit at this layer.
    pub(crate) fn get_or_create(
        &self,
        name: &str,
        factory: &DatabaseCatalogEntryFactory,
    ) -> Arc<dyn DatabaseCatalogEntry> {
        let mut dbs = self.dbs.lock();
        Arc::clone(
            dbs.entry(name.to_string())
                .or_insert_with(|| factory(name)),
        )
    }

    /// Stages removal of `entry` against the transaction and erases it
    /// from the live map. Commit destroys the handle; rollback reinstalls
    /// the same handle object.
    pub(crate) fn stage_removal(&self, ctx: &OperationContext, entry: &Arc<dyn DatabaseCatalogEntry>) {
        let mut dbs = self.dbs.lock();
        ctx.register_change(Box::new(RemoveDbChange {
            dbs: Arc::clone(&self.dbs),
            name: entry.name().to_string(),
            entry: Arc::clone(entry),
        }));
        dbs.remove(entry.name());
    }

    /// Releases every handle.
    pub(crate) fn clear(&self) {
        self.dbs.lock().clear();
    }
}
