//! Durable catalog over the well-known `_mdb_catalog` record store.
//!
//! One record per collection, encoded with a deterministic length-prefixed
//! binary layout. The catalog is the authoritative mapping from namespace
//! to storage ident, creation options, and index descriptors; the engine's
//! ident set is reconciled against it at startup.

use crate::error::{CatalogError, CatalogResult};
use crate::namespace::Namespace;
use keeldb_storage::{CollectionConfig, OperationContext, Prefix, RecordId, RecordStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Well-known ident of the catalog record store.
pub const CATALOG_IDENT: &str = "_mdb_catalog";

/// Current catalog entry format version.
pub const ENTRY_VERSION: u16 = 1;

/// Access-path shape of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexKind {
    /// Ordered traversal and range scans.
    BTree = 1,
    /// Equality lookup.
    Hash = 2,
}

impl IndexKind {
    /// Converts a byte to an index kind.
    #[must_use]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::BTree),
            2 => Some(Self::Hash),
            _ => None,
        }
    }

    /// Converts the kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Declared shape of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Path of the indexed field.
    pub field_path: Vec<String>,
    /// Access-path shape.
    pub kind: IndexKind,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// Catalog descriptor of one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    /// Index name, unique within its collection.
    pub name: String,
    /// Ident holding the index data.
    pub ident: String,
    /// Declared shape.
    pub spec: IndexSpec,
    /// Whether the build has completed.
    pub ready: bool,
    /// Whether any indexed field has held multiple values.
    pub multikey: bool,
    /// Prefix of the index within its grouped table.
    pub prefix: Prefix,
}

/// Catalog descriptor of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionMetadata {
    /// The collection's namespace.
    pub namespace: Namespace,
    /// Ident holding the record data.
    pub ident: String,
    /// Creation-time options.
    pub config: CollectionConfig,
    /// Index descriptors.
    pub indexes: Vec<IndexMetadata>,
    /// Prefix of the collection within its grouped table.
    pub prefix: Prefix,
}

impl CollectionMetadata {
    /// Returns the largest prefix used by the collection or any of its
    /// indexes.
    #[must_use]
    pub fn max_prefix(&self) -> Prefix {
        self.indexes
            .iter()
            .map(|index| index.prefix)
            .fold(self.prefix, Prefix::max)
    }

    /// Returns the descriptor of the named index.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexMetadata> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Encodes the entry to bytes (deterministic).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        put_u16(&mut buf, ENTRY_VERSION);
        put_str(&mut buf, self.namespace.as_str());
        put_str(&mut buf, &self.ident);

        buf.push(u8::from(self.config.capped));
        put_opt_u64(&mut buf, self.config.capped_max_bytes);
        put_opt_u64(&mut buf, self.config.capped_max_documents);

        put_i64(&mut buf, self.prefix.as_i64());

        put_u32(&mut buf, self.indexes.len() as u32);
        for index in &self.indexes {
            put_str(&mut buf, &index.name);
            put_str(&mut buf, &index.ident);
            put_u16(&mut buf, index.spec.field_path.len() as u16);
            for field in &index.spec.field_path {
                put_str(&mut buf, field);
            }
            buf.push(index.spec.kind.as_byte());
            buf.push(u8::from(index.spec.unique));
            buf.push(u8::from(index.ready));
            buf.push(u8::from(index.multikey));
            put_i64(&mut buf, index.prefix.as_i64());
        }

        buf
    }

    /// Decodes an entry from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CorruptCatalogEntry`] if the bytes do not
    /// form a well-formed entry.
    pub fn decode(data: &[u8]) -> CatalogResult<Self> {
        let mut cursor = 0usize;

        let version = read_u16(data, &mut cursor)?;
        if version > ENTRY_VERSION {
            return Err(CatalogError::corrupt_entry(format!(
                "unsupported entry version: {version}"
            )));
        }

        let namespace = Namespace::new(read_str(data, &mut cursor)?);
        let ident = read_str(data, &mut cursor)?;

        let capped = read_u8(data, &mut cursor)? != 0;
        let capped_max_bytes = read_opt_u64(data, &mut cursor)?;
        let capped_max_documents = read_opt_u64(data, &mut cursor)?;

        let prefix = Prefix::new(read_i64(data, &mut cursor)?);

        let index_count = read_u32(data, &mut cursor)? as usize;
        let mut indexes = Vec::with_capacity(index_count);
        for _ in 0..index_count {
            let name = read_str(data, &mut cursor)?;
            let index_ident = read_str(data, &mut cursor)?;
            let path_count = read_u16(data, &mut cursor)? as usize;
            let mut field_path = Vec::with_capacity(path_count);
            for _ in 0..path_count {
                field_path.push(read_str(data, &mut cursor)?);
            }
            let kind = IndexKind::from_byte(read_u8(data, &mut cursor)?)
                .ok_or_else(|| CatalogError::corrupt_entry("unknown index kind"))?;
            let unique = read_u8(data, &mut cursor)? != 0;
            let ready = read_u8(data, &mut cursor)? != 0;
            let multikey = read_u8(data, &mut cursor)? != 0;
            let index_prefix = Prefix::new(read_i64(data, &mut cursor)?);

            indexes.push(IndexMetadata {
                name,
                ident: index_ident,
                spec: IndexSpec {
                    field_path,
                    kind,
                    unique,
                },
                ready,
                multikey,
                prefix: index_prefix,
            });
        }

        Ok(Self {
            namespace,
            ident,
            config: CollectionConfig {
                capped,
                capped_max_bytes,
                capped_max_documents,
            },
            indexes,
            prefix,
        })
    }
}

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_u16(buf, s.len() as u16);
    buf.extend_from_slice(s.as_bytes());
}

fn put_opt_u64(buf: &mut Vec<u8>, v: Option<u64>) {
    match v {
        Some(v) => {
            buf.push(1);
            put_u64(buf, v);
        }
        None => buf.push(0),
    }
}

fn take<'a>(data: &'a [u8], cursor: &mut usize, len: usize) -> CatalogResult<&'a [u8]> {
    let end = cursor
        .checked_add(len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| CatalogError::corrupt_entry("catalog entry too short"))?;
    let slice = &data[*cursor..end];
    *cursor = end;
    Ok(slice)
}

fn read_u8(data: &[u8], cursor: &mut usize) -> CatalogResult<u8> {
    Ok(take(data, cursor, 1)?[0])
}

fn read_u16(data: &[u8], cursor: &mut usize) -> CatalogResult<u16> {
    let bytes = take(data, cursor, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32(data: &[u8], cursor: &mut usize) -> CatalogResult<u32> {
    let bytes = take(data, cursor, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_u64(data: &[u8], cursor: &mut usize) -> CatalogResult<u64> {
    let bytes = take(data, cursor, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(raw))
}

fn read_i64(data: &[u8], cursor: &mut usize) -> CatalogResult<i64> {
    let bytes = take(data, cursor, 8)?;
    let mut raw = [0u8; 8];
    raw.copy_from_slice(bytes);
    Ok(i64::from_le_bytes(raw))
}

fn read_str(data: &[u8], cursor: &mut usize) -> CatalogResult<String> {
    let len = read_u16(data, cursor)? as usize;
    let bytes = take(data, cursor, len)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| CatalogError::corrupt_entry("invalid string in catalog entry"))
}

fn read_opt_u64(data: &[u8], cursor: &mut usize) -> CatalogResult<Option<u64>> {
    if read_u8(data, cursor)? != 0 {
        Ok(Some(read_u64(data, cursor)?))
    } else {
        Ok(None)
    }
}

struct CatalogSlot {
    record_id: RecordId,
    meta: CollectionMetadata,
}

/// Typed reader/writer over the catalog record store.
///
/// Enumerations reflect the in-memory view populated by
/// [`init`](DurableCatalog::init) and maintained by the writer half;
/// returned metadata is a value copy.
pub struct DurableCatalog {
    record_store: Arc<dyn RecordStore>,
    directory_per_db: bool,
    directory_for_indexes: bool,
    entries: RwLock<BTreeMap<Namespace, CatalogSlot>>,
    next_ident_suffix: AtomicU64,
}

impl DurableCatalog {
    /// Creates a catalog over `record_store`. Call
    /// [`init`](DurableCatalog::init) before using it.
    #[must_use]
    pub fn new(
        record_store: Arc<dyn RecordStore>,
        directory_per_db: bool,
        directory_for_indexes: bool,
    ) -> Self {
        Self {
            record_store,
            directory_per_db,
            directory_for_indexes,
            entries: RwLock::new(BTreeMap::new()),
            next_ident_suffix: AtomicU64::new(1),
        }
    }

    /// Reads every persisted entry and populates the in-memory view.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store cannot be read or an entry
    /// fails to decode.
    pub fn init(&self, ctx: &OperationContext) -> CatalogResult<()> {
        let records = self.record_store.all_records(ctx)?;
        let mut entries = BTreeMap::new();
        let mut max_suffix = 0u64;

        for (record_id, data) in records {
            let meta = CollectionMetadata::decode(&data)?;
            for ident in std::iter::once(&meta.ident).chain(meta.indexes.iter().map(|i| &i.ident))
            {
                if let Some(suffix) = ident_suffix(ident) {
                    max_suffix = max_suffix.max(suffix);
                }
            }
            entries.insert(meta.namespace.clone(), CatalogSlot { record_id, meta });
        }

        self.next_ident_suffix
            .store(max_suffix + 1, Ordering::SeqCst);
        *self.entries.write() = entries;
        Ok(())
    }

    /// Returns every namespace with a persisted entry.
    #[must_use]
    pub fn all_collections(&self) -> Vec<Namespace> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns every ident mentioned by any entry: collection idents plus
    /// index idents.
    #[must_use]
    pub fn all_idents(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut idents = Vec::new();
        for slot in entries.values() {
            idents.push(slot.meta.ident.clone());
            for index in &slot.meta.indexes {
                idents.push(index.ident.clone());
            }
        }
        idents
    }

    /// Returns true if `ident` names user data rather than an internal
    /// container. Only user-data idents are garbage-collected during
    /// reconciliation.
    #[must_use]
    pub fn is_user_data_ident(&self, ident: &str) -> bool {
        ident.contains("collection-") || ident.contains("index-")
    }

    /// Returns the ident backing a collection.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CollectionNotFound`] if the namespace has no
    /// entry.
    pub fn collection_ident(&self, ns: &Namespace) -> CatalogResult<String> {
        let entries = self.entries.read();
        entries
            .get(ns)
            .map(|slot| slot.meta.ident.clone())
            .ok_or_else(|| CatalogError::collection_not_found(ns.clone()))
    }

    /// Returns the ident backing an index.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CollectionNotFound`] if the namespace has no
    /// entry, or [`CatalogError::IndexNotFound`] if the collection has no
    /// index with this name.
    pub fn index_ident(&self, ns: &Namespace, index_name: &str) -> CatalogResult<String> {
        let entries = self.entries.read();
        let slot = entries
            .get(ns)
            .ok_or_else(|| CatalogError::collection_not_found(ns.clone()))?;
        slot.meta
            .index(index_name)
            .map(|index| index.ident.clone())
            .ok_or_else(|| CatalogError::index_not_found(ns.clone(), index_name))
    }

    /// Returns a copy of the collection's metadata. Mutating the copy does
    /// not write back.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CollectionNotFound`] if the namespace has no
    /// entry.
    pub fn metadata(&self, ns: &Namespace) -> CatalogResult<CollectionMetadata> {
        let entries = self.entries.read();
        entries
            .get(ns)
            .map(|slot| slot.meta.clone())
            .ok_or_else(|| CatalogError::collection_not_found(ns.clone()))
    }

    /// Writes an entry, replacing any existing entry for the namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store write fails.
    pub fn put_entry(&self, ctx: &OperationContext, meta: CollectionMetadata) -> CatalogResult<()> {
        let data = meta.encode();
        let mut entries = self.entries.write();
        let record_id = match entries.get(&meta.namespace).map(|slot| slot.record_id) {
            Some(record_id) => {
                self.record_store.update_record(ctx, record_id, &data)?;
                record_id
            }
            None => self.record_store.insert_record(ctx, &data)?,
        };
        entries.insert(meta.namespace.clone(), CatalogSlot { record_id, meta });
        Ok(())
    }

    /// Removes a collection's entry.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::CollectionNotFound`] if the namespace has no
    /// entry, or an error if the record store write fails.
    pub fn remove_entry(&self, ctx: &OperationContext, ns: &Namespace) -> CatalogResult<()> {
        let mut entries = self.entries.write();
        let slot = entries
            .remove(ns)
            .ok_or_else(|| CatalogError::collection_not_found(ns.clone()))?;
        self.record_store.delete_record(ctx, slot.record_id)?;
        Ok(())
    }

    /// Generates a fresh collection ident for `ns`, honoring
    /// directory-per-database.
    #[must_use]
    pub fn new_collection_ident(&self, ns: &Namespace) -> String {
        let n = self.next_ident_suffix.fetch_add(1, Ordering::SeqCst);
        if self.directory_per_db {
            format!("{}/collection-{n}", ns.db())
        } else {
            format!("collection-{n}")
        }
    }

    /// Generates a fresh index ident for `ns`, honoring
    /// directory-per-database and directory-for-indexes.
    #[must_use]
    pub fn new_index_ident(&self, ns: &Namespace) -> String {
        let n = self.next_ident_suffix.fetch_add(1, Ordering::SeqCst);
        match (self.directory_per_db, self.directory_for_indexes) {
            (true, true) => format!("{}/index/index-{n}", ns.db()),
            (true, false) => format!("{}/index-{n}", ns.db()),
            (false, true) => format!("index/index-{n}"),
            (false, false) => format!("index-{n}"),
        }
    }
}

fn ident_suffix(ident: &str) -> Option<u64> {
    ident.rsplit('-').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use keeldb_storage::{InMemoryEngine, KvEngine};
    use proptest::prelude::*;

    fn sample_metadata() -> CollectionMetadata {
        CollectionMetadata {
            namespace: Namespace::new("app.users"),
            ident: "collection-3".into(),
            config: CollectionConfig {
                capped: true,
                capped_max_bytes: Some(1 << 20),
                capped_max_documents: None,
            },
            indexes: vec![
                IndexMetadata {
                    name: "email_unique".into(),
                    ident: "index-4".into(),
                    spec: IndexSpec {
                        field_path: vec!["email".into()],
                        kind: IndexKind::Hash,
                        unique: true,
                    },
                    ready: true,
                    multikey: false,
                    prefix: Prefix::new(7),
                },
                IndexMetadata {
                    name: "age".into(),
                    ident: "index-5".into(),
                    spec: IndexSpec {
                        field_path: vec!["profile".into(), "age".into()],
                        kind: IndexKind::BTree,
                        unique: false,
                    },
                    ready: false,
                    multikey: true,
                    prefix: Prefix::new(9),
                },
            ],
            prefix: Prefix::new(5),
        }
    }

    fn catalog_fixture() -> (InMemoryEngine, OperationContext, DurableCatalog) {
        let engine = InMemoryEngine::new();
        let ctx = OperationContext::new(engine.new_recovery_unit());
        engine
            .create_grouped_record_store(
                &ctx,
                CATALOG_IDENT,
                CATALOG_IDENT,
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();
        let store = engine
            .get_grouped_record_store(
                &ctx,
                CATALOG_IDENT,
                CATALOG_IDENT,
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();
        let catalog = DurableCatalog::new(store, false, false);
        catalog.init(&ctx).unwrap();
        (engine, ctx, catalog)
    }

    #[test]
    fn encode_decode_round_trip() {
        let meta = sample_metadata();
        let decoded = CollectionMetadata::decode(&meta.encode()).unwrap();
        assert_eq!(decoded, meta);
    }

    #[test]
    fn encoding_is_deterministic() {
        let meta = sample_metadata();
        assert_eq!(meta.encode(), meta.encode());
        let reencoded = CollectionMetadata::decode(&meta.encode()).unwrap().encode();
        assert_eq!(reencoded, meta.encode());
    }

    #[test]
    fn truncated_entry_rejected() {
        let data = sample_metadata().encode();
        for len in [0, 1, 5, data.len() - 1] {
            let result = CollectionMetadata::decode(&data[..len]);
            assert!(
                matches!(result, Err(CatalogError::CorruptCatalogEntry { .. })),
                "length {len} should not decode"
            );
        }
    }

    #[test]
    fn unknown_index_kind_rejected() {
        let mut meta = sample_metadata();
        meta.indexes.truncate(0);
        let mut data = meta.encode();
        // Append one index with a bogus kind byte.
        let count_at = data.len() - 4;
        data[count_at..].copy_from_slice(&1u32.to_le_bytes());
        put_str(&mut data, "bad");
        put_str(&mut data, "index-9");
        put_u16(&mut data, 0);
        data.push(99); // kind
        data.push(0);
        data.push(1);
        data.push(0);
        put_i64(&mut data, -1);

        let result = CollectionMetadata::decode(&data);
        assert!(matches!(
            result,
            Err(CatalogError::CorruptCatalogEntry { .. })
        ));
    }

    #[test]
    fn max_prefix_folds_indexes() {
        let meta = sample_metadata();
        assert_eq!(meta.max_prefix(), Prefix::new(9));

        let bare = CollectionMetadata {
            indexes: Vec::new(),
            ..sample_metadata()
        };
        assert_eq!(bare.max_prefix(), Prefix::new(5));
    }

    #[test]
    fn put_then_lookup() {
        let (_engine, ctx, catalog) = catalog_fixture();
        let meta = sample_metadata();
        catalog.put_entry(&ctx, meta.clone()).unwrap();

        let ns = Namespace::new("app.users");
        assert_eq!(catalog.all_collections(), vec![ns.clone()]);
        assert_eq!(catalog.collection_ident(&ns).unwrap(), "collection-3");
        assert_eq!(catalog.index_ident(&ns, "age").unwrap(), "index-5");
        assert_eq!(catalog.metadata(&ns).unwrap(), meta);
        assert_eq!(
            catalog.all_idents(),
            vec!["collection-3", "index-4", "index-5"]
        );
    }

    #[test]
    fn metadata_is_a_value_copy() {
        let (_engine, ctx, catalog) = catalog_fixture();
        catalog.put_entry(&ctx, sample_metadata()).unwrap();

        let ns = Namespace::new("app.users");
        let mut copy = catalog.metadata(&ns).unwrap();
        copy.ident = "collection-999".into();
        assert_eq!(catalog.collection_ident(&ns).unwrap(), "collection-3");
    }

    #[test]
    fn missing_lookups_fail() {
        let (_engine, ctx, catalog) = catalog_fixture();
        catalog.put_entry(&ctx, sample_metadata()).unwrap();

        let ns = Namespace::new("app.users");
        let missing = Namespace::new("app.ghosts");
        assert!(matches!(
            catalog.collection_ident(&missing),
            Err(CatalogError::CollectionNotFound { .. })
        ));
        assert!(matches!(
            catalog.index_ident(&ns, "nope"),
            Err(CatalogError::IndexNotFound { .. })
        ));
    }

    #[test]
    fn entries_survive_reinit() {
        let (engine, ctx, catalog) = catalog_fixture();
        let meta = sample_metadata();
        catalog.put_entry(&ctx, meta.clone()).unwrap();

        // A second catalog over the same record store sees the same bytes.
        let store = engine
            .get_grouped_record_store(
                &ctx,
                CATALOG_IDENT,
                CATALOG_IDENT,
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();
        let reopened = DurableCatalog::new(store, false, false);
        reopened.init(&ctx).unwrap();
        assert_eq!(reopened.metadata(&meta.namespace).unwrap(), meta);
    }

    #[test]
    fn remove_entry_deletes_the_record() {
        let (_engine, ctx, catalog) = catalog_fixture();
        let meta = sample_metadata();
        catalog.put_entry(&ctx, meta.clone()).unwrap();
        catalog.remove_entry(&ctx, &meta.namespace).unwrap();

        assert!(catalog.all_collections().is_empty());
        assert!(matches!(
            catalog.remove_entry(&ctx, &meta.namespace),
            Err(CatalogError::CollectionNotFound { .. })
        ));
    }

    #[test]
    fn user_data_classification() {
        let (_engine, _ctx, catalog) = catalog_fixture();
        assert!(catalog.is_user_data_ident("collection-12"));
        assert!(catalog.is_user_data_ident("d1/index-3"));
        assert!(catalog.is_user_data_ident("d1/index/index-3"));
        assert!(!catalog.is_user_data_ident(CATALOG_IDENT));
        assert!(!catalog.is_user_data_ident("sizeStorer"));
    }

    #[test]
    fn ident_generation_respects_directory_modes() {
        let ns = Namespace::new("d1.c1");
        let engine = InMemoryEngine::new();
        let ctx = OperationContext::new(engine.new_recovery_unit());
        engine
            .create_grouped_record_store(
                &ctx,
                CATALOG_IDENT,
                CATALOG_IDENT,
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();
        let store = engine
            .get_grouped_record_store(
                &ctx,
                CATALOG_IDENT,
                CATALOG_IDENT,
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();

        let flat = DurableCatalog::new(Arc::clone(&store), false, false);
        assert_eq!(flat.new_collection_ident(&ns), "collection-1");
        assert_eq!(flat.new_index_ident(&ns), "index-2");

        let nested = DurableCatalog::new(store, true, true);
        assert_eq!(nested.new_collection_ident(&ns), "d1/collection-1");
        assert_eq!(nested.new_index_ident(&ns), "d1/index/index-2");
    }

    #[test]
    fn ident_generation_continues_past_persisted_suffixes() {
        let (engine, ctx, catalog) = catalog_fixture();
        catalog.put_entry(&ctx, sample_metadata()).unwrap();

        // Reopen; suffixes resume after the largest persisted one (index-5).
        let store = engine
            .get_grouped_record_store(
                &ctx,
                CATALOG_IDENT,
                CATALOG_IDENT,
                &CollectionConfig::default(),
                Prefix::NOT_PREFIXED,
            )
            .unwrap();
        let reopened = DurableCatalog::new(store, false, false);
        reopened.init(&ctx).unwrap();
        assert_eq!(
            reopened.new_collection_ident(&Namespace::new("d2.c")),
            "collection-6"
        );
    }

    fn arb_index() -> impl Strategy<Value = IndexMetadata> {
        (
            "[a-z_]{1,12}",
            "[a-z]{0,4}index-[0-9]{1,4}",
            prop::collection::vec("[a-z]{1,8}", 1..4),
            prop::bool::ANY,
            prop::bool::ANY,
            prop::bool::ANY,
            -1i64..1000,
        )
            .prop_map(
                |(name, ident, field_path, unique, ready, multikey, prefix)| IndexMetadata {
                    name,
                    ident,
                    spec: IndexSpec {
                        field_path,
                        kind: if unique { IndexKind::Hash } else { IndexKind::BTree },
                        unique,
                    },
                    ready,
                    multikey,
                    prefix: Prefix::new(prefix),
                },
            )
    }

    fn arb_metadata() -> impl Strategy<Value = CollectionMetadata> {
        (
            "[a-z]{1,8}\\.[a-z]{1,8}",
            "collection-[0-9]{1,4}",
            prop::bool::ANY,
            prop::option::of(0u64..1 << 40),
            prop::option::of(0u64..1 << 20),
            prop::collection::vec(arb_index(), 0..4),
            -1i64..1000,
        )
            .prop_map(
                |(ns, ident, capped, max_bytes, max_docs, indexes, prefix)| CollectionMetadata {
                    namespace: Namespace::new(ns),
                    ident,
                    config: CollectionConfig {
                        capped,
                        capped_max_bytes: max_bytes,
                        capped_max_documents: max_docs,
                    },
                    indexes,
                    prefix: Prefix::new(prefix),
                },
            )
    }

    proptest! {
        #[test]
        fn round_trip_any_entry(meta in arb_metadata()) {
            let bytes = meta.encode();
            let decoded = CollectionMetadata::decode(&bytes).unwrap();
            prop_assert_eq!(&decoded, &meta);
            prop_assert_eq!(decoded.encode(), bytes);
        }
    }
}
