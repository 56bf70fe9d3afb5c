//! Record store trait definition.

use crate::error::StorageResult;
use crate::recovery::OperationContext;
use crate::types::RecordId;

/// A stream of opaque records inside one ident.
///
/// Record stores do not interpret record bytes; the layer above owns all
/// format decisions. Enumeration reflects the snapshot of the enclosing
/// operation, and returned bytes are value copies.
pub trait RecordStore: Send + Sync {
    /// Returns the ident backing this store.
    fn ident(&self) -> &str;

    /// Returns every record visible to the operation, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying ident cannot be read.
    fn all_records(&self, ctx: &OperationContext) -> StorageResult<Vec<(RecordId, Vec<u8>)>>;

    /// Inserts a record and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert_record(&self, ctx: &OperationContext, data: &[u8]) -> StorageResult<RecordId>;

    /// Replaces the record at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RecordNotFound`](crate::StorageError::RecordNotFound)
    /// if no record has this id.
    fn update_record(&self, ctx: &OperationContext, id: RecordId, data: &[u8])
        -> StorageResult<()>;

    /// Removes the record at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::RecordNotFound`](crate::StorageError::RecordNotFound)
    /// if no record has this id.
    fn delete_record(&self, ctx: &OperationContext, id: RecordId) -> StorageResult<()>;
}
