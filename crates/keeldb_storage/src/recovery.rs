//! Per-operation transaction plumbing.
//!
//! Every operation against the storage layer carries an
//! [`OperationContext`] owning one [`RecoveryUnit`]: the engine-provided
//! transaction handle holding a snapshot and pending writes. Mutations are
//! scoped by a [`WriteUnitOfWork`], which commits explicitly and aborts on
//! drop.

use crate::error::StorageResult;
use crate::types::Timestamp;
use parking_lot::Mutex;

/// A commit/rollback callback pair attached to a transaction.
///
/// A recovery unit enqueues registered changes and invokes exactly one of
/// the two methods when the outermost unit of work finalizes: `commit` when
/// it commits, `rollback` when it aborts. Rollbacks run in reverse
/// registration order.
pub trait TxnChange: Send {
    /// Called when the enclosing transaction commits.
    fn commit(self: Box<Self>);

    /// Called when the enclosing transaction rolls back.
    fn rollback(self: Box<Self>);
}

/// Engine-provided transaction handle.
///
/// Units of work nest: only the outermost commit finalizes the transaction
/// and fires registered changes; an abort at any nesting level forces the
/// whole transaction to roll back.
pub trait RecoveryUnit: Send {
    /// Enters a unit of work, incrementing the nesting depth.
    fn begin_unit_of_work(&mut self);

    /// Leaves a unit of work. When the outermost unit commits, pending
    /// writes become durable and registered changes fire their commit
    /// callbacks.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to commit; the transaction is
    /// then finalized as aborted.
    fn commit_unit_of_work(&mut self) -> StorageResult<()>;

    /// Aborts the current unit of work. The transaction as a whole rolls
    /// back once the outermost unit finishes.
    fn abort_unit_of_work(&mut self);

    /// Returns the commit timestamp assigned to this transaction, or the
    /// null timestamp if none is set.
    fn commit_timestamp(&self) -> Timestamp;

    /// Assigns the commit timestamp for subsequent writes.
    fn set_commit_timestamp(&mut self, ts: Timestamp);

    /// Clears the commit timestamp.
    fn clear_commit_timestamp(&mut self);

    /// Attaches a change to fire when the transaction finalizes.
    fn register_change(&mut self, change: Box<dyn TxnChange>);

    /// Releases the snapshot held by this recovery unit. Must not be called
    /// inside a unit of work.
    fn abandon_snapshot(&mut self);
}

/// Context carried by one logical operation.
///
/// Owns the operation's recovery unit behind interior mutability so that
/// scoped guards and callees can share it. Operations are single-threaded;
/// the lock only serializes re-entrant access from guards.
pub struct OperationContext {
    recovery_unit: Mutex<Box<dyn RecoveryUnit>>,
}

impl OperationContext {
    /// Creates a context around an engine-provided recovery unit.
    #[must_use]
    pub fn new(recovery_unit: Box<dyn RecoveryUnit>) -> Self {
        Self {
            recovery_unit: Mutex::new(recovery_unit),
        }
    }

    /// Returns the transaction's commit timestamp.
    #[must_use]
    pub fn commit_timestamp(&self) -> Timestamp {
        self.recovery_unit.lock().commit_timestamp()
    }

    /// Assigns the transaction's commit timestamp.
    pub fn set_commit_timestamp(&self, ts: Timestamp) {
        self.recovery_unit.lock().set_commit_timestamp(ts);
    }

    /// Clears the transaction's commit timestamp.
    pub fn clear_commit_timestamp(&self) {
        self.recovery_unit.lock().clear_commit_timestamp();
    }

    /// Attaches a change to the transaction.
    pub fn register_change(&self, change: Box<dyn TxnChange>) {
        self.recovery_unit.lock().register_change(change);
    }

    /// Releases the snapshot held by the operation.
    pub fn abandon_snapshot(&self) {
        self.recovery_unit.lock().abandon_snapshot();
    }

    fn begin_unit_of_work(&self) {
        self.recovery_unit.lock().begin_unit_of_work();
    }

    fn commit_unit_of_work(&self) -> StorageResult<()> {
        self.recovery_unit.lock().commit_unit_of_work()
    }

    fn abort_unit_of_work(&self) {
        self.recovery_unit.lock().abort_unit_of_work();
    }
}

impl std::fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext").finish_non_exhaustive()
    }
}

/// Scoped write transaction.
///
/// Entering begins a unit of work on the context's recovery unit;
/// [`commit`](WriteUnitOfWork::commit) commits it. Dropping the unit
/// without committing aborts it, on every exit path including panics.
pub struct WriteUnitOfWork<'a> {
    ctx: &'a OperationContext,
    finalized: bool,
}

impl<'a> WriteUnitOfWork<'a> {
    /// Begins a unit of work on `ctx`.
    #[must_use]
    pub fn new(ctx: &'a OperationContext) -> Self {
        ctx.begin_unit_of_work();
        Self {
            ctx,
            finalized: false,
        }
    }

    /// Commits the unit of work.
    ///
    /// # Errors
    ///
    /// Returns the engine's commit failure. The unit is finalized either
    /// way; a failed commit leaves the transaction aborted by the engine.
    pub fn commit(mut self) -> StorageResult<()> {
        self.finalized = true;
        self.ctx.commit_unit_of_work()
    }
}

impl Drop for WriteUnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finalized {
            self.ctx.abort_unit_of_work();
        }
    }
}
