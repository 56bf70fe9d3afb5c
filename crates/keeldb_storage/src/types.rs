//! Core value types shared across the storage contract.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// A point in the cluster's logical time.
///
/// Timestamps order committed writes so that replication can roll back to a
/// stable point. The zero value is the null timestamp: "this write carries
/// no timestamp".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The null timestamp.
    pub const NULL: Self = Self(0);

    /// Initial-data sentinel permitting unstable checkpoints.
    ///
    /// While the initial-data timestamp holds this value, the engine may
    /// persist data that replication has not yet declared stable, and the
    /// coordination layer does not require replicated drops to carry a
    /// commit timestamp.
    pub const ALLOW_UNSTABLE_CHECKPOINTS: Self = Self(1);

    /// Creates a timestamp from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true for the null timestamp.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts:{}", self.0)
    }
}

/// Largest prefix either observed in persisted metadata or handed out by
/// [`Prefix::next_prefix`]. Seeded once at bootstrap, never torn down.
static LARGEST_ASSIGNED: AtomicI64 = AtomicI64::new(0);

/// Numeric prefix partitioning a grouped table into logical record streams.
///
/// Grouped record stores share one physical table; each logical store is
/// distinguished by its prefix. The allocator is process-wide: any prefix
/// returned by [`Prefix::next_prefix`] strictly exceeds every prefix
/// previously observed via [`Prefix::observe_largest`] or allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prefix(pub i64);

impl Prefix {
    /// Marker for record stores that do not share a table.
    pub const NOT_PREFIXED: Self = Self(-1);

    /// Creates a prefix from a raw value.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Returns true if this prefix addresses a slice of a shared table.
    #[must_use]
    pub const fn is_prefixed(self) -> bool {
        self.0 >= 0
    }

    /// Raises the process-wide allocator to at least `prefix`.
    ///
    /// Called once at bootstrap with the maximum prefix found in persisted
    /// metadata, so later allocations never collide with existing data.
    pub fn observe_largest(prefix: Prefix) {
        LARGEST_ASSIGNED.fetch_max(prefix.0, Ordering::SeqCst);
    }

    /// Allocates a prefix strictly greater than every prefix observed or
    /// allocated so far.
    #[must_use]
    pub fn next_prefix() -> Prefix {
        Prefix(LARGEST_ASSIGNED.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Returns the current allocator high-water mark.
    #[must_use]
    pub fn largest_assigned() -> Prefix {
        Prefix(LARGEST_ASSIGNED.load(Ordering::SeqCst))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prefix:{}", self.0)
    }
}

/// Identifier of a record within one record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Creates a record id from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec:{}", self.0)
    }
}

/// Creation-time collection options.
///
/// The coordination layer persists these in the catalog and hands them back
/// to the engine when record stores are created or reopened; beyond
/// equality it does not interpret them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionConfig {
    /// Whether the collection is capped (fixed-size, insertion-ordered).
    pub capped: bool,
    /// Maximum size in bytes for a capped collection.
    pub capped_max_bytes: Option<u64>,
    /// Maximum document count for a capped collection.
    pub capped_max_documents: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_timestamp() {
        assert!(Timestamp::NULL.is_null());
        assert!(!Timestamp::new(42).is_null());
        assert_eq!(format!("{}", Timestamp::new(42)), "ts:42");
    }

    #[test]
    fn unstable_checkpoint_sentinel_is_not_null() {
        assert!(!Timestamp::ALLOW_UNSTABLE_CHECKPOINTS.is_null());
    }

    #[test]
    fn not_prefixed_marker() {
        assert!(!Prefix::NOT_PREFIXED.is_prefixed());
        assert!(Prefix::new(0).is_prefixed());
        assert!(Prefix::new(7).is_prefixed());
    }

    #[test]
    fn allocator_exceeds_observed_prefixes() {
        Prefix::observe_largest(Prefix::new(100));
        assert!(Prefix::largest_assigned() >= Prefix::new(100));

        let next = Prefix::next_prefix();
        assert!(next > Prefix::new(100));
        // The allocator never moves backwards.
        assert!(Prefix::largest_assigned() >= next);
    }

    #[test]
    fn allocator_ignores_not_prefixed() {
        let before = Prefix::largest_assigned();
        Prefix::observe_largest(Prefix::NOT_PREFIXED);
        assert!(Prefix::largest_assigned() >= before);
    }

    #[test]
    fn collection_config_equality() {
        let a = CollectionConfig::default();
        let b = CollectionConfig {
            capped: true,
            capped_max_bytes: Some(4096),
            capped_max_documents: None,
        };
        assert_eq!(a, CollectionConfig::default());
        assert_ne!(a, b);
    }
}
