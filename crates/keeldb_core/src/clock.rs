//! Cluster time source.

use keeldb_storage::Timestamp;

/// Source of the cluster's current logical time.
///
/// The drop orchestrator consults the clock to timestamp replicated drops.
/// Standalone deployments may return the null timestamp, in which case
/// drops are not timestamped.
pub trait ClusterClock: Send + Sync {
    /// Returns the current cluster time.
    fn cluster_time(&self) -> Timestamp;
}

/// A clock for deployments without replication: cluster time is always
/// null, so no drop is ever timestamped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullClock;

impl ClusterClock for NullClock {
    fn cluster_time(&self) -> Timestamp {
        Timestamp::NULL
    }
}
