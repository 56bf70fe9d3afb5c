//! Collection namespaces.

use std::fmt;

/// Prefix marking a collection renamed ahead of a replication-deferred drop.
const DROP_PENDING_PREFIX: &str = "system.drop.";

/// Prefix of temporary map-reduce output collections.
const TMP_MAP_REDUCE_PREFIX: &str = "tmp.mr";

/// A dotted `<db>.<collection>` name.
///
/// The database portion runs up to the first dot; everything after it is
/// the collection portion. A name without a dot is all database with an
/// empty collection portion.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace {
    full: String,
    dot: Option<usize>,
}

impl Namespace {
    /// Creates a namespace from a dotted name.
    #[must_use]
    pub fn new(ns: impl Into<String>) -> Self {
        let full = ns.into();
        let dot = full.find('.');
        Self { full, dot }
    }

    /// Creates a namespace from database and collection portions.
    #[must_use]
    pub fn from_parts(db: &str, coll: &str) -> Self {
        Self::new(format!("{db}.{coll}"))
    }

    /// Returns the full dotted name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// Returns the database portion.
    #[must_use]
    pub fn db(&self) -> &str {
        match self.dot {
            Some(dot) => &self.full[..dot],
            None => &self.full,
        }
    }

    /// Returns the collection portion.
    #[must_use]
    pub fn coll(&self) -> &str {
        match self.dot {
            Some(dot) => &self.full[dot + 1..],
            None => "",
        }
    }

    /// Returns true if writes to this namespace are replicated.
    ///
    /// The `local` database never replicates, and neither does the
    /// profiling collection.
    #[must_use]
    pub fn is_replicated(&self) -> bool {
        self.db() != "local" && self.coll() != "system.profile"
    }

    /// Returns true for a collection renamed to await a timestamp-gated
    /// drop.
    #[must_use]
    pub fn is_drop_pending(&self) -> bool {
        self.coll().starts_with(DROP_PENDING_PREFIX)
    }

    /// Returns true for the legacy `system.indexes` collection.
    #[must_use]
    pub fn is_system_dot_indexes(&self) -> bool {
        self.coll() == "system.indexes"
    }

    /// Returns true for temporary map-reduce output collections.
    #[must_use]
    pub fn is_tmp_map_reduce(&self) -> bool {
        self.coll().starts_with(TMP_MAP_REDUCE_PREFIX)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

impl From<&str> for Namespace {
    fn from(ns: &str) -> Self {
        Self::new(ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_first_dot() {
        let ns = Namespace::new("app.events.archive");
        assert_eq!(ns.db(), "app");
        assert_eq!(ns.coll(), "events.archive");
        assert_eq!(ns.as_str(), "app.events.archive");
    }

    #[test]
    fn no_dot_is_all_database() {
        let ns = Namespace::new("admin");
        assert_eq!(ns.db(), "admin");
        assert_eq!(ns.coll(), "");
    }

    #[test]
    fn from_parts_round_trips() {
        let ns = Namespace::from_parts("d1", "c1");
        assert_eq!(ns, Namespace::new("d1.c1"));
        assert_eq!(format!("{ns}"), "d1.c1");
    }

    #[test]
    fn local_database_is_not_replicated() {
        assert!(!Namespace::new("local.oplog.rs").is_replicated());
        assert!(Namespace::new("app.users").is_replicated());
    }

    #[test]
    fn profile_collection_is_not_replicated() {
        assert!(!Namespace::new("app.system.profile").is_replicated());
    }

    #[test]
    fn drop_pending_detection() {
        assert!(Namespace::new("d1.system.drop.12i1t4.c_repl").is_drop_pending());
        assert!(!Namespace::new("d1.system.dropped").is_drop_pending());
        assert!(!Namespace::new("d1.c_repl").is_drop_pending());
    }

    #[test]
    fn system_indexes_detection() {
        assert!(Namespace::new("d1.system.indexes").is_system_dot_indexes());
        assert!(!Namespace::new("d1.system.indexes.old").is_system_dot_indexes());
    }

    #[test]
    fn tmp_map_reduce_detection() {
        assert!(Namespace::new("d1.tmp.mr.x").is_tmp_map_reduce());
        assert!(Namespace::new("d1.tmp.mr").is_tmp_map_reduce());
        assert!(!Namespace::new("d1.tmp.other").is_tmp_map_reduce());
    }

    #[test]
    fn ordering_follows_full_name() {
        let mut names = vec![
            Namespace::new("d2.c1"),
            Namespace::new("d1.c2"),
            Namespace::new("d1.c1"),
        ];
        names.sort();
        assert_eq!(names[0].as_str(), "d1.c1");
        assert_eq!(names[2].as_str(), "d2.c1");
    }
}
