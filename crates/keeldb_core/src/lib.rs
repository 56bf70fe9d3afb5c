//! # KeelDB Core
//!
//! Catalog coordination layer for KeelDB.
//!
//! This crate sits between a generic KV engine (see `keeldb_storage`) and
//! the database service above it. The engine exposes opaque idents; the
//! service wants databases, collections, and indexes with durable
//! metadata. This crate provides:
//! - The durable catalog over the well-known `_mdb_catalog` record store
//! - The in-memory database registry with rollback-safe removal
//! - Bootstrap and recovery, including reconciliation of the engine's
//!   ident set against the catalog
//! - Two-phase database drops honoring replication timestamps
//! - Backup lifecycle and timestamp pass-through

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod clock;
mod config;
mod engine;
mod error;
mod namespace;
mod registry;

pub use catalog::{
    CollectionMetadata, DurableCatalog, IndexKind, IndexMetadata, IndexSpec, CATALOG_IDENT,
    ENTRY_VERSION,
};
pub use clock::{ClusterClock, NullClock};
pub use config::EngineOptions;
pub use engine::StorageEngine;
pub use error::{CatalogError, CatalogResult};
pub use namespace::Namespace;
pub use registry::{DatabaseCatalogEntry, DatabaseCatalogEntryFactory};
