//! # Storage Backends
//!
//! Persistent implementations of the catalog traits. The in-memory
//! `Catalog` lives in `catalog`.

mod redb_catalog;

pub use redb_catalog::RedbCatalog;
