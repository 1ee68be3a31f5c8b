//! # Formats
//!
//! Serialized forms of catalog data:
//! - `persistence`: binary records (header + postcard) stored by `RedbCatalog`
//! - `snapshot`: JSON catalog snapshots for import and export
//!
//! Both are pure transformations; file and database I/O live elsewhere.

mod persistence;
mod snapshot;

pub use persistence::{MAX_RECORD_SIZE, PersistenceHeader, decode_record, encode_record};
pub use snapshot::{CatalogSnapshot, ImportSummary};
