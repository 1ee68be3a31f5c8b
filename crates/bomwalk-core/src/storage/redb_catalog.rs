//! # redb-backed Catalog
//!
//! A disk-backed catalog using the redb embedded database. Provides the same
//! store traits as the in-memory `Catalog`, with ACID transactions and crash
//! safety from redb's copy-on-write B-trees.
//!
//! Every value is stored as a record from `formats::encode_record` (header +
//! postcard), keyed by a tuple of its key fields:
//! - `part_masters`: `(workspace, number)`
//! - `configuration_items`: `(workspace, id)`
//! - `baselines`: `(workspace, item, name)`
//!
//! Listings walk the key range of one workspace (or one configuration item),
//! so a scope never sees records of another scope that shares its prefix.
//!
//! A baseline is checked for uniqueness and written inside one write
//! transaction, so a capture either lands completely or not at all.

use crate::baseline::ProductBaseline;
use crate::catalog::{BaselineStore, PartRepository, PartStore};
use crate::formats::{decode_record, encode_record};
use crate::primitives::FORMAT_VERSION;
use crate::{BomError, ConfigurationItem, ConfigurationItemKey, PartMaster, PartMasterKey};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// A table of encoded records keyed by (workspace, name within workspace).
type ScopedTable = TableDefinition<'static, (&'static str, &'static str), &'static [u8]>;

/// Table for part masters: (workspace, number) -> record bytes
const PART_MASTERS: ScopedTable = TableDefinition::new("part_masters");

/// Table for configuration items: (workspace, id) -> record bytes
const CONFIGURATION_ITEMS: ScopedTable = TableDefinition::new("configuration_items");

/// Table for baselines: (workspace, item, name) -> record bytes
const BASELINES: TableDefinition<(&str, &str, &str), &[u8]> = TableDefinition::new("baselines");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const FORMAT_VERSION_KEY: &str = "format_version";

fn io_err(e: impl std::fmt::Display) -> BomError {
    BomError::Io(e.to_string())
}

/// Metadata key of the last effectivity id allocated in a workspace.
fn effectivity_counter_key(workspace: &str) -> String {
    format!("effectivity_id/{}", workspace)
}

/// A disk-backed catalog.
pub struct RedbCatalog {
    db: Database,
}

impl std::fmt::Debug for RedbCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbCatalog").finish_non_exhaustive()
    }
}

impl RedbCatalog {
    /// Open or create a catalog database at the given path.
    ///
    /// Fails with `Deserialization` if the file was written with another
    /// record format version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BomError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        let write_txn = db.begin_write().map_err(io_err)?;
        {
            let _ = write_txn.open_table(PART_MASTERS).map_err(io_err)?;
            let _ = write_txn.open_table(CONFIGURATION_ITEMS).map_err(io_err)?;
            let _ = write_txn.open_table(BASELINES).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;

            let stored = meta
                .get(FORMAT_VERSION_KEY)
                .map_err(io_err)?
                .map(|v| v.value());
            match stored {
                Some(version) if version != u64::from(FORMAT_VERSION) => {
                    return Err(BomError::Deserialization(format!(
                        "Unsupported catalog version: {} (expected {})",
                        version, FORMAT_VERSION
                    )));
                }
                Some(_) => {}
                None => {
                    meta.insert(FORMAT_VERSION_KEY, u64::from(FORMAT_VERSION))
                        .map_err(io_err)?;
                }
            }
        }
        write_txn.commit().map_err(io_err)?;

        tracing::debug!(path = %path.as_ref().display(), "catalog opened");
        Ok(Self { db })
    }

    fn get<T: DeserializeOwned>(
        &self,
        table: ScopedTable,
        key: (&str, &str),
    ) -> Result<Option<T>, BomError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(table).map_err(io_err)?;
        match table.get(key).map_err(io_err)? {
            Some(data) => Ok(Some(decode_record(data.value())?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(
        &self,
        table: ScopedTable,
        key: (&str, &str),
        value: &T,
    ) -> Result<(), BomError> {
        let bytes = encode_record(value)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(table).map_err(io_err)?;
            table.insert(key, bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    /// Every record of one workspace, in key order.
    fn scan<T: DeserializeOwned>(
        &self,
        table: ScopedTable,
        workspace: &str,
    ) -> Result<Vec<T>, BomError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(table).map_err(io_err)?;

        let mut out = Vec::new();
        for entry in table.range((workspace, "")..).map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            if key.value().0 != workspace {
                break;
            }
            out.push(decode_record(value.value())?);
        }
        Ok(out)
    }
}

impl PartStore for RedbCatalog {
    fn load_part_master(&self, key: &PartMasterKey) -> Result<Arc<PartMaster>, BomError> {
        self.get::<PartMaster>(PART_MASTERS, key.storage_key())?
            .map(Arc::new)
            .ok_or_else(|| BomError::PartMasterNotFound(key.clone()))
    }

    fn load_configuration_item(
        &self,
        key: &ConfigurationItemKey,
    ) -> Result<ConfigurationItem, BomError> {
        self.get(CONFIGURATION_ITEMS, key.storage_key())?
            .ok_or_else(|| BomError::ConfigurationItemNotFound(key.clone()))
    }
}

impl PartRepository for RedbCatalog {
    fn save_part_master(&mut self, part: PartMaster) -> Result<(), BomError> {
        self.put(PART_MASTERS, part.key.storage_key(), &part)
    }

    fn save_configuration_item(&mut self, item: ConfigurationItem) -> Result<(), BomError> {
        self.put(CONFIGURATION_ITEMS, item.key.storage_key(), &item)
    }

    fn part_masters(&self, workspace: &str) -> Result<Vec<Arc<PartMaster>>, BomError> {
        Ok(self
            .scan::<PartMaster>(PART_MASTERS, workspace)?
            .into_iter()
            .map(Arc::new)
            .collect())
    }

    fn configuration_items(&self, workspace: &str) -> Result<Vec<ConfigurationItem>, BomError> {
        self.scan(CONFIGURATION_ITEMS, workspace)
    }

    fn next_effectivity_id(&mut self, workspace: &str, floor: u64) -> Result<u64, BomError> {
        let key = effectivity_counter_key(workspace);
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let id = {
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            let last = meta
                .get(key.as_str())
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            let id = last.max(floor).checked_add(1).ok_or_else(|| {
                BomError::NotAllowed(format!("effectivity ids exhausted in {}", workspace))
            })?;
            meta.insert(key.as_str(), id).map_err(io_err)?;
            id
        };
        write_txn.commit().map_err(io_err)?;
        Ok(id)
    }
}

impl BaselineStore for RedbCatalog {
    fn save_baseline(&mut self, baseline: ProductBaseline) -> Result<(), BomError> {
        let (workspace, item) = baseline.configuration_item.storage_key();
        let key = (workspace, item, baseline.name.as_str());
        let bytes = encode_record(&baseline)?;

        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut table = write_txn.open_table(BASELINES).map_err(io_err)?;
            if table.get(key).map_err(io_err)?.is_some() {
                return Err(BomError::BaselineAlreadyExists(baseline.name.clone()));
            }
            table.insert(key, bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn load_baseline(
        &self,
        item: &ConfigurationItemKey,
        name: &str,
    ) -> Result<ProductBaseline, BomError> {
        let (workspace, id) = item.storage_key();
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(BASELINES).map_err(io_err)?;
        match table.get((workspace, id, name)).map_err(io_err)? {
            Some(data) => decode_record(data.value()),
            None => Err(BomError::BaselineNotFound(name.to_string())),
        }
    }

    fn baselines(&self, item: &ConfigurationItemKey) -> Result<Vec<ProductBaseline>, BomError> {
        let (workspace, id) = item.storage_key();
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(BASELINES).map_err(io_err)?;

        let mut out = Vec::new();
        for entry in table.range((workspace, id, "")..).map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            let (owner_workspace, owner_id, _) = key.value();
            if owner_workspace != workspace || owner_id != id {
                break;
            }
            out.push(decode_record(value.value())?);
        }
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================
