//! # Catalog Snapshot
//!
//! Portable JSON form of one workspace: part masters, configuration items and
//! baselines. Used by the CLI `import` and `export` commands and by fixtures.
//!
//! Export is deterministic: every list comes out in key order.

use crate::baseline::ProductBaseline;
use crate::catalog::{BaselineStore, PartRepository};
use crate::primitives::{FORMAT_VERSION, MAX_IMPORT_PARTS};
use crate::{BomError, ConfigurationItem, PartMaster};
use serde::{Deserialize, Serialize};

/// Everything stored for one workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub format_version: u8,
    pub workspace: String,
    #[serde(default)]
    pub part_masters: Vec<PartMaster>,
    #[serde(default)]
    pub configuration_items: Vec<ConfigurationItem>,
    #[serde(default)]
    pub baselines: Vec<ProductBaseline>,
}

/// Counts reported after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub part_masters: usize,
    pub configuration_items: usize,
    pub baselines: usize,
    /// Baselines already present under the same name, left untouched.
    pub skipped_baselines: usize,
}

impl CatalogSnapshot {
    /// Empty snapshot for a workspace.
    #[must_use]
    pub fn new(workspace: impl Into<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            workspace: workspace.into(),
            part_masters: Vec::new(),
            configuration_items: Vec::new(),
            baselines: Vec::new(),
        }
    }

    /// Collect the content of `workspace` from a repository.
    pub fn collect<R>(repo: &R, workspace: &str) -> Result<Self, BomError>
    where
        R: PartRepository + BaselineStore + ?Sized,
    {
        let mut snapshot = Self::new(workspace);
        snapshot.part_masters = repo
            .part_masters(workspace)?
            .iter()
            .map(|part| PartMaster::clone(part))
            .collect();
        snapshot.configuration_items = repo.configuration_items(workspace)?;
        for item in &snapshot.configuration_items {
            snapshot.baselines.extend(repo.baselines(&item.key)?);
        }
        Ok(snapshot)
    }

    /// Write the snapshot into a repository.
    ///
    /// Parts and configuration items are inserted or replaced. Baselines are
    /// immutable, so an existing baseline with the same name is kept and
    /// counted as skipped.
    pub fn apply<R>(self, repo: &mut R) -> Result<ImportSummary, BomError>
    where
        R: PartRepository + BaselineStore + ?Sized,
    {
        self.validate()?;
        let mut summary = ImportSummary::default();

        for part in self.part_masters {
            repo.save_part_master(part)?;
            summary.part_masters += 1;
        }
        for item in self.configuration_items {
            repo.save_configuration_item(item)?;
            summary.configuration_items += 1;
        }
        for baseline in self.baselines {
            let name = baseline.name.clone();
            match repo.save_baseline(baseline) {
                Ok(()) => summary.baselines += 1,
                Err(BomError::BaselineAlreadyExists(_)) => {
                    tracing::warn!(baseline = %name, "baseline already exists, skipped");
                    summary.skipped_baselines += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            workspace = %self.workspace,
            parts = summary.part_masters,
            items = summary.configuration_items,
            baselines = summary.baselines,
            "catalog imported"
        );
        Ok(summary)
    }

    /// Check version, size and workspace consistency.
    pub fn validate(&self) -> Result<(), BomError> {
        if self.format_version != FORMAT_VERSION {
            return Err(BomError::Deserialization(format!(
                "Unsupported snapshot version: {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }
        if self.part_masters.len() > MAX_IMPORT_PARTS {
            return Err(BomError::NotAllowed(format!(
                "snapshot holds {} parts, maximum is {}",
                self.part_masters.len(),
                MAX_IMPORT_PARTS
            )));
        }
        let foreign = self
            .part_masters
            .iter()
            .map(|p| &p.key.workspace)
            .chain(self.configuration_items.iter().map(|i| &i.key.workspace))
            .find(|ws| **ws != self.workspace);
        if let Some(ws) = foreign {
            return Err(BomError::NotAllowed(format!(
                "snapshot for workspace {} contains data of workspace {}",
                self.workspace, ws
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, BomError> {
        serde_json::to_string_pretty(self).map_err(|e| BomError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, BomError> {
        serde_json::from_str(json).map_err(|e| BomError::Deserialization(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, PartStore};
    use crate::{ConfigurationItemKey, PartMasterKey, PartUsageLink};

    fn filled() -> Catalog {
        let mut p = PartMaster::new(PartMasterKey::new("ws", "P"), "alice");
        p.add_revision("A")
            .add_iteration(vec![PartUsageLink::new(1, "Q").optional()]);
        let mut q = PartMaster::new(PartMasterKey::new("ws", "Q"), "alice");
        q.add_revision("A").add_iteration(Vec::new());

        let mut catalog = Catalog::new().with_part(p).with_part(q);
        catalog
            .save_configuration_item(ConfigurationItem::new(
                ConfigurationItemKey::new("ws", "PRODUCT"),
                "P",
            ))
            .expect("save item");
        catalog
    }

    #[test]
    fn json_export_import_preserves_catalog() {
        let source = filled();
        let json = CatalogSnapshot::collect(&source, "ws")
            .expect("collect")
            .to_json()
            .expect("json");

        let mut target = Catalog::new();
        let summary = CatalogSnapshot::from_json(&json)
            .expect("parse")
            .apply(&mut target)
            .expect("apply");

        assert_eq!(summary.part_masters, 2);
        assert_eq!(summary.configuration_items, 1);
        let key = PartMasterKey::new("ws", "P");
        assert_eq!(
            target.load_part_master(&key).expect("load"),
            source.load_part_master(&key).expect("load")
        );
    }

    #[test]
    fn foreign_workspace_is_rejected() {
        let mut snapshot = CatalogSnapshot::new("ws");
        snapshot
            .part_masters
            .push(PartMaster::new(PartMasterKey::new("other", "X"), "bob"));

        assert!(matches!(
            snapshot.apply(&mut Catalog::new()),
            Err(BomError::NotAllowed(_))
        ));
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut snapshot = CatalogSnapshot::new("ws");
        snapshot.format_version = 99;
        assert!(snapshot.validate().is_err());
    }
}
