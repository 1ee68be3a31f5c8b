//! # Part Catalog
//!
//! Storage seams consumed by the resolver and by the management operations,
//! plus the in-memory `Catalog` implementing all of them.
//!
//! - `PartStore`: read-only lookups. This is all the resolver needs.
//! - `PartRepository`: writes and listings used by effectivity management
//!   and by the CLI.
//! - `BaselineStore`: immutable, named baselines per configuration item.
//!
//! All fallible operations return `Result<T, BomError>` so the in-memory
//! catalog and the redb-backed `RedbCatalog` can be used interchangeably.
//! All maps are `BTreeMap` so every listing comes out in key order.

use crate::baseline::ProductBaseline;
use crate::primitives::{PATH_SEPARATOR, ROOT_LINK_FULL_ID};
use crate::{BomError, ConfigurationItem, ConfigurationItemKey, PartLink, PartMaster, PartMasterKey};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// STORE TRAITS
// =============================================================================

/// Lookup of parts and configuration items.
///
/// Implementations must be safe for concurrent read access when one store is
/// shared by traversals on several threads.
pub trait PartStore {
    /// Load a part master; `PartMasterNotFound` if absent.
    fn load_part_master(&self, key: &PartMasterKey) -> Result<Arc<PartMaster>, BomError>;

    /// Load a configuration item; `ConfigurationItemNotFound` if absent.
    fn load_configuration_item(
        &self,
        key: &ConfigurationItemKey,
    ) -> Result<ConfigurationItem, BomError>;
}

/// Writable part storage.
pub trait PartRepository: PartStore {
    /// Insert or replace a part master.
    fn save_part_master(&mut self, part: PartMaster) -> Result<(), BomError>;

    /// Insert or replace a configuration item.
    fn save_configuration_item(&mut self, item: ConfigurationItem) -> Result<(), BomError>;

    /// Every part master of a workspace, ordered by number.
    fn part_masters(&self, workspace: &str) -> Result<Vec<Arc<PartMaster>>, BomError>;

    /// Every configuration item of a workspace, ordered by id.
    fn configuration_items(&self, workspace: &str) -> Result<Vec<ConfigurationItem>, BomError>;

    /// Allocate an effectivity id in a workspace: one above both `floor` and
    /// the last id allocated there. An id is never handed out twice, even
    /// after the effectivity holding it is deleted.
    fn next_effectivity_id(&mut self, workspace: &str, floor: u64) -> Result<u64, BomError>;
}

/// Storage of captured baselines.
pub trait BaselineStore {
    /// Store a new baseline. Fails with `BaselineAlreadyExists` if the
    /// configuration item already has a baseline with that name.
    fn save_baseline(&mut self, baseline: ProductBaseline) -> Result<(), BomError>;

    fn load_baseline(
        &self,
        item: &ConfigurationItemKey,
        name: &str,
    ) -> Result<ProductBaseline, BomError>;

    /// Baselines of a configuration item, ordered by name.
    fn baselines(&self, item: &ConfigurationItemKey) -> Result<Vec<ProductBaseline>, BomError>;
}

// =============================================================================
// IN-MEMORY CATALOG
// =============================================================================

/// In-memory catalog.
///
/// Part masters are kept behind `Arc` so a lookup hands out a shared,
/// immutable view without copying the revision history.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    parts: BTreeMap<PartMasterKey, Arc<PartMaster>>,
    items: BTreeMap<ConfigurationItemKey, ConfigurationItem>,
    /// (configuration item, baseline name) -> baseline
    baselines: BTreeMap<(ConfigurationItemKey, String), ProductBaseline>,
    /// workspace -> last allocated effectivity id
    effectivity_ids: BTreeMap<String, u64>,
}

impl Catalog {
    /// Create a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of part masters across workspaces.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Builder-style insertion, convenient for fixtures.
    #[must_use]
    pub fn with_part(mut self, part: PartMaster) -> Self {
        self.parts.insert(part.key.clone(), Arc::new(part));
        self
    }
}

impl PartStore for Catalog {
    fn load_part_master(&self, key: &PartMasterKey) -> Result<Arc<PartMaster>, BomError> {
        self.parts
            .get(key)
            .cloned()
            .ok_or_else(|| BomError::PartMasterNotFound(key.clone()))
    }

    fn load_configuration_item(
        &self,
        key: &ConfigurationItemKey,
    ) -> Result<ConfigurationItem, BomError> {
        self.items
            .get(key)
            .cloned()
            .ok_or_else(|| BomError::ConfigurationItemNotFound(key.clone()))
    }
}

impl PartRepository for Catalog {
    fn save_part_master(&mut self, part: PartMaster) -> Result<(), BomError> {
        self.parts.insert(part.key.clone(), Arc::new(part));
        Ok(())
    }

    fn save_configuration_item(&mut self, item: ConfigurationItem) -> Result<(), BomError> {
        self.items.insert(item.key.clone(), item);
        Ok(())
    }

    fn part_masters(&self, workspace: &str) -> Result<Vec<Arc<PartMaster>>, BomError> {
        Ok(self
            .parts
            .iter()
            .filter(|(key, _)| key.workspace == workspace)
            .map(|(_, part)| Arc::clone(part))
            .collect())
    }

    fn configuration_items(&self, workspace: &str) -> Result<Vec<ConfigurationItem>, BomError> {
        Ok(self
            .items
            .values()
            .filter(|item| item.key.workspace == workspace)
            .cloned()
            .collect())
    }

    fn next_effectivity_id(&mut self, workspace: &str, floor: u64) -> Result<u64, BomError> {
        let last = self.effectivity_ids.entry(workspace.to_string()).or_insert(0);
        let id = (*last).max(floor).checked_add(1).ok_or_else(|| {
            BomError::NotAllowed(format!("effectivity ids exhausted in {}", workspace))
        })?;
        *last = id;
        Ok(id)
    }
}

impl BaselineStore for Catalog {
    fn save_baseline(&mut self, baseline: ProductBaseline) -> Result<(), BomError> {
        let key = (baseline.configuration_item.clone(), baseline.name.clone());
        if self.baselines.contains_key(&key) {
            return Err(BomError::BaselineAlreadyExists(baseline.name));
        }
        self.baselines.insert(key, baseline);
        Ok(())
    }

    fn load_baseline(
        &self,
        item: &ConfigurationItemKey,
        name: &str,
    ) -> Result<ProductBaseline, BomError> {
        self.baselines
            .get(&(item.clone(), name.to_string()))
            .cloned()
            .ok_or_else(|| BomError::BaselineNotFound(name.to_string()))
    }

    fn baselines(&self, item: &ConfigurationItemKey) -> Result<Vec<ProductBaseline>, BomError> {
        Ok(self
            .baselines
            .iter()
            .filter(|((owner, _), _)| owner == item)
            .map(|(_, baseline)| baseline.clone())
            .collect())
    }
}

// =============================================================================
// PATH DECODING
// =============================================================================

/// Rebuild a path from its string form (`-1-u12-s3`), starting at `root`.
///
/// Each full id is looked up among the links of the part reached so far, so
/// the result carries the real link values (amounts, substitutes) and can be
/// handed to `ConfigurationResolver::resolve_from_path`.
pub fn decode_path<S: PartStore + ?Sized>(
    store: &S,
    root: &PartMasterKey,
    path: &str,
) -> Result<Vec<PartLink>, BomError> {
    let rest = path
        .strip_prefix(ROOT_LINK_FULL_ID)
        .ok_or_else(|| BomError::InvalidPath(format!("{} does not start at the root", path)))?;

    let full_ids: Vec<&str> = match rest.strip_prefix(PATH_SEPARATOR) {
        Some(tail) => tail.split(PATH_SEPARATOR).collect(),
        None if rest.is_empty() => Vec::new(),
        None => {
            return Err(BomError::InvalidPath(format!(
                "{} has no separator after the root",
                path
            )));
        }
    };
    if full_ids.iter().any(|s| s.is_empty()) {
        return Err(BomError::InvalidPath(format!("{} has an empty link id", path)));
    }

    let mut links = vec![PartLink::root(root.number.clone())];
    let mut current = store.load_part_master(root)?;

    for full_id in full_ids {
        let link = current.find_link(full_id).ok_or_else(|| {
            BomError::InvalidPath(format!("{} has no link {}", current.key, full_id))
        })?;
        current =
            store.load_part_master(&PartMasterKey::new(root.workspace.clone(), link.component()))?;
        links.push(link);
    }

    Ok(links)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::path_to_string;
    use crate::{PartSubstituteLink, PartUsageLink};

    fn part(number: &str, links: Vec<PartUsageLink>) -> PartMaster {
        let mut part = PartMaster::new(PartMasterKey::new("ws", number), "alice");
        part.add_revision("A").add_iteration(links);
        part
    }

    fn catalog() -> Catalog {
        Catalog::new()
            .with_part(part(
                "P",
                vec![PartUsageLink::new(12, "Q").with_substitute(PartSubstituteLink::new(3, "R"))],
            ))
            .with_part(part("Q", Vec::new()))
            .with_part(part("R", Vec::new()))
    }

    #[test]
    fn missing_part_is_not_found() {
        let catalog = Catalog::new();
        let err = catalog
            .load_part_master(&PartMasterKey::new("ws", "X"))
            .expect_err("absent");
        assert!(matches!(err, BomError::PartMasterNotFound(_)));
    }

    #[test]
    fn listings_are_scoped_and_ordered() {
        let mut catalog = catalog();
        catalog
            .save_part_master(PartMaster::new(PartMasterKey::new("other", "A"), "bob"))
            .expect("save");

        let numbers: Vec<_> = catalog
            .part_masters("ws")
            .expect("list")
            .iter()
            .map(|p| p.number().to_string())
            .collect();
        assert_eq!(numbers, vec!["P", "Q", "R"]);
        assert_eq!(catalog.part_count(), 4);
    }

    #[test]
    fn decode_path_finds_substitutes() {
        let catalog = catalog();
        let root = PartMasterKey::new("ws", "P");

        let path = decode_path(&catalog, &root, "-1-s3").expect("decode");
        assert_eq!(path_to_string(&path), "-1-s3");
        assert_eq!(path[1].component(), "R");

        let root_only = decode_path(&catalog, &root, "-1").expect("decode");
        assert_eq!(root_only.len(), 1);
    }

    #[test]
    fn decode_path_rejects_unknown_links() {
        let catalog = catalog();
        let root = PartMasterKey::new("ws", "P");

        assert!(matches!(
            decode_path(&catalog, &root, "-1-u99"),
            Err(BomError::InvalidPath(_))
        ));
        assert!(matches!(
            decode_path(&catalog, &root, "u12"),
            Err(BomError::InvalidPath(_))
        ));
    }

    #[test]
    fn decode_path_needs_separators_between_links() {
        let catalog = catalog();
        let root = PartMasterKey::new("ws", "P");

        for malformed in ["-1u12", "-1--u12", "-1-u12-"] {
            assert!(
                matches!(
                    decode_path(&catalog, &root, malformed),
                    Err(BomError::InvalidPath(_))
                ),
                "{malformed} should be rejected"
            );
        }
    }
}
