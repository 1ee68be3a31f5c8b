//! # Product Baselines
//!
//! A baseline is an immutable, named snapshot of one fully resolved
//! configuration of a product: the ordered list of accepted path strings plus
//! the iteration retained for every part.
//!
//! `BaselineCapture` runs the resolver once with a `BaselineCreationFilter`
//! and a `StrictObserver`, so any unresolved or ambiguous node aborts the
//! capture, as does a cyclic structure. Nothing is stored unless the whole
//! walk succeeds.
//!
//! `BaselineFilter` turns a stored baseline back into a `ConfigurationFilter`,
//! which resolves the product exactly as it was frozen.

use crate::catalog::{BaselineStore, PartStore};
use crate::filter::{BaselineCreationFilter, BaselineType, ConfigurationFilter, nominal_link};
use crate::observer::StrictObserver;
use crate::primitives::FORMAT_VERSION;
use crate::product::path_to_string;
use crate::resolver::ConfigurationResolver;
use crate::{BomError, ConfigurationItemKey, PartIteration, PartLink, PartMaster};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// BASELINE RECORD
// =============================================================================

/// Iteration frozen for one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselinedPart {
    pub version: String,
    pub iteration: u32,
}

/// Immutable snapshot of a resolved product structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductBaseline {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: BaselineType,
    pub configuration_item: ConfigurationItemKey,
    pub created: DateTime<Utc>,
    /// Layout version of this record.
    pub format_version: u8,
    /// Accepted path strings, in resolution order (parents first).
    pub paths: Vec<String>,
    /// Part number -> frozen iteration.
    pub baselined_parts: BTreeMap<String, BaselinedPart>,
    #[serde(default)]
    pub substitute_links: BTreeSet<String>,
    #[serde(default)]
    pub optional_usage_links: BTreeSet<String>,
}

impl ProductBaseline {
    /// Frozen iteration of a part, if the part belongs to the baseline.
    #[must_use]
    pub fn baselined_part(&self, number: &str) -> Option<&BaselinedPart> {
        self.baselined_parts.get(number)
    }

    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }
}

// =============================================================================
// CAPTURE
// =============================================================================

/// What to capture: name and the choices made for substitutes and optional
/// links. Choices are path strings.
#[derive(Debug, Clone, Default)]
pub struct BaselineRequest {
    pub name: String,
    pub description: String,
    pub kind: BaselineType,
    pub substitute_links: Vec<String>,
    pub optional_usage_links: Vec<String>,
}

impl BaselineRequest {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: BaselineType) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }
}

/// Captures baselines into a store that also provides the parts.
pub struct BaselineCapture<'a, R: PartStore + BaselineStore + ?Sized> {
    repo: &'a mut R,
}

impl<'a, R: PartStore + BaselineStore + ?Sized> BaselineCapture<'a, R> {
    pub fn new(repo: &'a mut R) -> Self {
        Self { repo }
    }

    /// Resolve the product of `item` and store the result under
    /// `request.name`.
    ///
    /// # Errors
    ///
    /// - `NotAllowed` for an empty name or any unresolved/ambiguous node
    /// - `BaselineAlreadyExists` if the name is taken
    /// - `StructuralConstraint` for a cyclic structure
    /// - any lookup failure of the configuration item or a part
    pub fn capture(
        &mut self,
        item: &ConfigurationItemKey,
        request: BaselineRequest,
    ) -> Result<ProductBaseline, BomError> {
        if request.name.trim().is_empty() {
            return Err(BomError::NotAllowed("baseline name is empty".to_string()));
        }
        match self.repo.load_baseline(item, &request.name) {
            Ok(_) => return Err(BomError::BaselineAlreadyExists(request.name)),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        let configuration_item = self.repo.load_configuration_item(item)?;
        let root = self.repo.load_part_master(&configuration_item.root_key())?;

        let filter = BaselineCreationFilter::new(request.kind)
            .with_substitute_links(request.substitute_links)
            .with_optional_usage_links(request.optional_usage_links);
        let tree = {
            let resolver = ConfigurationResolver::new(&*self.repo, &filter);
            resolver.resolve_from_root(root, None, &mut StrictObserver)?
        };

        let components = tree.flatten();
        let mut baselined_parts = BTreeMap::new();
        for component in &components {
            if let Some(iteration) = &component.retained_iteration {
                baselined_parts.insert(
                    component.number().to_string(),
                    BaselinedPart {
                        version: iteration.key.revision.version.clone(),
                        iteration: iteration.key.iteration,
                    },
                );
            }
        }

        let baseline = ProductBaseline {
            name: request.name,
            description: request.description,
            kind: request.kind,
            configuration_item: item.clone(),
            created: Utc::now(),
            format_version: FORMAT_VERSION,
            paths: components.iter().map(|c| c.path_string()).collect(),
            baselined_parts,
            substitute_links: filter.substitute_links,
            optional_usage_links: filter.optional_usage_links,
        };

        self.repo.save_baseline(baseline.clone())?;
        tracing::info!(
            baseline = %baseline.name,
            item = %item,
            kind = %baseline.kind,
            paths = baseline.paths.len(),
            parts = baseline.baselined_parts.len(),
            "baseline captured"
        );
        Ok(baseline)
    }
}

// =============================================================================
// BASELINE FILTER
// =============================================================================

/// Resolves a product as frozen in a baseline.
#[derive(Debug, Clone)]
pub struct BaselineFilter {
    paths: BTreeSet<String>,
    parts: BTreeMap<String, BaselinedPart>,
}

impl BaselineFilter {
    #[must_use]
    pub fn new(baseline: &ProductBaseline) -> Self {
        Self {
            paths: baseline.paths.iter().cloned().collect(),
            parts: baseline.baselined_parts.clone(),
        }
    }
}

impl ConfigurationFilter for BaselineFilter {
    fn resolve_iterations(&self, part: &PartMaster) -> Result<Vec<PartIteration>, BomError> {
        Ok(self
            .parts
            .get(part.number())
            .and_then(|frozen| part.iteration(&frozen.version, frozen.iteration))
            .cloned()
            .into_iter()
            .collect())
    }

    fn resolve_links(&self, path: &[PartLink]) -> Result<Vec<PartLink>, BomError> {
        let nominal = nominal_link(path)?;
        let parent = &path[..path.len().saturating_sub(1)];

        let candidates = std::iter::once(nominal.clone())
            .chain(nominal.substitutes().iter().cloned().map(PartLink::Substitute));

        let mut accepted = Vec::new();
        for candidate in candidates {
            let mut extended = parent.to_vec();
            extended.push(candidate.clone());
            if self.paths.contains(&path_to_string(&extended)) {
                accepted.push(candidate);
            }
        }
        Ok(accepted)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, PartRepository};
    use crate::{
        ConfigurationItem, PartMasterKey, PartSubstituteLink, PartUsageLink, RevisionStatus,
    };

    fn part(number: &str, links: Vec<PartUsageLink>) -> PartMaster {
        let mut part = PartMaster::new(PartMasterKey::new("ws", number), "alice");
        let rev = part.add_revision("A");
        rev.status = RevisionStatus::Released;
        rev.add_iteration(links);
        part
    }

    fn catalog() -> (Catalog, ConfigurationItemKey) {
        let mut catalog = Catalog::new()
            .with_part(part(
                "P",
                vec![
                    PartUsageLink::new(1, "Q").with_substitute(PartSubstituteLink::new(2, "R")),
                    PartUsageLink::new(3, "OPT").optional(),
                ],
            ))
            .with_part(part("Q", Vec::new()))
            .with_part(part("R", Vec::new()))
            .with_part(part("OPT", Vec::new()));
        let key = ConfigurationItemKey::new("ws", "PRODUCT");
        catalog
            .save_configuration_item(ConfigurationItem::new(key.clone(), "P"))
            .expect("save item");
        (catalog, key)
    }

    #[test]
    fn capture_freezes_paths_and_iterations() {
        let (mut catalog, key) = catalog();
        let baseline = BaselineCapture::new(&mut catalog)
            .capture(&key, BaselineRequest::new("b1", BaselineType::Released))
            .expect("capture");

        assert_eq!(baseline.paths, vec!["-1", "-1-u1"]);
        assert_eq!(
            baseline.baselined_part("Q"),
            Some(&BaselinedPart {
                version: "A".to_string(),
                iteration: 1
            })
        );
        assert!(catalog.load_baseline(&key, "b1").is_ok());
    }

    #[test]
    fn capture_honours_choices() {
        let (mut catalog, key) = catalog();
        let mut request = BaselineRequest::new("b2", BaselineType::Latest);
        request.substitute_links = vec!["-1-s2".to_string()];
        request.optional_usage_links = vec!["-1-u3".to_string()];

        let baseline = BaselineCapture::new(&mut catalog)
            .capture(&key, request)
            .expect("capture");
        assert_eq!(baseline.paths, vec!["-1", "-1-s2", "-1-u3"]);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let (mut catalog, key) = catalog();
        let mut capture = BaselineCapture::new(&mut catalog);
        capture
            .capture(&key, BaselineRequest::new("b1", BaselineType::Latest))
            .expect("first");

        let err = capture
            .capture(&key, BaselineRequest::new("b1", BaselineType::Latest))
            .expect_err("second");
        assert!(matches!(err, BomError::BaselineAlreadyExists(_)));
    }

    #[test]
    fn unreleased_part_blocks_released_capture() {
        let (mut catalog, key) = catalog();
        let mut wip = PartMaster::new(PartMasterKey::new("ws", "Q"), "alice");
        wip.add_revision("A").add_iteration(Vec::new());
        catalog.save_part_master(wip).expect("save");

        let err = BaselineCapture::new(&mut catalog)
            .capture(&key, BaselineRequest::new("b1", BaselineType::Released))
            .expect_err("unreleased");
        assert!(matches!(err, BomError::NotAllowed(_)));
        assert!(catalog.baselines(&key).expect("list").is_empty());
    }

    #[test]
    fn baseline_filter_accepts_only_frozen_links() {
        let (mut catalog, key) = catalog();
        let mut request = BaselineRequest::new("b1", BaselineType::Latest);
        request.substitute_links = vec!["-1-s2".to_string()];
        let baseline = BaselineCapture::new(&mut catalog)
            .capture(&key, request)
            .expect("capture");

        let filter = BaselineFilter::new(&baseline);
        let p = catalog
            .load_part_master(&PartMasterKey::new("ws", "P"))
            .expect("load");
        let usage = p.revisions[0].iterations[0].usage_links[0].clone();
        let links = filter
            .resolve_links(&[PartLink::root("P"), PartLink::Usage(usage)])
            .expect("links");

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].component(), "R");
        assert_eq!(filter.resolve_iterations(&p).expect("iterations").len(), 1);
    }
}
