//! # Configuration Filters
//!
//! A `ConfigurationFilter` is the pluggable policy consulted by the resolver at
//! every node and edge:
//! - `resolve_iterations`: which iteration(s) of a part apply
//! - `resolve_links`: which of {usage link, its substitutes} continue a path
//!
//! The resolver never asks why a filter returned zero, one or many results;
//! it only branches over them. The filters below are the stock policies; a
//! captured baseline provides one more (`baseline::BaselineFilter`).

use crate::effectivity::{EffectivityContext, any_matches};
use crate::product::path_to_string;
use crate::{BomError, PartIteration, PartLink, PartMaster};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// FILTER TRAIT
// =============================================================================

/// Policy deciding which iterations and links a resolution keeps.
///
/// Implementations must be safe for concurrent read access if the same filter
/// is shared by traversals running on several threads.
pub trait ConfigurationFilter {
    /// Iterations of `part` accepted by the policy, in order.
    fn resolve_iterations(&self, part: &PartMaster) -> Result<Vec<PartIteration>, BomError>;

    /// Links accepted for a path whose last element is a usage link.
    /// May be empty for optional links.
    fn resolve_links(&self, path: &[PartLink]) -> Result<Vec<PartLink>, BomError>;
}

impl<F: ConfigurationFilter + ?Sized> ConfigurationFilter for &F {
    fn resolve_iterations(&self, part: &PartMaster) -> Result<Vec<PartIteration>, BomError> {
        (**self).resolve_iterations(part)
    }

    fn resolve_links(&self, path: &[PartLink]) -> Result<Vec<PartLink>, BomError> {
        (**self).resolve_links(path)
    }
}

impl<F: ConfigurationFilter + ?Sized> ConfigurationFilter for Box<F> {
    fn resolve_iterations(&self, part: &PartMaster) -> Result<Vec<PartIteration>, BomError> {
        (**self).resolve_iterations(part)
    }

    fn resolve_links(&self, path: &[PartLink]) -> Result<Vec<PartLink>, BomError> {
        (**self).resolve_links(path)
    }
}

/// Last element of a path, which every `resolve_links` call is about.
pub(crate) fn nominal_link(path: &[PartLink]) -> Result<&PartLink, BomError> {
    path.last()
        .ok_or_else(|| BomError::InvalidPath("empty path".to_string()))
}

/// The nominal link followed by every substitute, in declaration order.
fn with_substitutes(nominal: &PartLink) -> Vec<PartLink> {
    std::iter::once(nominal.clone())
        .chain(nominal.substitutes().iter().cloned().map(PartLink::Substitute))
        .collect()
}

/// Nominal link only, or the nominal link plus all substitutes.
fn nominal_or_divergent(path: &[PartLink], diverge: bool) -> Result<Vec<PartLink>, BomError> {
    let nominal = nominal_link(path)?;
    if diverge {
        Ok(with_substitutes(nominal))
    } else {
        Ok(vec![nominal.clone()])
    }
}

// =============================================================================
// LATEST
// =============================================================================

/// Last checked-in iteration of the last revision.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatestFilter {
    /// Also accept every substitute (ambiguous paths are reported).
    pub diverge: bool,
}

impl LatestFilter {
    #[must_use]
    pub fn new(diverge: bool) -> Self {
        Self { diverge }
    }
}

impl ConfigurationFilter for LatestFilter {
    fn resolve_iterations(&self, part: &PartMaster) -> Result<Vec<PartIteration>, BomError> {
        Ok(part
            .last_revision()
            .and_then(|r| r.last_checked_in_iteration())
            .cloned()
            .into_iter()
            .collect())
    }

    fn resolve_links(&self, path: &[PartLink]) -> Result<Vec<PartLink>, BomError> {
        nominal_or_divergent(path, self.diverge)
    }
}

// =============================================================================
// RELEASED
// =============================================================================

/// Last iteration of the last released revision; nothing if none is released.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleasedFilter {
    pub diverge: bool,
}

impl ReleasedFilter {
    #[must_use]
    pub fn new(diverge: bool) -> Self {
        Self { diverge }
    }
}

impl ConfigurationFilter for ReleasedFilter {
    fn resolve_iterations(&self, part: &PartMaster) -> Result<Vec<PartIteration>, BomError> {
        Ok(part
            .last_released_revision()
            .and_then(|r| r.last_iteration())
            .cloned()
            .into_iter()
            .collect())
    }

    fn resolve_links(&self, path: &[PartLink]) -> Result<Vec<PartLink>, BomError> {
        nominal_or_divergent(path, self.diverge)
    }
}

// =============================================================================
// EFFECTIVITY
// =============================================================================

/// Selects by serial number, date or lot.
///
/// Iterations: the last checked-in iteration of the newest revision whose
/// effectivities match. Links: the nominal link plus every substitute bound by
/// a matching effectivity.
#[derive(Debug, Clone, Default)]
pub struct EffectivityFilter {
    pub context: EffectivityContext,
}

impl EffectivityFilter {
    #[must_use]
    pub fn new(context: EffectivityContext) -> Self {
        Self { context }
    }
}

impl ConfigurationFilter for EffectivityFilter {
    fn resolve_iterations(&self, part: &PartMaster) -> Result<Vec<PartIteration>, BomError> {
        Ok(part
            .revisions
            .iter()
            .rev()
            .find(|r| any_matches(&r.effectivities, &self.context))
            .and_then(|r| r.last_checked_in_iteration())
            .cloned()
            .into_iter()
            .collect())
    }

    fn resolve_links(&self, path: &[PartLink]) -> Result<Vec<PartLink>, BomError> {
        let nominal = nominal_link(path)?;
        let mut links = vec![nominal.clone()];
        links.extend(
            nominal
                .substitutes()
                .iter()
                .filter(|s| any_matches(&s.effectivities, &self.context))
                .cloned()
                .map(PartLink::Substitute),
        );
        Ok(links)
    }
}

// =============================================================================
// BASELINE CREATION
// =============================================================================

/// Which iterations a baseline freezes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineType {
    #[default]
    Latest,
    Released,
}

impl std::fmt::Display for BaselineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Released => write!(f, "released"),
        }
    }
}

impl std::str::FromStr for BaselineType {
    type Err = BomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(Self::Latest),
            "released" => Ok(Self::Released),
            _ => Err(BomError::NotAllowed(format!(
                "invalid baseline type: {}. Use 'latest' or 'released'",
                s
            ))),
        }
    }
}

/// Policy used while capturing a baseline: never ambiguous on links.
///
/// - An optional usage link is dropped unless its path string is retained.
/// - A substitute replaces the nominal link when the path ending with that
///   substitute is listed in `substitute_links`.
#[derive(Debug, Clone, Default)]
pub struct BaselineCreationFilter {
    pub kind: BaselineType,
    pub substitute_links: BTreeSet<String>,
    pub optional_usage_links: BTreeSet<String>,
}

impl BaselineCreationFilter {
    #[must_use]
    pub fn new(kind: BaselineType) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_substitute_links(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.substitute_links.extend(paths);
        self
    }

    #[must_use]
    pub fn with_optional_usage_links(mut self, paths: impl IntoIterator<Item = String>) -> Self {
        self.optional_usage_links.extend(paths);
        self
    }
}

impl ConfigurationFilter for BaselineCreationFilter {
    fn resolve_iterations(&self, part: &PartMaster) -> Result<Vec<PartIteration>, BomError> {
        match self.kind {
            BaselineType::Latest => LatestFilter::new(false).resolve_iterations(part),
            BaselineType::Released => ReleasedFilter::new(false).resolve_iterations(part),
        }
    }

    fn resolve_links(&self, path: &[PartLink]) -> Result<Vec<PartLink>, BomError> {
        let nominal = nominal_link(path)?;

        if nominal.is_optional() && !self.optional_usage_links.contains(&path_to_string(path)) {
            return Ok(Vec::new());
        }

        let parent = &path[..path.len().saturating_sub(1)];
        for substitute in nominal.substitutes() {
            let mut candidate = parent.to_vec();
            candidate.push(PartLink::Substitute(substitute.clone()));
            if self.substitute_links.contains(&path_to_string(&candidate)) {
                return Ok(vec![PartLink::Substitute(substitute.clone())]);
            }
        }

        Ok(vec![nominal.clone()])
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effectivity::Effectivity;
    use crate::{PartMasterKey, PartSubstituteLink, PartUsageLink, RevisionStatus};
    use chrono::{TimeZone, Utc};

    fn part_with_two_revisions() -> PartMaster {
        let mut part = PartMaster::new(PartMasterKey::new("ws", "P"), "alice");
        let a = part.add_revision("A");
        a.status = RevisionStatus::Released;
        a.add_iteration(Vec::new());
        a.add_iteration(Vec::new());
        let b = part.add_revision("B");
        b.add_iteration(Vec::new());
        b.add_iteration(Vec::new());
        b.checked_out_by = Some("bob".to_string());
        part
    }

    fn path_to_q() -> Vec<PartLink> {
        let usage = PartUsageLink::new(1, "Q")
            .with_substitute(PartSubstituteLink::new(2, "R"))
            .with_substitute(PartSubstituteLink::new(3, "S"));
        vec![PartLink::root("P"), PartLink::Usage(usage)]
    }

    fn keys(iterations: &[PartIteration]) -> Vec<String> {
        iterations.iter().map(|i| i.key.to_string()).collect()
    }

    #[test]
    fn latest_takes_checked_in_iteration_of_last_revision() {
        let part = part_with_two_revisions();
        let found = LatestFilter::new(false).resolve_iterations(&part).expect("filter");
        assert_eq!(keys(&found), vec!["ws/P-B-1"]);
    }

    #[test]
    fn released_takes_last_released_revision() {
        let part = part_with_two_revisions();
        let found = ReleasedFilter::new(false).resolve_iterations(&part).expect("filter");
        assert_eq!(keys(&found), vec!["ws/P-A-2"]);

        let mut unreleased = part;
        unreleased.revisions[0].status = RevisionStatus::WorkInProgress;
        let found = ReleasedFilter::new(false)
            .resolve_iterations(&unreleased)
            .expect("filter");
        assert!(found.is_empty());
    }

    #[test]
    fn divergent_filter_returns_substitutes() {
        let path = path_to_q();
        let nominal = LatestFilter::new(false).resolve_links(&path).expect("links");
        let all = LatestFilter::new(true).resolve_links(&path).expect("links");

        assert_eq!(nominal.len(), 1);
        let components: Vec<_> = all.iter().map(PartLink::component).collect();
        assert_eq!(components, vec!["Q", "R", "S"]);
    }

    #[test]
    fn effectivity_filter_picks_matching_revision_and_substitute() {
        let mut part = part_with_two_revisions();
        part.revisions[0].effectivities.push(
            Effectivity::serial_number_based(1, "early", Some("1"), Some("99")).expect("eff"),
        );
        part.revisions[1]
            .effectivities
            .push(Effectivity::serial_number_based(2, "late", Some("100"), None).expect("eff"));

        let early = EffectivityFilter::new(EffectivityContext::for_serial_number("5"));
        let late = EffectivityFilter::new(EffectivityContext::for_serial_number("500"));
        assert_eq!(keys(&early.resolve_iterations(&part).expect("filter")), vec!["ws/P-A-2"]);
        assert_eq!(keys(&late.resolve_iterations(&part).expect("filter")), vec!["ws/P-B-1"]);

        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("date");
        let usage = PartUsageLink::new(1, "Q").with_substitute(
            PartSubstituteLink::new(2, "R")
                .with_effectivity(Effectivity::date_based(3, "d", Some(date), None).expect("eff")),
        );
        let path = vec![PartLink::root("P"), PartLink::Usage(usage)];

        let before = EffectivityFilter::new(EffectivityContext::at_date(
            Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).single().expect("date"),
        ));
        let after = EffectivityFilter::new(EffectivityContext::at_date(date));
        assert_eq!(before.resolve_links(&path).expect("links").len(), 1);
        assert_eq!(after.resolve_links(&path).expect("links").len(), 2);
    }

    #[test]
    fn baseline_creation_drops_unretained_optional_links() {
        let usage = PartUsageLink::new(4, "OPT").optional();
        let path = vec![PartLink::root("P"), PartLink::Usage(usage)];

        let dropping = BaselineCreationFilter::new(BaselineType::Latest);
        assert!(dropping.resolve_links(&path).expect("links").is_empty());

        let keeping = BaselineCreationFilter::new(BaselineType::Latest)
            .with_optional_usage_links(vec!["-1-u4".to_string()]);
        assert_eq!(keeping.resolve_links(&path).expect("links").len(), 1);
    }

    #[test]
    fn baseline_creation_prefers_chosen_substitute() {
        let filter = BaselineCreationFilter::new(BaselineType::Latest)
            .with_substitute_links(vec!["-1-s3".to_string()]);
        let links = filter.resolve_links(&path_to_q()).expect("links");

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].full_id(), "s3");
    }

    #[test]
    fn empty_path_is_invalid() {
        assert!(matches!(
            LatestFilter::new(false).resolve_links(&[]),
            Err(BomError::InvalidPath(_))
        ));
    }

    #[test]
    fn baseline_type_parses() {
        assert_eq!("Released".parse::<BaselineType>().expect("parse"), BaselineType::Released);
        assert!("frozen".parse::<BaselineType>().is_err());
    }
}
