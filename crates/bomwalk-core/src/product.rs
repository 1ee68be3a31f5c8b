//! # Product Data Model
//!
//! Parts, their revisions and iterations, and the links that form the BOM
//! graph.
//!
//! A `PartMaster` owns `PartRevision`s, each revision owns ordered
//! `PartIteration`s, and each iteration owns the outgoing `PartUsageLink`s of
//! that snapshot. Links name their child by part number only; the child is
//! loaded through a `PartStore` when the resolver reaches it.
//!
//! `PartLink` is the element type of a path. Besides usage and substitute
//! links it has a `Root` variant, the synthetic link the resolver places at
//! element zero so the traversal root needs no special case.

use crate::effectivity::Effectivity;
use crate::primitives::{
    PATH_SEPARATOR, ROOT_LINK_FULL_ID, ROOT_LINK_ID, SUBSTITUTE_LINK_PREFIX, USAGE_LINK_PREFIX,
};
use crate::{ConfigurationItemKey, PartIterationKey, PartMasterKey, PartRevisionKey};
use serde::{Deserialize, Serialize};

// =============================================================================
// LINKS
// =============================================================================

/// Alternative child for a usage link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSubstituteLink {
    pub id: u64,
    pub amount: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_description: Option<String>,
    /// Part number of the substitute child.
    pub component: String,
    /// Optional validity windows; empty means "not bound".
    #[serde(default)]
    pub effectivities: Vec<Effectivity>,
}

impl PartSubstituteLink {
    #[must_use]
    pub fn new(id: u64, component: impl Into<String>) -> Self {
        Self {
            id,
            amount: 1.0,
            unit: None,
            reference_description: None,
            component: component.into(),
            effectivities: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_effectivity(mut self, effectivity: Effectivity) -> Self {
        self.effectivities.push(effectivity);
        self
    }
}

/// A BOM edge: `amount` of the child part, possibly optional, with an ordered
/// list of substitutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartUsageLink {
    pub id: u64,
    pub amount: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub reference_description: Option<String>,
    /// Part number of the child.
    pub component: String,
    #[serde(default)]
    pub substitutes: Vec<PartSubstituteLink>,
}

impl PartUsageLink {
    /// Mandatory link to one unit of `component`.
    #[must_use]
    pub fn new(id: u64, component: impl Into<String>) -> Self {
        Self {
            id,
            amount: 1.0,
            unit: None,
            optional: false,
            comment: String::new(),
            reference_description: None,
            component: component.into(),
            substitutes: Vec::new(),
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn with_amount(mut self, amount: f64, unit: Option<&str>) -> Self {
        self.amount = amount;
        self.unit = unit.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_substitute(mut self, substitute: PartSubstituteLink) -> Self {
        self.substitutes.push(substitute);
        self
    }
}

/// One element of a path through the BOM graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartLink {
    /// Synthetic link pointing at the traversal root.
    Root { component: String },
    Usage(PartUsageLink),
    Substitute(PartSubstituteLink),
}

impl PartLink {
    /// Synthetic root link for the given part.
    #[must_use]
    pub fn root(component: impl Into<String>) -> Self {
        Self::Root {
            component: component.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            Self::Root { .. } => ROOT_LINK_ID,
            Self::Usage(link) => link.id,
            Self::Substitute(link) => link.id,
        }
    }

    /// Identifier used in path strings: `-1`, `u<id>` or `s<id>`.
    #[must_use]
    pub fn full_id(&self) -> String {
        match self {
            Self::Root { .. } => ROOT_LINK_FULL_ID.to_string(),
            Self::Usage(link) => format!("{}{}", USAGE_LINK_PREFIX, link.id),
            Self::Substitute(link) => format!("{}{}", SUBSTITUTE_LINK_PREFIX, link.id),
        }
    }

    #[must_use]
    pub fn amount(&self) -> f64 {
        match self {
            Self::Root { .. } => 1.0,
            Self::Usage(link) => link.amount,
            Self::Substitute(link) => link.amount,
        }
    }

    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Root { .. } => None,
            Self::Usage(link) => link.unit.as_deref(),
            Self::Substitute(link) => link.unit.as_deref(),
        }
    }

    /// Only usage links can be optional.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Usage(link) if link.optional)
    }

    /// Part number of the child this link points at.
    #[must_use]
    pub fn component(&self) -> &str {
        match self {
            Self::Root { component } => component,
            Self::Usage(link) => &link.component,
            Self::Substitute(link) => &link.component,
        }
    }

    #[must_use]
    pub fn substitutes(&self) -> &[PartSubstituteLink] {
        match self {
            Self::Usage(link) => &link.substitutes,
            Self::Root { .. } | Self::Substitute(_) => &[],
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root { .. })
    }
}

/// Serialize a path as its link full ids joined by `-` (e.g. `-1-u12-s3`).
#[must_use]
pub fn path_to_string(path: &[PartLink]) -> String {
    path.iter()
        .map(PartLink::full_id)
        .collect::<Vec<_>>()
        .join(&PATH_SEPARATOR.to_string())
}

// =============================================================================
// ITERATION / REVISION / MASTER
// =============================================================================

/// One immutable snapshot of a revision's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartIteration {
    pub key: PartIterationKey,
    #[serde(default)]
    pub usage_links: Vec<PartUsageLink>,
}

impl PartIteration {
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.usage_links.is_empty()
    }
}

/// Lifecycle state consulted by release-based policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionStatus {
    #[default]
    WorkInProgress,
    Released,
    Obsolete,
}

impl std::fmt::Display for RevisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkInProgress => write!(f, "wip"),
            Self::Released => write!(f, "released"),
            Self::Obsolete => write!(f, "obsolete"),
        }
    }
}

/// One version line of a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRevision {
    pub key: PartRevisionKey,
    #[serde(default)]
    pub status: RevisionStatus,
    /// Set while a user holds the last iteration as a working copy.
    #[serde(default)]
    pub checked_out_by: Option<String>,
    #[serde(default)]
    pub iterations: Vec<PartIteration>,
    #[serde(default)]
    pub effectivities: Vec<Effectivity>,
}

impl PartRevision {
    #[must_use]
    pub fn new(key: PartRevisionKey) -> Self {
        Self {
            key,
            status: RevisionStatus::default(),
            checked_out_by: None,
            iterations: Vec::new(),
            effectivities: Vec::new(),
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.key.version
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.status == RevisionStatus::Released
    }

    #[must_use]
    pub fn is_checked_out(&self) -> bool {
        self.checked_out_by.is_some()
    }

    /// Append a new iteration with the given outgoing links.
    pub fn add_iteration(&mut self, usage_links: Vec<PartUsageLink>) -> PartIterationKey {
        let number = u32::try_from(self.iterations.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        let key = PartIterationKey::new(self.key.clone(), number);
        self.iterations.push(PartIteration {
            key: key.clone(),
            usage_links,
        });
        key
    }

    #[must_use]
    pub fn iteration(&self, number: u32) -> Option<&PartIteration> {
        self.iterations.iter().find(|it| it.key.iteration == number)
    }

    #[must_use]
    pub fn last_iteration(&self) -> Option<&PartIteration> {
        self.iterations.last()
    }

    /// Last iteration visible to everyone: when the revision is checked out
    /// the last iteration is the working copy, so the one before it is used.
    #[must_use]
    pub fn last_checked_in_iteration(&self) -> Option<&PartIteration> {
        if self.is_checked_out() {
            let len = self.iterations.len();
            len.checked_sub(2).and_then(|i| self.iterations.get(i))
        } else {
            self.iterations.last()
        }
    }
}

/// Identity of a part and owner of its revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartMaster {
    pub key: PartMasterKey,
    #[serde(default)]
    pub name: String,
    pub author: String,
    #[serde(default)]
    pub revisions: Vec<PartRevision>,
}

impl PartMaster {
    #[must_use]
    pub fn new(key: PartMasterKey, author: impl Into<String>) -> Self {
        Self {
            key,
            name: String::new(),
            author: author.into(),
            revisions: Vec::new(),
        }
    }

    #[must_use]
    pub fn number(&self) -> &str {
        &self.key.number
    }

    /// Append a new revision and return it for further building.
    pub fn add_revision(&mut self, version: impl Into<String>) -> &mut PartRevision {
        let key = PartRevisionKey::new(self.key.clone(), version);
        self.revisions.push(PartRevision::new(key));
        let last = self.revisions.len().saturating_sub(1);
        &mut self.revisions[last]
    }

    #[must_use]
    pub fn revision(&self, version: &str) -> Option<&PartRevision> {
        self.revisions.iter().find(|r| r.version() == version)
    }

    pub fn revision_mut(&mut self, version: &str) -> Option<&mut PartRevision> {
        self.revisions.iter_mut().find(|r| r.version() == version)
    }

    #[must_use]
    pub fn last_revision(&self) -> Option<&PartRevision> {
        self.revisions.last()
    }

    #[must_use]
    pub fn last_released_revision(&self) -> Option<&PartRevision> {
        self.revisions.iter().rev().find(|r| r.is_released())
    }

    #[must_use]
    pub fn iteration(&self, version: &str, number: u32) -> Option<&PartIteration> {
        self.revision(version)?.iteration(number)
    }

    /// Find a usage link or substitute by full id among every iteration,
    /// newest first.
    #[must_use]
    pub fn find_link(&self, full_id: &str) -> Option<PartLink> {
        for revision in self.revisions.iter().rev() {
            for iteration in revision.iterations.iter().rev() {
                for usage in &iteration.usage_links {
                    let link = PartLink::Usage(usage.clone());
                    if link.full_id() == full_id {
                        return Some(link);
                    }
                    for substitute in &usage.substitutes {
                        let link = PartLink::Substitute(substitute.clone());
                        if link.full_id() == full_id {
                            return Some(link);
                        }
                    }
                }
            }
        }
        None
    }
}

// =============================================================================
// CONFIGURATION ITEM
// =============================================================================

/// Named product definition anchoring a traversal root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationItem {
    pub key: ConfigurationItemKey,
    #[serde(default)]
    pub description: String,
    /// Part number of the product's root part.
    pub design_item: String,
}

impl ConfigurationItem {
    #[must_use]
    pub fn new(key: ConfigurationItemKey, design_item: impl Into<String>) -> Self {
        Self {
            key,
            description: String::new(),
            design_item: design_item.into(),
        }
    }

    #[must_use]
    pub fn root_key(&self) -> PartMasterKey {
        PartMasterKey::new(self.key.workspace.clone(), self.design_item.clone())
    }
}

// =============================================================================
// TESTS
// =============================================================================
