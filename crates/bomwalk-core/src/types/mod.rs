//! # Core Type Definitions
//!
//! Identity keys and the error type shared by every bomwalk module:
//! - Part identifiers (`PartMasterKey`, `PartRevisionKey`, `PartIterationKey`)
//! - Product anchor identifier (`ConfigurationItemKey`)
//! - Error types (`BomError`)
//!
//! ## Ordering Guarantees
//!
//! All keys implement `Ord` so they can live in `BTreeMap`/`BTreeSet` and
//! every listing produced by the crate comes out in the same order.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// PART IDENTIFIERS
// =============================================================================

/// Identity of a part, independent of any revision.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartMasterKey {
    /// Workspace owning the part.
    pub workspace: String,
    /// Part number, unique inside the workspace.
    pub number: String,
}

impl PartMasterKey {
    #[must_use]
    pub fn new(workspace: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            number: number.into(),
        }
    }

    /// Storage key used by persistent backends: `(workspace, number)`.
    #[must_use]
    pub fn storage_key(&self) -> (&str, &str) {
        (&self.workspace, &self.number)
    }
}

impl fmt::Display for PartMasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace, self.number)
    }
}

/// Identity of one revision line of a part (e.g. "A", "B").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartRevisionKey {
    pub part: PartMasterKey,
    pub version: String,
}

impl PartRevisionKey {
    #[must_use]
    pub fn new(part: PartMasterKey, version: impl Into<String>) -> Self {
        Self {
            part,
            version: version.into(),
        }
    }
}

impl fmt::Display for PartRevisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.part, self.version)
    }
}

/// Identity of one immutable iteration inside a revision. Iterations are
/// numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartIterationKey {
    pub revision: PartRevisionKey,
    pub iteration: u32,
}

impl PartIterationKey {
    #[must_use]
    pub fn new(revision: PartRevisionKey, iteration: u32) -> Self {
        Self {
            revision,
            iteration,
        }
    }

    /// Part number this iteration belongs to.
    #[must_use]
    pub fn number(&self) -> &str {
        &self.revision.part.number
    }
}

impl fmt::Display for PartIterationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.revision, self.iteration)
    }
}

// =============================================================================
// CONFIGURATION ITEM IDENTIFIER
// =============================================================================

/// Identity of a named product definition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigurationItemKey {
    pub workspace: String,
    pub id: String,
}

impl ConfigurationItemKey {
    #[must_use]
    pub fn new(workspace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn storage_key(&self) -> (&str, &str) {
        (&self.workspace, &self.id)
    }
}

impl fmt::Display for ConfigurationItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace, self.id)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in bomwalk.
///
/// Ambiguity and emptiness during resolution are NOT errors: they are reported
/// to the observer, which may turn them into `NotAllowed`. The only condition
/// the resolver raises on its own is `StructuralConstraint`.
#[derive(Debug, Error)]
pub enum BomError {
    /// No part master is stored under the key.
    #[error("Part master not found: {0}")]
    PartMasterNotFound(PartMasterKey),

    /// The part master exists but has no revision with that version.
    #[error("Part revision not found: {0}")]
    PartRevisionNotFound(PartRevisionKey),

    /// No configuration item is stored under the key.
    #[error("Configuration item not found: {0}")]
    ConfigurationItemNotFound(ConfigurationItemKey),

    /// No effectivity with this id exists in the workspace.
    #[error("Effectivity not found: {0}")]
    EffectivityNotFound(u64),

    /// No baseline with this name exists for the configuration item.
    #[error("Baseline not found: {0}")]
    BaselineNotFound(String),

    /// Baselines are immutable; a name can only be captured once.
    #[error("Baseline already exists: {0}")]
    BaselineAlreadyExists(String),

    /// A part appears among its own ancestors on a path.
    #[error("Cyclic product structure: part {part} is its own ancestor on path {path}")]
    StructuralConstraint { part: String, path: String },

    /// An effectivity was created or updated without its lower bound.
    #[error("Missing mandatory lower bound for {0} effectivity")]
    MissingLowerBound(&'static str),

    /// A path is empty or cannot be parsed.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// An observer or a guarded operation refused to continue.
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// An I/O or storage error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl BomError {
    /// True for the lookup failures a caller may want to treat as "absent".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PartMasterNotFound(_)
                | Self::PartRevisionNotFound(_)
                | Self::ConfigurationItemNotFound(_)
                | Self::EffectivityNotFound(_)
                | Self::BaselineNotFound(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn keys_display_with_workspace_prefix() {
        let part = PartMasterKey::new("ws", "P-100");
        let rev = PartRevisionKey::new(part.clone(), "B");
        let it = PartIterationKey::new(rev, 3);

        assert_eq!(part.to_string(), "ws/P-100");
        assert_eq!(it.to_string(), "ws/P-100-B-3");
        assert_eq!(it.number(), "P-100");
    }

    #[test]
    fn part_keys_order_deterministically() {
        let mut keys = BTreeSet::new();
        keys.insert(PartMasterKey::new("ws", "C"));
        keys.insert(PartMasterKey::new("ws", "A"));
        keys.insert(PartMasterKey::new("aa", "Z"));

        let ordered: Vec<_> = keys.iter().map(PartMasterKey::storage_key).collect();
        assert_eq!(ordered, vec![("aa", "Z"), ("ws", "A"), ("ws", "C")]);
    }

    #[test]
    fn not_found_classification() {
        let err = BomError::PartMasterNotFound(PartMasterKey::new("ws", "X"));
        assert!(err.is_not_found());

        let err = BomError::StructuralConstraint {
            part: "X".to_string(),
            path: "-1-u1".to_string(),
        };
        assert!(!err.is_not_found());
    }
}
