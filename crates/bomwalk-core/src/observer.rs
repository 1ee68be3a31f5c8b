//! # Resolution Observers
//!
//! The resolver reports every place where the policy fails to pick exactly
//! one iteration or one link through a `ResolutionObserver`. One resolver
//! invocation uses one observer value.
//!
//! Every hook returns a `Result`: an `Err` is propagated unchanged by the
//! resolver, which is how a caller turns an ambiguity into a hard failure.
//! The default bodies accept everything, so an implementation only overrides
//! the hooks it cares about.

use crate::product::path_to_string;
use crate::{BomError, PartIteration, PartLink, PartMaster};
use std::sync::Arc;

/// Decision returned by `on_path_walk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathWalk {
    /// Keep walking below this path.
    Continue,
    /// Return no children for this path; not an error.
    Prune,
}

/// Hooks called by the resolver while walking a product structure.
pub trait ResolutionObserver {
    /// No iteration of the part satisfies the policy.
    fn on_unresolved_version(&mut self, _part: &PartMaster) -> Result<(), BomError> {
        Ok(())
    }

    /// More than one iteration of the part satisfies the policy.
    fn on_indeterminate_version(
        &mut self,
        _part: &PartMaster,
        _iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        Ok(())
    }

    /// A mandatory usage link resolved to no eligible link.
    fn on_unresolved_path(
        &mut self,
        _path: &[PartLink],
        _iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        Ok(())
    }

    /// A usage link resolved to several eligible links.
    fn on_indeterminate_path(
        &mut self,
        _path: &[PartLink],
        _iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        Ok(())
    }

    /// An optional usage link was taken.
    fn on_optional_path(
        &mut self,
        _path: &[PartLink],
        _iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        Ok(())
    }

    /// The retained iteration has no outgoing links: a leaf of the tree.
    fn on_branch_discovered(
        &mut self,
        _path: &[PartLink],
        _iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        Ok(())
    }

    /// Called on entry of every recursive step, before the filter runs.
    fn on_path_walk(
        &mut self,
        _path: &[PartLink],
        _parts: &[Arc<PartMaster>],
    ) -> Result<PathWalk, BomError> {
        Ok(PathWalk::Continue)
    }
}

impl<O: ResolutionObserver + ?Sized> ResolutionObserver for &mut O {
    fn on_unresolved_version(&mut self, part: &PartMaster) -> Result<(), BomError> {
        (**self).on_unresolved_version(part)
    }

    fn on_indeterminate_version(
        &mut self,
        part: &PartMaster,
        iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        (**self).on_indeterminate_version(part, iterations)
    }

    fn on_unresolved_path(
        &mut self,
        path: &[PartLink],
        iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        (**self).on_unresolved_path(path, iterations)
    }

    fn on_indeterminate_path(
        &mut self,
        path: &[PartLink],
        iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        (**self).on_indeterminate_path(path, iterations)
    }

    fn on_optional_path(
        &mut self,
        path: &[PartLink],
        iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        (**self).on_optional_path(path, iterations)
    }

    fn on_branch_discovered(
        &mut self,
        path: &[PartLink],
        iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        (**self).on_branch_discovered(path, iterations)
    }

    fn on_path_walk(
        &mut self,
        path: &[PartLink],
        parts: &[Arc<PartMaster>],
    ) -> Result<PathWalk, BomError> {
        (**self).on_path_walk(path, parts)
    }
}

// =============================================================================
// STOCK OBSERVERS
// =============================================================================

/// Accepts every event silently.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ResolutionObserver for NoopObserver {}

/// One recorded resolution event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionEvent {
    UnresolvedVersion { part: String },
    IndeterminateVersion { part: String, iterations: Vec<String> },
    UnresolvedPath { path: String },
    IndeterminatePath { path: String },
    OptionalPath { path: String },
    BranchDiscovered { path: String },
}

impl std::fmt::Display for ResolutionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedVersion { part } => write!(f, "unresolved version: {}", part),
            Self::IndeterminateVersion { part, iterations } => {
                write!(f, "indeterminate version: {} ({})", part, iterations.join(", "))
            }
            Self::UnresolvedPath { path } => write!(f, "unresolved path: {}", path),
            Self::IndeterminatePath { path } => write!(f, "indeterminate path: {}", path),
            Self::OptionalPath { path } => write!(f, "optional path: {}", path),
            Self::BranchDiscovered { path } => write!(f, "branch: {}", path),
        }
    }
}

/// Records every event, in walk order.
#[derive(Debug, Clone, Default)]
pub struct CollectingObserver {
    pub events: Vec<ResolutionEvent>,
    /// Paths visited by `on_path_walk`, in walk order.
    pub walked: Vec<String>,
}

impl CollectingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events other than branch discoveries.
    pub fn diagnostics(&self) -> impl Iterator<Item = &ResolutionEvent> {
        self.events
            .iter()
            .filter(|e| !matches!(e, ResolutionEvent::BranchDiscovered { .. }))
    }

    #[must_use]
    pub fn count(&self, predicate: impl Fn(&ResolutionEvent) -> bool) -> usize {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

impl ResolutionObserver for CollectingObserver {
    fn on_unresolved_version(&mut self, part: &PartMaster) -> Result<(), BomError> {
        self.events.push(ResolutionEvent::UnresolvedVersion {
            part: part.number().to_string(),
        });
        Ok(())
    }

    fn on_indeterminate_version(
        &mut self,
        part: &PartMaster,
        iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        self.events.push(ResolutionEvent::IndeterminateVersion {
            part: part.number().to_string(),
            iterations: iterations.iter().map(|i| i.key.to_string()).collect(),
        });
        Ok(())
    }

    fn on_unresolved_path(&mut self, path: &[PartLink], _: &[PartIteration]) -> Result<(), BomError> {
        self.events.push(ResolutionEvent::UnresolvedPath {
            path: path_to_string(path),
        });
        Ok(())
    }

    fn on_indeterminate_path(
        &mut self,
        path: &[PartLink],
        _: &[PartIteration],
    ) -> Result<(), BomError> {
        self.events.push(ResolutionEvent::IndeterminatePath {
            path: path_to_string(path),
        });
        Ok(())
    }

    fn on_optional_path(&mut self, path: &[PartLink], _: &[PartIteration]) -> Result<(), BomError> {
        self.events.push(ResolutionEvent::OptionalPath {
            path: path_to_string(path),
        });
        Ok(())
    }

    fn on_branch_discovered(
        &mut self,
        path: &[PartLink],
        _: &[PartIteration],
    ) -> Result<(), BomError> {
        self.events.push(ResolutionEvent::BranchDiscovered {
            path: path_to_string(path),
        });
        Ok(())
    }

    fn on_path_walk(
        &mut self,
        path: &[PartLink],
        _: &[Arc<PartMaster>],
    ) -> Result<PathWalk, BomError> {
        self.walked.push(path_to_string(path));
        Ok(PathWalk::Continue)
    }
}

/// Refuses any unresolved or ambiguous node or edge.
///
/// Used when the result must be one complete, unambiguous structure, as for a
/// baseline capture.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictObserver;

impl ResolutionObserver for StrictObserver {
    fn on_unresolved_version(&mut self, part: &PartMaster) -> Result<(), BomError> {
        Err(BomError::NotAllowed(format!(
            "no iteration of part {} satisfies the configuration",
            part.key
        )))
    }

    fn on_indeterminate_version(
        &mut self,
        part: &PartMaster,
        iterations: &[PartIteration],
    ) -> Result<(), BomError> {
        Err(BomError::NotAllowed(format!(
            "{} iterations of part {} satisfy the configuration",
            iterations.len(),
            part.key
        )))
    }

    fn on_unresolved_path(&mut self, path: &[PartLink], _: &[PartIteration]) -> Result<(), BomError> {
        Err(BomError::NotAllowed(format!(
            "mandatory link {} resolves to nothing",
            path_to_string(path)
        )))
    }

    fn on_indeterminate_path(
        &mut self,
        path: &[PartLink],
        _: &[PartIteration],
    ) -> Result<(), BomError> {
        Err(BomError::NotAllowed(format!(
            "link {} resolves to several links",
            path_to_string(path)
        )))
    }
}

// =============================================================================
// TESTS
// =============================================================================
