//! # Configuration Resolver
//!
//! Walks a BOM graph depth first under a `ConfigurationFilter` and builds one
//! concrete `Component` tree.
//!
//! At every part the filter picks the iteration(s); at every usage link it
//! picks the eligible link(s). Zero or several answers are reported to the
//! `ResolutionObserver` and the walk branches over whatever came back. The
//! only failure the resolver raises itself is `StructuralConstraint`: a part
//! found among its own ancestors. Reconvergence (the same part under two
//! unrelated parents) is legal and yields two components.
//!
//! ## Branch isolation
//!
//! The path, the ancestor parts and the accumulated iterations are copied at
//! each branch point, so sibling sub-walks never observe each other's
//! elements. Observers only ever receive borrowed slices.
//!
//! ## Termination
//!
//! Cycle detection and the optional depth bound guarantee termination;
//! `stop()` ends the walk cooperatively. A stopped resolver returns empty
//! children from every pending step, leaving already built components intact.

use crate::catalog::PartStore;
use crate::component::Component;
use crate::filter::ConfigurationFilter;
use crate::observer::{PathWalk, ResolutionObserver};
use crate::product::path_to_string;
use crate::{BomError, PartIteration, PartLink, PartMaster, PartMasterKey};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// STOP HANDLE
// =============================================================================

/// Cooperative cancellation flag shared between a resolver and its callers.
///
/// Cloning yields a handle on the same flag; the transition to stopped is
/// one way.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the walk to stop. Idempotent.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolves product structures read from `store` under `filter`.
///
/// The resolver holds no per-walk state besides the stop flag, so it may be
/// reused for several walks until it is stopped.
pub struct ConfigurationResolver<'a, S: PartStore + ?Sized, F: ConfigurationFilter> {
    store: &'a S,
    filter: F,
    stop: StopHandle,
}

impl<S: PartStore + ?Sized, F: ConfigurationFilter> std::fmt::Debug
    for ConfigurationResolver<'_, S, F>
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationResolver")
            .field("stopped", &self.stop.is_stopped())
            .finish_non_exhaustive()
    }
}

/// Per-step inputs of the recursive walk.
struct Step<'p> {
    workspace: &'p str,
    max_depth: Option<usize>,
    iterations: &'p [PartIteration],
    parts: &'p [Arc<PartMaster>],
    path: &'p [PartLink],
}

impl<'a, S: PartStore + ?Sized, F: ConfigurationFilter> ConfigurationResolver<'a, S, F> {
    #[must_use]
    pub fn new(store: &'a S, filter: F) -> Self {
        Self {
            store,
            filter,
            stop: StopHandle::new(),
        }
    }

    /// Handle that stops this resolver from another thread or an observer.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop the walk in progress; pending steps return no children.
    pub fn stop(&self) {
        self.stop.stop();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    #[must_use]
    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Resolve the structure below `root`, reached through the synthetic
    /// root link.
    ///
    /// `max_depth` bounds descent: a component whose ancestor chain (itself
    /// included) is longer than `max_depth` gets no children.
    pub fn resolve_from_root<O: ResolutionObserver>(
        &self,
        root: Arc<PartMaster>,
        max_depth: Option<usize>,
        observer: &mut O,
    ) -> Result<Component, BomError> {
        let path = vec![PartLink::root(root.number())];
        self.resolve(root, path, max_depth, observer)
    }

    /// Resolve the structure below the last part of an existing path.
    ///
    /// The path is kept as the prefix of every produced component's path.
    /// Ancestor tracking starts at the zoomed part.
    pub fn resolve_from_path<O: ResolutionObserver>(
        &self,
        workspace: &str,
        path: Vec<PartLink>,
        max_depth: Option<usize>,
        observer: &mut O,
    ) -> Result<Component, BomError> {
        let last = path
            .last()
            .ok_or_else(|| BomError::InvalidPath("cannot resolve from an empty path".to_string()))?;
        let part = self
            .store
            .load_part_master(&PartMasterKey::new(workspace, last.component()))?;
        self.resolve(part, path, max_depth, observer)
    }

    fn resolve<O: ResolutionObserver>(
        &self,
        part: Arc<PartMaster>,
        path: Vec<PartLink>,
        max_depth: Option<usize>,
        observer: &mut O,
    ) -> Result<Component, BomError> {
        tracing::debug!(
            part = %part.key,
            path = %path_to_string(&path),
            max_depth = ?max_depth,
            "resolution started"
        );

        let workspace = part.key.workspace.clone();
        let parts = vec![Arc::clone(&part)];
        let walk_path = path.clone();
        let mut root = Component::new(part, path);
        let step = Step {
            workspace: &workspace,
            max_depth,
            iterations: &[],
            parts: &parts,
            path: &walk_path,
        };
        root.children = self.children(&mut root, &step, observer)?;
        Ok(root)
    }

    /// One recursive step: the children of `component`.
    fn children<O: ResolutionObserver>(
        &self,
        component: &mut Component,
        step: &Step<'_>,
        observer: &mut O,
    ) -> Result<Vec<Component>, BomError> {
        if self.is_stopped() {
            return Ok(Vec::new());
        }

        if observer.on_path_walk(step.path, step.parts)? == PathWalk::Prune {
            tracing::debug!(path = %path_to_string(step.path), "branch pruned by observer");
            return Ok(Vec::new());
        }

        let current_depth = step.parts.len();
        let Some(part) = step.parts.last() else {
            return Ok(Vec::new());
        };
        tracing::debug!(part = %part.key, depth = current_depth, "resolving part");

        let iterations = self.filter.resolve_iterations(part)?;
        match iterations.len() {
            0 => observer.on_unresolved_version(part)?,
            1 => component.retained_iteration = iterations.first().cloned(),
            _ => observer.on_indeterminate_version(part, &iterations)?,
        }

        let mut children = Vec::new();
        for iteration in &iterations {
            let mut branch_iterations = step.iterations.to_vec();
            branch_iterations.push(iteration.clone());

            if iteration.is_leaf() {
                observer.on_branch_discovered(step.path, &branch_iterations)?;
            }

            for usage in &iteration.usage_links {
                let mut current_path = step.path.to_vec();
                current_path.push(PartLink::Usage(usage.clone()));

                let eligible = self.filter.resolve_links(&current_path)?;
                if eligible.is_empty() && !usage.optional {
                    observer.on_unresolved_path(&current_path, &branch_iterations)?;
                }
                if eligible.len() > 1 {
                    observer.on_indeterminate_path(&current_path, &branch_iterations)?;
                }
                if eligible.len() == 1 && eligible.first().is_some_and(PartLink::is_optional) {
                    observer.on_optional_path(&current_path, &branch_iterations)?;
                }

                for link in eligible {
                    if max_depth_reached(step.max_depth, current_depth) {
                        continue;
                    }

                    let mut next_path = step.path.to_vec();
                    next_path.push(link);
                    let child = self.load_child(step, &next_path)?;

                    let mut next_parts = step.parts.to_vec();
                    next_parts.push(Arc::clone(&child));

                    let mut sub_component = Component::new(child, next_path.clone());
                    let next_step = Step {
                        workspace: step.workspace,
                        max_depth: step.max_depth,
                        iterations: &branch_iterations,
                        parts: &next_parts,
                        path: &next_path,
                    };
                    sub_component.children =
                        self.children(&mut sub_component, &next_step, observer)?;
                    children.push(sub_component);
                }
            }
        }

        Ok(children)
    }

    /// Load the part the last link of `next_path` points at, refusing any
    /// part already among the ancestors.
    fn load_child(&self, step: &Step<'_>, next_path: &[PartLink]) -> Result<Arc<PartMaster>, BomError> {
        let link = crate::filter::nominal_link(next_path)?;
        let key = PartMasterKey::new(step.workspace, link.component());
        let child = self.store.load_part_master(&key)?;

        if step.parts.iter().any(|ancestor| ancestor.key == child.key) {
            let path = path_to_string(next_path);
            tracing::warn!(part = %child.key, path = %path, "cyclic product structure");
            return Err(BomError::StructuralConstraint {
                part: child.number().to_string(),
                path,
            });
        }

        Ok(child)
    }
}

fn max_depth_reached(max_depth: Option<usize>, current_depth: usize) -> bool {
    max_depth.is_some_and(|max| current_depth > max)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::filter::{BaselineCreationFilter, BaselineType, LatestFilter};
    use crate::observer::{CollectingObserver, NoopObserver, ResolutionEvent};
    use crate::{PartMasterKey, PartSubstituteLink, PartUsageLink};

    fn part(number: &str, links: Vec<PartUsageLink>) -> PartMaster {
        let mut part = PartMaster::new(PartMasterKey::new("ws", number), "alice");
        part.add_revision("A").add_iteration(links);
        part
    }

    fn chain() -> Catalog {
        Catalog::new()
            .with_part(part("A", vec![PartUsageLink::new(1, "B")]))
            .with_part(part("B", vec![PartUsageLink::new(2, "C")]))
            .with_part(part("C", Vec::new()))
    }

    fn root(catalog: &Catalog, number: &str) -> Arc<PartMaster> {
        catalog
            .load_part_master(&PartMasterKey::new("ws", number))
            .expect("root")
    }

    #[test]
    fn resolves_a_chain() {
        let catalog = chain();
        let resolver = ConfigurationResolver::new(&catalog, LatestFilter::default());
        let tree = resolver
            .resolve_from_root(root(&catalog, "A"), None, &mut NoopObserver)
            .expect("resolve");

        assert_eq!(tree.path_strings(), vec!["-1", "-1-u1", "-1-u1-u2"]);
        assert_eq!(
            tree.retained_iteration.as_ref().map(|i| i.key.to_string()),
            Some("ws/A-A-1".to_string())
        );
    }

    #[test]
    fn depth_bound_cuts_children() {
        let catalog = chain();
        let resolver = ConfigurationResolver::new(&catalog, LatestFilter::default());

        let none = resolver
            .resolve_from_root(root(&catalog, "A"), Some(0), &mut NoopObserver)
            .expect("resolve");
        assert!(none.is_leaf());

        let one = resolver
            .resolve_from_root(root(&catalog, "A"), Some(1), &mut NoopObserver)
            .expect("resolve");
        assert_eq!(one.depth(), 2);
    }

    #[test]
    fn missing_child_propagates_not_found() {
        let catalog = Catalog::new().with_part(part("A", vec![PartUsageLink::new(1, "GONE")]));
        let resolver = ConfigurationResolver::new(&catalog, LatestFilter::default());
        let err = resolver
            .resolve_from_root(root(&catalog, "A"), None, &mut NoopObserver)
            .expect_err("missing child");
        assert!(matches!(err, BomError::PartMasterNotFound(_)));
    }

    #[test]
    fn stopped_resolver_returns_bare_root() {
        let catalog = chain();
        let resolver = ConfigurationResolver::new(&catalog, LatestFilter::default());
        resolver.stop();
        resolver.stop();

        let tree = resolver
            .resolve_from_root(root(&catalog, "A"), None, &mut NoopObserver)
            .expect("resolve");
        assert!(tree.is_leaf());
        assert!(tree.retained_iteration.is_none());
    }

    #[test]
    fn empty_path_is_rejected() {
        let catalog = chain();
        let resolver = ConfigurationResolver::new(&catalog, LatestFilter::default());
        assert!(matches!(
            resolver.resolve_from_path("ws", Vec::new(), None, &mut NoopObserver),
            Err(BomError::InvalidPath(_))
        ));
    }

    #[test]
    fn path_walk_sees_every_step() {
        let catalog = chain();
        let resolver = ConfigurationResolver::new(&catalog, LatestFilter::default());
        let mut observer = CollectingObserver::new();
        resolver
            .resolve_from_root(root(&catalog, "A"), None, &mut observer)
            .expect("resolve");

        assert_eq!(observer.walked, vec!["-1", "-1-u1", "-1-u1-u2"]);
    }

    #[test]
    fn optional_path_reported_only_for_the_optional_link_itself() {
        let catalog = Catalog::new()
            .with_part(part(
                "A",
                vec![
                    PartUsageLink::new(1, "B").optional(),
                    PartUsageLink::new(2, "C")
                        .optional()
                        .with_substitute(PartSubstituteLink::new(3, "S")),
                ],
            ))
            .with_part(part("B", Vec::new()))
            .with_part(part("C", Vec::new()))
            .with_part(part("S", Vec::new()));
        let filter = BaselineCreationFilter::new(BaselineType::Latest)
            .with_optional_usage_links(["-1-u1".to_string(), "-1-u2".to_string()])
            .with_substitute_links(["-1-s3".to_string()]);
        let resolver = ConfigurationResolver::new(&catalog, filter);
        let mut observer = CollectingObserver::new();

        let tree = resolver
            .resolve_from_root(root(&catalog, "A"), None, &mut observer)
            .expect("resolve");

        assert_eq!(tree.path_strings(), vec!["-1", "-1-u1", "-1-s3"]);
        let optional: Vec<_> = observer
            .events
            .iter()
            .filter_map(|e| match e {
                ResolutionEvent::OptionalPath { path } => Some(path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(optional, vec!["-1-u1"]);
    }
}
