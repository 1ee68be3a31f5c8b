//! # Component Tree
//!
//! The resolved output: one `Component` per retained (part, path) pair.
//!
//! A part reachable through two different paths appears twice, once under
//! each parent. Components are built bottom-up by the resolver and are never
//! shared or mutated after the walk completes.

use crate::product::path_to_string;
use crate::{PartIteration, PartLink, PartMaster};
use serde::Serialize;
use std::sync::Arc;

/// One resolved node of a configured product structure.
#[derive(Debug, Clone)]
pub struct Component {
    pub author: String,
    pub part: Arc<PartMaster>,
    /// Path from the traversal root; element zero is the root link.
    pub path: Vec<PartLink>,
    /// Set only when the filter returned exactly one iteration.
    pub retained_iteration: Option<PartIteration>,
    pub children: Vec<Component>,
}

impl Component {
    #[must_use]
    pub fn new(part: Arc<PartMaster>, path: Vec<PartLink>) -> Self {
        Self {
            author: part.author.clone(),
            part,
            path,
            retained_iteration: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn number(&self) -> &str {
        self.part.number()
    }

    /// Link that led to this component.
    #[must_use]
    pub fn link(&self) -> Option<&PartLink> {
        self.path.last()
    }

    #[must_use]
    pub fn path_string(&self) -> String {
        path_to_string(&self.path)
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// This component and all descendants, depth first, parents first.
    #[must_use]
    pub fn flatten(&self) -> Vec<&Component> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(component) = stack.pop() {
            out.push(component);
            stack.extend(component.children.iter().rev());
        }
        out
    }

    /// Path strings of every component, in `flatten` order.
    #[must_use]
    pub fn path_strings(&self) -> Vec<String> {
        self.flatten().iter().map(|c| c.path_string()).collect()
    }

    /// Number of components in the tree.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.flatten().len()
    }

    /// Depth of the deepest component, the root being depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Component::depth).max().unwrap_or(0)
    }

    /// Find a descendant (or self) by path string.
    #[must_use]
    pub fn find(&self, path: &str) -> Option<&Component> {
        self.flatten().into_iter().find(|c| c.path_string() == path)
    }

    /// Owned, serializable view for output.
    #[must_use]
    pub fn summary(&self) -> ComponentSummary {
        let link = self.link();
        ComponentSummary {
            number: self.number().to_string(),
            name: self.part.name.clone(),
            path: self.path_string(),
            iteration: self.retained_iteration.as_ref().map(|i| i.key.to_string()),
            amount: link.map(PartLink::amount).unwrap_or(1.0),
            unit: link.and_then(|l| l.unit().map(str::to_string)),
            optional: link.is_some_and(PartLink::is_optional),
            children: self.children.iter().map(Component::summary).collect(),
        }
    }
}

/// Serializable projection of a `Component`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSummary {
    pub number: String,
    pub name: String,
    pub path: String,
    pub iteration: Option<String>,
    pub amount: f64,
    pub unit: Option<String>,
    pub optional: bool,
    pub children: Vec<ComponentSummary>,
}

// =============================================================================
// TESTS
// =============================================================================
