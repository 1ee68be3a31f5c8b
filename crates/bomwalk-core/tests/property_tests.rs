//! # Property-Based Tests
//!
//! Invariants of the resolver over randomly generated product structures.
//!
//! These tests ensure termination, determinism and correct cycle handling.

use bomwalk_core::{
    BomError, Catalog, CollectingObserver, ConfigurationResolver, LatestFilter, NoopObserver,
    PartMaster, PartMasterKey, PartStore, PartUsageLink,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GENERATORS
// =============================================================================

/// Build a catalog of parts N0..Nn where every edge (a, b) with a < b becomes
/// a usage link from Na to Nb. Edges going backwards are dropped, so the
/// structure is acyclic.
fn acyclic_catalog(size: usize, edges: &[(usize, usize)]) -> (Catalog, BTreeMap<usize, Vec<usize>>) {
    let mut adjacency: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &(a, b) in edges {
        if a < b && b < size {
            adjacency.entry(a).or_default().push(b);
        }
    }

    let mut catalog = Catalog::new();
    let mut link_id = 0u64;
    for i in 0..size {
        let links: Vec<PartUsageLink> = adjacency
            .get(&i)
            .map(|targets| {
                targets
                    .iter()
                    .map(|t| {
                        link_id += 1;
                        PartUsageLink::new(link_id, format!("N{}", t))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let mut part = PartMaster::new(PartMasterKey::new("ws", format!("N{}", i)), "prop");
        part.add_revision("A").add_iteration(links);
        catalog = catalog.with_part(part);
    }
    (catalog, adjacency)
}

/// Number of distinct paths starting at `node`, itself included.
fn path_count(node: usize, adjacency: &BTreeMap<usize, Vec<usize>>) -> usize {
    1 + adjacency
        .get(&node)
        .map(|targets| targets.iter().map(|&t| path_count(t, adjacency)).sum())
        .unwrap_or(0)
}

fn root(catalog: &Catalog, number: &str) -> std::sync::Arc<PartMaster> {
    catalog
        .load_part_master(&PartMasterKey::new("ws", number))
        .expect("root")
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Acyclic structures always resolve and visit each distinct path once.
    #[test]
    fn acyclic_structures_visit_every_path_once(
        size in 1usize..9,
        edges in vec((0usize..9, 0usize..9), 0..20)
    ) {
        let (catalog, adjacency) = acyclic_catalog(size, &edges);
        let mut observer = CollectingObserver::new();
        let tree = ConfigurationResolver::new(&catalog, LatestFilter::default())
            .resolve_from_root(root(&catalog, "N0"), None, &mut observer)
            .expect("acyclic structure resolves");

        let paths = tree.path_strings();
        let distinct: BTreeSet<_> = paths.iter().cloned().collect();
        prop_assert_eq!(distinct.len(), paths.len());
        prop_assert_eq!(paths.len(), path_count(0, &adjacency));
        prop_assert_eq!(&observer.walked, &paths);
    }

    /// Same catalog, same filter: same tree.
    #[test]
    fn resolution_is_deterministic(
        size in 1usize..9,
        edges in vec((0usize..9, 0usize..9), 0..20)
    ) {
        let (catalog, _) = acyclic_catalog(size, &edges);
        let resolver = ConfigurationResolver::new(&catalog, LatestFilter::default());

        let first = resolver
            .resolve_from_root(root(&catalog, "N0"), None, &mut NoopObserver)
            .expect("resolve");
        let second = resolver
            .resolve_from_root(root(&catalog, "N0"), None, &mut NoopObserver)
            .expect("resolve");

        prop_assert_eq!(first.summary(), second.summary());
    }

    /// A shared part under any number of parents is never flagged.
    #[test]
    fn reconvergence_never_errors(width in 1usize..12) {
        let mut catalog = Catalog::new();
        let mut root_links = Vec::new();
        for i in 0..width {
            let id = i as u64 + 1;
            root_links.push(PartUsageLink::new(id, format!("SUB{}", i)));
            let mut sub = PartMaster::new(PartMasterKey::new("ws", format!("SUB{}", i)), "prop");
            sub.add_revision("A")
                .add_iteration(vec![PartUsageLink::new(100 + id, "BOLT")]);
            catalog = catalog.with_part(sub);
        }
        let mut top = PartMaster::new(PartMasterKey::new("ws", "TOP"), "prop");
        top.add_revision("A").add_iteration(root_links);
        let mut bolt = PartMaster::new(PartMasterKey::new("ws", "BOLT"), "prop");
        bolt.add_revision("A").add_iteration(Vec::new());
        catalog = catalog.with_part(top).with_part(bolt);

        let tree = ConfigurationResolver::new(&catalog, LatestFilter::default())
            .resolve_from_root(root(&catalog, "TOP"), None, &mut NoopObserver)
            .expect("reconvergence is legal");

        let bolts = tree.flatten().into_iter().filter(|c| c.number() == "BOLT").count();
        prop_assert_eq!(bolts, width);
    }

    /// A back edge anywhere along a chain is always reported as a cycle.
    #[test]
    fn back_edge_is_always_a_cycle(length in 1usize..10, target in 0usize..10) {
        let target = target % length;
        let mut catalog = Catalog::new();
        for i in 0..length {
            let next = if i + 1 < length { i + 1 } else { target };
            let mut part = PartMaster::new(PartMasterKey::new("ws", format!("N{}", i)), "prop");
            part.add_revision("A")
                .add_iteration(vec![PartUsageLink::new(i as u64 + 1, format!("N{}", next))]);
            catalog = catalog.with_part(part);
        }

        let result = ConfigurationResolver::new(&catalog, LatestFilter::default())
            .resolve_from_root(root(&catalog, "N0"), None, &mut NoopObserver);

        let is_cycle = matches!(
            result,
            Err(BomError::StructuralConstraint { ref part, .. }) if *part == format!("N{}", target)
        );
        prop_assert!(is_cycle);
    }
}
