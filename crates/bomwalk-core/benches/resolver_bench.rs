//! # Resolver Benchmarks
//!
//! Performance benchmarks for bomwalk-core resolution.
//!
//! Run with: `cargo bench -p bomwalk-core`

use bomwalk_core::{
    Catalog, ConfigurationResolver, LatestFilter, NoopObserver, PartMaster, PartMasterKey,
    PartStore, PartSubstituteLink, PartUsageLink,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// A chain of N parts, each using the next one.
fn create_chain(size: usize) -> Catalog {
    let mut catalog = Catalog::new();
    for i in 0..size {
        let links = if i + 1 < size {
            vec![PartUsageLink::new(i as u64 + 1, format!("N{}", i + 1))]
        } else {
            Vec::new()
        };
        let mut part = PartMaster::new(PartMasterKey::new("bench", format!("N{}", i)), "bench");
        part.add_revision("A").add_iteration(links);
        catalog = catalog.with_part(part);
    }
    catalog
}

/// A tree of the given depth where every assembly uses `width` distinct
/// sub-assemblies of the next level, each with one substitute. Levels share
/// parts, so the resolved tree has width^depth leaves.
fn create_wide(width: usize, depth: usize) -> Catalog {
    let mut catalog = Catalog::new();
    let mut link_id = 0u64;
    for level in 0..=depth {
        for slot in 0..width {
            let mut links = Vec::new();
            if level < depth {
                for child in 0..width {
                    link_id += 2;
                    links.push(
                        PartUsageLink::new(link_id, format!("L{}-{}", level + 1, child))
                            .with_substitute(PartSubstituteLink::new(
                                link_id + 1,
                                format!("L{}-{}", level + 1, (child + 1) % width),
                            )),
                    );
                }
            }
            let number = format!("L{}-{}", level, slot);
            let mut part = PartMaster::new(PartMasterKey::new("bench", number), "bench");
            part.add_revision("A").add_iteration(links);
            catalog = catalog.with_part(part);
        }
    }
    catalog
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_chain");

    for size in [10, 100, 500].iter() {
        let catalog = create_chain(*size);
        let root = catalog
            .load_part_master(&PartMasterKey::new("bench", "N0"))
            .expect("root should exist");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let resolver = ConfigurationResolver::new(&catalog, LatestFilter::default());
                black_box(resolver.resolve_from_root(root.clone(), None, &mut NoopObserver))
            });
        });
    }

    group.finish();
}

fn bench_wide(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_wide");

    for (width, depth) in [(4, 3), (6, 4), (8, 4)] {
        let catalog = create_wide(width, depth);
        let root = catalog
            .load_part_master(&PartMasterKey::new("bench", "L0-0"))
            .expect("root should exist");

        group.bench_with_input(
            BenchmarkId::new("nominal", format!("{}x{}", width, depth)),
            &root,
            |b, root| {
                b.iter(|| {
                    let resolver = ConfigurationResolver::new(&catalog, LatestFilter::new(false));
                    black_box(resolver.resolve_from_root(root.clone(), None, &mut NoopObserver))
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("depth_2", format!("{}x{}", width, depth)),
            &root,
            |b, root| {
                b.iter(|| {
                    let resolver = ConfigurationResolver::new(&catalog, LatestFilter::new(false));
                    black_box(resolver.resolve_from_root(root.clone(), Some(2), &mut NoopObserver))
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_chain, bench_wide);
criterion_main!(benches);
