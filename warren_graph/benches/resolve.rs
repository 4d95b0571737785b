// Graph resolution benchmarks: cold materialization of unexplored space vs
// warm re-resolution of cached paths.
//
// Run with: cargo bench --package warren_graph --bench resolve

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use warren_graph::{Graph, Path, Side};

/// A wandering walk that keeps leaving explored space: alternate cap and
/// ring steps so consecutive sides never cancel.
fn wandering_path(len: usize) -> Path {
    let ring = [
        Side::UpperA,
        Side::LowerB,
        Side::UpperC,
        Side::LowerD,
        Side::UpperE,
    ];
    (0..len)
        .map(|i| {
            if i % 2 == 0 {
                ring[(i / 2) % ring.len()]
            } else if i % 4 == 1 {
                Side::Top
            } else {
                Side::Bottom
            }
        })
        .collect()
}

fn bench_cold_resolve(c: &mut Criterion) {
    let path = wandering_path(64);
    c.bench_function("resolve_cold_64_steps", |b| {
        b.iter(|| {
            let mut graph = Graph::new();
            black_box(graph.resolve(black_box(&path)))
        });
    });
}

fn bench_warm_resolve(c: &mut Criterion) {
    let path = wandering_path(64);
    let mut graph = Graph::new();
    graph.resolve(&path);
    c.bench_function("resolve_warm_64_steps", |b| {
        b.iter(|| black_box(graph.resolve(black_box(&path))));
    });
}

fn bench_frontier_expansion(c: &mut Criterion) {
    c.bench_function("expand_origin_frontier", |b| {
        b.iter(|| {
            let mut graph = Graph::new();
            for side in Side::iter() {
                let node = graph.ensure_neighbor(Graph::ORIGIN, side);
                for other in Side::iter() {
                    black_box(graph.ensure_neighbor(node, other));
                }
            }
            graph.node_count()
        });
    });
}

criterion_group!(
    benches,
    bench_cold_resolve,
    bench_warm_resolve,
    bench_frontier_expansion
);
criterion_main!(benches);
