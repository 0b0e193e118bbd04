use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use steller::{ClusterGraph, ClusterLayering, LayeringOptions};

/// A band graph: `bands` sibling clusters of `width` vertices each, wired
/// with a deterministic shifted pattern that forces plenty of crossings.
fn band_graph(bands: usize, width: usize) -> ClusterGraph {
    let mut cg = ClusterGraph::new();
    let mut rows = Vec::with_capacity(bands);
    for _ in 0..bands {
        let c = cg.add_cluster(cg.root());
        let row: Vec<_> = (0..width).map(|_| cg.add_node(c)).collect();
        rows.push(row);
    }
    for pair in rows.windows(2) {
        for (i, &u) in pair[0].iter().enumerate() {
            cg.add_edge(u, pair[1][(i + 1) % width]);
            cg.add_edge(u, pair[1][(i + width - 1) % width]);
        }
    }
    cg
}

fn bench_layering(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster_layering");
    for (bands, width) in [(3usize, 6usize), (5, 10)] {
        let cg = band_graph(bands, width);
        let options = LayeringOptions {
            runs: 2,
            fails: 1,
            seed: 1,
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{bands}x{width}")),
            &cg,
            |b, cg| {
                b.iter(|| {
                    let layering = ClusterLayering::build(black_box(cg), &options).unwrap();
                    black_box(layering.crossings())
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_layering);
criterion_main!(benches);
