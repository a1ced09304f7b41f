//! Clustering throughput on synthetic feeds.
//!
//! Covers the viewport-tick hot path: full feed, no cap, and a capped
//! render at 10k and 50k points.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use geocluster_core::{ClusterEngine, GridIndex, SensorPoint, ViewState};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn synthetic_feed(n: usize, seed: u64) -> Vec<SensorPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            SensorPoint::new(
                format!("sensor-{i}"),
                rng.gen_range(-60.0..70.0),
                rng.gen_range(-180.0..180.0),
                rng.gen_range(0.0..10.0),
            )
        })
        .collect()
}

fn bench_uncapped(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster/uncapped");
    let engine = ClusterEngine::default();

    for n in [10_000, 50_000] {
        let points = synthetic_feed(n, 42);
        for zoom in [2.0, 6.0, 12.0] {
            group.bench_with_input(
                BenchmarkId::new(format!("z{zoom}"), n),
                &points,
                |b, points| {
                    let mut index = GridIndex::new();
                    let view = ViewState::at_zoom(zoom);
                    b.iter(|| engine.cluster_with_index(&mut index, black_box(points), &view));
                },
            );
        }
    }

    group.finish();
}

fn bench_capped(c: &mut Criterion) {
    let mut group = c.benchmark_group("cluster/capped");
    group.sample_size(20);
    let engine = ClusterEngine::default();

    for n in [10_000, 50_000] {
        let points = synthetic_feed(n, 7);
        for cap in [50, 500] {
            group.bench_with_input(BenchmarkId::new(format!("k{cap}"), n), &points, |b, points| {
                let view = ViewState::at_zoom(5.0).with_max_clusters(cap);
                b.iter(|| engine.cluster(black_box(points), &view));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_uncapped, bench_capped);
criterion_main!(benches);
