use std::time::{Duration, Instant};

use geocluster_core::{ClusterEngine, GridIndex, SensorPoint, ViewState};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Seeded synthetic feed: a few dense facility sites plus background
/// stations spread over inhabited latitudes.
pub fn synthetic_feed(n: usize, seed: u64) -> Vec<SensorPoint> {
    const SITES: [(f64, f64); 6] = [
        (37.42, 141.03),
        (51.39, 30.10),
        (35.31, 139.56),
        (47.51, 34.58),
        (33.45, -117.55),
        (46.97, 3.51),
    ];
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let (lat, lon) = if rng.gen_bool(0.6) {
                let (slat, slon) = SITES[rng.gen_range(0..SITES.len())];
                (slat + rng.gen_range(-0.3..0.3), slon + rng.gen_range(-0.3..0.3))
            } else {
                (rng.gen_range(-60.0..72.0), rng.gen_range(-180.0..180.0))
            };
            SensorPoint::new(format!("sensor-{i}"), lat, lon, rng.gen_range(0.02..0.3))
                .with_timestamp(1_700_000_000_000 + i as i64)
        })
        .collect()
}

pub fn run(
    points: usize,
    zoom: f64,
    max_clusters: Option<i64>,
    seed: u64,
    iterations: u32,
) -> anyhow::Result<()> {
    let feed = synthetic_feed(points, seed);
    let engine = ClusterEngine::default();
    let view = ViewState {
        zoom,
        bounding_box: None,
        max_clusters,
    };
    let mut index = GridIndex::new();

    // Warm-up pass also gives the shape of the output.
    let output = engine.cluster_with_index(&mut index, &feed, &view);
    info!(
        points,
        zoom,
        clusters = output.records.len(),
        cells = output.stats.occupied_cells,
        merges = output.stats.merges,
        "warm-up complete"
    );

    let iterations = iterations.max(1);
    let mut timings: Vec<Duration> = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations {
        let start = Instant::now();
        let out = engine.cluster_with_index(&mut index, &feed, &view);
        timings.push(start.elapsed());
        std::hint::black_box(out);
    }
    timings.sort();

    let total: Duration = timings.iter().sum();
    let mean = total / iterations;
    let p50 = timings[timings.len() / 2];
    let max = timings[timings.len() - 1];

    println!("{points} points, zoom {zoom}, cap {max_clusters:?}");
    println!("  {} clusters ({} merges)", output.records.len(), output.stats.merges);
    println!(
        "  mean {:.2} ms  p50 {:.2} ms  max {:.2} ms  over {iterations} runs",
        mean.as_secs_f64() * 1e3,
        p50.as_secs_f64() * 1e3,
        max.as_secs_f64() * 1e3,
    );
    Ok(())
}
