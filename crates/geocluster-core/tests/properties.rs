//! End-to-end clustering properties over seeded synthetic feeds.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use geocluster_core::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn synthetic_feed(n: usize, seed: u64) -> Vec<SensorPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            // Half the sensors sit around a few hotspots, the rest anywhere.
            let (lat, lon) = if i % 2 == 0 {
                let hubs = [(35.6, 139.7), (51.5, -0.1), (-33.9, 151.2), (40.7, -74.0)];
                let (hlat, hlon) = hubs[(i / 2) % 4];
                (hlat + rng.gen_range(-0.5..0.5), hlon + rng.gen_range(-0.5..0.5))
            } else {
                (rng.gen_range(-90.0..=90.0), rng.gen_range(-180.0..=180.0))
            };
            SensorPoint::new(format!("sensor-{i:05}"), lat, lon, rng.gen_range(0.0..5.0))
                .with_timestamp(1_700_000_000_000 + i as i64)
        })
        .collect()
}

fn uniform_feed(n: usize, seed: u64) -> Vec<SensorPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            SensorPoint::new(
                format!("u-{i:05}"),
                rng.gen_range(-90.0..=90.0),
                rng.gen_range(-180.0..=180.0),
                rng.gen_range(0.0..5.0),
            )
        })
        .collect()
}

fn example_points() -> Vec<SensorPoint> {
    vec![
        SensorPoint::new("a", 10.0, 10.0, 0.2),
        SensorPoint::new("b", 10.01, 10.01, 0.4),
        SensorPoint::new("c", 9.99, 9.99, 7.5),
        SensorPoint::new("d", 10.005, 9.995, 0.1),
        SensorPoint::new("e", 9.995, 10.005, 0.3),
        SensorPoint::new("far", 80.0, 80.0, 1.0),
    ]
}

#[test]
fn example_tight_group_plus_isolated_point() {
    let points = example_points();
    let out = cluster(&points, &ViewState::at_zoom(2.0));

    assert_eq!(out.dropped_count, 0);
    assert_eq!(out.records.len(), 2);

    let ClusterRecord::Aggregate(agg) = &out.records[0] else {
        panic!("expected the tight group to aggregate");
    };
    assert_eq!(agg.member_count, 5);
    assert!((agg.centroid.lat - 10.0).abs() < 1e-3);
    assert!((agg.centroid.lon - 10.0).abs() < 1e-3);
    assert_eq!(agg.representative_value, 7.5);

    assert_eq!(out.records[1], ClusterRecord::Singleton(points[5].clone()));
}

#[test]
fn example_capped_to_one_cluster() {
    let points = example_points();
    let uncapped = cluster(&points, &ViewState::at_zoom(2.0));
    let group_centroid = uncapped.records[0].centroid();

    let out = cluster(&points, &ViewState::at_zoom(2.0).with_max_clusters(1));
    assert_eq!(out.records.len(), 1);

    let ClusterRecord::Aggregate(agg) = &out.records[0] else {
        panic!("expected a single aggregate");
    };
    assert_eq!(agg.member_count, 6);
    assert_eq!(agg.representative_value, 7.5);
    let expected_lat = (group_centroid.lat * 5.0 + 80.0) / 6.0;
    let expected_lon = (group_centroid.lon * 5.0 + 80.0) / 6.0;
    assert!((agg.centroid.lat - expected_lat).abs() < 1e-9);
    assert!((agg.centroid.lon - expected_lon).abs() < 1e-9);
}

#[test]
fn point_conservation_across_zooms_and_caps() {
    let points = synthetic_feed(1_200, 7);
    for zoom in [0.0, 1.0, 3.5, 6.0, 10.0, 18.0] {
        for cap in [None, Some(1), Some(25), Some(400)] {
            let mut view = ViewState::at_zoom(zoom);
            view.max_clusters = cap;
            let out = cluster(&points, &view);

            assert_eq!(out.total_members(), points.len(), "zoom {zoom} cap {cap:?}");
            let mut seen = HashSet::new();
            for record in &out.records {
                for id in record.member_ids() {
                    assert!(seen.insert(id.to_string()), "{id} appears twice");
                }
            }
            assert_eq!(seen.len(), points.len());
        }
    }
}

#[test]
fn cap_is_respected() {
    let points = synthetic_feed(800, 11);
    for k in [1, 2, 3, 10, 50, 100] {
        let out = cluster(&points, &ViewState::at_zoom(8.0).with_max_clusters(k));
        assert!(out.records.len() <= k as usize, "cap {k} gave {}", out.records.len());
    }
}

#[test]
fn non_positive_cap_clamps_to_one() {
    let points = synthetic_feed(200, 3);
    for k in [0, -1, -100] {
        let out = cluster(&points, &ViewState::at_zoom(4.0).with_max_clusters(k));
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].member_count(), 200);
    }
}

#[test]
fn output_is_deterministic() {
    let points = synthetic_feed(2_000, 42);
    let view = ViewState::at_zoom(5.0).with_max_clusters(60);
    let first = cluster(&points, &view);
    let second = cluster(&points, &view);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn output_is_canonically_ordered() {
    let points = synthetic_feed(1_500, 5);
    let out = cluster(&points, &ViewState::at_zoom(6.0));
    for pair in out.records.windows(2) {
        assert!(canonical_cmp(&pair[0], &pair[1]).is_lt());
    }
}

#[test]
fn aggregates_carry_worst_case_value() {
    let points = synthetic_feed(2_500, 19);
    let by_id: std::collections::HashMap<&str, f64> =
        points.iter().map(|p| (p.id.as_str(), p.value)).collect();

    for view in [ViewState::at_zoom(3.0), ViewState::at_zoom(3.0).with_max_clusters(8)] {
        let out = cluster(&points, &view);
        for record in &out.records {
            if let ClusterRecord::Aggregate(agg) = record {
                let max = agg
                    .member_ids
                    .iter()
                    .map(|id| by_id[id.as_str()])
                    .fold(f64::NEG_INFINITY, f64::max);
                assert_eq!(agg.representative_value, max);
            }
        }
    }
}

#[test]
fn isolated_point_passes_through_unchanged() {
    let point = SensorPoint::new("solo", -12.5, 33.25, 0.42).with_timestamp(1234);
    let out = cluster(std::slice::from_ref(&point), &ViewState::at_zoom(9.0));
    assert_eq!(out.records, vec![ClusterRecord::Singleton(point)]);
}

#[test]
fn zoom_never_reduces_cluster_count() {
    let points = synthetic_feed(4_000, 23);
    let mut previous = 0;
    for step in 0..=32 {
        let zoom = f64::from(step) * 0.5;
        let count = cluster(&points, &ViewState::at_zoom(zoom)).records.len();
        assert!(count >= previous, "zoom {zoom}: {count} < {previous}");
        previous = count;
    }
}

#[test]
fn nan_latitude_is_dropped_and_counted() {
    let mut points = example_points();
    points.push(SensorPoint::new("broken", f64::NAN, 10.0, 99.0));
    let out = cluster(&points, &ViewState::at_zoom(2.0));

    assert_eq!(out.dropped_count, 1);
    assert_eq!(out.total_members(), 6);
    assert!(out.records.iter().all(|r| !r.member_ids().contains(&"broken")));
}

#[test]
fn malformed_feed_never_panics() {
    let points = vec![
        SensorPoint::new("", 0.0, 0.0, 1.0),
        SensorPoint::new("x", f64::INFINITY, 0.0, 1.0),
        SensorPoint::new("y", 0.0, f64::NEG_INFINITY, 1.0),
        SensorPoint::new("z", 91.0, 0.0, 1.0),
        SensorPoint::new("ok", 90.0, 180.0, 1.0),
        SensorPoint::new("ok", -90.0, -180.0, 1.0),
    ];
    for zoom in [f64::NAN, -1.0, 0.0, 1e9] {
        let out = cluster(&points, &ViewState::at_zoom(zoom).with_max_clusters(-3));
        assert_eq!(out.dropped_count, 5);
        assert_eq!(out.total_members(), 1);
    }
}

#[test]
fn viewport_crossing_antimeridian() {
    let points = vec![
        SensorPoint::new("east", 0.0, 179.5, 1.0),
        SensorPoint::new("west", 0.0, -179.5, 2.0),
        SensorPoint::new("middle", 0.0, 0.0, 3.0),
    ];
    let view = ViewState::at_zoom(10.0).with_bounds(BoundingBox::new(-5.0, 5.0, 170.0, -170.0));
    let out = cluster(&points, &view);

    assert_eq!(out.stats.culled_points, 1);
    let ids: Vec<&str> = out.records.iter().flat_map(|r| r.member_ids()).collect();
    assert!(ids.contains(&"east"));
    assert!(ids.contains(&"west"));
    assert!(!ids.contains(&"middle"));
}

#[test]
fn high_zoom_approaches_one_point_per_cluster() {
    let points = synthetic_feed(500, 99);
    let out = cluster(&points, &ViewState::at_zoom(22.0));
    assert_eq!(out.records.len(), points.len());
    assert!(out.records.iter().all(ClusterRecord::is_singleton));
}

#[test]
fn finest_allowed_cells_keep_zoom_monotonic() {
    let mut config = EngineConfig::default();
    config.grid.min_cell_degrees = MIN_CELL_DEGREES_FLOOR;
    let engine = ClusterEngine::new(config).unwrap();
    let points = synthetic_feed(200, 17);

    let low = engine.cluster(&points, &ViewState::at_zoom(20.0)).records.len();
    let high = engine.cluster(&points, &ViewState::at_zoom(70.0)).records.len();
    assert!(high >= low, "zoom 70 gave {high} < {low}");
    assert_eq!(high, points.len());
}

#[test]
fn capped_call_on_ten_thousand_points_is_fast() {
    // Unoptimised builds get more headroom.
    let budget = if cfg!(debug_assertions) {
        Duration::from_secs(5)
    } else {
        Duration::from_secs(1)
    };
    let points = uniform_feed(10_000, 5);

    for (zoom, cap) in [(3.0, 50), (4.0, 10), (12.0, 200)] {
        let view = ViewState::at_zoom(zoom).with_max_clusters(cap);
        let started = Instant::now();
        let out = cluster(&points, &view);
        let elapsed = started.elapsed();

        assert!(out.records.len() <= cap as usize);
        assert_eq!(out.total_members(), points.len());
        assert!(elapsed < budget, "zoom {zoom} cap {cap} took {elapsed:?}");
    }
}
