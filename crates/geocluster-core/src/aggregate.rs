//! One cluster record per occupied grid cell.

use std::collections::BTreeSet;

use crate::grid::GridIndex;
use crate::model::{
    AggregateCluster, BoundingBox, ClusterRecord, LatLon, SensorPoint, canonical_cmp,
};

/// Reduce a set of member points to a single aggregate.
///
/// `members` must be non-empty.
pub fn aggregate_members(members: &[&SensorPoint]) -> AggregateCluster {
    let n = members.len();
    let first = members[0];
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    let mut max_value = f64::NEG_INFINITY;
    let mut latest: Option<i64> = None;
    let mut bounds = BoundingBox::around(first.lat, first.lon);
    let mut ids = BTreeSet::new();

    for p in members {
        lat_sum += p.lat;
        lon_sum += p.lon;
        max_value = max_value.max(p.value);
        latest = latest.max(p.timestamp);
        bounds.extend(p.lat, p.lon);
        ids.insert(p.id.clone());
    }

    AggregateCluster {
        centroid: LatLon::new(lat_sum / n as f64, lon_sum / n as f64),
        member_count: n,
        representative_value: max_value,
        member_ids: ids,
        bounds,
        latest_timestamp: latest,
    }
}

/// Turn every occupied cell into a record, in canonical order.
///
/// Cells holding one point pass it through unchanged as a singleton.
pub fn aggregate_cells(points: &[&SensorPoint], index: &GridIndex) -> Vec<ClusterRecord> {
    let mut records: Vec<ClusterRecord> = index
        .cells()
        .filter_map(|(_, members)| match members {
            [] => None,
            [only] => Some(ClusterRecord::Singleton(points[*only].clone())),
            many => {
                let refs: Vec<&SensorPoint> = many.iter().map(|&i| points[i]).collect();
                Some(ClusterRecord::Aggregate(aggregate_members(&refs)))
            }
        })
        .collect();

    records.sort_by(canonical_cmp);
    records
}
