//! Cap reducer: greedy nearest-pair agglomeration down to a cluster cap.
//!
//! Every live cluster remembers its nearest neighbour. Each step merges the
//! globally closest pair, found by scanning those neighbours, then refreshes
//! only the entries the merge touched: clusters whose neighbour was one of
//! the merged pair rescan, and every other cluster just compares against
//! the merged centroid. The whole reduction is O(k²) in the number of
//! clusters, independent of the number of points, with no pair storage.
//!
//! Ties on distance go to the pair with the lowest combined canonical key
//! (the smaller of the two keys first, then the larger).

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::model::{
    AggregateCluster, BoundingBox, ClusterRecord, LatLon, SensorPoint, SortKey, canonical_cmp,
};

/// A cluster while the reducer works on it.
#[derive(Debug, Clone)]
struct Working {
    centroid: LatLon,
    count: usize,
    max_value: f64,
    ids: BTreeSet<String>,
    bounds: BoundingBox,
    latest: Option<i64>,
    /// Kept so an unmerged singleton is handed back untouched.
    original: Option<SensorPoint>,
    key: SortKey,
}

impl Working {
    fn from_record(record: ClusterRecord) -> Self {
        let key = record.sort_key();
        match record {
            ClusterRecord::Singleton(p) => Working {
                centroid: LatLon::new(p.lat, p.lon),
                count: 1,
                max_value: p.value,
                ids: BTreeSet::from([p.id.clone()]),
                bounds: BoundingBox::around(p.lat, p.lon),
                latest: p.timestamp,
                original: Some(p),
                key,
            },
            ClusterRecord::Aggregate(a) => Working {
                centroid: a.centroid,
                count: a.member_count,
                max_value: a.representative_value,
                ids: a.member_ids,
                bounds: a.bounds,
                latest: a.latest_timestamp,
                original: None,
                key,
            },
        }
    }

    fn absorb(&mut self, other: Working) {
        let total = (self.count + other.count) as f64;
        let (wa, wb) = (self.count as f64, other.count as f64);
        self.centroid = LatLon::new(
            (self.centroid.lat * wa + other.centroid.lat * wb) / total,
            (self.centroid.lon * wa + other.centroid.lon * wb) / total,
        );
        self.count += other.count;
        self.max_value = self.max_value.max(other.max_value);

        let mut ids = other.ids;
        if ids.len() > self.ids.len() {
            std::mem::swap(&mut self.ids, &mut ids);
        }
        self.ids.extend(ids);

        self.bounds = self.bounds.union(&other.bounds);
        self.latest = self.latest.max(other.latest);
        self.original = None;
        let first_id: Arc<str> = self
            .ids
            .first()
            .map(|s| Arc::from(s.as_str()))
            .unwrap_or_else(|| Arc::from(""));
        self.key = SortKey::new(self.centroid.lat, self.centroid.lon, first_id);
    }

    fn into_record(self) -> ClusterRecord {
        if let Some(point) = self.original {
            return ClusterRecord::Singleton(point);
        }
        ClusterRecord::Aggregate(AggregateCluster {
            centroid: self.centroid,
            member_count: self.count,
            representative_value: self.max_value,
            member_ids: self.ids,
            bounds: self.bounds,
            latest_timestamp: self.latest,
        })
    }
}

/// A merge candidate: slot `a`, its partner `b`, and their distance.
///
/// Keys are looked up in the slots when distances tie, so a candidate is
/// three words and costs nothing to copy.
#[derive(Debug, Clone, Copy)]
struct Pair {
    dist: f64,
    a: usize,
    b: usize,
}

impl Pair {
    fn between(slots: &[Option<Working>], a: usize, b: usize) -> Option<Self> {
        let (wa, wb) = (slots[a].as_ref()?, slots[b].as_ref()?);
        Some(Pair {
            dist: wa.centroid.planar_distance(&wb.centroid),
            a,
            b,
        })
    }

    /// The pair's keys, smaller first.
    fn keys<'s>(
        &self,
        slots: &'s [Option<Working>],
    ) -> (Option<&'s SortKey>, Option<&'s SortKey>) {
        let ka = slots[self.a].as_ref().map(|w| &w.key);
        let kb = slots[self.b].as_ref().map(|w| &w.key);
        if ka <= kb { (ka, kb) } else { (kb, ka) }
    }

    /// Distance first, then the combined key.
    fn cmp_in(&self, other: &Pair, slots: &[Option<Working>]) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.keys(slots).cmp(&other.keys(slots)))
    }

    fn beats(&self, current: Option<Pair>, slots: &[Option<Working>]) -> bool {
        current.is_none_or(|c| self.cmp_in(&c, slots) == Ordering::Less)
    }
}

/// Closest live partner of slot `a`.
fn nearest(slots: &[Option<Working>], a: usize) -> Option<Pair> {
    let mut best = None;
    for b in 0..slots.len() {
        if b == a {
            continue;
        }
        if let Some(pair) = Pair::between(slots, a, b)
            && pair.beats(best, slots)
        {
            best = Some(pair);
        }
    }
    best
}

/// Merge clusters until at most `cap` remain (or only one is left).
///
/// Returns the records in canonical order and the number of merges done.
/// Input already within the cap is returned unchanged.
pub fn reduce_to_cap(records: Vec<ClusterRecord>, cap: usize) -> (Vec<ClusterRecord>, usize) {
    let cap = cap.max(1);
    if records.len() <= cap {
        return (records, 0);
    }

    let mut records = records;
    records.sort_by(canonical_cmp);
    let mut slots: Vec<Option<Working>> = records
        .into_iter()
        .map(|r| Some(Working::from_record(r)))
        .collect();
    let mut live = slots.len();
    let mut neighbour: Vec<Option<Pair>> = (0..slots.len()).map(|a| nearest(&slots, a)).collect();

    let mut merges = 0;
    while live > cap && live > 1 {
        let best = neighbour
            .iter()
            .flatten()
            .copied()
            .reduce(|best, pair| if pair.beats(Some(best), &slots) { pair } else { best });
        let Some(best) = best else {
            break;
        };

        let (keep, retire) = (best.a.min(best.b), best.a.max(best.b));
        let Some(absorbed) = slots[retire].take() else {
            break;
        };
        if let Some(survivor) = slots[keep].as_mut() {
            survivor.absorb(absorbed);
        }
        neighbour[retire] = None;
        live -= 1;
        merges += 1;

        for a in 0..slots.len() {
            if slots[a].is_none() {
                continue;
            }
            let stale = a == keep || neighbour[a].is_some_and(|p| p.b == keep || p.b == retire);
            if stale {
                neighbour[a] = nearest(&slots, a);
            } else if let Some(pair) = Pair::between(&slots, a, keep)
                && pair.beats(neighbour[a], &slots)
            {
                neighbour[a] = Some(pair);
            }
        }
    }

    debug!(merges, remaining = live, cap, "cap reduction complete");

    let mut out: Vec<ClusterRecord> = slots
        .into_iter()
        .flatten()
        .map(Working::into_record)
        .collect();
    out.sort_by(canonical_cmp);
    (out, merges)
}
