//! Data model: sensor points, view state, and render-ready cluster records.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A single geo-located sensor reading as delivered by the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorPoint {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    /// Numeric reading (e.g. dose rate).
    pub value: f64,
    /// Unix epoch milliseconds. Only used for recency display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl SensorPoint {
    /// Create a reading without a timestamp.
    pub fn new(id: impl Into<String>, lat: f64, lon: f64, value: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lon,
            value,
            timestamp: None,
        }
    }

    /// Attach a reading timestamp (epoch milliseconds).
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    /// Create a coordinate pair.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Planar Euclidean distance on (lat, lon) degrees.
    pub fn planar_distance(&self, other: &LatLon) -> f64 {
        (self.lat - other.lat).hypot(self.lon - other.lon)
    }
}

/// A lat/lon rectangle. Edges are inclusive.
///
/// When `min_lon > max_lon` the box crosses the antimeridian and contains
/// longitudes `>= min_lon` or `<= max_lon`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Create a box. `min_lon > max_lon` means it crosses the antimeridian.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// A degenerate box covering exactly one coordinate.
    pub fn around(lat: f64, lon: f64) -> Self {
        Self::new(lat, lat, lon, lon)
    }

    /// Whether the box can be used for culling at all.
    pub fn is_usable(&self) -> bool {
        [self.min_lat, self.max_lat, self.min_lon, self.max_lon]
            .iter()
            .all(|v| v.is_finite())
            && self.min_lat <= self.max_lat
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lon > self.max_lon
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.min_lat || lat > self.max_lat {
            return false;
        }
        if self.crosses_antimeridian() {
            lon >= self.min_lon || lon <= self.max_lon
        } else {
            lon >= self.min_lon && lon <= self.max_lon
        }
    }

    /// Grow the box to include a coordinate. Only meaningful for
    /// non-antimeridian boxes built from member points.
    pub fn extend(&mut self, lat: f64, lon: f64) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }
}

/// The caller's current view: zoom, optional viewport, optional cap.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// Zoom level, integer or fractional. Negative or non-finite values
    /// are treated as 0.
    pub zoom: f64,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    /// Maximum number of output records. Values below 1 clamp to 1.
    #[serde(default)]
    pub max_clusters: Option<i64>,
}

impl ViewState {
    /// Create an uncapped, unbounded view at a zoom level.
    pub fn at_zoom(zoom: f64) -> Self {
        Self {
            zoom,
            bounding_box: None,
            max_clusters: None,
        }
    }

    /// Restrict the view to a viewport.
    pub fn with_bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounding_box = Some(bounds);
        self
    }

    /// Cap the number of output records.
    pub fn with_max_clusters(mut self, max_clusters: i64) -> Self {
        self.max_clusters = Some(max_clusters);
        self
    }

    pub fn effective_zoom(&self) -> f64 {
        if self.zoom.is_finite() && self.zoom > 0.0 {
            self.zoom
        } else {
            0.0
        }
    }

    /// The cap after clamping, if any.
    pub fn effective_cap(&self) -> Option<usize> {
        self.max_clusters.map(|k| usize::try_from(k.max(1)).unwrap_or(usize::MAX))
    }
}

/// Several points reduced to one render record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateCluster {
    /// Arithmetic mean of member coordinates.
    pub centroid: LatLon,
    pub member_count: usize,
    /// Maximum member value. Never the mean: a single hot reading must
    /// stay visible inside a cluster of normal ones.
    pub representative_value: f64,
    pub member_ids: BTreeSet<String>,
    /// Tight bounds of the member coordinates, for drill-down.
    pub bounds: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_timestamp: Option<i64>,
}

/// One output record handed to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClusterRecord {
    Singleton(SensorPoint),
    Aggregate(AggregateCluster),
}

impl ClusterRecord {
    pub fn centroid(&self) -> LatLon {
        match self {
            ClusterRecord::Singleton(p) => LatLon::new(p.lat, p.lon),
            ClusterRecord::Aggregate(a) => a.centroid,
        }
    }

    pub fn member_count(&self) -> usize {
        match self {
            ClusterRecord::Singleton(_) => 1,
            ClusterRecord::Aggregate(a) => a.member_count,
        }
    }

    pub fn representative_value(&self) -> f64 {
        match self {
            ClusterRecord::Singleton(p) => p.value,
            ClusterRecord::Aggregate(a) => a.representative_value,
        }
    }

    pub fn member_ids(&self) -> Vec<&str> {
        match self {
            ClusterRecord::Singleton(p) => vec![p.id.as_str()],
            ClusterRecord::Aggregate(a) => a.member_ids.iter().map(String::as_str).collect(),
        }
    }

    /// The id used for canonical ordering: the point id, or the smallest
    /// member id of an aggregate.
    pub fn key_id(&self) -> &str {
        match self {
            ClusterRecord::Singleton(p) => &p.id,
            ClusterRecord::Aggregate(a) => a.member_ids.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn sort_key(&self) -> SortKey {
        let c = self.centroid();
        SortKey::new(c.lat, c.lon, Arc::from(self.key_id()))
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self, ClusterRecord::Singleton(_))
    }
}

/// Canonical order key: latitude, then longitude, then id.
#[derive(Debug, Clone)]
pub struct SortKey {
    pub lat: f64,
    pub lon: f64,
    pub id: Arc<str>,
}

impl SortKey {
    /// Create a sort key.
    pub fn new(lat: f64, lon: f64, id: Arc<str>) -> Self {
        Self { lat, lon, id }
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.lat
            .total_cmp(&other.lat)
            .then_with(|| self.lon.total_cmp(&other.lon))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Compare two records in canonical output order.
pub fn canonical_cmp(a: &ClusterRecord, b: &ClusterRecord) -> Ordering {
    let (ca, cb) = (a.centroid(), b.centroid());
    ca.lat
        .total_cmp(&cb.lat)
        .then_with(|| ca.lon.total_cmp(&cb.lon))
        .then_with(|| a.key_id().cmp(b.key_id()))
}

/// Per-call diagnostics. Not part of the render contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStats {
    pub valid_points: usize,
    /// Valid points outside the viewport.
    pub culled_points: usize,
    pub occupied_cells: usize,
    pub cell_degrees: f64,
    /// The grid was coarsened to stay under the cell-count bound.
    pub coarsened: bool,
    /// Merges performed by the cap reducer.
    pub merges: usize,
}

/// Result of one clustering call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOutput {
    pub records: Vec<ClusterRecord>,
    /// Invalid or duplicate input points discarded.
    pub dropped_count: usize,
    pub stats: ClusterStats,
}

impl ClusterOutput {
    /// Sum of `member_count` over all records.
    pub fn total_members(&self) -> usize {
        self.records.iter().map(ClusterRecord::member_count).sum()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_contains_inclusive_edges() {
        let bbox = BoundingBox::new(0.0, 10.0, 0.0, 10.0);
        assert!(bbox.contains(0.0, 0.0));
        assert!(bbox.contains(10.0, 10.0));
        assert!(!bbox.contains(10.1, 5.0));
        assert!(!bbox.contains(5.0, -0.1));
    }

    #[test]
    fn bounding_box_across_antimeridian() {
        let bbox = BoundingBox::new(-10.0, 10.0, 170.0, -170.0);
        assert!(bbox.crosses_antimeridian());
        assert!(bbox.contains(0.0, 175.0));
        assert!(bbox.contains(0.0, -175.0));
        assert!(!bbox.contains(0.0, 0.0));
    }

    #[test]
    fn inverted_latitudes_are_unusable() {
        assert!(!BoundingBox::new(10.0, 0.0, 0.0, 10.0).is_usable());
        assert!(!BoundingBox::new(0.0, f64::NAN, 0.0, 10.0).is_usable());
        assert!(BoundingBox::new(0.0, 10.0, 170.0, -170.0).is_usable());
    }

    #[test]
    fn cap_clamps_to_one() {
        assert_eq!(ViewState::at_zoom(1.0).with_max_clusters(0).effective_cap(), Some(1));
        assert_eq!(ViewState::at_zoom(1.0).with_max_clusters(-5).effective_cap(), Some(1));
        assert_eq!(ViewState::at_zoom(1.0).with_max_clusters(7).effective_cap(), Some(7));
        assert_eq!(ViewState::at_zoom(1.0).effective_cap(), None);
    }

    #[test]
    fn negative_zoom_is_zero() {
        assert_eq!(ViewState::at_zoom(-3.0).effective_zoom(), 0.0);
        assert_eq!(ViewState::at_zoom(f64::NAN).effective_zoom(), 0.0);
        assert_eq!(ViewState::at_zoom(4.5).effective_zoom(), 4.5);
    }

    #[test]
    fn canonical_order_breaks_ties_by_id() {
        let a = ClusterRecord::Singleton(SensorPoint::new("b", 1.0, 1.0, 0.0));
        let b = ClusterRecord::Singleton(SensorPoint::new("a", 1.0, 1.0, 0.0));
        assert_eq!(canonical_cmp(&a, &b), Ordering::Greater);
        assert!(a.sort_key() > b.sort_key());
    }

    #[test]
    fn point_json_uses_camel_case() {
        let p = SensorPoint::new("s1", 1.5, 2.5, 0.3).with_timestamp(42);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"timestamp\":42"));
        let back: SensorPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
