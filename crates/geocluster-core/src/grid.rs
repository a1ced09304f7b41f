//! Spatial grid builder: buckets points into zoom-scaled cells.
//!
//! Cell size halves with every whole zoom level:
//!
//! ```text
//! cell_degrees = clamp(base / 2^floor(zoom), min, max)
//! key          = (floor((lat + 90) / cell), floor((lon + 180) / cell))
//! ```
//!
//! Because the exponent is a whole level, each cell at level `z + 1` lies
//! inside exactly one cell at level `z`; cluster counts can only grow as the
//! user zooms in. If a build would occupy more than `max_cells` cells, the
//! grid is coarsened by doubling the cell size until it fits.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::{GridConfig, MIN_CELL_DEGREES_FLOOR};
use crate::model::{BoundingBox, SensorPoint};

/// Integer coordinates of a grid cell: (latitude row, longitude column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey(pub i64, pub i64);

impl CellKey {
    pub fn for_point(lat: f64, lon: f64, cell_degrees: f64) -> Self {
        let row = ((lat + 90.0) / cell_degrees).floor() as i64;
        let col = ((lon + 180.0) / cell_degrees).floor() as i64;
        CellKey(row, col)
    }
}

/// Cell size in degrees for a zoom level.
pub fn cell_degrees(zoom: f64, config: &GridConfig) -> f64 {
    let level = if zoom.is_finite() && zoom > 0.0 {
        zoom.floor().min(f64::from(i32::MAX)) as i32
    } else {
        0
    };
    let raw = config.base_cell_degrees / 2f64.powi(level);
    // max/min rather than clamp(): a hand-built config may be inverted.
    raw.max(config.min_cell_degrees)
        .min(config.max_cell_degrees)
        .max(MIN_CELL_DEGREES_FLOOR)
}

/// Drop points outside the viewport. Returns the kept points and how many
/// were culled. An unusable box culls nothing.
pub fn cull<'a>(
    points: Vec<&'a SensorPoint>,
    bounds: Option<&BoundingBox>,
) -> (Vec<&'a SensorPoint>, usize) {
    let Some(bbox) = bounds else {
        return (points, 0);
    };
    if !bbox.is_usable() {
        warn!(?bbox, "ignoring unusable viewport bounds");
        return (points, 0);
    }
    let before = points.len();
    let kept: Vec<&SensorPoint> = points
        .into_iter()
        .filter(|p| bbox.contains(p.lat, p.lon))
        .collect();
    let culled = before - kept.len();
    (kept, culled)
}

/// Reusable cell → point-index buckets.
///
/// Bucket vectors are recycled between builds so a long-lived session does
/// not reallocate on every viewport tick. The index is only a cache: every
/// build starts from an empty map.
#[derive(Debug, Default)]
pub struct GridIndex {
    cells: HashMap<CellKey, Vec<usize>>,
    spare: Vec<Vec<usize>>,
}

impl GridIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty the index, keeping bucket allocations for reuse.
    pub fn clear(&mut self) {
        for (_, mut bucket) in self.cells.drain() {
            bucket.clear();
            self.spare.push(bucket);
        }
    }

    /// Bucket `points` at the given cell size.
    ///
    /// Stops early and returns `false` once more than `limit` cells are
    /// occupied; the index is then incomplete and must be rebuilt.
    pub fn bucket(&mut self, points: &[&SensorPoint], cell_degrees: f64, limit: usize) -> bool {
        self.clear();
        for (i, p) in points.iter().enumerate() {
            let key = CellKey::for_point(p.lat, p.lon, cell_degrees);
            let spare = &mut self.spare;
            self.cells
                .entry(key)
                .or_insert_with(|| spare.pop().unwrap_or_default())
                .push(i);
            if self.cells.len() > limit {
                return false;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Occupied cells and the indices of their members, in arbitrary order.
    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &[usize])> {
        self.cells.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

/// Outcome of a grid build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    /// Cell size actually used.
    pub cell_degrees: f64,
    pub occupied_cells: usize,
    pub coarsened: bool,
}

/// Bucket points for `zoom`, coarsening if the cell bound is exceeded.
pub fn build_grid(
    index: &mut GridIndex,
    points: &[&SensorPoint],
    zoom: f64,
    config: &GridConfig,
) -> GridLayout {
    let mut cell = cell_degrees(zoom, config);
    let mut coarsened = false;

    loop {
        let at_max = cell >= config.max_cell_degrees;
        let limit = if at_max { usize::MAX } else { config.max_cells.max(1) };
        if index.bucket(points, cell, limit) {
            break;
        }
        coarsened = true;
        cell = (cell * 2.0).min(config.max_cell_degrees);
        debug!(cell_degrees = cell, "cell bound exceeded, coarsening grid");
    }

    if coarsened {
        warn!(
            points = points.len(),
            zoom,
            cell_degrees = cell,
            max_cells = config.max_cells,
            "grid coarsened to stay under cell bound"
        );
    }

    GridLayout {
        cell_degrees: cell,
        occupied_cells: index.len(),
        coarsened,
    }
}
