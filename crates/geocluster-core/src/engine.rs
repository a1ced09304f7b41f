//! Clustering entry point: validate, cull, bucket, aggregate, cap.
//!
//! ```text
//! points + view ─▶ validate ─▶ cull ─▶ grid ─▶ aggregate ─▶ (cap) ─▶ records
//! ```
//!
//! The engine holds only configuration. A caller that wants to reuse grid
//! allocations across calls passes its own `GridIndex` to
//! [`ClusterEngine::cluster_with_index`].

use tracing::debug;

use crate::aggregate::aggregate_cells;
use crate::config::{EngineConfig, GridConfig};
use crate::error::ConfigResult;
use crate::grid::{GridIndex, build_grid, cull};
use crate::model::{ClusterOutput, ClusterStats, SensorPoint, ViewState};
use crate::reduce::reduce_to_cap;
use crate::validate::validate_points;

/// A configured clustering engine. Cheap to clone, safe to share.
#[derive(Debug, Clone, Default)]
pub struct ClusterEngine {
    config: EngineConfig,
}

impl ClusterEngine {
    /// Create an engine, rejecting an invalid configuration.
    pub fn new(config: EngineConfig) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cluster `points` for `view` using a throwaway grid index.
    pub fn cluster(&self, points: &[SensorPoint], view: &ViewState) -> ClusterOutput {
        let mut index = GridIndex::new();
        self.cluster_with_index(&mut index, points, view)
    }

    /// Cluster `points` for `view`, bucketing into a caller-owned index.
    pub fn cluster_with_index(
        &self,
        index: &mut GridIndex,
        points: &[SensorPoint],
        view: &ViewState,
    ) -> ClusterOutput {
        let (valid, dropped_count) = validate_points(points);
        let valid_points = valid.len();
        let (visible, culled_points) = cull(valid, view.bounding_box.as_ref());

        let cap = view.effective_cap().or(self.config.max_clusters_default);
        let grid = self.grid_config_for(cap);
        let zoom = view.effective_zoom();

        let layout = build_grid(index, &visible, zoom, &grid);
        let mut records = aggregate_cells(&visible, index);
        index.clear();

        let mut merges = 0;
        if let Some(cap) = cap {
            (records, merges) = reduce_to_cap(records, cap);
        }

        let stats = ClusterStats {
            valid_points,
            culled_points,
            occupied_cells: layout.occupied_cells,
            cell_degrees: layout.cell_degrees,
            coarsened: layout.coarsened,
            merges,
        };

        debug!(
            input = points.len(),
            valid = valid_points,
            dropped = dropped_count,
            culled = culled_points,
            zoom,
            cell_degrees = layout.cell_degrees,
            cells = layout.occupied_cells,
            merges,
            clusters = records.len(),
            "clustered sensor points"
        );

        ClusterOutput {
            records,
            dropped_count,
            stats,
        }
    }

    /// Grid knobs for one call. Capped calls get a tighter cell bound so
    /// the reducer input stays small.
    fn grid_config_for(&self, cap: Option<usize>) -> GridConfig {
        let mut grid = self.config.grid.clone();
        if let Some(cap) = cap {
            let bound = self.config.reduce_input_limit.max(cap);
            grid.max_cells = grid.max_cells.min(bound);
        }
        grid
    }
}

/// Cluster with the default configuration.
pub fn cluster(points: &[SensorPoint], view: &ViewState) -> ClusterOutput {
    ClusterEngine::default().cluster(points, view)
}
