//! geocluster-core: zoom-keyed spatial clustering of sensor readings.
//!
//! Turns a set of geo-located readings plus a view state (zoom, optional
//! viewport, optional cluster cap) into a small, canonically ordered set of
//! render-ready cluster records. Pure and synchronous: no I/O, no shared
//! state, safe to call from any thread.
//!
//! # Components
//!
//! - **`validate`** — Drops malformed and duplicate points
//! - **`grid`** — Zoom-scaled cell bucketing and viewport culling
//! - **`aggregate`** — One record per occupied cell (max-value representative)
//! - **`reduce`** — Greedy nearest-pair merging down to a cluster cap
//! - **`engine`** — The `cluster()` entry point tying the stages together
//!
//! # Invariants
//!
//! - Every valid point inside the viewport lands in exactly one record.
//! - With a cap of `k`, at most `k` records come back.
//! - Records are sorted by centroid latitude, then longitude, then id.
//! - An aggregate's representative value is the maximum member value.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod model;
pub mod reduce;
pub mod validate;

pub use config::{EngineConfig, GridConfig, MIN_CELL_DEGREES_FLOOR};
pub use engine::{ClusterEngine, cluster};
pub use error::{ConfigError, ConfigResult};
pub use grid::{CellKey, GridIndex, GridLayout, cell_degrees};
pub use model::{
    AggregateCluster, BoundingBox, ClusterOutput, ClusterRecord, ClusterStats, LatLon, SensorPoint,
    SortKey, ViewState, canonical_cmp,
};
pub use reduce::reduce_to_cap;
pub use validate::{Rejection, check_point, validate_points};
