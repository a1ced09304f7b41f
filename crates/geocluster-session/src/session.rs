//! Clustering session: per-consumer orchestration over a live feed.
//!
//! A `ClusterSession` belongs to one consumer (one map view). It keeps the
//! latest reading per sensor, reuses one grid index across calls, and skips
//! recomputation when neither the snapshot nor the view materially changed.
//! Every output is still computed from scratch by the engine; the session
//! never patches a previous result.

use std::collections::BTreeMap;

use geocluster_core::{
    ClusterEngine, ClusterOutput, ConfigResult, EngineConfig, GridIndex, SensorPoint, ViewState,
    check_point,
};
use tracing::debug;

/// Outcome of merging a batch of readings into the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub inserted: usize,
    pub updated: usize,
    /// Readings identical to what the snapshot already held.
    pub unchanged: usize,
    /// Malformed readings; the snapshot keeps whatever it held before.
    pub rejected: usize,
}

impl ApplySummary {
    /// Whether the batch changed the snapshot.
    pub fn is_material(&self) -> bool {
        self.inserted + self.updated > 0
    }
}

pub struct ClusterSession {
    engine: ClusterEngine,
    index: GridIndex,
    /// Latest reading per sensor id, ordered by id so clustering input does
    /// not depend on arrival order.
    snapshot: BTreeMap<String, SensorPoint>,
    /// Snapshot changed since the last recluster.
    dirty: bool,
    last_view: Option<ViewState>,
    last_output: Option<ClusterOutput>,
}

impl Default for ClusterSession {
    fn default() -> Self {
        Self::with_engine(ClusterEngine::default())
    }
}

impl ClusterSession {
    /// Create a session with its own engine, rejecting an invalid config.
    pub fn new(config: EngineConfig) -> ConfigResult<Self> {
        Ok(Self::with_engine(ClusterEngine::new(config)?))
    }

    /// Create a session around an existing engine.
    pub fn with_engine(engine: ClusterEngine) -> Self {
        Self {
            engine,
            index: GridIndex::new(),
            snapshot: BTreeMap::new(),
            dirty: false,
            last_view: None,
            last_output: None,
        }
    }

    pub fn engine(&self) -> &ClusterEngine {
        &self.engine
    }

    /// Cluster an explicit point set, bypassing the snapshot.
    pub fn cluster(&mut self, points: &[SensorPoint], view: &ViewState) -> ClusterOutput {
        self.engine.cluster_with_index(&mut self.index, points, view)
    }

    /// Upsert readings by sensor id.
    ///
    /// A malformed reading is rejected outright, so it never replaces the
    /// sensor's last good one.
    pub fn apply_readings<I>(&mut self, readings: I) -> ApplySummary
    where
        I: IntoIterator<Item = SensorPoint>,
    {
        let mut summary = ApplySummary::default();
        for reading in readings {
            if let Err(reason) = check_point(&reading) {
                debug!(id = %reading.id, ?reason, "rejected sensor reading");
                summary.rejected += 1;
                continue;
            }
            match self.snapshot.get_mut(&reading.id) {
                Some(existing) if *existing == reading => summary.unchanged += 1,
                Some(existing) => {
                    *existing = reading;
                    summary.updated += 1;
                }
                None => {
                    self.snapshot.insert(reading.id.clone(), reading);
                    summary.inserted += 1;
                }
            }
        }
        if summary.is_material() {
            self.dirty = true;
        }
        debug!(
            inserted = summary.inserted,
            updated = summary.updated,
            unchanged = summary.unchanged,
            rejected = summary.rejected,
            sensors = self.snapshot.len(),
            "applied readings"
        );
        summary
    }

    /// Drop sensors from the snapshot. Returns how many were present.
    pub fn remove_points<'a, I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let removed = ids
            .into_iter()
            .filter(|id| self.snapshot.remove(*id).is_some())
            .count();
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    /// Replace the whole snapshot, e.g. after a feed reconnect. Malformed
    /// readings are skipped; among duplicates the first wins.
    pub fn replace_snapshot<I>(&mut self, readings: I)
    where
        I: IntoIterator<Item = SensorPoint>,
    {
        self.snapshot.clear();
        for reading in readings.into_iter().filter(|r| check_point(r).is_ok()) {
            self.snapshot.entry(reading.id.clone()).or_insert(reading);
        }
        self.dirty = true;
    }

    pub fn snapshot_len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn snapshot_points(&self) -> Vec<SensorPoint> {
        self.snapshot.values().cloned().collect()
    }

    /// Cluster the current snapshot for `view`.
    pub fn recluster(&mut self, view: &ViewState) -> ClusterOutput {
        let points = self.snapshot_points();
        let output = self.engine.cluster_with_index(&mut self.index, &points, view);
        self.dirty = false;
        self.last_view = Some(view.clone());
        self.last_output = Some(output.clone());
        output
    }

    /// Recluster only if the snapshot or the view changed since the last
    /// call. Returns `None` when the previous output still stands.
    pub fn recluster_if_changed(&mut self, view: &ViewState) -> Option<ClusterOutput> {
        let view_changed = self.last_view.as_ref() != Some(view);
        if !self.dirty && !view_changed && self.last_output.is_some() {
            debug!("snapshot and view unchanged, skipping recluster");
            return None;
        }
        Some(self.recluster(view))
    }

    pub fn last_output(&self) -> Option<&ClusterOutput> {
        self.last_output.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
