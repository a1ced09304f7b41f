//! Drops malformed feed data before bucketing.

use std::collections::HashSet;

use tracing::trace;

use crate::model::SensorPoint;

/// Why a point was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    EmptyId,
    DuplicateId,
    NonFiniteCoordinate,
    OutOfRange,
    NonFiniteValue,
}

/// Check a single point in isolation (everything except duplicates).
pub fn check_point(point: &SensorPoint) -> Result<(), Rejection> {
    if point.id.is_empty() {
        return Err(Rejection::EmptyId);
    }
    if !point.lat.is_finite() || !point.lon.is_finite() {
        return Err(Rejection::NonFiniteCoordinate);
    }
    if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lon) {
        return Err(Rejection::OutOfRange);
    }
    if !point.value.is_finite() {
        return Err(Rejection::NonFiniteValue);
    }
    Ok(())
}

/// Split raw points into valid points and a dropped count.
///
/// Duplicate ids keep the first occurrence. Input order of the valid
/// points is preserved.
pub fn validate_points(points: &[SensorPoint]) -> (Vec<&SensorPoint>, usize) {
    let mut seen: HashSet<&str> = HashSet::with_capacity(points.len());
    let mut valid = Vec::with_capacity(points.len());
    let mut dropped = 0;

    for point in points {
        let verdict = check_point(point).and_then(|()| {
            if seen.insert(point.id.as_str()) {
                Ok(())
            } else {
                Err(Rejection::DuplicateId)
            }
        });
        match verdict {
            Ok(()) => valid.push(point),
            Err(reason) => {
                dropped += 1;
                trace!(id = %point.id, ?reason, "dropped sensor point");
            }
        }
    }

    (valid, dropped)
}
