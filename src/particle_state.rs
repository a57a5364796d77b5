use crate::error::{TransportError, TransportResult};
use crate::spatial_index::{FullPoint, HorizontalPoint};
use transport_common::GeoPoint;

/// Positions of every particle at one instant, stored column-wise.
/// Row `i` is always particle `i` of the initial input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionSnapshot {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    pub depth: Vec<f64>,
}

impl PositionSnapshot {
    /// Builds a snapshot from particle rows, rejecting empty or non-finite input.
    pub fn from_points(points: &[GeoPoint]) -> TransportResult<Self> {
        if points.is_empty() {
            return Err(TransportError::EmptyInput("particle set"));
        }
        if let Some(row) = points.iter().position(|p| !p.is_finite()) {
            return Err(TransportError::NonFinite { what: "particle set", row });
        }
        Ok(Self {
            lon: points.iter().map(|p| p.lon).collect(),
            lat: points.iter().map(|p| p.lat).collect(),
            depth: points.iter().map(|p| p.depth).collect(),
        })
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            lon: Vec::with_capacity(n),
            lat: Vec::with_capacity(n),
            depth: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.lon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }

    #[inline(always)]
    pub fn point(&self, idx: usize) -> GeoPoint {
        GeoPoint::new(self.lon[idx], self.lat[idx], self.depth[idx])
    }

    #[inline(always)]
    pub fn set_point(&mut self, idx: usize, point: GeoPoint) {
        self.lon[idx] = point.lon;
        self.lat[idx] = point.lat;
        self.depth[idx] = point.depth;
    }

    pub fn push(&mut self, point: GeoPoint) {
        self.lon.push(point.lon);
        self.lat.push(point.lat);
        self.depth.push(point.depth);
    }

    pub fn points(&self) -> Vec<GeoPoint> {
        (0..self.len()).map(|idx| self.point(idx)).collect()
    }

    /// `[lon, lat]` rows for horizontal index queries.
    pub fn horizontal_points(&self) -> Vec<HorizontalPoint> {
        self.lon.iter().zip(&self.lat).map(|(&x, &y)| [x, y]).collect()
    }

    /// `[lon, lat, depth]` rows for full-grid index queries.
    pub fn full_points(&self) -> Vec<FullPoint> {
        self.lon
            .iter()
            .zip(&self.lat)
            .zip(&self.depth)
            .map(|((&x, &y), &z)| [x, y, z])
            .collect()
    }
}

/// The "previous" and "current" snapshots of a run in progress.
///
/// Each step reads `current` as its immutable input and produces the next
/// snapshot; `advance` then rotates the pair.
#[derive(Debug)]
pub struct ParticleState {
    pub previous: PositionSnapshot,
    pub current: PositionSnapshot,
}

impl ParticleState {
    /// Starts a run: both snapshots hold the initial positions.
    pub fn new(initial: PositionSnapshot) -> Self {
        Self {
            previous: initial.clone(),
            current: initial,
        }
    }

    pub fn num_particles(&self) -> usize {
        self.current.len()
    }

    /// Makes `next` the current snapshot; the old current becomes previous.
    pub fn advance(&mut self, next: PositionSnapshot) {
        debug_assert_eq!(next.len(), self.current.len());
        self.previous = std::mem::replace(&mut self.current, next);
    }

    /// Consumes the state, returning `(previous, current)`.
    pub fn into_parts(self) -> (PositionSnapshot, PositionSnapshot) {
        (self.previous, self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_rotates_snapshots() {
        let initial = PositionSnapshot::from_points(&[GeoPoint::new(1.0, 2.0, 3.0)]).unwrap();
        let mut state = ParticleState::new(initial.clone());

        let mut next = initial.clone();
        next.set_point(0, GeoPoint::new(1.5, 2.0, 3.0));
        state.advance(next.clone());

        assert_eq!(state.previous, initial);
        assert_eq!(state.current, next);
        assert_eq!(state.num_particles(), 1);
    }

    #[test]
    fn rejects_empty_and_non_finite() {
        assert!(PositionSnapshot::from_points(&[]).is_err());
        let err = PositionSnapshot::from_points(&[GeoPoint::new(0.0, 0.0, 0.0), GeoPoint::new(f64::INFINITY, 0.0, 0.0)]);
        assert!(matches!(err, Err(TransportError::NonFinite { row: 1, .. })));
    }

    #[test]
    fn query_rows_follow_particle_order() {
        let snapshot = PositionSnapshot::from_points(&[GeoPoint::new(1.0, 2.0, 3.0), GeoPoint::new(4.0, 5.0, 6.0)]).unwrap();
        assert_eq!(snapshot.horizontal_points(), vec![[1.0, 2.0], [4.0, 5.0]]);
        assert_eq!(snapshot.full_points(), vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    }
}
