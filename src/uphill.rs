//! Seabed slope restriction.
//!
//! A move is "uphill" when the cell a particle arrives in has a seabed more
//! than `threshold_m` shallower than the cell it is leaving. Such moves are
//! either dropped outright or shortened towards the previous position.

use crate::error::{TransportError, TransportResult};
use crate::particle_state::PositionSnapshot;
use crate::sampler::FieldSampler;
use transport_common::CorrectionMode;

/// Number of uphill tests before a particle falls back to staying put.
pub const MAX_UPHILL_TESTS: usize = 3;

/// True when arriving in a seabed more than `threshold` shallower than the one left.
#[inline(always)]
pub fn is_uphill(leaving_depth: f64, arriving_depth: f64, threshold: f64) -> bool {
    leaving_depth - arriving_depth > threshold
}

/// What the corrector did during one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UphillReport {
    /// Moves replaced by zero displacement.
    pub suppressed: usize,
    /// Moves shortened to a half or quarter step.
    pub damped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeRestriction {
    pub threshold_m: f64,
    pub mode: CorrectionMode,
}

impl SlopeRestriction {
    pub fn new(threshold_m: f64, mode: CorrectionMode) -> TransportResult<Self> {
        if !(threshold_m >= 0.0) {
            return Err(TransportError::config("slope threshold must be a non-negative number"));
        }
        Ok(Self { threshold_m, mode })
    }

    /// Corrects `candidate` in place.
    ///
    /// `leaving_depth[i]` is the seabed depth of the cell particle `i` is
    /// moving out of; only rows with `active[i]` set are considered.
    pub fn correct(
        &self,
        previous: &PositionSnapshot,
        candidate: &mut PositionSnapshot,
        leaving_depth: &[f64],
        active: &[bool],
        sampler: &FieldSampler<'_>,
    ) -> TransportResult<UphillReport> {
        let n = previous.len();
        TransportError::check_len("uphill candidate", n, candidate.len())?;
        TransportError::check_len("uphill leaving depth", n, leaving_depth.len())?;
        TransportError::check_len("uphill active mask", n, active.len())?;

        let mut report = UphillReport::default();
        let mut pending: Vec<usize> = (0..n).filter(|&idx| active[idx]).collect();

        for attempt in 1..=MAX_UPHILL_TESTS {
            if pending.is_empty() {
                break;
            }

            // Test only the rows still in question.
            let mut probe = PositionSnapshot::with_capacity(pending.len());
            for &idx in &pending {
                probe.push(candidate.point(idx));
            }
            let cells = sampler.locate_horizontal(&probe)?;
            let arriving = sampler.seabed_depths(&cells);

            let uphill: Vec<usize> = pending
                .iter()
                .zip(&arriving)
                .filter(|&(&idx, &depth)| is_uphill(leaving_depth[idx], depth, self.threshold_m))
                .map(|(&idx, _)| idx)
                .collect();

            // Rows that passed on a retry were shortened, not dropped.
            if attempt > 1 {
                report.damped += pending.len() - uphill.len();
            }

            let give_up = self.mode == CorrectionMode::Hard || attempt == MAX_UPHILL_TESTS;
            for &idx in &uphill {
                let retreat = if give_up {
                    previous.point(idx)
                } else {
                    candidate.point(idx).midpoint(previous.point(idx))
                };
                candidate.set_point(idx, retreat);
            }
            if give_up {
                report.suppressed += uphill.len();
                break;
            }
            pending = uphill;
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::CurrentField;
    use crate::spatial_index::GridIndices;
    use transport_common::GeoPoint;

    /// Deep water for lon < 0.5, a shelf 60 m shallower beyond it.
    fn shelf_field() -> CurrentField {
        let mut lon = Vec::new();
        let mut lat = Vec::new();
        let mut depth = Vec::new();
        for ix in 0..=10 {
            for iy in 0..=2 {
                let x = ix as f64 * 0.1;
                lon.push(x);
                lat.push(iy as f64 * 0.1);
                depth.push(if x < 0.5 { 100.0 } else { 40.0 });
            }
        }
        let n = lon.len();
        CurrentField::new(lon, lat, depth, vec![0.0; n], vec![0.0; n]).unwrap()
    }

    fn run_case(mode: CorrectionMode, from: f64, to: f64) -> (GeoPoint, UphillReport) {
        let field = shelf_field();
        let indices = GridIndices::build(&field).unwrap();
        let sampler = FieldSampler::new(&field, &indices);
        let previous = PositionSnapshot::from_points(&[GeoPoint::new(from, 0.1, 0.0)]).unwrap();
        let mut candidate = PositionSnapshot::from_points(&[GeoPoint::new(to, 0.1, 0.0)]).unwrap();

        let restriction = SlopeRestriction::new(50.0, mode).unwrap();
        let report = restriction
            .correct(&previous, &mut candidate, &[100.0], &[true], &sampler)
            .unwrap();
        (candidate.point(0), report)
    }

    #[test]
    fn uphill_test_uses_threshold() {
        assert!(is_uphill(100.0, 40.0, 50.0));
        assert!(!is_uphill(100.0, 50.0, 50.0));
        assert!(!is_uphill(40.0, 100.0, 50.0));
    }

    #[test]
    fn hard_policy_keeps_previous_position() {
        let (point, report) = run_case(CorrectionMode::Hard, 0.4, 0.62);
        assert_eq!(point, GeoPoint::new(0.4, 0.1, 0.0));
        assert_eq!(report, UphillReport { suppressed: 1, damped: 0 });
    }

    #[test]
    fn mean_move_stops_at_half_step_when_compliant() {
        // Half step lands on 0.43, still over deep water.
        let (point, report) = run_case(CorrectionMode::MeanMove, 0.36, 0.5);
        assert!((point.lon - 0.43).abs() < 1e-12);
        assert!(point.lon > 0.36 && point.lon < 0.5);
        assert_eq!(report, UphillReport { suppressed: 0, damped: 1 });
    }

    #[test]
    fn mean_move_tries_quarter_step() {
        // Half step 0.50 is on the shelf, quarter step 0.43 is not.
        let (point, report) = run_case(CorrectionMode::MeanMove, 0.36, 0.64);
        assert!((point.lon - 0.43).abs() < 1e-12);
        assert_eq!(report.damped, 1);
    }

    #[test]
    fn mean_move_falls_back_to_zero_displacement() {
        // Even the quarter step (0.57) lands on the shelf.
        let (point, report) = run_case(CorrectionMode::MeanMove, 0.46, 0.9);
        assert_eq!(point, GeoPoint::new(0.46, 0.1, 0.0));
        assert_eq!(report, UphillReport { suppressed: 1, damped: 0 });
    }

    #[test]
    fn inactive_particles_are_left_alone() {
        let field = shelf_field();
        let indices = GridIndices::build(&field).unwrap();
        let sampler = FieldSampler::new(&field, &indices);
        let previous = PositionSnapshot::from_points(&[GeoPoint::new(0.4, 0.1, 0.0)]).unwrap();
        let mut candidate = PositionSnapshot::from_points(&[GeoPoint::new(0.9, 0.1, 0.0)]).unwrap();
        let restriction = SlopeRestriction::new(50.0, CorrectionMode::Hard).unwrap();
        restriction
            .correct(&previous, &mut candidate, &[100.0], &[false], &sampler)
            .unwrap();
        assert_eq!(candidate.point(0).lon, 0.9);
    }
}
