use crate::error::{TransportError, TransportResult};
use crate::field::CurrentField;
use crate::particle_state::PositionSnapshot;
use crate::sedimentation::SedimentationParams;
use rand::distr::Uniform;
use rand::prelude::*;
use rayon::prelude::*;
use std::collections::HashMap;
use transport_common::GeoExtent;

/// Per-particle stop step; 0 while the particle is still moving.
///
/// Entries are set at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTimes {
    steps: Vec<u32>,
}

impl StopTimes {
    pub fn new(num_particles: usize) -> Self {
        Self { steps: vec![0; num_particles] }
    }

    /// Records `step` for `idx` unless it already stopped. Returns whether it was newly set.
    #[inline(always)]
    pub fn mark(&mut self, idx: usize, step: u32) -> bool {
        debug_assert!(step > 0, "stop step 0 is reserved for moving particles");
        if self.steps[idx] == 0 {
            self.steps[idx] = step;
            true
        } else {
            false
        }
    }

    #[inline(always)]
    pub fn is_stopped(&self, idx: usize) -> bool {
        self.steps[idx] != 0
    }

    pub fn get(&self, idx: usize) -> u32 {
        self.steps[idx]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn stopped_count(&self) -> usize {
        self.steps.iter().filter(|&&s| s != 0).count()
    }

    pub fn all_stopped(&self) -> bool {
        self.steps.iter().all(|&s| s != 0)
    }

    /// `true` for every particle that is still moving.
    pub fn active_mask(&self) -> Vec<bool> {
        self.steps.iter().map(|&s| s == 0).collect()
    }

    /// Stops every remaining particle at `step`. Returns how many were forced.
    pub fn force_final(&mut self, step: u32) -> usize {
        let mut forced = 0;
        for s in self.steps.iter_mut().filter(|s| **s == 0) {
            *s = step;
            forced += 1;
        }
        forced
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.steps
    }

    pub fn into_vec(self) -> Vec<u32> {
        self.steps
    }
}

/// Counts of what stopped particles during one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopReport {
    pub boundary: usize,
    pub settled: usize,
    pub occupied_cells: usize,
}

/// Occupancy and settling odds of one grid cell for the current step.
#[derive(Debug, Clone, Copy)]
struct CellStats {
    occupants: usize,
    probability: f64,
}

/// Decides which particles stop at each step.
pub struct StopEvaluator<'a> {
    field: &'a CurrentField,
    extent: GeoExtent,
    sedimentation: Option<&'a SedimentationParams>,
    at_max_speed: bool,
    seed: u64,
}

impl<'a> StopEvaluator<'a> {
    pub fn new(
        field: &'a CurrentField,
        sedimentation: Option<&'a SedimentationParams>,
        at_max_speed: bool,
        seed: u64,
    ) -> Self {
        Self {
            field,
            extent: field.extent(),
            sedimentation,
            at_max_speed,
            seed,
        }
    }

    /// Applies the boundary rule and then, if enabled, the sedimentation rule.
    ///
    /// `cells` holds the nearest horizontal cell of every candidate position.
    pub fn evaluate(
        &self,
        step: u32,
        candidate: &PositionSnapshot,
        cells: &[usize],
        stops: &mut StopTimes,
    ) -> TransportResult<StopReport> {
        let n = candidate.len();
        TransportError::check_len("stop cells", n, cells.len())?;
        TransportError::check_len("stop times", n, stops.len())?;

        let mut report = StopReport::default();

        // --- 1. Boundary exit ---
        for idx in 0..n {
            if !stops.is_stopped(idx) && !self.extent.contains(candidate.lon[idx], candidate.lat[idx]) {
                stops.mark(idx, step);
                report.boundary += 1;
            }
        }

        // --- 2. Sedimentation ---
        if let Some(params) = self.sedimentation {
            let cell_stats = self.cell_stats(params, cells, stops)?;
            report.occupied_cells = cell_stats.len();

            let settling = self.draw_settling(step, cells, stops, &cell_stats)?;
            for idx in settling {
                if stops.mark(idx, step) {
                    report.settled += 1;
                }
            }
        }

        Ok(report)
    }

    /// Groups moving particles by cell and derives each cell's stop probability.
    /// All counts are complete before any particle's draw is made.
    fn cell_stats(
        &self,
        params: &SedimentationParams,
        cells: &[usize],
        stops: &StopTimes,
    ) -> TransportResult<HashMap<usize, CellStats>> {
        let mut occupants: HashMap<usize, usize> = HashMap::new();
        for (idx, &cell) in cells.iter().enumerate() {
            if !stops.is_stopped(idx) {
                *occupants.entry(cell).or_insert(0) += 1;
            }
        }

        occupants
            .into_iter()
            .map(|(cell, count)| -> TransportResult<(usize, CellStats)> {
                let speed = self.field.sedimentation_speed(cell, self.at_max_speed);
                let u_div = params.velocity_deficit(speed);
                let probability = params
                    .stop_probability(u_div, count)
                    .ok_or(TransportError::EmptyCell { cell })?;
                Ok((cell, CellStats { occupants: count, probability }))
            })
            .collect()
    }

    /// One uniform draw per moving particle. Each draw has its own RNG seeded
    /// from the run seed, particle and step, so results do not depend on threads.
    fn draw_settling(
        &self,
        step: u32,
        cells: &[usize],
        stops: &StopTimes,
        cell_stats: &HashMap<usize, CellStats>,
    ) -> TransportResult<Vec<usize>> {
        let unit_dist = Uniform::new(0.0f64, 1.0f64)?;
        let seed = self.seed;

        let settled = (0..cells.len())
            .into_par_iter()
            .filter(|&idx| !stops.is_stopped(idx))
            .filter_map(|idx| {
                let stats = cell_stats.get(&cells[idx])?;
                if stats.probability <= 0.0 {
                    return None;
                }
                let particle_seed = seed
                    .wrapping_add((idx as u64).wrapping_mul(0x1F3A))
                    .wrapping_add((step as u64).wrapping_mul(0x58C7));
                let mut rng = StdRng::seed_from_u64(particle_seed);
                (rng.sample(unit_dist) < stats.probability).then_some(idx)
            })
            .collect::<Vec<usize>>();

        if !settled.is_empty() {
            log::trace!(
                "Step {}: {} particles settled across {} occupied cells (max occupancy {}).",
                step,
                settled.len(),
                cell_stats.len(),
                cell_stats.values().map(|s| s.occupants).max().unwrap_or(0)
            );
        }
        Ok(settled)
    }
}
