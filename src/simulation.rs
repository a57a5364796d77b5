use crate::error::{TransportError, TransportResult};
use crate::field::CurrentField;
use crate::particle_state::{ParticleState, PositionSnapshot};
use crate::sampler::{CellLookup, FieldSampler, VelocitySample};
use crate::sedimentation::{build_sedimentation_params, SedimentationParams, SettlingConfig};
use crate::spatial_index::GridIndices;
use crate::stopping::{StopEvaluator, StopReport, StopTimes};
use crate::trajectory::{Trajectory, TrajectoryStore};
use crate::uphill::{SlopeRestriction, UphillReport};
use log::{debug, info, trace};
use rayon::prelude::*;
use std::slice::ChunksExact;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use transport_common::{GeoPoint, RunParams, RunSummary};

/// Where the time-stepping loop is, or how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    /// Every particle stopped before the horizon.
    AllStopped,
    /// The configured number of slots was written.
    HorizonReached,
    /// The caller's cancel flag was seen between two steps.
    Cancelled,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::AllStopped => "all_stopped",
            RunState::HorizonReached => "horizon_reached",
            RunState::Cancelled => "cancelled",
        }
    }
}

/// Everything a finished run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub trajectory: Trajectory,
    pub final_positions: PositionSnapshot,
    /// Positions one slot before the final ones.
    pub previous_positions: PositionSnapshot,
    pub stop_times: Vec<u32>,
    /// Slots written, the initial positions included.
    pub executed_steps: u32,
    pub state: RunState,
}

impl RunOutput {
    /// Nearest full-grid cells, one list per executed slot.
    pub fn full_cells(&self) -> ChunksExact<'_, usize> {
        self.trajectory.full_cells()
    }

    /// Nearest horizontal cells, one list per executed slot.
    pub fn horizontal_cells(&self) -> ChunksExact<'_, usize> {
        self.trajectory.horizontal_cells()
    }

    pub fn stopped_count(&self) -> usize {
        self.stop_times.iter().filter(|&&s| s != 0).count()
    }

    /// Serializable summary of the run.
    pub fn summary(&self, params: &RunParams, include_positions: bool) -> RunSummary {
        RunSummary {
            executed_steps: self.executed_steps,
            horizon: params.horizon,
            termination: self.state.as_str().to_string(),
            simulated_seconds: self.executed_steps.saturating_sub(1) as f64 * params.step_seconds,
            stop_times: self.stop_times.clone(),
            stopped_count: self.stopped_count(),
            final_positions: include_positions.then(|| self.final_positions.points()),
        }
    }
}

/// What one step produced.
struct StepOutcome {
    positions: PositionSnapshot,
    cells: CellLookup,
    uphill: UphillReport,
    stops: StopReport,
}

/// Advects particle sets through one current field.
///
/// The field, its spatial indices and the sedimentation parameters are
/// shared read-only by every run, so one engine can serve many batches.
pub struct TransportEngine {
    field: Arc<CurrentField>,
    params: RunParams,
    indices: GridIndices,
    sedimentation: Option<SedimentationParams>,
    restriction: Option<SlopeRestriction>,
}

impl TransportEngine {
    /// Validates `params`, then builds the spatial indices and, when
    /// sedimentation is enabled, its parameters.
    pub fn new(field: Arc<CurrentField>, params: RunParams) -> TransportResult<Self> {
        Self::from_parts(field, params, None, None)
    }

    /// Like `new`, reusing indices and/or sedimentation parameters computed
    /// earlier for the same field.
    pub fn from_parts(
        field: Arc<CurrentField>,
        params: RunParams,
        indices: Option<GridIndices>,
        sedimentation: Option<SedimentationParams>,
    ) -> TransportResult<Self> {
        validate_params(&params, &field)?;

        let indices = match indices {
            Some(indices) => {
                indices.check_matches(field.len())?;
                indices
            }
            None => GridIndices::build(&field)?,
        };

        let sedimentation = match (params.sedimentation, sedimentation) {
            (false, _) => None,
            (true, Some(provided)) => Some(provided),
            (true, None) => {
                let settling = SettlingConfig {
                    bottom_layer_m: params.bottom_layer_m,
                    flocculation_exponent: params.flocculation_exponent,
                };
                Some(build_sedimentation_params(
                    params.sink_speed,
                    params.step_seconds,
                    params.particle_radius,
                    &settling,
                )?)
            }
        };

        let restriction = params
            .slope_threshold_m
            .map(|threshold| SlopeRestriction::new(threshold, params.correction_mode))
            .transpose()?;

        Ok(Self {
            field,
            params,
            indices,
            sedimentation,
            restriction,
        })
    }

    pub fn params(&self) -> &RunParams {
        &self.params
    }

    pub fn field(&self) -> &CurrentField {
        &self.field
    }

    /// The spatial indices, cheap to clone for reuse by another engine.
    pub fn indices(&self) -> &GridIndices {
        &self.indices
    }

    pub fn sedimentation(&self) -> Option<&SedimentationParams> {
        self.sedimentation.as_ref()
    }

    /// Runs the particles to the horizon or until all of them stopped.
    pub fn run(&self, particles: &[GeoPoint]) -> TransportResult<RunOutput> {
        self.run_with_cancel(particles, &AtomicBool::new(false))
    }

    /// Like `run`, but checks `cancel` between steps. A cancelled run still
    /// returns every slot written so far.
    pub fn run_with_cancel(&self, particles: &[GeoPoint], cancel: &AtomicBool) -> TransportResult<RunOutput> {
        let initial = PositionSnapshot::from_points(particles)?;
        let num_particles = initial.len();
        let horizon = self.params.horizon;

        let mut store = TrajectoryStore::with_horizon(num_particles, horizon, self.params.max_trajectory_bytes)?;
        let sampler = FieldSampler::new(&self.field, &self.indices);
        let evaluator = StopEvaluator::new(
            &self.field,
            self.sedimentation.as_ref(),
            self.params.sed_at_max_speed,
            self.params.seed,
        );
        let mut stops = StopTimes::new(num_particles);

        // --- Slot 1: initial positions ---
        let mut state = ParticleState::new(initial);
        let mut cells = sampler.locate(&state.current)?;
        store.push(&state.current, &cells.full, &cells.horizontal)?;

        info!(
            "Starting transport loop: {} particles, {} cells, up to {} steps of {:.0} s.",
            num_particles,
            self.field.len(),
            horizon,
            self.params.step_seconds
        );
        let start_time = Instant::now();

        let mut run_state = RunState::Running;
        let mut step: u32 = 1;
        while run_state == RunState::Running {
            if step >= horizon {
                run_state = RunState::HorizonReached;
                break;
            }
            if cancel.load(Ordering::Relaxed) {
                run_state = RunState::Cancelled;
                break;
            }
            step += 1;

            let step_start_time = Instant::now();
            let outcome = self.advance(step, &state.current, &cells, &sampler, &evaluator, &mut stops)?;
            store.push(&outcome.positions, &outcome.cells.full, &outcome.cells.horizontal)?;
            state.advance(outcome.positions);
            cells = outcome.cells;

            if outcome.stops != StopReport::default() || outcome.uphill != UphillReport::default() {
                debug!(
                    "Step {}: {} left the domain, {} settled, {} uphill moves suppressed, {} damped.",
                    step, outcome.stops.boundary, outcome.stops.settled, outcome.uphill.suppressed, outcome.uphill.damped
                );
            }
            trace!(
                "Step [{}/{}] completed in {:.2} ms",
                step,
                horizon,
                step_start_time.elapsed().as_secs_f64() * 1000.0
            );

            if stops.all_stopped() {
                run_state = RunState::AllStopped;
            }
        }

        let executed_steps = store.len() as u32;
        if self.params.force_final_settling {
            let forced = stops.force_final(executed_steps);
            if forced > 0 {
                debug!("Forced {} remaining particles to settle at step {}.", forced, executed_steps);
            }
        }

        info!(
            "Transport loop ended ({}) after {} of {} steps in {:.3} s; {} of {} particles stopped.",
            run_state.as_str(),
            executed_steps,
            horizon,
            start_time.elapsed().as_secs_f64(),
            stops.stopped_count(),
            num_particles
        );

        let (previous_positions, final_positions) = state.into_parts();
        Ok(RunOutput {
            trajectory: store.finish(),
            final_positions,
            previous_positions,
            stop_times: stops.into_vec(),
            executed_steps,
            state: run_state,
        })
    }

    /// One step: sample, integrate, restrict, then decide stops.
    fn advance(
        &self,
        step: u32,
        previous: &PositionSnapshot,
        previous_cells: &CellLookup,
        sampler: &FieldSampler<'_>,
        evaluator: &StopEvaluator<'_>,
        stops: &mut StopTimes,
    ) -> TransportResult<StepOutcome> {
        // --- 1. Sample the field under every particle ---
        let sample = sampler.sample(&previous_cells.horizontal);
        let active = stops.active_mask();

        // --- 2. Integrate ---
        let mut candidate = integrate(previous, &sample, &active, self.params.step_seconds);
        if let Some(row) = (0..candidate.len()).find(|&idx| !candidate.point(idx).is_finite()) {
            return Err(TransportError::NonFinite { what: "advected positions", row });
        }

        // --- 3. Uphill restriction ---
        let uphill = match &self.restriction {
            Some(restriction) => restriction.correct(previous, &mut candidate, &sample.depth, &active, sampler)?,
            None => UphillReport::default(),
        };

        // --- 4. Stops, on the corrected positions ---
        let cells = sampler.locate(&candidate)?;
        let stop_report = evaluator.evaluate(step, &candidate, &cells.horizontal, stops)?;

        Ok(StepOutcome {
            positions: candidate,
            cells,
            uphill,
            stops: stop_report,
        })
    }
}

/// Moves every active particle by its sampled current for `dt` seconds.
/// Stopped particles keep their previous position.
pub fn integrate(previous: &PositionSnapshot, sample: &VelocitySample, active: &[bool], dt: f64) -> PositionSnapshot {
    let mut next = previous.clone();
    next.lon
        .par_iter_mut()
        .zip(next.lat.par_iter_mut())
        .enumerate()
        .for_each(|(idx, (lon_out, lat_out))| {
            if !active[idx] {
                return;
            }
            let moved = previous.point(idx).advect(sample.u[idx], sample.v[idx], dt);
            *lon_out = moved.lon;
            *lat_out = moved.lat;
        });
    next
}

fn validate_params(params: &RunParams, field: &CurrentField) -> TransportResult<()> {
    if params.horizon == 0 {
        return Err(TransportError::config("step count must be greater than 0"));
    }
    if !(params.step_seconds > 0.0) || !params.step_seconds.is_finite() {
        return Err(TransportError::config("step duration must be positive"));
    }
    if !(params.particle_radius > 0.0) {
        return Err(TransportError::config("particle radius must be positive"));
    }
    if !params.sink_speed.is_finite() {
        return Err(TransportError::config("sinking speed must be finite"));
    }
    if params.sedimentation && params.sed_at_max_speed && field.max_speed.is_none() {
        return Err(TransportError::config(
            "sedimentation at max speed requested but the field has no max_speed column",
        ));
    }
    Ok(())
}
