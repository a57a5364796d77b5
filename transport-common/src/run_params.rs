use serde::{Deserialize, Serialize};

/// Seconds in one day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;
/// Default step length: half an hour.
pub const DEFAULT_STEP_SECONDS: f64 = 1800.0;

/// How an uphill move is suppressed.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMode {
    /// Uphill particles stay where they were.
    #[default]
    Hard,
    /// Uphill particles retreat towards their previous position by halves, then stay.
    MeanMove,
}

/// Runtime parameters derived from the configuration, used throughout a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    // Time
    pub step_seconds: f64, // Per-step duration (s)
    pub horizon: u32,      // Trajectory slots including the initial positions

    // Particle properties
    pub sink_speed: f64,      // m/s, negative-down
    pub particle_radius: f64, // m

    // Sedimentation
    pub sedimentation: bool,
    pub sed_at_max_speed: bool,
    pub seed: u64,
    pub bottom_layer_m: f64,
    pub flocculation_exponent: f64,

    // Uphill restriction
    pub slope_threshold_m: Option<f64>,
    pub correction_mode: CorrectionMode,

    // Stopping
    pub force_final_settling: bool,
    pub max_trajectory_bytes: Option<u64>,
}

impl RunParams {
    /// Parameters for a run of `duration_days` with the default half-hour step.
    pub fn for_days(duration_days: f64) -> Self {
        RunParams {
            step_seconds: DEFAULT_STEP_SECONDS,
            horizon: horizon_for(duration_days, DEFAULT_STEP_SECONDS),
            ..RunParams::default()
        }
    }
}

impl Default for RunParams {
    fn default() -> Self {
        RunParams {
            step_seconds: DEFAULT_STEP_SECONDS,
            horizon: horizon_for(1.0, DEFAULT_STEP_SECONDS),
            sink_speed: 0.0,
            particle_radius: 1e-4,
            sedimentation: false,
            sed_at_max_speed: false,
            seed: 0,
            bottom_layer_m: 10.0,
            flocculation_exponent: 0.0,
            slope_threshold_m: None,
            correction_mode: CorrectionMode::Hard,
            force_final_settling: false,
            max_trajectory_bytes: None,
        }
    }
}

/// Converts a duration in days to a number of steps of `step_seconds`.
/// One day at the default step gives 48.
pub fn horizon_for(duration_days: f64, step_seconds: f64) -> u32 {
    if step_seconds <= 0.0 || !duration_days.is_finite() {
        return 0;
    }
    (duration_days * SECONDS_PER_DAY / step_seconds).round().max(0.0) as u32
}

/// Converts a sinking rate in meters/day to a vertical speed in m/s, negative-down.
pub fn sink_speed_from_rate(meters_per_day: f64) -> f64 {
    -meters_per_day / SECONDS_PER_DAY
}
