//! Sedimentation constants and the settling-count model.
//!
//! The stopping evaluator only needs two things from here: the critical
//! velocity squared below which deposition can happen, and a function that
//! turns a velocity deficit and a cell's occupant count into an expected
//! number of particles settling during one step.

use crate::error::{TransportError, TransportResult};
use std::fmt;
use std::sync::Arc;

/// Acceleration due to gravity (m/s^2).
pub const GRAVITY: f64 = 9.81;
/// Critical Shields parameter for incipient motion.
pub const CRITICAL_SHIELDS: f64 = 0.05;
/// Particle to seawater density ratio (quartz).
pub const RELATIVE_DENSITY: f64 = 2.65;
/// Quadratic bottom drag coefficient.
pub const DRAG_COEFFICIENT: f64 = 0.0025;

/// Expected number of particles settling out of a cell in one step.
pub trait SettlingModel: Send + Sync {
    /// `u_div` is the normalized velocity deficit in `[0, 1]`;
    /// `occupants` is the number of moving particles in the cell.
    fn settling_count(&self, u_div: f64, occupants: usize) -> f64;
}

impl<F> SettlingModel for F
where
    F: Fn(f64, usize) -> f64 + Send + Sync,
{
    fn settling_count(&self, u_div: f64, occupants: usize) -> f64 {
        self(u_div, occupants)
    }
}

/// Immutable per-run sedimentation parameters.
#[derive(Clone)]
pub struct SedimentationParams {
    pub critical_velocity_sq: f64,
    pub settling: Arc<dyn SettlingModel>,
}

impl fmt::Debug for SedimentationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SedimentationParams")
            .field("critical_velocity_sq", &self.critical_velocity_sq)
            .finish_non_exhaustive()
    }
}

impl SedimentationParams {
    pub fn new(critical_velocity_sq: f64, settling: Arc<dyn SettlingModel>) -> TransportResult<Self> {
        if !(critical_velocity_sq > 0.0) || !critical_velocity_sq.is_finite() {
            return Err(TransportError::config("critical velocity squared must be positive and finite"));
        }
        Ok(Self { critical_velocity_sq, settling })
    }

    /// `max(0, 1 - speed^2 / critical^2)`: zero at or above the critical speed.
    #[inline(always)]
    pub fn velocity_deficit(&self, speed: f64) -> f64 {
        (1.0 - speed * speed / self.critical_velocity_sq).max(0.0)
    }

    /// Probability that any one of `occupants` particles settles this step.
    /// `None` for an empty cell, which has no per-particle probability.
    pub fn stop_probability(&self, u_div: f64, occupants: usize) -> Option<f64> {
        if occupants == 0 {
            return None;
        }
        let expected = self.settling.settling_count(u_div, occupants);
        let p = expected / occupants as f64;
        Some(if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 })
    }
}

/// Tunables of the default deposition model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlingConfig {
    /// Height of the near-bed layer particles settle out of (m).
    pub bottom_layer_m: f64,
    /// Exponent of the crowding enhancement; 0 disables it.
    pub flocculation_exponent: f64,
}

impl Default for SettlingConfig {
    fn default() -> Self {
        Self {
            bottom_layer_m: 10.0,
            flocculation_exponent: 0.0,
        }
    }
}

/// Krone-style deposition: the fraction of a cell's particles that settle in
/// one step is `1 - exp(-|w| n^m dt U_div / h)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepositionModel {
    pub sink_speed: f64,
    pub step_seconds: f64,
    pub bottom_layer_m: f64,
    pub flocculation_exponent: f64,
}

impl SettlingModel for DepositionModel {
    fn settling_count(&self, u_div: f64, occupants: usize) -> f64 {
        if occupants == 0 {
            return 0.0;
        }
        let n = occupants as f64;
        let crowding = n.powf(self.flocculation_exponent);
        let rate = self.sink_speed.abs() * crowding * self.step_seconds * u_div.max(0.0) / self.bottom_layer_m;
        n * (1.0 - (-rate).exp())
    }
}

/// Critical depth-averaged velocity squared for a grain of the given radius (m).
pub fn critical_velocity_sq(particle_radius: f64) -> f64 {
    let diameter = 2.0 * particle_radius;
    CRITICAL_SHIELDS * (RELATIVE_DENSITY - 1.0) * GRAVITY * diameter / DRAG_COEFFICIENT
}

/// Derives the sedimentation parameters for one run.
///
/// `sink_speed` is in m/s (sign ignored), `step_seconds` in s, `particle_radius` in m.
pub fn build_sedimentation_params(
    sink_speed: f64,
    step_seconds: f64,
    particle_radius: f64,
    settling: &SettlingConfig,
) -> TransportResult<SedimentationParams> {
    if !(step_seconds > 0.0) {
        return Err(TransportError::config("step duration must be positive"));
    }
    if !(particle_radius > 0.0) {
        return Err(TransportError::config("particle radius must be positive"));
    }
    if !(settling.bottom_layer_m > 0.0) {
        return Err(TransportError::config("bottom layer height must be positive"));
    }
    if !(settling.flocculation_exponent >= 0.0) {
        return Err(TransportError::config("flocculation exponent must not be negative"));
    }
    if sink_speed == 0.0 {
        log::warn!("Sedimentation enabled with zero sinking speed; no particle will settle.");
    }

    let model = DepositionModel {
        sink_speed,
        step_seconds,
        bottom_layer_m: settling.bottom_layer_m,
        flocculation_exponent: settling.flocculation_exponent,
    };
    SedimentationParams::new(critical_velocity_sq(particle_radius), Arc::new(model))
}
