use serde::{Deserialize, Serialize};
use crate::geo::GeoPoint;

/// A compact record of one finished transport run.
#[derive(Debug, Clone, Serialize, Deserialize)] // Derive traits for easy saving/loading
pub struct RunSummary {
    /// Number of trajectory slots actually written, initial positions included.
    pub executed_steps: u32,
    /// The configured horizon the run was allowed to reach.
    pub horizon: u32,
    /// How the loop ended: "all_stopped", "horizon_reached" or "cancelled".
    pub termination: String,
    /// Simulated time covered by the executed steps, in seconds.
    pub simulated_seconds: f64,
    /// Per-particle stop step; 0 while the particle is still moving.
    pub stop_times: Vec<u32>,
    pub stopped_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "final_positions": null
    pub final_positions: Option<Vec<GeoPoint>>,
}

impl RunSummary {
    /// Fraction of particles that stopped during the run.
    pub fn stopped_fraction(&self) -> f64 {
        if self.stop_times.is_empty() {
            0.0
        } else {
            self.stopped_count as f64 / self.stop_times.len() as f64
        }
    }
}
