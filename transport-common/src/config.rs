use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::run_params::{horizon_for, sink_speed_from_rate, CorrectionMode, RunParams, DEFAULT_STEP_SECONDS};
use std::path::Path;

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub duration_days: f64,
    #[serde(default = "default_step_seconds")]
    pub step_seconds: f64,
    /// Overrides the horizon derived from `duration_days`.
    #[serde(default)]
    pub step_count: Option<u32>,
}

// Physical particle properties
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ParticleConfig {
    #[serde(default)]
    pub sinking_rate_m_per_day: f64,
    #[serde(default = "default_radius")]
    pub radius_m: f64,
}

// Stochastic sedimentation settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SedimentationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Use the precomputed per-cell maximum current speed instead of the local speed.
    #[serde(default)]
    pub at_max_speed: bool,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_bottom_layer")]
    pub bottom_layer_m: f64,
    #[serde(default)]
    pub flocculation_exponent: f64,
}

// Seabed slope restriction settings
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct UphillConfig {
    #[serde(default)]
    pub threshold_m: Option<f64>,
    #[serde(default)]
    pub mode: CorrectionMode,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub force_final_settling: bool,
    /// Refuse runs whose trajectory would exceed this many mebibytes.
    #[serde(default)]
    pub max_trajectory_mb: Option<u64>,
}

// Input files read by the driver
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InputConfig {
    pub field_csv: String,
    pub particles_csv: String,
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    #[serde(default = "default_true")]
    pub save_summary: bool,
    #[serde(default)]
    pub save_final_positions: bool,
}

// Main transport configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TransportConfig {
    pub timing: TimingConfig,
    #[serde(default)]
    pub particles: ParticleConfig,
    #[serde(default)]
    pub sedimentation: SedimentationConfig,
    #[serde(default)]
    pub uphill: UphillConfig,
    #[serde(default)]
    pub run: RunConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        ParticleConfig {
            sinking_rate_m_per_day: 0.0,
            radius_m: default_radius(),
        }
    }
}

impl Default for SedimentationConfig {
    fn default() -> Self {
        SedimentationConfig {
            enabled: false,
            at_max_speed: false,
            seed: 0,
            bottom_layer_m: default_bottom_layer(),
            flocculation_exponent: 0.0,
        }
    }
}

impl TransportConfig {
    /// Loads the transport configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;

        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TransportConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the run meaningless before anything is allocated.
    pub fn validate(&self) -> Result<()> {
        if !(self.timing.step_seconds > 0.0) {
            anyhow::bail!("step_seconds must be positive.");
        }
        match self.timing.step_count {
            Some(0) => anyhow::bail!("step_count must be greater than 0."),
            Some(_) => {}
            None => {
                if !(self.timing.duration_days > 0.0) {
                    anyhow::bail!("duration_days must be positive.");
                }
                if horizon_for(self.timing.duration_days, self.timing.step_seconds) == 0 {
                    anyhow::bail!("duration_days is shorter than a single step.");
                }
            }
        }
        if !(self.particles.radius_m > 0.0) {
            anyhow::bail!("radius_m must be positive.");
        }
        if self.particles.sinking_rate_m_per_day < 0.0 {
            anyhow::bail!("sinking_rate_m_per_day must not be negative.");
        }
        if !(self.sedimentation.bottom_layer_m > 0.0) {
            anyhow::bail!("bottom_layer_m must be positive.");
        }
        if self.sedimentation.flocculation_exponent < 0.0 {
            anyhow::bail!("flocculation_exponent must not be negative.");
        }
        if let Some(threshold) = self.uphill.threshold_m {
            if !(threshold >= 0.0) {
                anyhow::bail!("uphill threshold_m must not be negative.");
            }
        }
        Ok(())
    }

    /// Converts the configuration into the parameters used at runtime.
    pub fn get_run_params(&self) -> RunParams {
        let step_seconds = self.timing.step_seconds;
        let horizon = self
            .timing
            .step_count
            .unwrap_or_else(|| horizon_for(self.timing.duration_days, step_seconds));

        RunParams {
            // Time
            step_seconds,
            horizon,
            // Particle properties
            sink_speed: sink_speed_from_rate(self.particles.sinking_rate_m_per_day),
            particle_radius: self.particles.radius_m,
            // Sedimentation
            sedimentation: self.sedimentation.enabled,
            sed_at_max_speed: self.sedimentation.at_max_speed,
            seed: self.sedimentation.seed,
            bottom_layer_m: self.sedimentation.bottom_layer_m,
            flocculation_exponent: self.sedimentation.flocculation_exponent,
            // Uphill restriction
            slope_threshold_m: self.uphill.threshold_m,
            correction_mode: self.uphill.mode,
            // Stopping
            force_final_settling: self.run.force_final_settling,
            max_trajectory_bytes: self.run.max_trajectory_mb.map(|mb| mb.saturating_mul(1 << 20)),
        }
    }
}

fn default_step_seconds() -> f64 {
    DEFAULT_STEP_SECONDS
}

fn default_radius() -> f64 {
    1e-4 // Fine sand
}

fn default_bottom_layer() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}
