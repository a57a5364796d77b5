pub mod config;
pub mod geo;
pub mod run_params;
pub mod summary;

// Re-export key types for easier use by dependent crates
pub use config::{TransportConfig, TimingConfig, ParticleConfig, SedimentationConfig, UphillConfig, RunConfig, InputConfig, OutputConfig};
pub use geo::{GeoExtent, GeoPoint, METERS_PER_DEGREE};
pub use run_params::{CorrectionMode, RunParams};
pub use summary::RunSummary;
