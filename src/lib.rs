//! Particle advection through a gridded ocean-current field.
//!
//! Particles are moved with the current of their nearest grid cell, kept off
//! steep upslopes, and stopped when they leave the grid or settle out.

pub mod error;
pub mod field;
pub mod input;
pub mod particle_state;
pub mod sampler;
pub mod sedimentation;
pub mod simulation;
pub mod spatial_index;
pub mod stopping;
pub mod trajectory;
pub mod uphill;

pub use error::{TransportError, TransportResult};
pub use field::CurrentField;
pub use particle_state::{ParticleState, PositionSnapshot};
pub use sampler::{CellLookup, FieldSampler, VelocitySample};
pub use sedimentation::{
    build_sedimentation_params, critical_velocity_sq, DepositionModel, SedimentationParams, SettlingConfig,
    SettlingModel,
};
pub use simulation::{integrate, RunOutput, RunState, TransportEngine};
pub use spatial_index::{GridIndices, NearestCell};
pub use stopping::{StopEvaluator, StopReport, StopTimes};
pub use trajectory::{estimated_bytes, Trajectory, TrajectoryStore};
pub use uphill::{SlopeRestriction, UphillReport, MAX_UPHILL_TESTS};

pub use transport_common::{CorrectionMode, GeoExtent, GeoPoint, RunParams, RunSummary};
