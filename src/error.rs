//! Error types for the transport engine.
//!
//! Every error is fatal to the run it occurs in; nothing here is retried.

use thiserror::Error;

/// Result alias used across the engine.
pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    /// A run parameter is out of range; raised before the loop starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Columns that must line up have different lengths.
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} is empty")]
    EmptyInput(&'static str),

    #[error("non-finite value in {what} at row {row}")]
    NonFinite { what: &'static str, row: usize },

    /// The trajectory would not fit in memory (or in the configured cap).
    #[error("trajectory needs {requested_bytes} bytes, more than can be allocated (limit {limit_bytes:?})")]
    ResourceExhausted {
        requested_bytes: u64,
        limit_bytes: Option<u64>,
    },

    /// A sedimentation cell was evaluated with no occupants.
    #[error("sedimentation cell {cell} has no occupants")]
    EmptyCell { cell: usize },

    #[error("spatial index query failed: {0}")]
    IndexQuery(String),

    #[error("random sampling setup failed: {0}")]
    Sampling(#[from] rand::distr::uniform::Error),
}

impl TransportError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        TransportError::InvalidConfig(message.into())
    }

    pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> TransportResult<()> {
        if expected == actual {
            Ok(())
        } else {
            Err(TransportError::ShapeMismatch { what, expected, actual })
        }
    }
}
