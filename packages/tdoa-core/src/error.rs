//! Error types for the positioning core.

use thiserror::Error;

/// A station report rejected at the aggregator boundary, or a completed group
/// the estimator refuses to solve.
///
/// Rejection never touches the in-progress group for the report's id.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidMeasurement {
    #[error("measurement id is empty")]
    EmptyId,

    #[error("unknown source '{source_id}' for measurement {id}")]
    UnknownSource { id: String, source_id: String },

    #[error("non-finite receivedAt ({received_at}) from {source_id} for measurement {id}")]
    NonFiniteTimestamp { id: String, source_id: String, received_at: f64 },

    /// Wire payload could not be decoded into a report at all
    #[error("malformed measurement: {0}")]
    Malformed(String),

    /// Group was collected under a different station order than the estimator's
    #[error("measurement {id} was grouped as {got:?}, estimator expects {expected:?}")]
    LayoutMismatch { id: String, expected: Vec<String>, got: Vec<String> },
}

/// Invalid estimator configuration. Fatal to the estimator being built.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("propagation speed must be finite and non-zero, got {0}")]
    InvalidPropagationSpeed(f64),

    #[error("timestamp scale must be finite and non-zero, got {0}")]
    InvalidTimestampScale(f64),

    #[error("at least {required} stations are required, got {available}")]
    InsufficientStations { available: usize, required: usize },

    #[error("duplicate station id '{0}'")]
    DuplicateStation(String),

    #[error("station '{0}' has a non-finite coordinate")]
    NonFiniteStation(String),

    #[error("invalid solver parameter {name}: {value}")]
    InvalidSolverParameter { name: &'static str, value: f64 },

    #[error("initial guess must be finite")]
    NonFiniteInitialGuess,
}
