//! Error types for trust scoring operations.

use thiserror::Error;

/// Errors that can occur during trust scoring operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReputationError {
    /// A peer rating score outside `[0.0, 1.0]`.
    #[error("Invalid rating score {0}: must be between 0.0 and 1.0")]
    InvalidScore(f64),

    /// A memory capacity that is negative or not a number.
    #[error("Invalid memory capacity {0} GB")]
    InvalidMemory(f64),

    /// The trust evaluator could not produce a result.
    #[error("Trust evaluator unavailable: {0}")]
    EvaluatorUnavailable(String),
}

/// Result type for trust scoring operations.
pub type Result<T> = std::result::Result<T, ReputationError>;
