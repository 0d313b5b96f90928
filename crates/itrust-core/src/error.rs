//! Error types for the trust engine.

use itrust_reputation::ReputationError;
use thiserror::Error;

use crate::config::ConfigError;

/// A request the engine understood but refuses to carry out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    /// A new device's starting trust is too low.
    #[error("Initial trust {trust:.3} is below the threshold {threshold:.3}")]
    LowInitialTrust {
        /// Trust the device would have started with.
        trust: f64,
        /// Minimum starting trust.
        threshold: f64,
    },

    /// The device was blacklisted in the past.
    #[error("Device {0} has a history of being blacklisted")]
    PreviouslyBlacklisted(String),

    /// The device is blacklisted; only manual review can change that.
    #[error("Device {0} is blacklisted and requires manual review")]
    Blacklisted(String),

    /// Registration of a device that is already active.
    #[error("Device {0} is already active")]
    AlreadyActive(String),

    /// The device has left the network.
    #[error("Device {0} is not active")]
    Inactive(String),

    /// A connection touches a blacklisted device.
    #[error("Connection blocked: device {0} is blacklisted")]
    BlacklistedParticipant(String),

    /// A rating targets a blacklisted device.
    #[error("Cannot rate blacklisted device {0}")]
    BlacklistedTarget(String),

    /// A device tried to connect to or rate itself.
    #[error("Device {0} cannot interact with itself")]
    SelfInteraction(String),
}

/// Errors that can occur in the trust engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// No device with this id.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The request was refused.
    #[error("Rejected: {0}")]
    Rejected(#[from] Rejection),

    /// Invalid scoring input.
    #[error("Reputation error: {0}")]
    Reputation(#[from] ReputationError),

    /// The trust evaluator could not be reached.
    #[error("Trust evaluator unavailable: {0}")]
    EvaluatorUnavailable(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network state broke one of its invariants.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),
}

impl CoreError {
    /// The rejection, if this error is one.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            CoreError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Whether this is a lookup failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::DeviceNotFound(_))
    }
}

/// Result type for trust engine operations.
pub type Result<T> = std::result::Result<T, CoreError>;
