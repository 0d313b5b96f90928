//! The seam between the stateful engine and the trust arithmetic.
//!
//! The engine never computes trust itself; it asks a [`TrustEvaluator`].
//! [`LocalEvaluator`] runs the formulas in-process. Other implementations may
//! call out to a remote scoring service and return
//! [`ReputationError::EvaluatorUnavailable`] when it cannot be reached.
//!
//! [`ReputationError::EvaluatorUnavailable`]: crate::ReputationError::EvaluatorUnavailable

use crate::error::Result;
use crate::flooding::{evaluate_flooding, FloodAssessment, FloodingConfig};
use crate::fusion::{fuse_trust, FusionConfig, TrustOutcome, TrustRequest};
use crate::initial::calculate_initial_trust;
use crate::weights::{DeviceType, OwnershipType};

/// Computes trust values on behalf of the engine.
pub trait TrustEvaluator: Send + Sync {
    /// Hardware-based initial trust for a new device.
    fn initial_trust(
        &self,
        ownership: OwnershipType,
        device_type: &DeviceType,
        memory_gb: f64,
    ) -> Result<f64>;

    /// Updated trust after a connection.
    fn calculate(&self, request: &TrustRequest) -> Result<TrustOutcome>;

    /// Flooding assessment for a device's recent connection count.
    fn evaluate_flooding(&self, recent_connections: usize, is_coordinator: bool)
        -> Result<FloodAssessment>;
}

/// In-process evaluator.
#[derive(Clone, Debug, Default)]
pub struct LocalEvaluator {
    fusion: FusionConfig,
    flooding: FloodingConfig,
}

impl LocalEvaluator {
    /// Create an evaluator with the given formulas.
    #[must_use]
    pub fn new(fusion: FusionConfig, flooding: FloodingConfig) -> Self {
        Self { fusion, flooding }
    }

    /// Fusion configuration in use.
    #[must_use]
    pub fn fusion(&self) -> &FusionConfig {
        &self.fusion
    }

    /// Flooding configuration in use.
    #[must_use]
    pub fn flooding(&self) -> &FloodingConfig {
        &self.flooding
    }
}

impl TrustEvaluator for LocalEvaluator {
    fn initial_trust(
        &self,
        ownership: OwnershipType,
        device_type: &DeviceType,
        memory_gb: f64,
    ) -> Result<f64> {
        Ok(calculate_initial_trust(ownership, device_type, memory_gb))
    }

    fn calculate(&self, request: &TrustRequest) -> Result<TrustOutcome> {
        Ok(fuse_trust(request, &self.fusion))
    }

    fn evaluate_flooding(
        &self,
        recent_connections: usize,
        is_coordinator: bool,
    ) -> Result<FloodAssessment> {
        Ok(evaluate_flooding(recent_connections, is_coordinator, &self.flooding))
    }
}
