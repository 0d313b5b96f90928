//! Trust fusion: combining direct, indirect and centrality evidence.
//!
//! ```text
//! base      = last_trust + direct
//! with peer evidence:  0.4 * base + 0.3 * indirect + 0.3 * centrality
//! cold start:          0.7 * base + 0.3 * centrality
//! ```
//!
//! The result is clamped to `[0, 1]` and rounded to three decimals. A result
//! below the trust threshold means the device must be blacklisted.

use serde::{Deserialize, Serialize};

use crate::rating::{aggregate_indirect, IndirectEvidence, PeerEvaluation};
use crate::score::{clamp_score, round_score, TRUST_THRESHOLD};
use crate::tier::ReputationTier;

/// Weights and constants of the fusion formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Updated trust below this blacklists the device.
    pub threshold: f64,
    /// Magnitude of the direct trust term.
    pub direct_step: f64,
    /// Weight of `last_trust + direct` when peer evidence exists.
    pub history_weight: f64,
    /// Weight of indirect trust.
    pub indirect_weight: f64,
    /// Weight of centrality when peer evidence exists.
    pub centrality_weight: f64,
    /// Weight of `last_trust + direct` without peer evidence.
    pub cold_start_history_weight: f64,
    /// Weight of centrality without peer evidence.
    pub cold_start_centrality_weight: f64,
    /// Centrality of a device with exactly one distinct partner.
    pub centrality_floor: f64,
    /// Distinct partners at which centrality saturates at 1.0.
    pub centrality_saturation: usize,
    /// Most recent peer evaluations considered per update.
    pub max_peer_evaluations: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            threshold: TRUST_THRESHOLD,
            direct_step: 0.01,
            history_weight: 0.4,
            indirect_weight: 0.3,
            centrality_weight: 0.3,
            cold_start_history_weight: 0.7,
            cold_start_centrality_weight: 0.3,
            centrality_floor: 0.30,
            centrality_saturation: 100,
            max_peer_evaluations: 15,
        }
    }
}

impl FusionConfig {
    /// Whether both weight sets sum to one.
    #[must_use]
    pub fn weights_are_normalized(&self) -> bool {
        let full = self.history_weight + self.indirect_weight + self.centrality_weight;
        let cold = self.cold_start_history_weight + self.cold_start_centrality_weight;
        (full - 1.0).abs() < 1e-9 && (cold - 1.0).abs() < 1e-9
    }
}

/// Direct trust contribution of a single connection.
#[must_use]
pub fn direct_trust(success: bool, config: &FusionConfig) -> f64 {
    if success {
        config.direct_step
    } else {
        -config.direct_step
    }
}

/// Centrality score from the number of distinct successful partners.
///
/// Zero partners score 0, one partner scores the floor, and the score grows
/// logarithmically up to 1.0 at the saturation point.
#[must_use]
pub fn centrality_score(distinct_partners: usize, config: &FusionConfig) -> f64 {
    let saturation = config.centrality_saturation.max(2);
    match distinct_partners {
        0 => 0.0,
        1 => config.centrality_floor,
        n if n >= saturation => 1.0,
        n => {
            let progress = (n as f64).ln() / (saturation as f64).ln();
            config.centrality_floor + (1.0 - config.centrality_floor) * progress
        }
    }
}

/// Inputs to one trust update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustRequest {
    /// The device's trust before this update.
    pub last_trust: f64,
    /// Outcome of the connection that triggered the update.
    pub success: bool,
    /// Peer evaluations, most recent first.
    pub peer_evaluations: Vec<PeerEvaluation>,
    /// The device's own current tier.
    pub rated_tier: ReputationTier,
    /// Distinct devices with a successful connection to this device.
    pub centrality_raw: usize,
}

/// Result of one trust update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustOutcome {
    /// New trust score.
    pub updated_trust: f64,
    /// Direct trust term.
    pub direct_trust: f64,
    /// Indirect trust evidence.
    pub indirect: IndirectEvidence,
    /// Centrality term.
    pub centrality_score: f64,
    /// Whether the device must be blacklisted.
    pub blacklisted: bool,
}

impl TrustOutcome {
    /// Indirect trust, if any rating was accepted.
    #[must_use]
    pub fn indirect_trust(&self) -> Option<f64> {
        self.indirect.value()
    }
}

/// Compute updated trust for a device.
#[must_use]
pub fn fuse_trust(request: &TrustRequest, config: &FusionConfig) -> TrustOutcome {
    let direct = direct_trust(request.success, config);
    let window = request.peer_evaluations.len().min(config.max_peer_evaluations);
    let indirect = aggregate_indirect(&request.peer_evaluations[..window], request.rated_tier);
    let centrality = centrality_score(request.centrality_raw, config);

    let base = request.last_trust + direct;
    let raw = match indirect.value() {
        Some(indirect_trust) => {
            config.history_weight * base
                + config.indirect_weight * indirect_trust
                + config.centrality_weight * centrality
        }
        None => config.cold_start_history_weight * base + config.cold_start_centrality_weight * centrality,
    };

    let updated_trust = round_score(clamp_score(raw));
    TrustOutcome {
        updated_trust,
        direct_trust: direct,
        indirect,
        centrality_score: centrality,
        blacklisted: updated_trust < config.threshold,
    }
}
