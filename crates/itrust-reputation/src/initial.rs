//! Starting trust for devices joining the network.
//!
//! Internal devices start between 0.6 and 1.0 depending on their hardware,
//! external devices start at a flat baseline. A device's history overrides the
//! hardware estimate: a previously blacklisted device is refused outright and
//! a returning device resumes from its last recorded score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decay::{rejoin_score, DecayConfig};
use crate::score::{round_score, EXTERNAL_BASELINE, TRUST_THRESHOLD};
use crate::weights::{memory_weight, DeviceType, OwnershipType};

/// Share of initial trust that every internal device gets regardless of hardware.
pub const INTERNAL_BASE_WEIGHT: f64 = 0.5;

/// Share of initial trust driven by the hardware estimate.
pub const HARDWARE_WEIGHT: f64 = 0.5;

/// What the network already knows about a joining device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DeviceHistory {
    /// Never seen before.
    New,
    /// Seen before and left voluntarily.
    Returning {
        /// Trust recorded at the device's last history entry.
        last_trust: f64,
        /// When the device left, if known.
        left_at: Option<DateTime<Utc>>,
    },
    /// Blacklisted at some point in the past.
    PreviouslyBlacklisted,
}

/// Outcome of an admission decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionDecision {
    /// The device may join.
    Accepted,
    /// The device is refused.
    Rejected,
}

/// Trust assigned to a joining device together with the admission decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Admission {
    /// Starting trust score.
    pub trust_score: f64,
    /// Whether the device is admitted.
    pub decision: AdmissionDecision,
    /// Human-readable explanation.
    pub reason: String,
}

impl Admission {
    fn accepted(trust_score: f64, reason: impl Into<String>) -> Self {
        Self {
            trust_score,
            decision: AdmissionDecision::Accepted,
            reason: reason.into(),
        }
    }

    fn rejected(trust_score: f64, reason: impl Into<String>) -> Self {
        Self {
            trust_score,
            decision: AdmissionDecision::Rejected,
            reason: reason.into(),
        }
    }

    /// Whether the device was admitted.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.decision == AdmissionDecision::Accepted
    }
}

/// Policy inputs for admission.
#[derive(Clone, Debug, PartialEq)]
pub struct AdmissionPolicy {
    /// Minimum starting trust for a new device.
    pub threshold: f64,
    /// Decay applied to carried-over trust.
    pub rejoin_decay: DecayConfig,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            threshold: TRUST_THRESHOLD,
            rejoin_decay: DecayConfig::default(),
        }
    }
}

/// Hardware-based initial trust, rounded to three decimals.
#[must_use]
pub fn calculate_initial_trust(
    ownership: OwnershipType,
    device_type: &DeviceType,
    memory_gb: f64,
) -> f64 {
    match ownership {
        OwnershipType::External => EXTERNAL_BASELINE,
        OwnershipType::Internal => {
            let hardware = (memory_weight(memory_gb) + device_type.computing_weight()) / 2.0;
            round_score(INTERNAL_BASE_WEIGHT + HARDWARE_WEIGHT * hardware)
        }
    }
}

/// Decide the starting trust and admission for a joining device.
#[must_use]
pub fn assign_initial_trust(
    ownership: OwnershipType,
    device_type: &DeviceType,
    memory_gb: f64,
    history: &DeviceHistory,
    policy: &AdmissionPolicy,
    now: DateTime<Utc>,
) -> Admission {
    let hardware_trust = match history {
        DeviceHistory::New => calculate_initial_trust(ownership, device_type, memory_gb),
        _ => 0.0,
    };
    admit(hardware_trust, history, policy, now)
}

/// Admission decision given an already computed hardware estimate.
///
/// `hardware_trust` is only consulted for [`DeviceHistory::New`].
#[must_use]
pub fn admit(
    hardware_trust: f64,
    history: &DeviceHistory,
    policy: &AdmissionPolicy,
    now: DateTime<Utc>,
) -> Admission {
    match history {
        DeviceHistory::PreviouslyBlacklisted => {
            Admission::rejected(0.0, "Device has a history of being blacklisted")
        }
        DeviceHistory::Returning { last_trust, left_at } => {
            let trust = rejoin_score(*last_trust, *left_at, &policy.rejoin_decay, now);
            Admission::accepted(trust, format!("Returning device resumes at trust {trust:.3}"))
        }
        DeviceHistory::New if hardware_trust < policy.threshold => Admission::rejected(
            hardware_trust,
            format!(
                "Initial trust {hardware_trust:.3} is below the threshold {:.3}",
                policy.threshold
            ),
        ),
        DeviceHistory::New => Admission::accepted(
            hardware_trust,
            format!("New device admitted at trust {hardware_trust:.3}"),
        ),
    }
}
