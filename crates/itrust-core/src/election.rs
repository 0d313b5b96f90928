//! Coordinator election.
//!
//! Selection is deterministic: filter eligible devices, keep the incumbent if
//! it is still eligible, otherwise rank the candidates and take the first.

use std::cmp::Ordering;

use itrust_reputation::OwnershipType;
use serde::{Deserialize, Serialize};

use crate::model::Device;

/// Whether a device may coordinate the network.
///
/// The device must be active, internal, an RSU or a Computer, not
/// blacklisted, and hold at least `threshold` trust.
#[must_use]
pub fn is_eligible(device: &Device, threshold: f64) -> bool {
    device.is_active
        && !device.is_blacklisted
        && device.ownership_type == OwnershipType::Internal
        && device.device_type.coordinator_rank().is_some()
        && device.trust() >= threshold
}

/// Outcome of an election.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionOutcome {
    /// The incumbent stays.
    Retained(String),
    /// A new coordinator was chosen.
    Elected {
        /// The new coordinator.
        coordinator: String,
        /// The former coordinator.
        previous: Option<String>,
    },
    /// No device is eligible.
    Vacant {
        /// The former coordinator.
        previous: Option<String>,
    },
}

impl ElectionOutcome {
    /// Coordinator after the election.
    #[must_use]
    pub fn coordinator(&self) -> Option<&str> {
        match self {
            ElectionOutcome::Retained(id) => Some(id),
            ElectionOutcome::Elected { coordinator, .. } => Some(coordinator),
            ElectionOutcome::Vacant { .. } => None,
        }
    }

    /// Whether the coordinator changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        match self {
            ElectionOutcome::Retained(_) => false,
            ElectionOutcome::Elected { .. } => true,
            ElectionOutcome::Vacant { previous } => previous.is_some(),
        }
    }
}

/// Candidate order: RSU before Computer, then higher trust, then smaller id.
fn candidate_order(a: &Device, b: &Device) -> Ordering {
    a.device_type
        .coordinator_rank()
        .cmp(&b.device_type.coordinator_rank())
        .then_with(|| b.trust().total_cmp(&a.trust()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Elect a coordinator among `devices`.
#[must_use]
pub fn elect_coordinator<'a, I>(devices: I, incumbent: Option<&str>, threshold: f64) -> ElectionOutcome
where
    I: IntoIterator<Item = &'a Device>,
{
    let eligible: Vec<&Device> = devices
        .into_iter()
        .filter(|d| is_eligible(d, threshold))
        .collect();

    if let Some(current) = incumbent {
        if eligible.iter().any(|d| d.id == current) {
            return ElectionOutcome::Retained(current.to_string());
        }
    }

    let previous = incumbent.map(str::to_string);
    match eligible.into_iter().min_by(|a, b| candidate_order(a, b)) {
        Some(winner) => ElectionOutcome::Elected {
            coordinator: winner.id.clone(),
            previous,
        },
        None => ElectionOutcome::Vacant { previous },
    }
}
