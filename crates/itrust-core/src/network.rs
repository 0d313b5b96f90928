//! The network aggregate: devices, the coordinator and the ledger.
//!
//! All state transitions that must keep the network consistent (blacklisting,
//! elections) live here. The engine decides when to call them.

use chrono::{DateTime, Duration, Utc};
use itrust_reputation::{FloodTracker, FloodingConfig, ReputationTier};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::election::{elect_coordinator, ElectionOutcome};
use crate::error::{CoreError, Result};
use crate::ledger::TrustLedger;
use crate::model::{Device, HistoryEntry, HistoryEvent};

/// Devices, coordinator and records of one network.
#[derive(Clone, Debug)]
pub struct Network {
    devices: HashMap<String, Device>,
    coordinator: Option<String>,
    ledger: TrustLedger,
    activity: FloodTracker,
}

impl Network {
    /// Empty network using the default flooding window.
    #[must_use]
    pub fn new() -> Self {
        Self::with_flood_window(FloodingConfig::default().window())
    }

    /// Empty network counting connection bursts over `window`.
    #[must_use]
    pub fn with_flood_window(window: Duration) -> Self {
        Self {
            devices: HashMap::new(),
            coordinator: None,
            ledger: TrustLedger::new(),
            activity: FloodTracker::new(window),
        }
    }

    /// Look up a device.
    #[must_use]
    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub(crate) fn device_mut(&mut self, id: &str) -> Result<&mut Device> {
        self.devices
            .get_mut(id)
            .ok_or_else(|| CoreError::DeviceNotFound(id.to_string()))
    }

    /// All devices, in no particular order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// Number of devices ever registered.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Current coordinator.
    #[must_use]
    pub fn coordinator(&self) -> Option<&str> {
        self.coordinator.as_deref()
    }

    pub(crate) fn coordinator_id(&self) -> Option<String> {
        self.coordinator.clone()
    }

    /// Records of this network.
    #[must_use]
    pub fn ledger(&self) -> &TrustLedger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut TrustLedger {
        &mut self.ledger
    }

    /// Count a connection initiated by `id`; returns the connections it
    /// initiated inside the flooding window.
    pub(crate) fn record_activity(&mut self, id: &str, at: DateTime<Utc>) -> usize {
        self.activity.record(id, at)
    }

    pub(crate) fn insert_device(&mut self, device: Device) {
        self.devices.insert(device.id.clone(), device);
    }

    /// Blacklist a device. Returns `false` if it already was.
    pub(crate) fn blacklist(&mut self, id: &str, reason: &str, at: DateTime<Utc>) -> Result<bool> {
        let device = self
            .devices
            .get_mut(id)
            .ok_or_else(|| CoreError::DeviceNotFound(id.to_string()))?;
        if device.is_blacklisted {
            return Ok(false);
        }

        device.is_blacklisted = true;
        device.is_active = false;
        device.suspicion.flag();
        device.blacklisted_at.get_or_insert(at);

        let entry = HistoryEntry::for_device(HistoryEvent::Blacklisted, device, at)
            .with_note(reason)
            .with_coordinator(self.coordinator.clone());
        warn!(device = %id, trust = device.trust(), reason = %reason, "Device blacklisted");
        self.ledger.append(entry);
        Ok(true)
    }

    /// Run an election and apply its outcome.
    pub(crate) fn run_election(&mut self, threshold: f64, at: DateTime<Utc>) -> ElectionOutcome {
        let outcome = elect_coordinator(self.devices.values(), self.coordinator.as_deref(), threshold);

        match &outcome {
            ElectionOutcome::Retained(_) => {}
            ElectionOutcome::Elected {
                coordinator,
                previous,
            } => {
                for device in self.devices.values_mut() {
                    device.is_coordinator = false;
                }
                if let Some(device) = self.devices.get_mut(coordinator) {
                    device.is_coordinator = true;
                    let entry = HistoryEntry::for_device(HistoryEvent::CoordinatorElected, device, at)
                        .with_coordinator(previous.clone())
                        .with_note(format!(
                            "{} elected coordinator ({}, trust {:.3})",
                            device.id,
                            device.device_type,
                            device.trust()
                        ));
                    self.ledger.append(entry);
                }
                self.coordinator = Some(coordinator.clone());
                info!(
                    coordinator = %coordinator,
                    previous = ?previous,
                    "Coordinator elected"
                );
            }
            ElectionOutcome::Vacant { previous } => {
                for device in self.devices.values_mut() {
                    device.is_coordinator = false;
                }
                self.coordinator = None;
                match previous {
                    Some(previous) => {
                        let entry = HistoryEntry::new(HistoryEvent::ElectionFailed, at)
                            .with_coordinator(Some(previous.clone()))
                            .with_note("No eligible coordinator candidate");
                        self.ledger.append(entry);
                        warn!(previous = %previous, "Coordinator lost and no eligible candidate");
                    }
                    None => debug!("No eligible coordinator candidate"),
                }
            }
        }

        outcome
    }

    /// Verify the structural invariants of the network.
    pub fn check_invariants(&self) -> Result<()> {
        let flagged: Vec<&str> = self
            .devices
            .values()
            .filter(|d| d.is_coordinator)
            .map(|d| d.id.as_str())
            .collect();
        if flagged.len() > 1 {
            return Err(CoreError::InvariantViolation(format!(
                "multiple coordinators: {flagged:?}"
            )));
        }
        if flagged.first().copied() != self.coordinator.as_deref() {
            return Err(CoreError::InvariantViolation(format!(
                "coordinator field {:?} disagrees with device flags {flagged:?}",
                self.coordinator
            )));
        }

        for device in self.devices.values() {
            let trust = device.trust();
            if !(0.0..=1.0).contains(&trust) {
                return Err(CoreError::InvariantViolation(format!(
                    "device {} trust {trust} out of range",
                    device.id
                )));
            }
            if device.is_blacklisted && device.is_active {
                return Err(CoreError::InvariantViolation(format!(
                    "blacklisted device {} is active",
                    device.id
                )));
            }
            if device.connection_count != device.successful_connections + device.failed_connections {
                return Err(CoreError::InvariantViolation(format!(
                    "device {} connection counters out of sync",
                    device.id
                )));
            }
        }

        Ok(())
    }

    /// Summary statistics.
    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        let mut tiers: Vec<(ReputationTier, usize)> =
            ReputationTier::ALL.iter().map(|t| (*t, 0)).collect();
        for device in self.devices.values() {
            let tier = device.tier();
            if let Some(slot) = tiers.iter_mut().find(|(t, _)| *t == tier) {
                slot.1 += 1;
            }
        }

        NetworkStats {
            total_devices: self.devices.len(),
            active_devices: self.devices.values().filter(|d| d.is_active).count(),
            blacklisted_devices: self.devices.values().filter(|d| d.is_blacklisted).count(),
            flagged_devices: self.devices.values().filter(|d| d.is_flagged()).count(),
            coordinator: self.coordinator.clone(),
            tiers,
            connections: self.ledger.connections().len(),
            ratings: self.ledger.ratings().len(),
            history_entries: self.ledger.history().len(),
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Devices ever registered.
    pub total_devices: usize,
    /// Devices currently active.
    pub active_devices: usize,
    /// Blacklisted devices.
    pub blacklisted_devices: usize,
    /// Flagged devices (blacklisted devices are always flagged).
    pub flagged_devices: usize,
    /// Current coordinator.
    pub coordinator: Option<String>,
    /// Device count per tier, in precedence order.
    pub tiers: Vec<(ReputationTier, usize)>,
    /// Recorded connections.
    pub connections: usize,
    /// Recorded ratings.
    pub ratings: usize,
    /// Trust history entries.
    pub history_entries: usize,
}

impl NetworkStats {
    /// Device count for one tier.
    #[must_use]
    pub fn tier_count(&self, tier: ReputationTier) -> usize {
        self.tiers
            .iter()
            .find(|(t, _)| *t == tier)
            .map_or(0, |(_, count)| *count)
    }
}
