//! Devices, connections, ratings and the trust history journal.

use chrono::{DateTime, Utc};
use itrust_reputation::{
    classify, DeviceType, OwnershipType, ReputationTier, SuspicionKind, SuspicionRecord,
    TrustScore,
};
use serde::{Deserialize, Serialize};

/// Default connection type when none is given.
pub const DEFAULT_CONNECTION_TYPE: &str = "data";

/// Number of recent suspicious activity kinds reported in [`ReputationInfo`].
pub const RECENT_SUSPICION_KINDS: usize = 3;

/// Registration details supplied by a joining device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Unique device id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Device type.
    pub device_type: DeviceType,
    /// Who operates the device.
    pub ownership_type: OwnershipType,
    /// Memory capacity in GB.
    pub memory_gb: f64,
    /// Opaque location string.
    #[serde(default)]
    pub location: Option<String>,
}

impl DeviceProfile {
    /// Create a profile; the name defaults to the id.
    pub fn new(
        id: impl Into<String>,
        device_type: DeviceType,
        ownership_type: OwnershipType,
        memory_gb: f64,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            device_type,
            ownership_type,
            memory_gb,
            location: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// A device participating in the network.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique device id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Device type.
    pub device_type: DeviceType,
    /// Who operates the device.
    pub ownership_type: OwnershipType,
    /// Memory capacity in GB.
    pub memory_gb: f64,
    /// Computing weight of the device type.
    pub computing_power: f64,
    /// Opaque location string.
    pub location: Option<String>,
    /// Current trust.
    pub trust_score: TrustScore,
    /// Successful connections involving the device.
    pub successful_connections: u64,
    /// Failed connections involving the device.
    pub failed_connections: u64,
    /// All connections involving the device.
    pub connection_count: u64,
    /// Permanently excluded.
    pub is_blacklisted: bool,
    /// Current network coordinator.
    pub is_coordinator: bool,
    /// Currently part of the network.
    pub is_active: bool,
    /// Suspicious-activity record.
    pub suspicion: SuspicionRecord,
    /// First registration.
    pub created_at: DateTime<Utc>,
    /// Last voluntary departure, cleared on rejoin.
    pub left_at: Option<DateTime<Utc>>,
    /// When the device was blacklisted.
    pub blacklisted_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Create an active device from its profile.
    #[must_use]
    pub fn from_profile(profile: DeviceProfile, trust: f64, at: DateTime<Utc>) -> Self {
        Self {
            computing_power: profile.device_type.computing_weight(),
            id: profile.id,
            name: profile.name,
            device_type: profile.device_type,
            ownership_type: profile.ownership_type,
            memory_gb: profile.memory_gb,
            location: profile.location,
            trust_score: TrustScore::new(trust),
            successful_connections: 0,
            failed_connections: 0,
            connection_count: 0,
            is_blacklisted: false,
            is_coordinator: false,
            is_active: true,
            suspicion: SuspicionRecord::new(),
            created_at: at,
            left_at: None,
            blacklisted_at: None,
        }
    }

    /// Current trust value.
    #[must_use]
    pub fn trust(&self) -> f64 {
        self.trust_score.value()
    }

    /// Whether the device is flagged.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.suspicion.is_flagged()
    }

    /// Flagged or blacklisted.
    #[must_use]
    pub fn is_under_suspicion(&self) -> bool {
        self.is_blacklisted || self.suspicion.is_flagged()
    }

    /// Current reputation tier.
    #[must_use]
    pub fn tier(&self) -> ReputationTier {
        classify(
            self.trust(),
            self.is_blacklisted,
            self.suspicion.is_flagged(),
            self.suspicion.count(),
        )
    }

    /// Count a connection outcome.
    pub fn record_outcome(&mut self, success: bool) {
        if success {
            self.successful_connections += 1;
        } else {
            self.failed_connections += 1;
        }
        self.connection_count = self.successful_connections + self.failed_connections;
    }

    /// Reputation summary.
    #[must_use]
    pub fn reputation_info(&self) -> ReputationInfo {
        ReputationInfo {
            device_id: self.id.clone(),
            trust_score: self.trust(),
            is_blacklisted: self.is_blacklisted,
            is_flagged: self.suspicion.is_flagged(),
            suspicious_count: self.suspicion.count(),
            tier: self.tier(),
            last_suspicious_activity: self.suspicion.last_activity(),
            recent_suspicious_types: self.suspicion.recent_kinds(RECENT_SUSPICION_KINDS),
        }
    }
}

/// Reputation summary of a device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReputationInfo {
    /// Device id.
    pub device_id: String,
    /// Current trust.
    pub trust_score: f64,
    /// Permanently excluded.
    pub is_blacklisted: bool,
    /// Flagged for suspicious activity.
    pub is_flagged: bool,
    /// Suspicious events recorded.
    pub suspicious_count: u32,
    /// Reputation tier.
    pub tier: ReputationTier,
    /// Latest suspicious event.
    pub last_suspicious_activity: Option<DateTime<Utc>>,
    /// Kinds of the latest suspicious events, oldest first.
    pub recent_suspicious_types: Vec<SuspicionKind>,
}

/// A connection to report to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    /// Initiating device.
    pub source_id: String,
    /// Receiving device.
    pub target_id: String,
    /// Whether the connection succeeded.
    pub success: bool,
    /// Free-form connection type.
    #[serde(default)]
    pub connection_type: Option<String>,
}

impl ConnectionRequest {
    /// Create a request with the default connection type.
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, success: bool) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            success,
            connection_type: None,
        }
    }

    /// Set the connection type.
    #[must_use]
    pub fn with_type(mut self, connection_type: impl Into<String>) -> Self {
        self.connection_type = Some(connection_type.into());
        self
    }
}

/// A recorded connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Ledger sequence number.
    pub id: u64,
    /// Initiating device.
    pub source_id: String,
    /// Receiving device.
    pub target_id: String,
    /// Whether the connection succeeded.
    pub success: bool,
    /// Free-form connection type.
    pub connection_type: String,
    /// When it happened.
    pub at: DateTime<Utc>,
}

impl Connection {
    /// Whether the connection is between `a` and `b`, in either direction.
    #[must_use]
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.source_id == a && self.target_id == b) || (self.source_id == b && self.target_id == a)
    }
}

/// A recorded peer rating.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerRating {
    /// Ledger sequence number.
    pub id: u64,
    /// Rating device.
    pub rater_id: String,
    /// Rated device.
    pub rated_id: String,
    /// Score in `[0, 1]`.
    pub score: f64,
    /// Optional comment.
    pub comment: Option<String>,
    /// When it was submitted.
    pub at: DateTime<Utc>,
}

/// Kind of trust history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEvent {
    /// First registration.
    Registered,
    /// Returned after leaving.
    Rejoined,
    /// Left voluntarily.
    Left,
    /// Trust recomputed after a connection.
    TrustUpdated,
    /// Penalized for a dishonest rating.
    DishonestRating,
    /// Penalized for flooding.
    Flooding,
    /// Blacklisted.
    Blacklisted,
    /// Became coordinator.
    CoordinatorElected,
    /// The network lost its coordinator and no candidate was eligible.
    ElectionFailed,
}

/// Components of a trust update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustComponents {
    /// Direct trust term.
    pub direct: f64,
    /// Indirect trust, if any rating was accepted.
    pub indirect: Option<f64>,
    /// Centrality term.
    pub centrality: f64,
}

/// One entry of the append-only trust history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Ledger sequence number.
    pub id: u64,
    /// Device concerned, absent for network-wide events.
    pub device_id: Option<String>,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Trust of the device after the event.
    pub trust_score: f64,
    /// Connection count of the device at the time.
    pub connection_count: u64,
    /// Peer involved, if any.
    pub peer_id: Option<String>,
    /// What happened.
    pub event: HistoryEvent,
    /// Free-form note.
    pub note: String,
    /// Coordinator at the time (the former coordinator for election events).
    pub coordinator_id: Option<String>,
    /// Trust update components.
    pub components: Option<TrustComponents>,
}

impl HistoryEntry {
    /// Start an entry; the ledger assigns the id on append.
    pub fn new(event: HistoryEvent, at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            device_id: None,
            at,
            trust_score: 0.0,
            connection_count: 0,
            peer_id: None,
            event,
            note: String::new(),
            coordinator_id: None,
            components: None,
        }
    }

    /// Entry about `device`, capturing its trust and connection count.
    pub fn for_device(event: HistoryEvent, device: &Device, at: DateTime<Utc>) -> Self {
        Self {
            device_id: Some(device.id.clone()),
            trust_score: device.trust(),
            connection_count: device.connection_count,
            ..Self::new(event, at)
        }
    }

    /// Set the peer.
    #[must_use]
    pub fn with_peer(mut self, peer_id: impl Into<String>) -> Self {
        self.peer_id = Some(peer_id.into());
        self
    }

    /// Set the note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    /// Set the coordinator reference.
    #[must_use]
    pub fn with_coordinator(mut self, coordinator_id: Option<String>) -> Self {
        self.coordinator_id = coordinator_id;
        self
    }

    /// Attach trust update components.
    #[must_use]
    pub fn with_components(mut self, components: TrustComponents) -> Self {
        self.components = Some(components);
        self
    }
}
