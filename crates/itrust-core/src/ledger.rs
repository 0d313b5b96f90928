//! Append-only record of connections, ratings and trust history.
//!
//! Every record draws its id from one shared sequence, so records of
//! different kinds can be ordered against each other even when their
//! timestamps collide.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::model::{Connection, HistoryEntry, HistoryEvent, PeerRating};

/// In-memory ledger.
#[derive(Clone, Debug, Default)]
pub struct TrustLedger {
    next_id: u64,
    connections: Vec<Connection>,
    ratings: Vec<PeerRating>,
    history: Vec<HistoryEntry>,
}

impl TrustLedger {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // ========================================================================
    // Appends
    // ========================================================================

    /// Record a connection.
    pub fn add_connection(
        &mut self,
        source_id: &str,
        target_id: &str,
        success: bool,
        connection_type: &str,
        at: DateTime<Utc>,
    ) -> Connection {
        let connection = Connection {
            id: self.allocate_id(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            success,
            connection_type: connection_type.to_string(),
            at,
        };
        self.connections.push(connection.clone());
        connection
    }

    /// Record a rating.
    pub fn add_rating(
        &mut self,
        rater_id: &str,
        rated_id: &str,
        score: f64,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> PeerRating {
        let rating = PeerRating {
            id: self.allocate_id(),
            rater_id: rater_id.to_string(),
            rated_id: rated_id.to_string(),
            score,
            comment,
            at,
        };
        self.ratings.push(rating.clone());
        rating
    }

    /// Append a history entry, assigning its id.
    pub fn append(&mut self, mut entry: HistoryEntry) -> u64 {
        entry.id = self.allocate_id();
        let id = entry.id;
        self.history.push(entry);
        id
    }

    // ========================================================================
    // Connection queries
    // ========================================================================

    /// All connections, oldest first.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Latest connection between two devices in either direction.
    #[must_use]
    pub fn last_connection_between(&self, a: &str, b: &str) -> Option<&Connection> {
        self.connections.iter().rev().find(|c| c.connects(a, b))
    }

    /// Latest connection between two devices recorded before sequence `before`.
    #[must_use]
    pub fn last_connection_before(&self, a: &str, b: &str, before: u64) -> Option<&Connection> {
        self.connections
            .iter()
            .rev()
            .skip_while(|c| c.id >= before)
            .find(|c| c.connects(a, b))
    }

    /// Distinct devices with at least one successful connection to `target_id`.
    #[must_use]
    pub fn successful_sources(&self, target_id: &str) -> HashSet<&str> {
        self.connections
            .iter()
            .filter(|c| c.success && c.target_id == target_id)
            .map(|c| c.source_id.as_str())
            .collect()
    }

    // ========================================================================
    // Rating queries
    // ========================================================================

    /// All ratings, oldest first.
    #[must_use]
    pub fn ratings(&self) -> &[PeerRating] {
        &self.ratings
    }

    /// Ratings received by `rated_id`, newest first.
    pub fn ratings_for<'a>(&'a self, rated_id: &'a str) -> impl Iterator<Item = &'a PeerRating> + 'a {
        self.ratings.iter().rev().filter(move |r| r.rated_id == rated_id)
    }

    // ========================================================================
    // History queries
    // ========================================================================

    /// All history entries, oldest first.
    #[must_use]
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// History of one device, oldest first.
    pub fn history_for<'a>(&'a self, device_id: &'a str) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
        self.history
            .iter()
            .filter(move |h| h.device_id.as_deref() == Some(device_id))
    }

    /// Latest history entry of a device.
    #[must_use]
    pub fn last_history_for(&self, device_id: &str) -> Option<&HistoryEntry> {
        self.history
            .iter()
            .rev()
            .find(|h| h.device_id.as_deref() == Some(device_id))
    }

    /// Whether the device has ever been blacklisted.
    #[must_use]
    pub fn ever_blacklisted(&self, device_id: &str) -> bool {
        self.history_for(device_id)
            .any(|h| h.event == HistoryEvent::Blacklisted)
    }

    /// Entries recorded while `coordinator_id` was coordinator, plus election
    /// entries that name it as the former coordinator.
    pub fn history_by_coordinator<'a>(
        &'a self,
        coordinator_id: &'a str,
    ) -> impl Iterator<Item = &'a HistoryEntry> + 'a {
        self.history
            .iter()
            .filter(move |h| h.coordinator_id.as_deref() == Some(coordinator_id))
    }
}
