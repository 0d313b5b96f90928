//! The trust engine: every operation on the network goes through here.
//!
//! The network aggregate sits behind a single lock. Each operation takes the
//! lock once and performs its whole read-compute-write cycle under it, so
//! trust updates are atomic and elections are globally serialized.

use chrono::{DateTime, Utc};
use itrust_reputation::weights::validate_memory;
use itrust_reputation::{
    admit, detect_dishonest_rating, validate_score, DeviceHistory, Dishonesty, FloodAssessment,
    LocalEvaluator, PeerEvaluation, ReputationError, SuspicionKind, TrustEvaluator, TrustOutcome,
    TrustRequest,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{CoreError, Rejection, Result};
use crate::model::{
    Connection, ConnectionRequest, Device, DeviceProfile, HistoryEntry, HistoryEvent, PeerRating,
    ReputationInfo, TrustComponents, DEFAULT_CONNECTION_TYPE,
};
use crate::network::{Network, NetworkStats};

// ============================================================================
// Operation results
// ============================================================================

/// Why a trust update was not performed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The device itself is blacklisted.
    DeviceBlacklisted,
    /// The peer is blacklisted.
    PeerBlacklisted,
}

/// Result of a trust update for one device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TrustUpdate {
    /// Trust was recomputed.
    Applied {
        /// Updated device.
        device_id: String,
        /// Trust before the update.
        previous_trust: f64,
        /// Evaluator output.
        outcome: TrustOutcome,
        /// Whether this update blacklisted the device.
        blacklisted: bool,
    },
    /// Nothing to do.
    Skipped {
        /// Device concerned.
        device_id: String,
        /// Why.
        reason: SkipReason,
    },
    /// The evaluator failed; device state is unchanged.
    Degraded {
        /// Device concerned.
        device_id: String,
        /// Evaluator error.
        reason: String,
    },
}

impl TrustUpdate {
    /// Device concerned.
    #[must_use]
    pub fn device_id(&self) -> &str {
        match self {
            TrustUpdate::Applied { device_id, .. }
            | TrustUpdate::Skipped { device_id, .. }
            | TrustUpdate::Degraded { device_id, .. } => device_id,
        }
    }

    /// New trust, if the update was applied.
    #[must_use]
    pub fn updated_trust(&self) -> Option<f64> {
        match self {
            TrustUpdate::Applied { outcome, .. } => Some(outcome.updated_trust),
            _ => None,
        }
    }

    /// Whether trust was recomputed.
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, TrustUpdate::Applied { .. })
    }
}

/// Result of recording a single connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionReport {
    /// The stored connection.
    pub connection: Connection,
    /// Flooding check on the source, if it ran.
    pub flooding: Option<FloodAssessment>,
    /// Trust updates for source and target.
    pub updates: Vec<TrustUpdate>,
}

/// Outcome of one connection in a batch.
#[derive(Clone, Debug, PartialEq)]
pub enum ConnectionOutcome {
    /// Stored.
    Recorded {
        /// The stored connection.
        connection: Connection,
        /// Flooding check on the source, if it ran.
        flooding: Option<FloodAssessment>,
    },
    /// Not stored.
    Refused(CoreError),
}

/// Result of recording a batch of connections.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchReport {
    /// One outcome per request, in order.
    pub outcomes: Vec<ConnectionOutcome>,
    /// One trust update per affected device, in arrival order.
    pub updates: Vec<TrustUpdate>,
}

impl BatchReport {
    /// Number of stored connections.
    #[must_use]
    pub fn recorded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ConnectionOutcome::Recorded { .. }))
            .count()
    }
}

/// Result of submitting a rating.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingReceipt {
    /// The stored rating.
    pub rating: PeerRating,
    /// Whether the rating was judged honest.
    pub accepted: bool,
    /// Trust removed from the rater.
    pub penalty_applied: f64,
    /// What kind of dishonesty was detected.
    pub dishonesty: Option<Dishonesty>,
}

// ============================================================================
// Engine
// ============================================================================

/// Thread-safe trust engine for one network.
pub struct TrustEngine {
    config: EngineConfig,
    evaluator: Arc<dyn TrustEvaluator>,
    network: Mutex<Network>,
}

impl TrustEngine {
    /// Create an engine that evaluates trust in-process.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let evaluator = Arc::new(LocalEvaluator::new(
            config.fusion.clone(),
            config.flooding.clone(),
        ));
        Self::with_evaluator(config, evaluator)
    }

    /// Create an engine that evaluates trust through `evaluator`.
    pub fn with_evaluator(config: EngineConfig, evaluator: Arc<dyn TrustEvaluator>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            network: Mutex::new(Network::with_flood_window(config.flooding.window())),
            config,
            evaluator,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn threshold(&self) -> f64 {
        self.config.fusion.threshold
    }

    // ========================================================================
    // Device lifecycle
    // ========================================================================

    /// Register a new device or readmit one that left.
    pub fn register_device(&self, profile: DeviceProfile) -> Result<Device> {
        self.register_device_at(profile, Utc::now())
    }

    /// [`register_device`](Self::register_device) at an explicit time.
    pub fn register_device_at(&self, profile: DeviceProfile, at: DateTime<Utc>) -> Result<Device> {
        validate_memory(profile.memory_gb)?;
        let mut net = self.network.lock();

        let history = match net.device(&profile.id) {
            Some(device) if device.is_blacklisted => {
                return Err(Rejection::Blacklisted(profile.id).into());
            }
            Some(device) if device.is_active => {
                return Err(Rejection::AlreadyActive(profile.id).into());
            }
            Some(device) => DeviceHistory::Returning {
                last_trust: net
                    .ledger()
                    .last_history_for(&device.id)
                    .map_or(device.trust(), |h| h.trust_score),
                left_at: device.left_at,
            },
            None if net.ledger().ever_blacklisted(&profile.id) => DeviceHistory::PreviouslyBlacklisted,
            None => DeviceHistory::New,
        };

        let hardware_trust = match history {
            DeviceHistory::New => self
                .evaluator
                .initial_trust(profile.ownership_type, &profile.device_type, profile.memory_gb)
                .map_err(|e| evaluator_error(&profile.id, e))?,
            _ => 0.0,
        };

        let policy = self.config.admission_policy();
        let admission = admit(hardware_trust, &history, &policy, at);
        if !admission.is_accepted() {
            info!(device = %profile.id, reason = %admission.reason, "Registration rejected");
            let rejection = match history {
                DeviceHistory::PreviouslyBlacklisted => Rejection::PreviouslyBlacklisted(profile.id),
                _ => Rejection::LowInitialTrust {
                    trust: admission.trust_score,
                    threshold: policy.threshold,
                },
            };
            return Err(rejection.into());
        }

        let coordinator = net.coordinator_id();
        let device_id = profile.id.clone();
        let entry = if matches!(history, DeviceHistory::Returning { .. }) {
            let device = net.device_mut(&device_id)?;
            device.is_active = true;
            device.left_at = None;
            device.trust_score.set(admission.trust_score);
            info!(device = %device_id, trust = device.trust(), "Device rejoined");
            HistoryEntry::for_device(HistoryEvent::Rejoined, device, at)
        } else {
            let device = Device::from_profile(profile, admission.trust_score, at);
            info!(
                device = %device.id,
                device_type = %device.device_type,
                ownership = %device.ownership_type,
                trust = device.trust(),
                "Device registered"
            );
            let entry = HistoryEntry::for_device(HistoryEvent::Registered, &device, at);
            net.insert_device(device);
            entry
        };
        net.ledger_mut()
            .append(entry.with_note(admission.reason).with_coordinator(coordinator));

        net.run_election(self.threshold(), at);
        debug_check(&net);
        snapshot(&net, &device_id)
    }

    /// Voluntarily leave the network.
    pub fn leave_device(&self, device_id: &str) -> Result<Device> {
        self.leave_device_at(device_id, Utc::now())
    }

    /// [`leave_device`](Self::leave_device) at an explicit time.
    pub fn leave_device_at(&self, device_id: &str, at: DateTime<Utc>) -> Result<Device> {
        let mut net = self.network.lock();
        let coordinator = net.coordinator_id();

        let device = net.device_mut(device_id)?;
        if device.is_blacklisted {
            return Err(Rejection::Blacklisted(device_id.to_string()).into());
        }
        if !device.is_active {
            return Err(Rejection::Inactive(device_id.to_string()).into());
        }
        device.is_active = false;
        device.left_at = Some(at);
        let entry = HistoryEntry::for_device(HistoryEvent::Left, device, at)
            .with_note("Device left the network")
            .with_coordinator(coordinator);
        info!(device = %device_id, trust = device.trust(), "Device left");

        net.ledger_mut().append(entry);
        net.run_election(self.threshold(), at);
        debug_check(&net);
        snapshot(&net, device_id)
    }

    /// Blacklist a device by operator decision.
    pub fn blacklist_device(&self, device_id: &str, reason: &str) -> Result<Device> {
        let at = Utc::now();
        let mut net = self.network.lock();
        net.blacklist(device_id, reason, at)?;
        net.run_election(self.threshold(), at);
        debug_check(&net);
        snapshot(&net, device_id)
    }

    // ========================================================================
    // Connections
    // ========================================================================

    /// Record a connection and update trust on both sides.
    pub fn record_connection(&self, request: ConnectionRequest) -> Result<ConnectionReport> {
        self.record_connection_at(request, Utc::now())
    }

    /// [`record_connection`](Self::record_connection) at an explicit time.
    pub fn record_connection_at(
        &self,
        request: ConnectionRequest,
        at: DateTime<Utc>,
    ) -> Result<ConnectionReport> {
        let mut net = self.network.lock();
        let (connection, flooding) = self.store_connection(&mut net, &request, at)?;

        let updates = vec![
            self.update_trust_locked(
                &mut net,
                &connection.source_id,
                &connection.target_id,
                connection.success,
                at,
            )?,
            self.update_trust_locked(
                &mut net,
                &connection.target_id,
                &connection.source_id,
                connection.success,
                at,
            )?,
        ];

        debug_check(&net);
        Ok(ConnectionReport {
            connection,
            flooding,
            updates,
        })
    }

    /// Record a batch of connections.
    ///
    /// Refused connections are reported and skipped. After all connections
    /// are stored, each affected device has its trust updated once, using the
    /// first connection of the batch it took part in.
    pub fn record_connections(&self, batch: &[ConnectionRequest]) -> BatchReport {
        self.record_connections_at(batch, Utc::now())
    }

    /// [`record_connections`](Self::record_connections) at an explicit time.
    pub fn record_connections_at(&self, batch: &[ConnectionRequest], at: DateTime<Utc>) -> BatchReport {
        let mut net = self.network.lock();
        let mut report = BatchReport::default();
        let mut pending: Vec<(String, String, bool)> = Vec::new();

        for request in batch {
            match self.store_connection(&mut net, request, at) {
                Ok((connection, flooding)) => {
                    pending.push((
                        connection.source_id.clone(),
                        connection.target_id.clone(),
                        connection.success,
                    ));
                    pending.push((
                        connection.target_id.clone(),
                        connection.source_id.clone(),
                        connection.success,
                    ));
                    report
                        .outcomes
                        .push(ConnectionOutcome::Recorded { connection, flooding });
                }
                Err(err) => {
                    if err.is_not_found() {
                        error!(
                            source = %request.source_id,
                            target = %request.target_id,
                            error = %err,
                            "Connection references unknown device"
                        );
                    } else {
                        warn!(
                            source = %request.source_id,
                            target = %request.target_id,
                            error = %err,
                            "Connection refused"
                        );
                    }
                    report.outcomes.push(ConnectionOutcome::Refused(err));
                }
            }
        }

        let mut processed = HashSet::new();
        for (device_id, peer_id, success) in pending {
            if !processed.insert(device_id.clone()) {
                continue;
            }
            match self.update_trust_locked(&mut net, &device_id, &peer_id, success, at) {
                Ok(update) => report.updates.push(update),
                Err(err) => error!(device = %device_id, error = %err, "Trust update failed"),
            }
        }

        debug_check(&net);
        report
    }

    fn store_connection(
        &self,
        net: &mut Network,
        request: &ConnectionRequest,
        at: DateTime<Utc>,
    ) -> Result<(Connection, Option<FloodAssessment>)> {
        if request.source_id == request.target_id {
            return Err(Rejection::SelfInteraction(request.source_id.clone()).into());
        }
        for id in [&request.source_id, &request.target_id] {
            let device = net
                .device(id)
                .ok_or_else(|| CoreError::DeviceNotFound(id.clone()))?;
            if device.is_blacklisted {
                return Err(Rejection::BlacklistedParticipant(id.clone()).into());
            }
            if !device.is_active {
                return Err(Rejection::Inactive(id.clone()).into());
            }
        }

        let connection_type = request
            .connection_type
            .as_deref()
            .unwrap_or(DEFAULT_CONNECTION_TYPE);
        let connection = net.ledger_mut().add_connection(
            &request.source_id,
            &request.target_id,
            request.success,
            connection_type,
            at,
        );
        net.device_mut(&request.source_id)?.record_outcome(request.success);
        net.device_mut(&request.target_id)?.record_outcome(request.success);
        debug!(
            source = %connection.source_id,
            target = %connection.target_id,
            success = connection.success,
            "Connection recorded"
        );

        let recent = net.record_activity(&request.source_id, at);
        let flooding = self.check_flooding(net, &request.source_id, recent, at)?;
        Ok((connection, flooding))
    }

    fn check_flooding(
        &self,
        net: &mut Network,
        device_id: &str,
        recent: usize,
        at: DateTime<Utc>,
    ) -> Result<Option<FloodAssessment>> {
        match net.device(device_id) {
            Some(device) if !device.is_blacklisted => {}
            _ => return Ok(None),
        }

        let is_coordinator = net.coordinator() == Some(device_id);

        let assessment = match self.evaluator.evaluate_flooding(recent, is_coordinator) {
            Ok(assessment) => assessment,
            Err(err) => {
                warn!(device = %device_id, error = %err, "Flooding check unavailable, skipping");
                return Ok(None);
            }
        };

        if assessment.is_flooding() {
            let note = format!(
                "{} connections in {}s (threshold {}, ratio {:.2}, risk {})",
                assessment.recent_connections,
                self.config.flooding.window_secs,
                assessment.threshold,
                assessment.overflow_ratio,
                assessment.risk
            );
            self.penalize(
                net,
                device_id,
                SuspicionKind::Flooding,
                assessment.penalty,
                self.config.flooding.flag_threshold,
                note,
                None,
                at,
            )?;
        }

        Ok(Some(assessment))
    }

    #[allow(clippy::too_many_arguments)]
    fn penalize(
        &self,
        net: &mut Network,
        device_id: &str,
        kind: SuspicionKind,
        penalty: f64,
        flag_threshold: u32,
        note: String,
        peer_id: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<f64> {
        let coordinator = net.coordinator_id();
        let device = net.device_mut(device_id)?;
        let removed = device.trust_score.penalize(penalty);
        let newly_flagged = device.suspicion.record(kind, note.clone(), at, flag_threshold);
        let below_threshold = device.trust_score.is_below(self.threshold());

        let event = match kind {
            SuspicionKind::Flooding => HistoryEvent::Flooding,
            SuspicionKind::Badmouthing | SuspicionKind::Collusion => HistoryEvent::DishonestRating,
        };
        let mut entry = HistoryEntry::for_device(event, device, at)
            .with_note(note)
            .with_coordinator(coordinator);
        if let Some(peer_id) = peer_id {
            entry = entry.with_peer(peer_id);
        }
        warn!(
            device = %device_id,
            kind = %kind,
            penalty = removed,
            trust = device.trust(),
            suspicious_count = device.suspicion.count(),
            flagged = newly_flagged,
            "Suspicious activity penalized"
        );
        net.ledger_mut().append(entry);

        if below_threshold {
            let reason = format!("Trust fell below threshold after {kind} penalty");
            net.blacklist(device_id, &reason, at)?;
        }
        net.run_election(self.threshold(), at);
        Ok(removed)
    }

    // ========================================================================
    // Trust updates
    // ========================================================================

    /// Recompute trust for `device_id` after a connection with `peer_id`.
    pub fn update_trust(&self, device_id: &str, peer_id: &str, success: bool) -> Result<TrustUpdate> {
        let mut net = self.network.lock();
        let update = self.update_trust_locked(&mut net, device_id, peer_id, success, Utc::now())?;
        debug_check(&net);
        Ok(update)
    }

    fn update_trust_locked(
        &self,
        net: &mut Network,
        device_id: &str,
        peer_id: &str,
        success: bool,
        at: DateTime<Utc>,
    ) -> Result<TrustUpdate> {
        let device = net
            .device(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound(device_id.to_string()))?;
        let peer = net
            .device(peer_id)
            .ok_or_else(|| CoreError::DeviceNotFound(peer_id.to_string()))?;

        if device.is_blacklisted || peer.is_blacklisted {
            let reason = if device.is_blacklisted {
                SkipReason::DeviceBlacklisted
            } else {
                SkipReason::PeerBlacklisted
            };
            debug!(device = %device_id, peer = %peer_id, reason = ?reason, "Trust update skipped");
            return Ok(TrustUpdate::Skipped {
                device_id: device_id.to_string(),
                reason,
            });
        }

        let request = self.trust_request(net, device, peer_id, success);
        let outcome = match self.evaluator.calculate(&request) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(device = %device_id, error = %err, "Trust evaluator unavailable, state unchanged");
                return Ok(TrustUpdate::Degraded {
                    device_id: device_id.to_string(),
                    reason: err.to_string(),
                });
            }
        };

        let previous_trust = request.last_trust;
        let coordinator = net.coordinator_id();
        let device = net.device_mut(device_id)?;
        device.trust_score.set(outcome.updated_trust);
        let below_threshold = outcome.blacklisted || device.trust_score.is_below(self.threshold());
        let entry = HistoryEntry::for_device(HistoryEvent::TrustUpdated, device, at)
            .with_peer(peer_id)
            .with_coordinator(coordinator)
            .with_components(TrustComponents {
                direct: outcome.direct_trust,
                indirect: outcome.indirect_trust(),
                centrality: outcome.centrality_score,
            })
            .with_note(format!(
                "Connection with {peer_id} {}",
                if success { "succeeded" } else { "failed" }
            ));
        debug!(
            device = %device_id,
            peer = %peer_id,
            previous = previous_trust,
            updated = device.trust(),
            "Trust updated"
        );
        net.ledger_mut().append(entry);

        let blacklisted = if below_threshold {
            let reason = format!(
                "Trust {:.3} below threshold {:.3}",
                outcome.updated_trust,
                self.threshold()
            );
            net.blacklist(device_id, &reason, at)?
        } else {
            false
        };
        net.run_election(self.threshold(), at);

        Ok(TrustUpdate::Applied {
            device_id: device_id.to_string(),
            previous_trust,
            outcome,
            blacklisted,
        })
    }

    fn trust_request(&self, net: &Network, device: &Device, peer_id: &str, success: bool) -> TrustRequest {
        let ledger = net.ledger();
        let peer_evaluations: Vec<PeerEvaluation> = ledger
            .ratings_for(&device.id)
            .filter(|rating| rating.rater_id != peer_id)
            .filter_map(|rating| {
                let preceding = ledger.last_connection_before(&rating.rater_id, &device.id, rating.id)?;
                let rater = net.device(&rating.rater_id)?;
                Some(PeerEvaluation {
                    rating_score: rating.score,
                    interaction_was_successful: preceding.success,
                    rater_tier: rater.tier(),
                })
            })
            .take(self.config.fusion.max_peer_evaluations)
            .collect();

        let mut partners = ledger.successful_sources(&device.id);
        if success {
            partners.insert(peer_id);
        }

        TrustRequest {
            last_trust: device.trust(),
            success,
            peer_evaluations,
            rated_tier: device.tier(),
            centrality_raw: partners.len(),
        }
    }

    // ========================================================================
    // Ratings
    // ========================================================================

    /// Submit a peer rating.
    pub fn submit_rating(
        &self,
        rater_id: &str,
        rated_id: &str,
        score: f64,
        comment: Option<String>,
    ) -> Result<RatingReceipt> {
        self.submit_rating_at(rater_id, rated_id, score, comment, Utc::now())
    }

    /// [`submit_rating`](Self::submit_rating) at an explicit time.
    pub fn submit_rating_at(
        &self,
        rater_id: &str,
        rated_id: &str,
        score: f64,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<RatingReceipt> {
        let mut net = self.network.lock();
        let rater = net
            .device(rater_id)
            .ok_or_else(|| CoreError::DeviceNotFound(rater_id.to_string()))?;
        let rated = net
            .device(rated_id)
            .ok_or_else(|| CoreError::DeviceNotFound(rated_id.to_string()))?;
        validate_score(score)?;
        if rater_id == rated_id {
            return Err(Rejection::SelfInteraction(rater_id.to_string()).into());
        }
        if rater.is_blacklisted {
            return Err(Rejection::Blacklisted(rater_id.to_string()).into());
        }
        if rated.is_blacklisted {
            return Err(Rejection::BlacklistedTarget(rated_id.to_string()).into());
        }

        let last_success = net
            .ledger()
            .last_connection_between(rater_id, rated_id)
            .map(|c| c.success);
        let dishonesty = detect_dishonest_rating(
            score,
            last_success,
            rated.is_under_suspicion(),
            &self.config.rating,
        );

        let rating = net
            .ledger_mut()
            .add_rating(rater_id, rated_id, score, comment, at);

        let penalty_applied = match dishonesty {
            Some(kind) => {
                let note = format!("{kind} rating {score:.2} of {rated_id}");
                self.penalize(
                    &mut net,
                    rater_id,
                    SuspicionKind::from(kind),
                    self.config.rating.penalty,
                    self.config.rating.flag_threshold,
                    note,
                    Some(rated_id),
                    at,
                )?
            }
            None => 0.0,
        };
        debug!(rater = %rater_id, rated = %rated_id, score = score, "Rating recorded");

        debug_check(&net);
        Ok(RatingReceipt {
            rating,
            accepted: dishonesty.is_none(),
            penalty_applied,
            dishonesty,
        })
    }

    // ========================================================================
    // Coordinator
    // ========================================================================

    /// Run a coordinator election and return the coordinator.
    pub fn elect_coordinator(&self) -> Option<String> {
        let mut net = self.network.lock();
        let outcome = net.run_election(self.threshold(), Utc::now());
        debug_check(&net);
        outcome.coordinator().map(str::to_string)
    }

    /// Current coordinator.
    #[must_use]
    pub fn coordinator(&self) -> Option<String> {
        self.network.lock().coordinator_id()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Snapshot of one device.
    pub fn device(&self, device_id: &str) -> Result<Device> {
        snapshot(&self.network.lock(), device_id)
    }

    /// Snapshot of all devices, ordered by id.
    #[must_use]
    pub fn devices(&self) -> Vec<Device> {
        let net = self.network.lock();
        let mut devices: Vec<Device> = net.devices().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    /// Reputation summary of one device.
    pub fn reputation(&self, device_id: &str) -> Result<ReputationInfo> {
        let net = self.network.lock();
        net.device(device_id)
            .map(Device::reputation_info)
            .ok_or_else(|| CoreError::DeviceNotFound(device_id.to_string()))
    }

    /// Trust history of one device, oldest first.
    #[must_use]
    pub fn history(&self, device_id: &str) -> Vec<HistoryEntry> {
        self.network.lock().ledger().history_for(device_id).cloned().collect()
    }

    /// History entries referencing `coordinator_id`.
    #[must_use]
    pub fn history_by_coordinator(&self, coordinator_id: &str) -> Vec<HistoryEntry> {
        self.network
            .lock()
            .ledger()
            .history_by_coordinator(coordinator_id)
            .cloned()
            .collect()
    }

    /// All recorded connections.
    #[must_use]
    pub fn connections(&self) -> Vec<Connection> {
        self.network.lock().ledger().connections().to_vec()
    }

    /// All recorded ratings.
    #[must_use]
    pub fn ratings(&self) -> Vec<PeerRating> {
        self.network.lock().ledger().ratings().to_vec()
    }

    /// Network statistics.
    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        self.network.lock().stats()
    }

    /// Verify the structural invariants of the network.
    pub fn check_invariants(&self) -> Result<()> {
        self.network.lock().check_invariants()
    }
}

impl Default for TrustEngine {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            evaluator: Arc::new(LocalEvaluator::new(
                config.fusion.clone(),
                config.flooding.clone(),
            )),
            network: Mutex::new(Network::with_flood_window(config.flooding.window())),
            config,
        }
    }
}

impl std::fmt::Debug for TrustEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let net = self.network.lock();
        f.debug_struct("TrustEngine")
            .field("config", &self.config)
            .field("devices", &net.device_count())
            .field("coordinator", &net.coordinator())
            .finish()
    }
}

fn snapshot(net: &Network, device_id: &str) -> Result<Device> {
    net.device(device_id)
        .cloned()
        .ok_or_else(|| CoreError::DeviceNotFound(device_id.to_string()))
}

fn evaluator_error(device_id: &str, err: ReputationError) -> CoreError {
    warn!(device = %device_id, error = %err, "Trust evaluator failed");
    match err {
        ReputationError::EvaluatorUnavailable(reason) => CoreError::EvaluatorUnavailable(reason),
        other => CoreError::Reputation(other),
    }
}

fn debug_check(net: &Network) {
    debug_assert!(
        net.check_invariants().is_ok(),
        "{:?}",
        net.check_invariants()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use itrust_reputation::{DeviceType, IndirectEvidence, OwnershipType};

    fn internal(id: &str, device_type: DeviceType, memory_gb: f64) -> DeviceProfile {
        DeviceProfile::new(id, device_type, OwnershipType::Internal, memory_gb)
    }

    fn external(id: &str, device_type: DeviceType) -> DeviceProfile {
        DeviceProfile::new(id, device_type, OwnershipType::External, 4.0)
    }

    fn engine_with_rsu_and_pc() -> TrustEngine {
        let engine = TrustEngine::default();
        engine.register_device(internal("rsu-1", DeviceType::Rsu, 16.0)).unwrap();
        engine.register_device(internal("pc-1", DeviceType::Computer, 16.0)).unwrap();
        engine
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= 1e-3,
            "expected {expected}, got {actual}"
        );
    }

    struct FailingEvaluator;

    impl TrustEvaluator for FailingEvaluator {
        fn initial_trust(&self, _: OwnershipType, _: &DeviceType, _: f64) -> itrust_reputation::Result<f64> {
            Ok(0.9)
        }

        fn calculate(&self, _: &TrustRequest) -> itrust_reputation::Result<TrustOutcome> {
            Err(ReputationError::EvaluatorUnavailable("scoring service down".into()))
        }

        fn evaluate_flooding(&self, _: usize, _: bool) -> itrust_reputation::Result<FloodAssessment> {
            Err(ReputationError::EvaluatorUnavailable("scoring service down".into()))
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[test]
    fn test_register_internal_rsu_becomes_coordinator() {
        let engine = TrustEngine::default();
        let device = engine.register_device(internal("rsu-1", DeviceType::Rsu, 16.0)).unwrap();

        assert_close(device.trust(), 0.95);
        assert!(device.is_coordinator);
        assert_eq!(engine.coordinator().as_deref(), Some("rsu-1"));
    }

    #[test]
    fn test_register_external_gets_baseline() {
        let engine = TrustEngine::default();
        let device = engine.register_device(external("phone-1", DeviceType::Smartphone)).unwrap();

        assert_close(device.trust(), 0.5);
        assert!(!device.is_coordinator);
        assert_eq!(engine.coordinator(), None);
    }

    #[test]
    fn test_register_rejects_low_initial_trust() {
        let config = EngineConfig::builder().with_trust_threshold(0.9).build();
        let engine = TrustEngine::new(config).unwrap();

        let err = engine
            .register_device(internal("sensor-1", DeviceType::Sensor, 1.0))
            .unwrap_err();

        assert!(matches!(
            err.rejection(),
            Some(Rejection::LowInitialTrust { .. })
        ));
        assert!(engine.device("sensor-1").is_err());
    }

    #[test]
    fn test_register_twice_is_rejected() {
        let engine = engine_with_rsu_and_pc();
        let err = engine
            .register_device(internal("pc-1", DeviceType::Computer, 16.0))
            .unwrap_err();
        assert_eq!(err, CoreError::Rejected(Rejection::AlreadyActive("pc-1".into())));
    }

    #[test]
    fn test_register_rejects_invalid_memory() {
        let engine = TrustEngine::default();
        let err = engine
            .register_device(internal("pc-1", DeviceType::Computer, -1.0))
            .unwrap_err();
        assert!(matches!(err, CoreError::Reputation(ReputationError::InvalidMemory(_))));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig::builder().with_trust_threshold(1.5).build();
        assert!(matches!(TrustEngine::new(config), Err(CoreError::Config(_))));

        let config = EngineConfig::builder()
            .with_flood_window_secs(10_000_000_000_000)
            .build();
        assert!(matches!(TrustEngine::new(config), Err(CoreError::Config(_))));
    }

    // ========================================================================
    // Leaving and rejoining
    // ========================================================================

    #[test]
    fn test_leave_and_rejoin_keeps_trust() {
        let engine = engine_with_rsu_and_pc();
        engine
            .record_connection(ConnectionRequest::new("pc-1", "rsu-1", true))
            .unwrap();
        let before = engine.device("pc-1").unwrap().trust();

        let left = engine.leave_device("pc-1").unwrap();
        assert!(!left.is_active);
        assert!(left.left_at.is_some());

        let back = engine
            .register_device(internal("pc-1", DeviceType::Computer, 16.0))
            .unwrap();
        assert!(back.is_active);
        assert!(back.left_at.is_none());
        assert_close(back.trust(), before);

        let events: Vec<HistoryEvent> = engine.history("pc-1").iter().map(|h| h.event).collect();
        assert!(events.contains(&HistoryEvent::Left));
        assert_eq!(events.last(), Some(&HistoryEvent::Rejoined));
    }

    #[test]
    fn test_leaving_coordinator_triggers_election() {
        let engine = engine_with_rsu_and_pc();
        assert_eq!(engine.coordinator().as_deref(), Some("rsu-1"));

        engine.leave_device("rsu-1").unwrap();
        assert_eq!(engine.coordinator().as_deref(), Some("pc-1"));
    }

    #[test]
    fn test_leave_twice_is_rejected() {
        let engine = engine_with_rsu_and_pc();
        engine.leave_device("pc-1").unwrap();
        assert_eq!(
            engine.leave_device("pc-1").unwrap_err(),
            CoreError::Rejected(Rejection::Inactive("pc-1".into()))
        );
    }

    // ========================================================================
    // Connections
    // ========================================================================

    #[test]
    fn test_cold_start_connection_updates_both_sides() {
        let engine = engine_with_rsu_and_pc();
        let report = engine
            .record_connection(ConnectionRequest::new("rsu-1", "pc-1", true))
            .unwrap();

        assert_eq!(report.updates.len(), 2);
        assert_eq!(report.connection.connection_type, DEFAULT_CONNECTION_TYPE);
        // 0.7 * (0.95 + 0.01) + 0.3 * 0.3
        assert_close(report.updates[0].updated_trust().unwrap(), 0.762);
        assert_close(engine.device("rsu-1").unwrap().trust(), 0.762);

        let pc = engine.device("pc-1").unwrap();
        assert_eq!(pc.successful_connections, 1);
        assert_eq!(pc.connection_count, 1);
    }

    #[test]
    fn test_connection_validation() {
        let engine = engine_with_rsu_and_pc();

        assert_eq!(
            engine
                .record_connection(ConnectionRequest::new("pc-1", "pc-1", true))
                .unwrap_err(),
            CoreError::Rejected(Rejection::SelfInteraction("pc-1".into()))
        );
        assert!(engine
            .record_connection(ConnectionRequest::new("pc-1", "ghost", true))
            .unwrap_err()
            .is_not_found());

        engine.leave_device("pc-1").unwrap();
        assert_eq!(
            engine
                .record_connection(ConnectionRequest::new("rsu-1", "pc-1", true))
                .unwrap_err(),
            CoreError::Rejected(Rejection::Inactive("pc-1".into()))
        );
        assert!(engine.connections().is_empty());
    }

    #[test]
    fn test_repeated_failures_blacklist_source() {
        let engine = engine_with_rsu_and_pc();
        for _ in 0..3 {
            engine
                .record_connection(ConnectionRequest::new("pc-1", "rsu-1", false))
                .unwrap();
        }
        assert!(!engine.device("pc-1").unwrap().is_blacklisted);

        let report = engine
            .record_connection(ConnectionRequest::new("pc-1", "rsu-1", false))
            .unwrap();

        assert!(matches!(
            report.updates[0],
            TrustUpdate::Applied { blacklisted: true, .. }
        ));
        assert_eq!(
            report.updates[1],
            TrustUpdate::Skipped {
                device_id: "rsu-1".into(),
                reason: SkipReason::PeerBlacklisted,
            }
        );

        let pc = engine.device("pc-1").unwrap();
        assert!(pc.is_blacklisted);
        assert!(!pc.is_active);
        assert!(engine
            .record_connection(ConnectionRequest::new("rsu-1", "pc-1", true))
            .is_err());
    }

    #[test]
    fn test_flooding_penalizes_member() {
        let config = EngineConfig::builder().with_flood_thresholds(3, 6).build();
        let engine = TrustEngine::new(config).unwrap();
        let t0 = Utc::now();
        engine
            .register_device_at(internal("rsu-1", DeviceType::Rsu, 16.0), t0)
            .unwrap();
        engine
            .register_device_at(internal("pc-1", DeviceType::Computer, 16.0), t0)
            .unwrap();

        let mut last = None;
        for i in 0..4 {
            let report = engine
                .record_connection_at(
                    ConnectionRequest::new("pc-1", "rsu-1", true),
                    t0 + Duration::seconds(i),
                )
                .unwrap();
            last = report.flooding;
        }

        let assessment = last.unwrap();
        assert!(assessment.is_flooding());
        assert_eq!(assessment.recent_connections, 4);
        // 0.05 + (4/3 - 1) * 0.3
        assert_close(assessment.penalty, 0.15);

        let info = engine.reputation("pc-1").unwrap();
        assert_eq!(info.suspicious_count, 1);
        assert!(!info.is_flagged);
        assert!(engine
            .history("pc-1")
            .iter()
            .any(|h| h.event == HistoryEvent::Flooding));
    }

    #[test]
    fn test_flooding_window_expires() {
        let config = EngineConfig::builder().with_flood_thresholds(3, 6).build();
        let engine = TrustEngine::new(config).unwrap();
        let t0 = Utc::now();
        engine
            .register_device_at(internal("rsu-1", DeviceType::Rsu, 16.0), t0)
            .unwrap();
        engine
            .register_device_at(internal("pc-1", DeviceType::Computer, 16.0), t0)
            .unwrap();

        for i in 0..4 {
            let report = engine
                .record_connection_at(
                    ConnectionRequest::new("pc-1", "rsu-1", true),
                    t0 + Duration::seconds(i * 30),
                )
                .unwrap();
            assert!(!report.flooding.unwrap().is_flooding());
        }
        assert_eq!(engine.reputation("pc-1").unwrap().suspicious_count, 0);
    }

    #[test]
    fn test_batch_updates_each_device_once() {
        let engine = engine_with_rsu_and_pc();
        engine.register_device(external("phone-1", DeviceType::Smartphone)).unwrap();

        let report = engine.record_connections(&[
            ConnectionRequest::new("phone-1", "rsu-1", true),
            ConnectionRequest::new("phone-1", "phone-1", true),
            ConnectionRequest::new("pc-1", "rsu-1", true),
        ]);

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.recorded(), 2);
        assert!(matches!(report.outcomes[1], ConnectionOutcome::Refused(_)));

        let updated: Vec<&str> = report.updates.iter().map(TrustUpdate::device_id).collect();
        assert_eq!(updated, vec!["phone-1", "rsu-1", "pc-1"]);
        assert_eq!(engine.device("rsu-1").unwrap().connection_count, 2);
    }

    #[test]
    fn test_degraded_evaluator_leaves_state_unchanged() {
        let engine =
            TrustEngine::with_evaluator(EngineConfig::default(), Arc::new(FailingEvaluator)).unwrap();
        engine.register_device(internal("rsu-1", DeviceType::Rsu, 16.0)).unwrap();
        engine.register_device(internal("pc-1", DeviceType::Computer, 16.0)).unwrap();

        let report = engine
            .record_connection(ConnectionRequest::new("pc-1", "rsu-1", true))
            .unwrap();

        assert!(report.flooding.is_none());
        assert!(report
            .updates
            .iter()
            .all(|u| matches!(u, TrustUpdate::Degraded { .. })));
        assert_close(engine.device("pc-1").unwrap().trust(), 0.9);
        assert_eq!(engine.connections().len(), 1);
    }

    // ========================================================================
    // Ratings
    // ========================================================================

    #[test]
    fn test_rating_without_connection_is_accepted() {
        let engine = engine_with_rsu_and_pc();
        let receipt = engine.submit_rating("pc-1", "rsu-1", 0.1, None).unwrap();

        assert!(receipt.accepted);
        assert_eq!(receipt.penalty_applied, 0.0);
        assert_eq!(engine.ratings().len(), 1);
    }

    #[test]
    fn test_badmouthing_is_penalized() {
        let engine = engine_with_rsu_and_pc();
        engine
            .record_connection(ConnectionRequest::new("pc-1", "rsu-1", true))
            .unwrap();
        let before = engine.device("pc-1").unwrap().trust();

        let receipt = engine
            .submit_rating("pc-1", "rsu-1", 0.1, Some("slow".into()))
            .unwrap();

        assert!(!receipt.accepted);
        assert_eq!(receipt.dishonesty, Some(Dishonesty::Badmouthing));
        assert_close(receipt.penalty_applied, 0.15);
        assert_close(engine.device("pc-1").unwrap().trust(), before - 0.15);
        assert_eq!(engine.ratings().len(), 1);

        let info = engine.reputation("pc-1").unwrap();
        assert_eq!(info.recent_suspicious_types, vec![SuspicionKind::Badmouthing]);
    }

    #[test]
    fn test_collusion_is_penalized() {
        let engine = engine_with_rsu_and_pc();
        engine
            .record_connection(ConnectionRequest::new("pc-1", "rsu-1", false))
            .unwrap();

        let receipt = engine.submit_rating("rsu-1", "pc-1", 0.9, None).unwrap();
        assert_eq!(receipt.dishonesty, Some(Dishonesty::Collusion));
    }

    #[test]
    fn test_rating_validation() {
        let engine = engine_with_rsu_and_pc();

        assert!(matches!(
            engine.submit_rating("pc-1", "rsu-1", 1.5, None),
            Err(CoreError::Reputation(ReputationError::InvalidScore(_)))
        ));
        assert_eq!(
            engine.submit_rating("pc-1", "pc-1", 0.5, None).unwrap_err(),
            CoreError::Rejected(Rejection::SelfInteraction("pc-1".into()))
        );

        engine.blacklist_device("pc-1", "manual").unwrap();
        assert_eq!(
            engine.submit_rating("rsu-1", "pc-1", 0.5, None).unwrap_err(),
            CoreError::Rejected(Rejection::BlacklistedTarget("pc-1".into()))
        );
        assert_eq!(
            engine.submit_rating("pc-1", "rsu-1", 0.5, None).unwrap_err(),
            CoreError::Rejected(Rejection::Blacklisted("pc-1".into()))
        );
    }

    #[test]
    fn test_ratings_feed_indirect_trust() {
        let engine = engine_with_rsu_and_pc();
        engine.register_device(external("phone-1", DeviceType::Smartphone)).unwrap();
        engine
            .record_connection(ConnectionRequest::new("phone-1", "rsu-1", true))
            .unwrap();
        engine.submit_rating("phone-1", "rsu-1", 0.8, None).unwrap();

        let report = engine
            .record_connection(ConnectionRequest::new("rsu-1", "pc-1", true))
            .unwrap();

        match &report.updates[0] {
            TrustUpdate::Applied { outcome, .. } => {
                assert_eq!(outcome.indirect, IndirectEvidence::Valid(0.8));
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    // ========================================================================
    // Coordinator and queries
    // ========================================================================

    #[test]
    fn test_blacklisting_coordinator_moves_role() {
        let engine = engine_with_rsu_and_pc();
        engine.blacklist_device("rsu-1", "tampering").unwrap();

        assert_eq!(engine.coordinator().as_deref(), Some("pc-1"));
        assert_eq!(engine.elect_coordinator().as_deref(), Some("pc-1"));
        assert!(engine
            .history_by_coordinator("rsu-1")
            .iter()
            .any(|h| h.event == HistoryEvent::CoordinatorElected));
    }

    #[test]
    fn test_blacklisted_device_cannot_return() {
        let engine = engine_with_rsu_and_pc();
        engine.blacklist_device("pc-1", "tampering").unwrap();

        assert_eq!(
            engine
                .register_device(internal("pc-1", DeviceType::Computer, 16.0))
                .unwrap_err(),
            CoreError::Rejected(Rejection::Blacklisted("pc-1".into()))
        );
    }

    #[test]
    fn test_stats_and_ordering() {
        let engine = engine_with_rsu_and_pc();
        engine.register_device(external("phone-1", DeviceType::Smartphone)).unwrap();

        let ids: Vec<String> = engine.devices().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["pc-1", "phone-1", "rsu-1"]);

        let stats = engine.stats();
        assert_eq!(stats.total_devices, 3);
        assert_eq!(stats.active_devices, 3);
        assert_eq!(stats.coordinator.as_deref(), Some("rsu-1"));
        assert!(engine.check_invariants().is_ok());
    }
}
