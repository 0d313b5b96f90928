//! # itrust-core
//!
//! Stateful trust engine for an Intelligent Transport System network.
//!
//! This is the main entry point for applications embedding the engine.
//!
//! ## Quick Start
//!
//! ```
//! use itrust_core::{ConnectionRequest, DeviceProfile, DeviceType, OwnershipType, TrustEngine};
//!
//! # fn main() -> Result<(), itrust_core::CoreError> {
//! let engine = TrustEngine::default();
//!
//! // Internal roadside units start with high trust and coordinate the network
//! engine.register_device(DeviceProfile::new("rsu-1", DeviceType::Rsu, OwnershipType::Internal, 16.0))?;
//! engine.register_device(DeviceProfile::new("car-7", DeviceType::SmartDevice, OwnershipType::External, 4.0))?;
//! assert_eq!(engine.coordinator().as_deref(), Some("rsu-1"));
//!
//! // Every connection updates trust on both sides
//! let report = engine.record_connection(ConnectionRequest::new("car-7", "rsu-1", true))?;
//! assert_eq!(report.updates.len(), 2);
//!
//! // Ratings are checked against the last connection between the two devices
//! let receipt = engine.submit_rating("car-7", "rsu-1", 0.9, None)?;
//! assert!(receipt.accepted);
//! # Ok(())
//! # }
//! ```
//!
//! ## Device Lifecycle
//!
//! - **Registered**: admitted with hardware-based or carried-over trust
//! - **Left**: inactive, may rejoin with the trust it left with
//! - **Blacklisted**: trust fell below the threshold; permanent
//!
//! ## Architecture
//!
//! - **TrustEngine**: Serializes every operation behind one lock
//! - **Network**: Devices, coordinator and ledger; owns blacklisting and elections
//! - **TrustLedger**: Append-only connections, ratings and trust history
//! - **Election**: Deterministic, sticky coordinator selection
//!
//! The trust arithmetic itself lives in `itrust-reputation` and is reached
//! through the [`TrustEvaluator`] trait.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod election;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod model;
pub mod network;

#[cfg(test)]
mod proptests;

// Main engine export
pub use engine::{
    BatchReport, ConnectionOutcome, ConnectionReport, RatingReceipt, SkipReason, TrustEngine,
    TrustUpdate,
};

pub use config::{ConfigError, EngineConfig, EngineConfigBuilder};
pub use election::{elect_coordinator, is_eligible, ElectionOutcome};
pub use error::{CoreError, Rejection, Result};
pub use ledger::TrustLedger;
pub use model::{
    Connection, ConnectionRequest, Device, DeviceProfile, HistoryEntry, HistoryEvent, PeerRating,
    ReputationInfo, TrustComponents,
};
pub use network::{Network, NetworkStats};

// Re-exports from the scoring crate
pub use itrust_reputation::{
    DecayConfig, DeviceType, Dishonesty, FloodAssessment, FloodRisk, FloodingConfig, FusionConfig,
    IndirectEvidence, LocalEvaluator, OwnershipType, RatingConfig, ReputationError, ReputationTier,
    SuspicionKind, TrustEvaluator, TrustOutcome, TrustRequest, TRUST_THRESHOLD,
};
