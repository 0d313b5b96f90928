//! # itrust-reputation
//!
//! Trust scoring for devices in an Intelligent Transport System network.
//!
//! This crate provides:
//! - **Weights**: Device classification and hardware weight tables
//! - **Initial**: Starting trust and admission decisions
//! - **Fusion**: Direct, indirect and centrality evidence combined into trust
//! - **Rating**: Honest/dishonest classification of peer ratings
//! - **Flooding**: Role-aware connection rate penalties
//! - **Tier**: Reputation tiers with fixed precedence
//! - **Evaluator**: The trait the stateful engine computes trust through
//!
//! Everything here is pure: no device registry, no locking, no I/O.
//!
//! ## Key Thresholds
//!
//! - Trust below 0.3 blacklists a device, permanently
//! - Ratings from blacklisted or very suspicious raters are ignored
//! - Members may open 12 connections per minute, the coordinator 24

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decay;
pub mod error;
pub mod evaluator;
pub mod flooding;
pub mod fusion;
pub mod initial;
pub mod rating;
pub mod score;
pub mod suspicion;
pub mod tier;
pub mod weights;

#[cfg(test)]
mod proptests;

pub use decay::DecayConfig;
pub use error::{ReputationError, Result};
pub use evaluator::{LocalEvaluator, TrustEvaluator};
pub use flooding::{evaluate_flooding, FloodAssessment, FloodRisk, FloodTracker, FloodingConfig};
pub use fusion::{centrality_score, direct_trust, fuse_trust, FusionConfig, TrustOutcome, TrustRequest};
pub use initial::{
    admit, assign_initial_trust, calculate_initial_trust, Admission, AdmissionDecision,
    AdmissionPolicy, DeviceHistory,
};
pub use rating::{
    aggregate_indirect, detect_dishonest_rating, judge_evaluation, validate_score, Dishonesty,
    EvaluationVerdict, IndirectEvidence, PeerEvaluation, RatingConfig,
};
pub use score::{TrustScore, TRUST_THRESHOLD};
pub use suspicion::{SuspicionEntry, SuspicionKind, SuspicionRecord};
pub use tier::{classify, ReputationTier};
pub use weights::{computing_weight, memory_weight, DeviceType, OwnershipType};
