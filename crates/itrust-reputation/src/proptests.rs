//! Property-based tests for the trust formulas.
//!
//! These tests verify scoring invariants:
//!
//! - Fused trust always lands in `[0, 1]`
//! - The blacklist decision agrees with the threshold
//! - Tier precedence holds for every flag combination
//! - Flooding penalties are bounded and never harsher for the coordinator

use proptest::prelude::*;

use crate::flooding::{evaluate_flooding, FloodingConfig};
use crate::fusion::{centrality_score, fuse_trust, FusionConfig, TrustRequest};
use crate::initial::calculate_initial_trust;
use crate::rating::{aggregate_indirect, PeerEvaluation};
use crate::score::TrustScore;
use crate::tier::{classify, ReputationTier};
use crate::weights::{DeviceType, OwnershipType};

fn tier_strategy() -> impl Strategy<Value = ReputationTier> {
    prop::sample::select(ReputationTier::ALL.to_vec())
}

fn evaluation_strategy() -> impl Strategy<Value = PeerEvaluation> {
    (0.0f64..=1.0, any::<bool>(), tier_strategy()).prop_map(|(score, success, tier)| {
        PeerEvaluation {
            rating_score: score,
            interaction_was_successful: success,
            rater_tier: tier,
        }
    })
}

fn device_type_strategy() -> impl Strategy<Value = DeviceType> {
    prop::sample::select(vec![
        DeviceType::Rsu,
        DeviceType::Computer,
        DeviceType::Smartphone,
        DeviceType::SmartDevice,
        DeviceType::Sensor,
        DeviceType::Rfid,
        DeviceType::Other("Drone".into()),
    ])
}

// ==================== Fusion Property Tests ====================

proptest! {
    /// Updated trust is always a valid score.
    #[test]
    fn fused_trust_in_range(
        last in 0.0f64..=1.0,
        success in any::<bool>(),
        evaluations in prop::collection::vec(evaluation_strategy(), 0..30),
        rated_tier in tier_strategy(),
        centrality_raw in 0usize..500,
    ) {
        let outcome = fuse_trust(
            &TrustRequest {
                last_trust: last,
                success,
                peer_evaluations: evaluations,
                rated_tier,
                centrality_raw,
            },
            &FusionConfig::default(),
        );
        prop_assert!((0.0..=1.0).contains(&outcome.updated_trust));
        prop_assert!((0.0..=1.0).contains(&outcome.centrality_score));
    }

    /// The blacklist decision is exactly "below threshold".
    #[test]
    fn blacklist_matches_threshold(
        last in 0.0f64..=1.0,
        success in any::<bool>(),
        centrality_raw in 0usize..200,
    ) {
        let config = FusionConfig::default();
        let outcome = fuse_trust(
            &TrustRequest {
                last_trust: last,
                success,
                peer_evaluations: Vec::new(),
                rated_tier: ReputationTier::from_trust(last),
                centrality_raw,
            },
            &config,
        );
        prop_assert_eq!(outcome.blacklisted, outcome.updated_trust < config.threshold);
    }

    /// Centrality never decreases as partners are added.
    #[test]
    fn centrality_monotonic(n in 0usize..300) {
        let config = FusionConfig::default();
        prop_assert!(centrality_score(n + 1, &config) >= centrality_score(n, &config));
    }

    /// Indirect trust, when present, is a mean of valid scores.
    #[test]
    fn indirect_trust_in_range(
        evaluations in prop::collection::vec(evaluation_strategy(), 1..30),
        rated_tier in tier_strategy(),
    ) {
        if let Some(value) = aggregate_indirect(&evaluations, rated_tier).value() {
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }
}

// ==================== Classification Property Tests ====================

proptest! {
    /// Blacklisting dominates every other input.
    #[test]
    fn blacklisted_always_blacklisted_tier(
        trust in 0.0f64..=1.0,
        flagged in any::<bool>(),
        count in 0u32..50,
    ) {
        prop_assert_eq!(classify(trust, true, flagged, count), ReputationTier::Blacklisted);
    }

    /// Flagged devices never land in a trust band.
    #[test]
    fn flagged_devices_are_suspicious(trust in 0.0f64..=1.0, count in 0u32..50) {
        let tier = classify(trust, false, true, count);
        prop_assert!(matches!(tier, ReputationTier::Suspicious | ReputationTier::VerySuspicious));
    }

    /// Unflagged devices are classified by trust alone.
    #[test]
    fn unflagged_devices_use_trust_bands(trust in 0.0f64..=1.0, count in 0u32..50) {
        prop_assert_eq!(classify(trust, false, false, count), ReputationTier::from_trust(trust));
    }
}

// ==================== Initial Trust and Penalty Property Tests ====================

proptest! {
    /// Internal devices start between 0.6 and 1.0; external devices at 0.5.
    #[test]
    fn initial_trust_bounds(device_type in device_type_strategy(), memory in 0.0f64..1024.0) {
        let internal = calculate_initial_trust(OwnershipType::Internal, &device_type, memory);
        prop_assert!((0.6..=1.0).contains(&internal));
        let external = calculate_initial_trust(OwnershipType::External, &device_type, memory);
        prop_assert_eq!(external, 0.5);
    }

    /// Penalties never push a score out of range.
    #[test]
    fn penalty_keeps_range(start in 0.0f64..=1.0, penalty in 0.0f64..2.0) {
        let mut score = TrustScore::new(start);
        score.penalize(penalty);
        prop_assert!((0.0..=1.0).contains(&score.value()));
        prop_assert!(score.value() <= start);
    }

    /// Flooding penalties are bounded and the coordinator is never punished harder.
    #[test]
    fn flooding_penalty_bounds(count in 0usize..500) {
        let config = FloodingConfig::default();
        let member = evaluate_flooding(count, false, &config);
        let coordinator = evaluate_flooding(count, true, &config);
        prop_assert!(member.penalty >= 0.0 && member.penalty <= config.max_penalty);
        prop_assert!(coordinator.penalty <= member.penalty);
    }
}
