//! Reputation tiers derived from trust and suspicion state.

use serde::{Deserialize, Serialize};

/// Tier thresholds and flag counts.
pub mod thresholds {
    /// Minimum trust for the Excellent tier.
    pub const EXCELLENT: f64 = 0.8;
    /// Minimum trust for the Good tier.
    pub const GOOD: f64 = 0.6;
    /// Minimum trust for the Average tier.
    pub const AVERAGE: f64 = 0.4;
    /// Suspicious-activity count at which a flagged device becomes very suspicious.
    pub const VERY_SUSPICIOUS_COUNT: u32 = 5;
}

use thresholds::*;

/// Reputation tier of a device.
///
/// Precedence, highest first: Blacklisted, VerySuspicious, Suspicious, then
/// the trust bands Excellent, Good, Average, Poor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReputationTier {
    /// Permanently excluded.
    Blacklisted,
    /// Flagged with repeated suspicious activity.
    VerySuspicious,
    /// Flagged.
    Suspicious,
    /// Trust >= 0.8.
    Excellent,
    /// Trust >= 0.6.
    Good,
    /// Trust >= 0.4.
    Average,
    /// Trust < 0.4.
    Poor,
}

impl ReputationTier {
    /// All tiers in precedence order.
    pub const ALL: [ReputationTier; 7] = [
        ReputationTier::Blacklisted,
        ReputationTier::VerySuspicious,
        ReputationTier::Suspicious,
        ReputationTier::Excellent,
        ReputationTier::Good,
        ReputationTier::Average,
        ReputationTier::Poor,
    ];

    /// Tier for a trust value alone, ignoring flags.
    #[must_use]
    pub fn from_trust(trust: f64) -> Self {
        if trust >= EXCELLENT {
            ReputationTier::Excellent
        } else if trust >= GOOD {
            ReputationTier::Good
        } else if trust >= AVERAGE {
            ReputationTier::Average
        } else {
            ReputationTier::Poor
        }
    }

    /// Wire name of the tier.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ReputationTier::Blacklisted => "BLACKLISTED",
            ReputationTier::VerySuspicious => "VERY_SUSPICIOUS",
            ReputationTier::Suspicious => "SUSPICIOUS",
            ReputationTier::Excellent => "EXCELLENT",
            ReputationTier::Good => "GOOD",
            ReputationTier::Average => "AVERAGE",
            ReputationTier::Poor => "POOR",
        }
    }

    /// Ratings from a device in this tier are ignored.
    #[must_use]
    pub fn is_unreliable_rater(&self) -> bool {
        matches!(
            self,
            ReputationTier::Blacklisted | ReputationTier::VerySuspicious
        )
    }

    /// Criticism of a device in this tier is plausible even after a
    /// successful interaction.
    #[must_use]
    pub fn warrants_criticism(&self) -> bool {
        matches!(
            self,
            ReputationTier::Poor | ReputationTier::Suspicious | ReputationTier::Blacklisted
        )
    }
}

impl std::fmt::Display for ReputationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Classify a device.
#[must_use]
pub fn classify(trust: f64, blacklisted: bool, flagged: bool, suspicious_count: u32) -> ReputationTier {
    if blacklisted {
        ReputationTier::Blacklisted
    } else if flagged && suspicious_count >= VERY_SUSPICIOUS_COUNT {
        ReputationTier::VerySuspicious
    } else if flagged {
        ReputationTier::Suspicious
    } else {
        ReputationTier::from_trust(trust)
    }
}
