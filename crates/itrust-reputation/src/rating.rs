//! Peer rating validation.
//!
//! Ratings are judged twice. When submitted, a rating is compared against the
//! last connection between rater and rated device to catch badmouthing and
//! collusion as they happen. When trust is recomputed, every recent rating is
//! re-judged against the connection that preceded it and the rater's current
//! tier, and only the ones that survive contribute indirect trust.

use serde::{Deserialize, Serialize};

use crate::error::{ReputationError, Result};
use crate::tier::ReputationTier;

/// Ratings at or above this value count as positive.
pub const POSITIVE_RATING: f64 = 0.5;

/// Reject scores outside `[0.0, 1.0]`.
pub fn validate_score(score: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&score) {
        Ok(score)
    } else {
        Err(ReputationError::InvalidScore(score))
    }
}

/// One peer's rating of a device, paired with the outcome of the connection
/// that preceded it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerEvaluation {
    /// Score given by the rater.
    pub rating_score: f64,
    /// Whether the connection before the rating succeeded.
    pub interaction_was_successful: bool,
    /// Current tier of the rater.
    pub rater_tier: ReputationTier,
}

/// Verdict on a single peer evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationVerdict {
    /// Consistent with the interaction outcome.
    Accepted,
    /// Rater is blacklisted or very suspicious.
    DiscardedRater,
    /// Negative rating after a successful interaction with a reputable device.
    Badmouthing,
    /// Positive rating after a failed interaction.
    Collusion,
}

impl EvaluationVerdict {
    /// Whether the rating counts toward indirect trust.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, EvaluationVerdict::Accepted)
    }
}

/// Judge a peer evaluation of a device currently in `rated_tier`.
#[must_use]
pub fn judge_evaluation(evaluation: &PeerEvaluation, rated_tier: ReputationTier) -> EvaluationVerdict {
    if evaluation.rater_tier.is_unreliable_rater() {
        return EvaluationVerdict::DiscardedRater;
    }

    let positive = evaluation.rating_score >= POSITIVE_RATING;
    match (positive, evaluation.interaction_was_successful) {
        (true, true) | (false, false) => EvaluationVerdict::Accepted,
        (false, true) if rated_tier.warrants_criticism() => EvaluationVerdict::Accepted,
        (false, true) => EvaluationVerdict::Badmouthing,
        (true, false) => EvaluationVerdict::Collusion,
    }
}

/// Indirect trust gathered from peer evaluations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum IndirectEvidence {
    /// No evaluations exist.
    ColdStart,
    /// Evaluations exist but none were accepted.
    NoValidEvidence,
    /// Mean of the accepted rating scores.
    Valid(f64),
}

impl IndirectEvidence {
    /// The indirect trust value, if any rating was accepted.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            IndirectEvidence::Valid(value) => Some(*value),
            _ => None,
        }
    }
}

/// Aggregate peer evaluations into indirect trust.
#[must_use]
pub fn aggregate_indirect(evaluations: &[PeerEvaluation], rated_tier: ReputationTier) -> IndirectEvidence {
    if evaluations.is_empty() {
        return IndirectEvidence::ColdStart;
    }

    let accepted: Vec<f64> = evaluations
        .iter()
        .filter(|e| judge_evaluation(e, rated_tier).is_accepted())
        .map(|e| e.rating_score)
        .collect();

    if accepted.is_empty() {
        IndirectEvidence::NoValidEvidence
    } else {
        IndirectEvidence::Valid(accepted.iter().sum::<f64>() / accepted.len() as f64)
    }
}

/// Submission-time rating rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Scores below this after a successful connection are badmouthing.
    pub badmouthing_below: f64,
    /// Scores above this after a failed connection are collusion.
    pub collusion_above: f64,
    /// Trust removed from a dishonest rater.
    pub penalty: f64,
    /// Suspicious-activity count at which a rater is flagged.
    pub flag_threshold: u32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            badmouthing_below: 0.4,
            collusion_above: 0.6,
            penalty: 0.15,
            flag_threshold: 3,
        }
    }
}

/// Kind of dishonest rating caught at submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dishonesty {
    /// Low score after a successful connection.
    Badmouthing,
    /// High score after a failed connection.
    Collusion,
}

impl Dishonesty {
    /// Short name used in logs and suspicion records.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Dishonesty::Badmouthing => "badmouthing",
            Dishonesty::Collusion => "collusion",
        }
    }
}

impl std::fmt::Display for Dishonesty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Check a new rating against the last connection between rater and rated.
///
/// `last_connection_success` is `None` when the two never connected, in which
/// case no judgement is made. Criticism of a device that is already flagged or
/// blacklisted is never treated as badmouthing.
#[must_use]
pub fn detect_dishonest_rating(
    score: f64,
    last_connection_success: Option<bool>,
    rated_under_suspicion: bool,
    config: &RatingConfig,
) -> Option<Dishonesty> {
    match last_connection_success? {
        true if score < config.badmouthing_below && !rated_under_suspicion => {
            Some(Dishonesty::Badmouthing)
        }
        false if score > config.collusion_above => Some(Dishonesty::Collusion),
        _ => None,
    }
}
