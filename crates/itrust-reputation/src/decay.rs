//! Decay of carried-over trust for devices returning to the network.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::score::{clamp_score, round_score, EXTERNAL_BASELINE};

/// Default decay rate per interval. Zero carries trust over unchanged.
pub const DEFAULT_DECAY_RATE: f64 = 0.0;

/// Default decay interval in seconds (1 day).
pub const DEFAULT_DECAY_INTERVAL_SECS: i64 = 24 * 60 * 60;

/// Configuration for rejoin decay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    /// Fraction of the distance to the target removed per interval (0.0-1.0).
    pub decay_rate: f64,
    /// Length of one decay interval in seconds.
    pub decay_interval_secs: i64,
    /// Score that carried trust decays toward.
    pub target_score: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            decay_rate: DEFAULT_DECAY_RATE,
            decay_interval_secs: DEFAULT_DECAY_INTERVAL_SECS,
            target_score: EXTERNAL_BASELINE,
        }
    }
}

impl DecayConfig {
    /// Create a new decay configuration.
    #[must_use]
    pub fn new(decay_rate: f64, decay_interval_secs: i64, target_score: f64) -> Self {
        Self {
            decay_rate: decay_rate.clamp(0.0, 1.0),
            decay_interval_secs: decay_interval_secs.max(1),
            target_score: clamp_score(target_score),
        }
    }

    /// Whether decay is switched off.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.decay_rate <= 0.0
    }

    /// Number of whole intervals between `since` and `now`.
    #[must_use]
    pub fn periods_between(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
        let elapsed = (now - since).num_seconds();
        if elapsed <= 0 {
            return 0;
        }
        let periods = elapsed / self.decay_interval_secs.max(1);
        u32::try_from(periods).unwrap_or(u32::MAX)
    }
}

/// Apply `periods` rounds of decay to a score.
#[must_use]
pub fn apply_decay(current_score: f64, config: &DecayConfig, periods: u32) -> f64 {
    if periods == 0 || config.is_disabled() {
        return current_score;
    }

    let retained = (1.0 - config.decay_rate.clamp(0.0, 1.0))
        .powi(i32::try_from(periods).unwrap_or(i32::MAX));
    let mut score = config.target_score + (current_score - config.target_score) * retained;
    if (score - config.target_score).abs() < 1e-6 {
        score = config.target_score;
    }

    clamp_score(round_score(score))
}

/// Trust for a device that left at `left_at` and rejoins at `now`.
///
/// Without a departure time the score is carried over unchanged.
#[must_use]
pub fn rejoin_score(
    last_score: f64,
    left_at: Option<DateTime<Utc>>,
    config: &DecayConfig,
    now: DateTime<Utc>,
) -> f64 {
    match left_at {
        Some(left_at) => apply_decay(last_score, config, config.periods_between(left_at, now)),
        None => last_score,
    }
}
