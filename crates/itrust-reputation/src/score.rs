//! Trust score value type and global trust limits.

use serde::{Deserialize, Serialize};

/// Trust score limits and thresholds.
pub mod limits {
    /// Lowest possible trust score.
    pub const TRUST_MIN: f64 = 0.0;

    /// Highest possible trust score.
    pub const TRUST_MAX: f64 = 1.0;

    /// Devices whose trust falls below this are blacklisted.
    pub const TRUST_THRESHOLD: f64 = 0.3;

    /// Starting trust for devices outside the operator's control.
    pub const EXTERNAL_BASELINE: f64 = 0.5;

    /// Scores are rounded to this many decimal places.
    pub const SCORE_DECIMALS: i32 = 3;
}

pub use limits::*;

/// Round a score to [`SCORE_DECIMALS`] decimal places.
#[must_use]
pub fn round_score(value: f64) -> f64 {
    let factor = 10f64.powi(SCORE_DECIMALS);
    (value * factor).round() / factor
}

/// Clamp a raw value into the trust range. NaN collapses to the minimum.
#[must_use]
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        TRUST_MIN
    } else {
        value.clamp(TRUST_MIN, TRUST_MAX)
    }
}

/// A trust score, always within `[0.0, 1.0]`.
///
/// Every constructor and mutator clamps, so a `TrustScore` can never hold an
/// out-of-range value regardless of what arithmetic produced it.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct TrustScore(f64);

impl TrustScore {
    /// Create a score, clamping into range.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(clamp_score(value))
    }

    /// The raw score value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.0
    }

    /// Subtract a penalty, flooring at [`TRUST_MIN`]. Returns the amount actually removed.
    pub fn penalize(&mut self, amount: f64) -> f64 {
        let before = self.0;
        self.0 = clamp_score(round_score(self.0 - amount.max(0.0))).min(before);
        before - self.0
    }

    /// Replace the score, clamping into range.
    pub fn set(&mut self, value: f64) {
        self.0 = clamp_score(value);
    }

    /// Whether the score is below `threshold`.
    #[must_use]
    pub fn is_below(&self, threshold: f64) -> bool {
        self.0 < threshold
    }
}

impl From<f64> for TrustScore {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<TrustScore> for f64 {
    fn from(score: TrustScore) -> Self {
        score.0
    }
}

impl std::fmt::Display for TrustScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}
