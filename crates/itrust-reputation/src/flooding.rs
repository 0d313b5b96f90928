//! Connection flooding detection.
//!
//! A device that opens more connections inside the sliding window than its
//! role allows is penalized in proportion to the overflow. The coordinator
//! legitimately talks to everyone, so its allowance is twice a member's.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default sliding window length in seconds.
pub const DEFAULT_WINDOW_SECS: i64 = 60;

/// Longest accepted sliding window in seconds (1 day).
pub const MAX_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Default connection allowance per window for ordinary members.
pub const DEFAULT_MEMBER_THRESHOLD: usize = 12;

/// Default connection allowance per window for the coordinator.
pub const DEFAULT_COORDINATOR_THRESHOLD: usize = 24;

/// Flooding detection configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloodingConfig {
    /// Sliding window length in seconds.
    pub window_secs: i64,
    /// Allowance for ordinary members.
    pub member_threshold: usize,
    /// Allowance for the coordinator.
    pub coordinator_threshold: usize,
    /// Overflow ratio above which activity is reported as a warning.
    pub warning_ratio: f64,
    /// Penalty applied just above the allowance.
    pub base_penalty: f64,
    /// Additional penalty per unit of overflow ratio above 1.0.
    pub penalty_slope: f64,
    /// Largest penalty for a single check.
    pub max_penalty: f64,
    /// Suspicious-activity count at which a flooding device is flagged.
    pub flag_threshold: u32,
}

impl Default for FloodingConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
            member_threshold: DEFAULT_MEMBER_THRESHOLD,
            coordinator_threshold: DEFAULT_COORDINATOR_THRESHOLD,
            warning_ratio: 0.8,
            base_penalty: 0.05,
            penalty_slope: 0.3,
            max_penalty: 0.2,
            flag_threshold: 2,
        }
    }
}

impl FloodingConfig {
    /// Set the window length.
    #[must_use]
    pub fn with_window_secs(mut self, secs: i64) -> Self {
        self.window_secs = secs;
        self
    }

    /// Set the member and coordinator allowances.
    #[must_use]
    pub fn with_thresholds(mut self, member: usize, coordinator: usize) -> Self {
        self.member_threshold = member;
        self.coordinator_threshold = coordinator;
        self
    }

    /// Set the penalty cap.
    #[must_use]
    pub fn with_max_penalty(mut self, max_penalty: f64) -> Self {
        self.max_penalty = max_penalty;
        self
    }

    /// Allowance for a device in the given role.
    #[must_use]
    pub fn threshold_for(&self, is_coordinator: bool) -> usize {
        if is_coordinator {
            self.coordinator_threshold
        } else {
            self.member_threshold
        }
    }

    /// Window length as a duration, clamped to `0..=MAX_WINDOW_SECS`.
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs.clamp(0, MAX_WINDOW_SECS))
    }
}

/// Severity of a device's connection rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloodRisk {
    /// Comfortably within the allowance.
    Normal,
    /// Close to the allowance, no penalty.
    Warning,
    /// Over the allowance.
    Moderate,
    /// Far over the allowance; penalty capped.
    Severe,
}

impl FloodRisk {
    /// Short name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            FloodRisk::Normal => "normal",
            FloodRisk::Warning => "warning",
            FloodRisk::Moderate => "moderate",
            FloodRisk::Severe => "severe",
        }
    }
}

impl std::fmt::Display for FloodRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of a flooding check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FloodAssessment {
    /// Connections counted in the window.
    pub recent_connections: usize,
    /// Allowance that applied.
    pub threshold: usize,
    /// `recent_connections / threshold`.
    pub overflow_ratio: f64,
    /// Trust penalty to apply.
    pub penalty: f64,
    /// Severity.
    pub risk: FloodRisk,
}

impl FloodAssessment {
    /// Whether the check calls for a penalty.
    #[must_use]
    pub fn is_flooding(&self) -> bool {
        self.penalty > 0.0
    }
}

/// Assess `recent_connections` made inside the window by a device.
#[must_use]
pub fn evaluate_flooding(
    recent_connections: usize,
    is_coordinator: bool,
    config: &FloodingConfig,
) -> FloodAssessment {
    let threshold = config.threshold_for(is_coordinator).max(1);
    let overflow_ratio = recent_connections as f64 / threshold as f64;

    let (penalty, risk) = if overflow_ratio > 1.0 {
        let linear = config.base_penalty + (overflow_ratio - 1.0) * config.penalty_slope;
        if linear >= config.max_penalty {
            (config.max_penalty, FloodRisk::Severe)
        } else {
            (linear, FloodRisk::Moderate)
        }
    } else if overflow_ratio > config.warning_ratio {
        (0.0, FloodRisk::Warning)
    } else {
        (0.0, FloodRisk::Normal)
    };

    FloodAssessment {
        recent_connections,
        threshold,
        overflow_ratio,
        penalty,
        risk,
    }
}

/// Per-device sliding window of connection timestamps.
#[derive(Clone, Debug, Default)]
pub struct FloodTracker {
    window: Duration,
    events: HashMap<String, VecDeque<DateTime<Utc>>>,
}

impl FloodTracker {
    /// Create a tracker with the given window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            events: HashMap::new(),
        }
    }

    /// Record a connection by `device_id` at `at`; returns the count inside the window.
    pub fn record(&mut self, device_id: &str, at: DateTime<Utc>) -> usize {
        let events = self.events.entry(device_id.to_string()).or_default();
        events.push_back(at);
        // A cutoff before the representable range keeps everything.
        if let Some(cutoff) = at.checked_sub_signed(self.window) {
            Self::evict(events, cutoff);
        }
        events.len()
    }

    fn evict(events: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
        while events.front().is_some_and(|at| *at < cutoff) {
            events.pop_front();
        }
    }
}
