//! Suspicious-activity bookkeeping per device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::rating::Dishonesty;

/// Maximum number of reasons retained per device.
pub const MAX_SUSPICION_REASONS: usize = 10;

/// Kind of suspicious activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionKind {
    /// Too many connections in the window.
    Flooding,
    /// Unjustified low rating.
    Badmouthing,
    /// Unjustified high rating.
    Collusion,
}

impl SuspicionKind {
    /// Short name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SuspicionKind::Flooding => "flooding",
            SuspicionKind::Badmouthing => "badmouthing",
            SuspicionKind::Collusion => "collusion",
        }
    }
}

impl From<Dishonesty> for SuspicionKind {
    fn from(dishonesty: Dishonesty) -> Self {
        match dishonesty {
            Dishonesty::Badmouthing => SuspicionKind::Badmouthing,
            Dishonesty::Collusion => SuspicionKind::Collusion,
        }
    }
}

impl std::fmt::Display for SuspicionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One recorded suspicious event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuspicionEntry {
    /// What happened.
    pub kind: SuspicionKind,
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Free-form details.
    pub details: String,
}

/// Suspicion counters and the bounded log of recent reasons.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SuspicionRecord {
    count: u32,
    flagged: bool,
    last_activity: Option<DateTime<Utc>>,
    reasons: VecDeque<SuspicionEntry>,
}

impl SuspicionRecord {
    /// Empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event. The device is flagged once the count reaches
    /// `flag_threshold`; returns `true` if this call set the flag.
    pub fn record(
        &mut self,
        kind: SuspicionKind,
        details: impl Into<String>,
        at: DateTime<Utc>,
        flag_threshold: u32,
    ) -> bool {
        self.count = self.count.saturating_add(1);
        self.last_activity = Some(at);
        if self.reasons.len() == MAX_SUSPICION_REASONS {
            self.reasons.pop_front();
        }
        self.reasons.push_back(SuspicionEntry {
            kind,
            at,
            details: details.into(),
        });

        if !self.flagged && self.count >= flag_threshold {
            self.flagged = true;
            return true;
        }
        false
    }

    /// Flag the device regardless of its count.
    pub fn flag(&mut self) {
        self.flagged = true;
    }

    /// Number of suspicious events ever recorded.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Whether the device is flagged.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.flagged
    }

    /// Time of the latest suspicious event.
    #[must_use]
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    /// Retained reasons, oldest first.
    pub fn reasons(&self) -> impl Iterator<Item = &SuspicionEntry> {
        self.reasons.iter()
    }

    /// Kinds of the `n` most recent events, oldest first.
    #[must_use]
    pub fn recent_kinds(&self, n: usize) -> Vec<SuspicionKind> {
        let skip = self.reasons.len().saturating_sub(n);
        self.reasons.iter().skip(skip).map(|e| e.kind).collect()
    }
}
