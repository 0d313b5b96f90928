//! JSON-lines event log replay.
//!
//! Each non-empty line is one [`Event`]. Lines starting with `#` are
//! comments. Engine refusals are logged and counted; malformed lines abort
//! the replay.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use tracing::{debug, info, warn};

use itrust_core::{
    ConnectionRequest, CoreError, DeviceProfile, NetworkStats, ReputationInfo, TrustEngine,
};
use itrust_reputation::{DeviceType, OwnershipType};

/// One recorded network event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A device joins (or rejoins) the network.
    Register {
        id: String,
        device_type: DeviceType,
        ownership_type: OwnershipType,
        memory_gb: f64,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        location: Option<String>,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// A device leaves voluntarily.
    Leave {
        id: String,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// A connection between two devices.
    Connect {
        source: String,
        target: String,
        success: bool,
        #[serde(default)]
        connection_type: Option<String>,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// A peer rating.
    Rate {
        rater: String,
        rated: String,
        score: f64,
        #[serde(default)]
        comment: Option<String>,
        #[serde(default)]
        at: Option<DateTime<Utc>>,
    },
    /// Operator blacklisting.
    Blacklist { id: String, reason: String },
    /// Explicit coordinator election.
    Elect,
}

impl Event {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Register { .. } => "register",
            Event::Leave { .. } => "leave",
            Event::Connect { .. } => "connect",
            Event::Rate { .. } => "rate",
            Event::Blacklist { .. } => "blacklist",
            Event::Elect => "elect",
        }
    }
}

/// Apply one event to the engine.
pub fn apply(engine: &TrustEngine, event: Event) -> Result<(), CoreError> {
    match event {
        Event::Register {
            id,
            device_type,
            ownership_type,
            memory_gb,
            name,
            location,
            at,
        } => {
            let mut profile = DeviceProfile::new(id, device_type, ownership_type, memory_gb);
            if let Some(name) = name {
                profile = profile.with_name(name);
            }
            if let Some(location) = location {
                profile = profile.with_location(location);
            }
            engine.register_device_at(profile, at.unwrap_or_else(Utc::now))?;
        }
        Event::Leave { id, at } => {
            engine.leave_device_at(&id, at.unwrap_or_else(Utc::now))?;
        }
        Event::Connect {
            source,
            target,
            success,
            connection_type,
            at,
        } => {
            let mut request = ConnectionRequest::new(source, target, success);
            if let Some(connection_type) = connection_type {
                request = request.with_type(connection_type);
            }
            engine.record_connection_at(request, at.unwrap_or_else(Utc::now))?;
        }
        Event::Rate {
            rater,
            rated,
            score,
            comment,
            at,
        } => {
            engine.submit_rating_at(&rater, &rated, score, comment, at.unwrap_or_else(Utc::now))?;
        }
        Event::Blacklist { id, reason } => {
            engine.blacklist_device(&id, &reason)?;
        }
        Event::Elect => {
            engine.elect_coordinator();
        }
    }
    Ok(())
}

/// Outcome of a replay.
#[derive(Clone, Debug, Serialize)]
pub struct ReplaySummary {
    /// Events read.
    pub events: usize,
    /// Events the engine accepted.
    pub applied: usize,
    /// Events the engine refused.
    pub refused: usize,
    /// Final network statistics.
    pub stats: NetworkStats,
    /// Final reputation of every device, ordered by id.
    pub devices: Vec<ReputationInfo>,
}

/// Replay every event from `reader`.
///
/// With `strict`, the first refused event aborts the replay.
pub fn replay<R: BufRead>(engine: &TrustEngine, reader: R, strict: bool) -> Result<ReplaySummary> {
    let mut events = 0;
    let mut applied = 0;
    let mut refused = 0;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("Failed to read line {line_no}"))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let event: Event = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid event on line {line_no}"))?;
        events += 1;
        let kind = event.kind();

        match apply(engine, event) {
            Ok(()) => {
                applied += 1;
                debug!(line = line_no, event = kind, "Event applied");
            }
            Err(err) if strict => bail!("Event on line {line_no} refused: {err}"),
            Err(err) => {
                refused += 1;
                warn!(line = line_no, event = kind, error = %err, "Event refused");
            }
        }
    }

    info!(events, applied, refused, "Replay finished");

    Ok(ReplaySummary {
        events,
        applied,
        refused,
        stats: engine.stats(),
        devices: engine
            .devices()
            .iter()
            .map(|d| d.reputation_info())
            .collect(),
    })
}
