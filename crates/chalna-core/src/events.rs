use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::TimezoneFingerprint;
use crate::countdown::RemainingTime;
use crate::deadline::Deadline;
use crate::sync::{PauseReason, SyncPhase};

/// Every state change in the engine produces an Event.
/// The host renders from them; observers (analytics, milestones) consume them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        life_expectancy_years: u32,
        deadline: Deadline,
        at: DateTime<Utc>,
    },
    TimerStopped {
        at: DateTime<Utc>,
    },
    /// The breakdown differs from the previous calculation.
    CountdownUpdated {
        remaining: RemainingTime,
        at: DateTime<Utc>,
    },
    /// The deadline was crossed. Emitted once per crossing.
    TimeExpired {
        deadline: Deadline,
        at: DateTime<Utc>,
    },
    CountdownPaused {
        reason: PauseReason,
        at: DateTime<Utc>,
    },
    /// Ticking resumed after a pause; `paused_ms` is the reconciled gap.
    CountdownResumed {
        paused_ms: i64,
        at: DateTime<Utc>,
    },
    TimezoneChanged {
        previous: TimezoneFingerprint,
        current: TimezoneFingerprint,
        at: DateTime<Utc>,
    },
    MilestoneReached {
        id: String,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: SyncPhase,
        is_active: bool,
        deadline: Option<Deadline>,
        remaining: RemainingTime,
        expired: bool,
        at: DateTime<Utc>,
    },
}
