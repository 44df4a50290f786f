//! Countdown engine implementation.
//!
//! The engine is a pure state holder: it keeps the deadline, the last
//! breakdown it produced and an expiry latch. It has no timer of its own;
//! the [`TickScheduler`](crate::scheduler::TickScheduler) decides when
//! `recompute()` runs.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CountdownEngine::new(crash_reporter);
//! engine.set_deadline(Some(deadline));
//! // Once per tick:
//! if let Some(event) = engine.recompute(clock.now()) { /* render */ }
//! ```

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::remaining::{compute_remaining, Countdown, RemainingTime};
use crate::clock::Moment;
use crate::crash::CrashReporter;
use crate::deadline::Deadline;
use crate::events::Event;

/// A deadline a fixed number of minutes after `armed_at`.
///
/// Used by the developer test mode to watch milestones and expiry play out
/// in minutes rather than decades.
pub fn test_mode_deadline(armed_at: NaiveDateTime, minutes: u32) -> Deadline {
    Deadline::new(armed_at + Duration::minutes(i64::from(minutes)))
}

/// Hook deciding which deadline the engine counts towards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeadlineOverride {
    /// Count towards the real, calculated deadline.
    #[default]
    None,
    /// Count towards `minutes` after the moment the hook was armed.
    FixedOffsetFromArming { minutes: u32 },
}

impl DeadlineOverride {
    pub fn from_test_mode(enabled: bool, minutes: u32) -> Self {
        if enabled {
            Self::FixedOffsetFromArming { minutes }
        } else {
            Self::None
        }
    }

    /// Resolve the hook into a concrete override deadline.
    pub fn arm(&self, armed_at: NaiveDateTime) -> Option<Deadline> {
        match *self {
            Self::None => None,
            Self::FixedOffsetFromArming { minutes } => Some(test_mode_deadline(armed_at, minutes)),
        }
    }
}

/// Core countdown engine.
pub struct CountdownEngine {
    crash: Arc<dyn CrashReporter>,
    deadline: Option<Deadline>,
    /// Replaces `deadline` while set.
    override_deadline: Option<Deadline>,
    last: Option<RemainingTime>,
    /// Set once `TimeExpired` has been emitted for the current crossing.
    expired: bool,
}

impl CountdownEngine {
    pub fn new(crash: Arc<dyn CrashReporter>) -> Self {
        Self {
            crash,
            deadline: None,
            override_deadline: None,
            last: None,
            expired: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// The deadline actually counted towards, honouring the override hook.
    pub fn effective_deadline(&self) -> Option<Deadline> {
        self.override_deadline.or(self.deadline)
    }

    pub fn has_override(&self) -> bool {
        self.override_deadline.is_some()
    }

    /// Last computed breakdown, or zero if nothing has been computed yet.
    pub fn remaining(&self) -> RemainingTime {
        self.last.unwrap_or(RemainingTime::ZERO)
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Replace the calculated deadline. A different deadline clears the
    /// previous breakdown and the expiry latch.
    pub fn set_deadline(&mut self, deadline: Option<Deadline>) {
        if self.deadline != deadline {
            self.deadline = deadline;
            self.invalidate();
        }
    }

    /// Install or remove the deadline override hook.
    pub fn set_override(&mut self, deadline: Option<Deadline>) {
        if self.override_deadline != deadline {
            self.override_deadline = deadline;
            self.invalidate();
        }
    }

    /// Forget the last breakdown so the next `recompute` always reports.
    pub fn invalidate(&mut self) {
        self.last = None;
        self.expired = false;
    }

    /// Recalculate against `now`.
    ///
    /// Returns `CountdownUpdated` when the breakdown changed, `TimeExpired`
    /// on the first calculation at or past the deadline, and `None` when
    /// nothing changed. Calculation failures are reported and degrade to an
    /// all-zero breakdown.
    pub fn recompute(&mut self, now: Moment) -> Option<Event> {
        let deadline = self.effective_deadline()?;

        match compute_remaining(deadline, now.local) {
            Ok(Countdown::Expired) => {
                self.last = Some(RemainingTime::ZERO);
                if self.expired {
                    return None;
                }
                self.expired = true;
                tracing::info!(%deadline, "deadline reached");
                Some(Event::TimeExpired {
                    deadline,
                    at: now.utc,
                })
            }
            Ok(Countdown::Remaining(remaining)) => {
                self.expired = false;
                self.publish(remaining, now)
            }
            Err(err) => {
                tracing::error!(error = %err, %deadline, "countdown calculation failed");
                self.crash.report_crash("countdown", &err);
                self.publish(RemainingTime::ZERO, now)
            }
        }
    }

    fn publish(&mut self, remaining: RemainingTime, now: Moment) -> Option<Event> {
        if self.last == Some(remaining) {
            return None;
        }
        self.last = Some(remaining);
        Some(Event::CountdownUpdated {
            remaining,
            at: now.utc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::crash::MemoryCrashReporter;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn engine() -> CountdownEngine {
        CountdownEngine::new(Arc::new(MemoryCrashReporter::new()))
    }

    #[test]
    fn no_deadline_no_event() {
        let mut engine = engine();
        let clock = ManualClock::utc(at(2024, 1, 1, 0, 0, 0));
        assert!(engine.recompute(clock.now()).is_none());
        assert!(engine.remaining().is_zero());
    }

    #[test]
    fn unchanged_breakdown_is_silent() {
        let mut engine = engine();
        engine.set_deadline(Some(Deadline::new(at(2080, 1, 1, 0, 0, 0))));
        let clock = ManualClock::utc(at(2024, 1, 1, 12, 0, 0));
        clock.advance(Duration::milliseconds(500));

        assert!(matches!(
            engine.recompute(clock.now()),
            Some(Event::CountdownUpdated { .. })
        ));
        assert!(engine.recompute(clock.now()).is_none());

        clock.advance(Duration::milliseconds(400));
        assert!(engine.recompute(clock.now()).is_none());

        clock.advance(Duration::seconds(1));
        assert!(engine.recompute(clock.now()).is_some());
    }

    #[test]
    fn expiry_signalled_once_per_crossing() {
        let mut engine = engine();
        engine.set_deadline(Some(Deadline::new(at(2030, 1, 1, 0, 0, 0))));
        let clock = ManualClock::utc(at(2029, 12, 31, 23, 59, 59));

        assert!(matches!(engine.recompute(clock.now()), Some(Event::CountdownUpdated { .. })));
        clock.advance(Duration::seconds(1));
        assert!(matches!(engine.recompute(clock.now()), Some(Event::TimeExpired { .. })));
        assert!(engine.is_expired());
        clock.advance(Duration::seconds(1));
        assert!(engine.recompute(clock.now()).is_none());
        assert!(engine.remaining().is_zero());

        // Wall clock moved back before the deadline (zone change), then forward again.
        clock.set_zone("Pacific/Honolulu", -600);
        assert!(matches!(engine.recompute(clock.now()), Some(Event::CountdownUpdated { .. })));
        assert!(!engine.is_expired());
        clock.set_zone("UTC", 0);
        assert!(matches!(engine.recompute(clock.now()), Some(Event::TimeExpired { .. })));
    }

    #[test]
    fn override_replaces_deadline() {
        let mut engine = engine();
        engine.set_deadline(Some(Deadline::new(at(2080, 1, 1, 0, 0, 0))));
        let clock = ManualClock::utc(at(2024, 1, 1, 12, 0, 0));

        let hook = DeadlineOverride::from_test_mode(true, 5);
        engine.set_override(hook.arm(clock.now().local));
        match engine.recompute(clock.now()) {
            Some(Event::CountdownUpdated { remaining, .. }) => {
                assert_eq!(
                    remaining,
                    RemainingTime { years: 0, months: 0, days: 0, hours: 0, minutes: 5, seconds: 0 }
                );
            }
            other => panic!("expected update, got {other:?}"),
        }

        engine.set_override(DeadlineOverride::None.arm(clock.now().local));
        assert_eq!(engine.effective_deadline(), engine.deadline());
        let event = engine.recompute(clock.now());
        assert!(matches!(event, Some(Event::CountdownUpdated { remaining, .. }) if remaining.years == 55));
    }
}
