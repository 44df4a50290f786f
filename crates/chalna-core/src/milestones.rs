//! One-time milestones over usage time and user actions.
//!
//! The tracker owns a [`MilestoneLedger`] (persisted under
//! `death_clock_milestones`) and answers, on each [`check`](MilestoneTracker::check),
//! which milestones were newly reached. Every milestone fires at most once,
//! except the daily reminder which fires at 23:59 once per calendar day.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Moment;
use crate::events::Event;

/// User actions milestones count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    TimerStart,
    ThemeChange,
    DataExport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    /// Hours since first use.
    Usage { hours: f64 },
    Action { action: Action, count: u32 },
    /// 23:59 local, once per day.
    Daily,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub id: &'static str,
    pub trigger: Trigger,
    pub priority: Priority,
}

const fn usage(id: &'static str, hours: f64, priority: Priority) -> Milestone {
    Milestone {
        id,
        trigger: Trigger::Usage { hours },
        priority,
    }
}

const fn action(id: &'static str, action: Action, count: u32, priority: Priority) -> Milestone {
    Milestone {
        id,
        trigger: Trigger::Action { action, count },
        priority,
    }
}

const DEFAULT_MILESTONES: &[Milestone] = &[
    action("first_start", Action::TimerStart, 1, Priority::High),
    usage("one_hour_usage", 1.0, Priority::High),
    usage("one_day_usage", 24.0, Priority::High),
    usage("one_week_usage", 168.0, Priority::Medium),
    usage("one_month_usage", 720.0, Priority::Medium),
    usage("three_months_usage", 2160.0, Priority::Low),
    action("timer_10_starts", Action::TimerStart, 10, Priority::Medium),
    action("first_theme_change", Action::ThemeChange, 1, Priority::Low),
    action("first_data_export", Action::DataExport, 1, Priority::Low),
    Milestone {
        id: "daily_reminder",
        trigger: Trigger::Daily,
        priority: Priority::Medium,
    },
];

const TEST_MILESTONES: &[Milestone] = &[
    action("test_first_start", Action::TimerStart, 1, Priority::High),
    usage("test_5_minutes_usage", 0.08, Priority::Medium),
];

/// The milestone set for the given mode.
pub fn default_milestones(test_mode: bool) -> &'static [Milestone] {
    if test_mode {
        TEST_MILESTONES
    } else {
        DEFAULT_MILESTONES
    }
}

/// Persisted progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneLedger {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub test_mode: bool,
    pub app_start_time: DateTime<Utc>,
    #[serde(default)]
    pub timer_start_count: u32,
    #[serde(default)]
    pub theme_change_count: u32,
    #[serde(default)]
    pub export_count: u32,
    #[serde(default)]
    pub last_daily_notification: Option<NaiveDate>,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub triggered: BTreeSet<String>,
}

fn default_true() -> bool {
    true
}

impl MilestoneLedger {
    pub fn new(app_start_time: DateTime<Utc>) -> Self {
        Self {
            enabled: true,
            test_mode: false,
            app_start_time,
            timer_start_count: 0,
            theme_change_count: 0,
            export_count: 0,
            last_daily_notification: None,
            last_checked: None,
            triggered: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    /// Rounded to two decimals.
    pub hours_used: f64,
    pub timer_starts: u32,
    pub theme_changes: u32,
    pub exports: u32,
}

pub struct MilestoneTracker {
    ledger: MilestoneLedger,
}

impl MilestoneTracker {
    pub fn new(ledger: MilestoneLedger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &MilestoneLedger {
        &self.ledger
    }

    pub fn milestones(&self) -> &'static [Milestone] {
        default_milestones(self.ledger.test_mode)
    }

    /// Milestones that have not fired yet. The daily reminder is always upcoming.
    pub fn upcoming(&self) -> Vec<&'static Milestone> {
        self.milestones()
            .iter()
            .filter(|m| !self.ledger.triggered.contains(m.id))
            .collect()
    }

    pub fn record(&mut self, action: Action) {
        let counter = match action {
            Action::TimerStart => &mut self.ledger.timer_start_count,
            Action::ThemeChange => &mut self.ledger.theme_change_count,
            Action::DataExport => &mut self.ledger.export_count,
        };
        *counter = counter.saturating_add(1);
    }

    /// Feed an engine event. Only `TimerStarted` counts.
    pub fn observe(&mut self, event: &Event) {
        if let Event::TimerStarted { .. } = event {
            self.record(Action::TimerStart);
        }
    }

    /// Newly reached milestones as of `now`. Returns an empty list while disabled.
    pub fn check(&mut self, now: Moment) -> Vec<&'static Milestone> {
        if !self.ledger.enabled {
            return Vec::new();
        }

        let hours_used = self.hours_used(now.utc);
        let today = now.local.date();
        let mut reached = Vec::new();

        for milestone in self.milestones() {
            if self.ledger.triggered.contains(milestone.id) {
                continue;
            }
            let hit = match milestone.trigger {
                Trigger::Usage { hours } => hours_used >= hours,
                Trigger::Action { action, count } => self.count(action) >= count,
                Trigger::Daily => {
                    now.local.hour() == 23
                        && now.local.minute() == 59
                        && self.ledger.last_daily_notification != Some(today)
                }
            };
            if !hit {
                continue;
            }
            match milestone.trigger {
                Trigger::Daily => self.ledger.last_daily_notification = Some(today),
                _ => {
                    self.ledger.triggered.insert(milestone.id.to_string());
                }
            }
            tracing::info!(id = milestone.id, "milestone reached");
            reached.push(milestone);
        }

        if !reached.is_empty() {
            self.ledger.last_checked = Some(now.utc);
        }
        reached
    }

    pub fn toggle_enabled(&mut self) -> bool {
        self.ledger.enabled = !self.ledger.enabled;
        self.ledger.enabled
    }

    /// Switch between the real and the test milestone set. Progress on the
    /// previous set is discarded.
    pub fn toggle_test_mode(&mut self) -> bool {
        self.ledger.test_mode = !self.ledger.test_mode;
        self.ledger.triggered.clear();
        self.ledger.test_mode
    }

    /// Make every milestone eligible again. Counters are kept.
    pub fn reset(&mut self) {
        self.ledger.triggered.clear();
        self.ledger.last_daily_notification = None;
    }

    pub fn usage_stats(&self, now: DateTime<Utc>) -> UsageStats {
        UsageStats {
            hours_used: (self.hours_used(now) * 100.0).round() / 100.0,
            timer_starts: self.ledger.timer_start_count,
            theme_changes: self.ledger.theme_change_count,
            exports: self.ledger.export_count,
        }
    }

    fn count(&self, action: Action) -> u32 {
        match action {
            Action::TimerStart => self.ledger.timer_start_count,
            Action::ThemeChange => self.ledger.theme_change_count,
            Action::DataExport => self.ledger.export_count,
        }
    }

    fn hours_used(&self, now: DateTime<Utc>) -> f64 {
        let ms = (now - self.ledger.app_start_time).num_milliseconds().max(0);
        ms as f64 / 3_600_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::{Duration, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn tracker(clock: &ManualClock) -> MilestoneTracker {
        MilestoneTracker::new(MilestoneLedger::new(clock.now().utc))
    }

    fn ids(reached: &[&Milestone]) -> Vec<&'static str> {
        reached.iter().map(|m| m.id).collect()
    }

    #[test]
    fn action_milestones_fire_once() {
        let clock = ManualClock::utc(start());
        let mut tracker = tracker(&clock);
        assert!(tracker.check(clock.now()).is_empty());

        tracker.record(Action::TimerStart);
        assert_eq!(ids(&tracker.check(clock.now())), vec!["first_start"]);
        assert!(tracker.check(clock.now()).is_empty());

        for _ in 0..9 {
            tracker.record(Action::TimerStart);
        }
        tracker.record(Action::ThemeChange);
        assert_eq!(
            ids(&tracker.check(clock.now())),
            vec!["timer_10_starts", "first_theme_change"]
        );
    }

    #[test]
    fn usage_milestones_follow_elapsed_hours() {
        let clock = ManualClock::utc(start());
        let mut tracker = tracker(&clock);
        clock.advance(Duration::minutes(59));
        assert!(tracker.check(clock.now()).is_empty());
        clock.advance(Duration::minutes(1));
        assert_eq!(ids(&tracker.check(clock.now())), vec!["one_hour_usage"]);
        clock.advance(Duration::days(8));
        assert_eq!(
            ids(&tracker.check(clock.now())),
            vec!["one_day_usage", "one_week_usage"]
        );
    }

    #[test]
    fn daily_reminder_once_per_day() {
        let clock = ManualClock::utc(start());
        let mut tracker = tracker(&clock);
        tracker.ledger.triggered.insert("one_hour_usage".into());
        tracker.ledger.triggered.insert("one_day_usage".into());

        clock.advance(Duration::hours(11) + Duration::minutes(59));
        assert_eq!(ids(&tracker.check(clock.now())), vec!["daily_reminder"]);
        clock.advance(Duration::seconds(30));
        assert!(tracker.check(clock.now()).is_empty());

        clock.advance(Duration::days(1));
        assert_eq!(ids(&tracker.check(clock.now())), vec!["daily_reminder"]);
    }

    #[test]
    fn test_mode_uses_short_set() {
        let clock = ManualClock::utc(start());
        let mut tracker = tracker(&clock);
        tracker.record(Action::TimerStart);
        assert!(!tracker.check(clock.now()).is_empty());

        assert!(tracker.toggle_test_mode());
        clock.advance(Duration::minutes(5));
        assert_eq!(
            ids(&tracker.check(clock.now())),
            vec!["test_first_start", "test_5_minutes_usage"]
        );
    }

    #[test]
    fn disabled_and_reset() {
        let clock = ManualClock::utc(start());
        let mut tracker = tracker(&clock);
        tracker.observe(&Event::TimerStopped { at: clock.now().utc });
        assert_eq!(tracker.ledger().timer_start_count, 0);
        tracker.record(Action::DataExport);

        assert!(!tracker.toggle_enabled());
        assert!(tracker.check(clock.now()).is_empty());
        assert!(tracker.toggle_enabled());
        assert_eq!(ids(&tracker.check(clock.now())), vec!["first_data_export"]);

        tracker.reset();
        assert_eq!(ids(&tracker.check(clock.now())), vec!["first_data_export"]);
        assert_eq!(tracker.usage_stats(clock.now().utc).exports, 1);
    }
}
