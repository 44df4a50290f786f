//! Background/foreground reconciliation.
//!
//! The coordinator is a pure state machine, driven by lifecycle changes,
//! timezone readings and the sleep window. It never touches storage or the
//! engine itself; each transition returns a [`SyncOutcome`] describing what
//! the caller must do (take a checkpoint, recompute now, persist the new
//! timezone) plus the events to publish.
//!
//! ## State Transitions
//!
//! ```text
//! ActiveTicking --background/inactive--> Backgrounded (paused)
//! Backgrounded  --active--------------> ActiveTicking (reconciled)
//! ActiveTicking --sleep window--------> ActivePaused
//! ActivePaused  --window ends---------> ActiveTicking (reconciled)
//! ```

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::notices::{Notice, NoticeBoard};
use crate::clock::{Moment, TimezoneFingerprint};
use crate::events::Event;
use crate::storage::SyncConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecyclePhase {
    Active,
    Inactive,
    Background,
}

impl AppLifecyclePhase {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    ActiveTicking,
    ActivePaused,
    Backgrounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    Background,
    SleepMode,
}

/// Timings, usually taken from the `[sync]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Gaps strictly longer than this show the sync notice.
    pub notice_threshold: Duration,
    pub sync_notice_ttl: Duration,
    pub timezone_notice_ttl: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(cfg: &SyncConfig) -> Self {
        let secs = |s: u64| Duration::seconds(i64::try_from(s).unwrap_or(i64::MAX).min(i64::MAX / 1_000));
        Self {
            notice_threshold: secs(cfg.sync_notice_threshold_secs),
            sync_notice_ttl: secs(cfg.sync_notice_secs),
            timezone_notice_ttl: secs(cfg.timezone_notice_secs),
        }
    }
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncOutcome {
    /// Recompute the countdown immediately.
    pub recompute: bool,
    /// Persist `lastCalculationTime` with this value.
    pub checkpoint_ms: Option<i64>,
    /// Persist this fingerprint.
    pub persist_fingerprint: Option<TimezoneFingerprint>,
    pub events: Vec<Event>,
}

impl SyncOutcome {
    fn merge(&mut self, other: SyncOutcome) {
        self.recompute |= other.recompute;
        self.checkpoint_ms = other.checkpoint_ms.or(self.checkpoint_ms);
        self.persist_fingerprint = other.persist_fingerprint.or(self.persist_fingerprint.take());
        self.events.extend(other.events);
    }
}

pub struct BackgroundSyncCoordinator {
    settings: SyncSettings,
    lifecycle: AppLifecyclePhase,
    paused: Option<PauseReason>,
    last_calculation_ms: Option<i64>,
    fingerprint: Option<TimezoneFingerprint>,
    notices: NoticeBoard,
}

impl BackgroundSyncCoordinator {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings,
            lifecycle: AppLifecyclePhase::Active,
            paused: None,
            last_calculation_ms: None,
            fingerprint: None,
            notices: NoticeBoard::new(settings.sync_notice_ttl, settings.timezone_notice_ttl),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn lifecycle(&self) -> AppLifecyclePhase {
        self.lifecycle
    }

    pub fn phase(&self) -> SyncPhase {
        match (self.lifecycle, self.paused) {
            (AppLifecyclePhase::Active, None) => SyncPhase::ActiveTicking,
            (AppLifecyclePhase::Active, Some(_)) => SyncPhase::ActivePaused,
            _ => SyncPhase::Backgrounded,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.is_some()
    }

    pub fn pause_reason(&self) -> Option<PauseReason> {
        self.paused
    }

    pub fn fingerprint(&self) -> Option<&TimezoneFingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn last_calculation_ms(&self) -> Option<i64> {
        self.last_calculation_ms
    }

    pub fn notices(&self, now: Moment) -> Vec<Notice> {
        self.notices.visible(now.utc)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Restore the persisted checkpoint and fingerprint after a relaunch.
    pub fn restore(
        &mut self,
        last_calculation_ms: Option<i64>,
        fingerprint: Option<TimezoneFingerprint>,
    ) {
        self.last_calculation_ms = last_calculation_ms;
        self.fingerprint = fingerprint;
    }

    /// Record a tick's recomputation instant.
    pub fn note_tick(&mut self, now: Moment) {
        self.last_calculation_ms = Some(now.epoch_ms());
    }

    /// Drop any pause, e.g. when the user stops the countdown.
    pub fn clear_pause(&mut self) {
        self.paused = None;
    }

    pub fn prune_notices(&mut self, now: Moment) {
        self.notices.prune(now.utc);
    }

    /// Forget everything except the lifecycle phase and the timezone.
    pub fn reset(&mut self) {
        self.paused = None;
        self.last_calculation_ms = None;
        self.notices.clear();
    }

    /// Compare `current` with the last known fingerprint.
    ///
    /// The first reading is only remembered. A different reading shows the
    /// timezone notice, forces a recompute while `counting`, and is persisted.
    /// Reading the same fingerprint again does nothing.
    pub fn detect_timezone(
        &mut self,
        current: TimezoneFingerprint,
        now: Moment,
        counting: bool,
    ) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();
        match self.fingerprint.replace(current.clone()) {
            None => {
                outcome.persist_fingerprint = Some(current);
            }
            Some(previous) if previous == current => {}
            Some(previous) => {
                tracing::info!(%previous, %current, "timezone changed");
                self.notices.show_timezone_changed(now.utc);
                outcome.recompute = counting;
                outcome.persist_fingerprint = Some(current.clone());
                outcome.events.push(Event::TimezoneChanged {
                    previous,
                    current,
                    at: now.utc,
                });
            }
        }
        outcome
    }

    /// Apply a lifecycle change.
    ///
    /// `counting` is true when the countdown is active with a birth date.
    pub fn on_lifecycle(
        &mut self,
        next: AppLifecyclePhase,
        now: Moment,
        timezone: TimezoneFingerprint,
        counting: bool,
    ) -> SyncOutcome {
        let previous = std::mem::replace(&mut self.lifecycle, next);
        tracing::debug!(?previous, ?next, "lifecycle change");

        match (previous.is_active(), next.is_active()) {
            (true, false) => self.enter_background(now, counting),
            (false, true) => {
                let mut outcome = self.detect_timezone(timezone, now, counting);
                if self.paused == Some(PauseReason::Background) {
                    outcome.merge(self.resume(now, counting));
                }
                outcome
            }
            _ => SyncOutcome::default(),
        }
    }

    /// Pause or resume for the sleep window. Only acts in the foreground.
    pub fn on_sleep_window(&mut self, pause: bool, now: Moment, counting: bool) -> SyncOutcome {
        if !self.lifecycle.is_active() || !counting {
            return SyncOutcome::default();
        }
        match (pause, self.paused) {
            (true, None) => self.pause(PauseReason::SleepMode, now),
            (false, Some(PauseReason::SleepMode)) => self.resume(now, counting),
            _ => SyncOutcome::default(),
        }
    }

    fn enter_background(&mut self, now: Moment, counting: bool) -> SyncOutcome {
        if !counting {
            return SyncOutcome::default();
        }
        match self.paused {
            None => self.pause(PauseReason::Background, now),
            // Already quiet; still refresh the checkpoint.
            Some(_) => {
                self.paused = Some(PauseReason::Background);
                self.last_calculation_ms = Some(now.epoch_ms());
                SyncOutcome {
                    checkpoint_ms: self.last_calculation_ms,
                    ..SyncOutcome::default()
                }
            }
        }
    }

    fn pause(&mut self, reason: PauseReason, now: Moment) -> SyncOutcome {
        let at_ms = now.epoch_ms();
        self.paused = Some(reason);
        self.last_calculation_ms = Some(at_ms);
        tracing::debug!(?reason, "countdown paused");
        SyncOutcome {
            checkpoint_ms: Some(at_ms),
            events: vec![Event::CountdownPaused { reason, at: now.utc }],
            ..SyncOutcome::default()
        }
    }

    fn resume(&mut self, now: Moment, counting: bool) -> SyncOutcome {
        self.paused = None;
        if !counting {
            return SyncOutcome::default();
        }

        let at_ms = now.epoch_ms();
        let paused_ms = self
            .last_calculation_ms
            .map(|last| at_ms.saturating_sub(last).max(0))
            .unwrap_or(0);
        self.last_calculation_ms = Some(at_ms);

        if paused_ms > self.settings.notice_threshold.num_milliseconds() {
            let minutes = paused_ms / 60_000;
            tracing::info!(minutes, "resynchronized after long pause");
            self.notices.show_sync(minutes, now.utc);
        }

        SyncOutcome {
            recompute: true,
            checkpoint_ms: Some(at_ms),
            events: vec![Event::CountdownResumed {
                paused_ms,
                at: now.utc,
            }],
            ..SyncOutcome::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::NaiveDate;

    fn clock() -> ManualClock {
        ManualClock::at_local(
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
            "Asia/Seoul",
            540,
        )
    }

    fn coordinator(clock: &ManualClock) -> BackgroundSyncCoordinator {
        let mut sync = BackgroundSyncCoordinator::new(SyncSettings::default());
        sync.detect_timezone(clock.timezone(), clock.now(), true);
        sync
    }

    fn round_trip(secs: i64) -> (BackgroundSyncCoordinator, SyncOutcome, Moment) {
        let clock = clock();
        let mut sync = coordinator(&clock);
        let out = sync.on_lifecycle(AppLifecyclePhase::Background, clock.now(), clock.timezone(), true);
        assert_eq!(out.checkpoint_ms, Some(clock.now().epoch_ms()));
        assert_eq!(sync.phase(), SyncPhase::Backgrounded);

        clock.advance(Duration::seconds(secs));
        let out = sync.on_lifecycle(AppLifecyclePhase::Active, clock.now(), clock.timezone(), true);
        (sync, out, clock.now())
    }

    #[test]
    fn long_background_shows_sync_notice() {
        let (sync, out, now) = round_trip(90);
        assert!(out.recompute);
        assert_eq!(out.checkpoint_ms, Some(now.epoch_ms()));
        assert!(matches!(out.events[..], [Event::CountdownResumed { paused_ms: 90_000, .. }]));
        assert_eq!(sync.notices(now), vec![Notice::Sync { minutes: 1 }]);
        assert_eq!(sync.phase(), SyncPhase::ActiveTicking);

        let later = Moment {
            utc: now.utc + Duration::seconds(3),
            local: now.local,
        };
        assert!(sync.notices(later).is_empty());
    }

    #[test]
    fn oversized_notice_duration_does_not_overflow() {
        let clock = clock();
        let settings = SyncSettings::from(&SyncConfig {
            sync_notice_secs: 9_000_000_000_000_000,
            ..SyncConfig::default()
        });
        let mut sync = BackgroundSyncCoordinator::new(settings);
        sync.detect_timezone(clock.timezone(), clock.now(), true);
        sync.on_lifecycle(AppLifecyclePhase::Background, clock.now(), clock.timezone(), true);
        clock.advance(Duration::seconds(90));
        sync.on_lifecycle(AppLifecyclePhase::Active, clock.now(), clock.timezone(), true);
        assert_eq!(sync.notices(clock.now()), vec![Notice::Sync { minutes: 1 }]);
    }

    #[test]
    fn short_background_resyncs_silently() {
        let (sync, out, now) = round_trip(30);
        assert!(out.recompute);
        assert!(sync.notices(now).is_empty());
    }

    #[test]
    fn exactly_one_minute_is_not_long() {
        let (sync, _, now) = round_trip(60);
        assert!(sync.notices(now).is_empty());
        let (sync, _, now) = round_trip(61);
        assert_eq!(sync.notices(now), vec![Notice::Sync { minutes: 1 }]);
    }

    #[test]
    fn idle_countdown_is_not_paused() {
        let clock = clock();
        let mut sync = coordinator(&clock);
        let out = sync.on_lifecycle(AppLifecyclePhase::Inactive, clock.now(), clock.timezone(), false);
        assert_eq!(out, SyncOutcome::default());
        assert!(!sync.is_paused());

        clock.advance(Duration::minutes(10));
        let out = sync.on_lifecycle(AppLifecyclePhase::Active, clock.now(), clock.timezone(), false);
        assert!(!out.recompute);
        assert!(sync.notices(clock.now()).is_empty());
    }

    #[test]
    fn inactive_then_background_keeps_first_checkpoint() {
        let clock = clock();
        let mut sync = coordinator(&clock);
        let start = clock.now().epoch_ms();
        sync.on_lifecycle(AppLifecyclePhase::Inactive, clock.now(), clock.timezone(), true);
        clock.advance(Duration::seconds(5));
        let out = sync.on_lifecycle(AppLifecyclePhase::Background, clock.now(), clock.timezone(), true);
        assert_eq!(out, SyncOutcome::default());
        assert_eq!(sync.last_calculation_ms(), Some(start));
    }

    #[test]
    fn timezone_change_notifies_once() {
        let clock = clock();
        let mut sync = coordinator(&clock);
        sync.on_lifecycle(AppLifecyclePhase::Background, clock.now(), clock.timezone(), true);

        clock.set_zone("Europe/Paris", 60);
        let out = sync.on_lifecycle(AppLifecyclePhase::Active, clock.now(), clock.timezone(), true);
        assert!(out.recompute);
        assert_eq!(out.persist_fingerprint, Some(TimezoneFingerprint::new("Europe/Paris", 60)));
        let changes = out
            .events
            .iter()
            .filter(|e| matches!(e, Event::TimezoneChanged { .. }))
            .count();
        assert_eq!(changes, 1);
        assert_eq!(sync.notices(clock.now()), vec![Notice::TimezoneChanged]);

        sync.on_lifecycle(AppLifecyclePhase::Background, clock.now(), clock.timezone(), true);
        clock.advance(Duration::seconds(10));
        let out = sync.on_lifecycle(AppLifecyclePhase::Active, clock.now(), clock.timezone(), true);
        assert!(out.persist_fingerprint.is_none());
        assert!(!out.events.iter().any(|e| matches!(e, Event::TimezoneChanged { .. })));
        assert!(sync.notices(clock.now()).is_empty());
    }

    #[test]
    fn first_reading_is_only_remembered() {
        let clock = clock();
        let mut sync = BackgroundSyncCoordinator::new(SyncSettings::default());
        let out = sync.detect_timezone(clock.timezone(), clock.now(), true);
        assert!(!out.recompute);
        assert_eq!(out.persist_fingerprint, Some(clock.timezone()));
        assert!(sync.notices(clock.now()).is_empty());
    }

    #[test]
    fn sleep_window_pauses_and_reconciles() {
        let clock = clock();
        let mut sync = coordinator(&clock);

        let out = sync.on_sleep_window(true, clock.now(), true);
        assert!(matches!(
            out.events[..],
            [Event::CountdownPaused { reason: PauseReason::SleepMode, .. }]
        ));
        assert_eq!(sync.phase(), SyncPhase::ActivePaused);
        assert_eq!(sync.on_sleep_window(true, clock.now(), true), SyncOutcome::default());

        clock.advance(Duration::hours(8));
        let out = sync.on_sleep_window(false, clock.now(), true);
        assert!(out.recompute);
        assert_eq!(sync.notices(clock.now()), vec![Notice::Sync { minutes: 480 }]);
        assert_eq!(sync.phase(), SyncPhase::ActiveTicking);
    }

    #[test]
    fn backgrounding_during_sleep_keeps_one_pause() {
        let clock = clock();
        let mut sync = coordinator(&clock);
        sync.on_sleep_window(true, clock.now(), true);
        clock.advance(Duration::minutes(30));
        let out = sync.on_lifecycle(AppLifecyclePhase::Background, clock.now(), clock.timezone(), true);
        assert!(out.events.is_empty());
        assert_eq!(sync.pause_reason(), Some(PauseReason::Background));

        clock.advance(Duration::seconds(20));
        let out = sync.on_lifecycle(AppLifecyclePhase::Active, clock.now(), clock.timezone(), true);
        assert!(matches!(out.events[..], [Event::CountdownResumed { paused_ms: 20_000, .. }]));
    }
}
