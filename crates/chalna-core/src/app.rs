//! Composition root.
//!
//! [`ChalnaApp`] owns one instance of every service and wires them together:
//! user operations validate and persist, lifecycle changes go through the
//! [`BackgroundSyncCoordinator`], and the [`TickScheduler`] gate decides
//! whether a tick recomputes the countdown. Nothing here is global; hosts
//! build the app from [`AppServices`] and drive it with a [`TickDriver`].
//!
//! Every operation returns the [`Event`]s it produced, in order.
//!
//! [`TickDriver`]: crate::scheduler::TickDriver

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::analytics::{Analytics, AnalyticsData};
use crate::clock::{Clock, Moment, TimezoneFingerprint};
use crate::countdown::{CountdownEngine, DeadlineOverride, RemainingTime};
use crate::crash::CrashReporter;
use crate::deadline::{compute_deadline, Deadline};
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::i18n::Catalog;
use crate::milestones::{Action, MilestoneLedger, MilestoneTracker};
use crate::notification::{NotificationCenter, Notifier};
use crate::profile::{BirthDate, LifeExpectancy, Profile};
use crate::scheduler::{RunConditions, TickScheduler, Transition};
use crate::sleep_mode::SleepSettings;
use crate::storage::{
    keys, normalize_language, Config, KeyValueStore, SessionState, SessionStateStore,
    StorageHealth,
};
use crate::sync::{
    AppLifecyclePhase, BackgroundSyncCoordinator, Notice, SyncOutcome, SyncSettings,
};
use crate::validation::{
    age_in_years, validate_birth_date, validate_life_expectancy, validate_profile,
};

/// Capabilities the host provides.
#[derive(Clone)]
pub struct AppServices {
    pub clock: Arc<dyn Clock>,
    pub backend: Arc<dyn KeyValueStore>,
    pub crash: Arc<dyn CrashReporter>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct ChalnaApp {
    config: Config,
    clock: Arc<dyn Clock>,
    crash: Arc<dyn CrashReporter>,
    store: SessionStateStore,
    engine: CountdownEngine,
    sync: BackgroundSyncCoordinator,
    scheduler: TickScheduler,
    notifications: NotificationCenter,
    milestones: MilestoneTracker,
    analytics: Analytics,
    sleep: SleepSettings,
    state: SessionState,
    health: Option<StorageHealth>,
    token: CancellationToken,
    torn_down: bool,
}

impl ChalnaApp {
    pub fn new(config: Config, services: AppServices) -> Self {
        let AppServices {
            clock,
            backend,
            crash,
            notifier,
        } = services;
        let now = clock.now();
        let state = fresh_state(&config);

        Self {
            store: SessionStateStore::new(backend, Arc::clone(&crash)),
            engine: CountdownEngine::new(Arc::clone(&crash)),
            sync: BackgroundSyncCoordinator::new(SyncSettings::from(&config.sync)),
            scheduler: TickScheduler::new(),
            notifications: NotificationCenter::new(notifier, config.notifications.enabled),
            milestones: MilestoneTracker::new(MilestoneLedger::new(now.utc)),
            analytics: Analytics::default(),
            sleep: config.sleep.clone(),
            state,
            health: None,
            token: CancellationToken::new(),
            torn_down: false,
            clock,
            crash,
            config,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn now(&self) -> Moment {
        self.clock.now()
    }

    pub fn timezone(&self) -> TimezoneFingerprint {
        self.clock.timezone()
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.engine.effective_deadline()
    }

    pub fn remaining(&self) -> RemainingTime {
        self.engine.remaining()
    }

    pub fn is_expired(&self) -> bool {
        self.engine.is_expired()
    }

    pub fn is_ticking(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn lifecycle(&self) -> AppLifecyclePhase {
        self.sync.lifecycle()
    }

    pub fn health(&self) -> Option<&StorageHealth> {
        self.health.as_ref()
    }

    /// Keys currently held by the storage backend.
    pub async fn stored_keys(&self) -> Vec<String> {
        self.store.keys().await
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.sync.notices(self.clock.now())
    }

    pub fn translator(&self) -> Catalog {
        Catalog::for_language(&self.state.language)
    }

    pub fn milestones(&self) -> &MilestoneTracker {
        &self.milestones
    }

    pub fn analytics(&self) -> &AnalyticsData {
        self.analytics.data()
    }

    pub fn sleep_settings(&self) -> &SleepSettings {
        &self.sleep
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Token cancelled on teardown; child tokens drive tick loops.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn snapshot(&self) -> Event {
        Event::StateSnapshot {
            phase: self.sync.phase(),
            is_active: self.state.is_active,
            deadline: self.engine.effective_deadline(),
            remaining: self.engine.remaining(),
            expired: self.engine.is_expired(),
            at: self.clock.now().utc,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Restore everything from storage and recompute at once.
    ///
    /// Returns no events if the app was torn down while loading.
    pub async fn initialize(&mut self) -> Result<Vec<Event>> {
        if self.torn_down {
            return Ok(Vec::new());
        }
        let now = self.clock.now();

        let defaults = self.state.clone();
        let Some(state) = self.store.load(&defaults, &self.token).await else {
            tracing::debug!("initialization cancelled");
            return Ok(Vec::new());
        };
        self.state = state;

        self.sleep = self.store.get(keys::SLEEP_MODE, self.config.sleep.clone()).await;
        if let Some(ledger) = self.store.get_opt::<MilestoneLedger>(keys::MILESTONES).await {
            self.milestones = MilestoneTracker::new(ledger);
        } else {
            self.store.set(keys::MILESTONES, self.milestones.ledger()).await;
        }
        let analytics = self.store.get(keys::ANALYTICS, AnalyticsData::default()).await;
        self.analytics = Analytics::new(analytics);

        let health = self.store.check_health(now.utc).await;
        if !health.healthy {
            tracing::warn!(message = ?health.message, "storage health check failed");
        }
        self.health = Some(health);

        let stored_fingerprint = self
            .store
            .get_opt::<TimezoneFingerprint>(keys::TIMEZONE_FINGERPRINT)
            .await;
        self.sync
            .restore(self.state.last_calculation_ms, stored_fingerprint);

        self.refresh_deadline();
        if self.state.is_counting() {
            self.arm_override(now);
        }

        let mut events = Vec::new();
        let outcome = self
            .sync
            .detect_timezone(self.clock.timezone(), now, self.state.is_counting());
        events.extend(self.apply(outcome, now).await);

        if self.state.is_counting() {
            self.start_notifications().await;
        }

        self.analytics.launch(now.utc);
        self.store.set(keys::ANALYTICS, self.analytics.data()).await;

        // A fresh engine reports on the first run, which covers relaunch.
        events.extend(self.reschedule(now).await);
        tracing::info!(
            is_active = self.state.is_active,
            has_birth_date = self.state.birth_date.is_some(),
            "initialized"
        );
        Ok(events)
    }

    /// Apply an app lifecycle change reported by the host.
    pub async fn on_lifecycle(&mut self, phase: AppLifecyclePhase) -> Vec<Event> {
        if self.torn_down {
            return Vec::new();
        }
        let now = self.clock.now();
        let outcome =
            self.sync
                .on_lifecycle(phase, now, self.clock.timezone(), self.state.is_counting());
        let mut events = self.apply(outcome, now).await;
        events.extend(self.reschedule(now).await);
        events
    }

    /// One beat of the tick driver.
    ///
    /// Checks the sleep window, then recomputes if the run this beat belongs
    /// to is still current. A run restarted by this beat has already ticked.
    pub async fn tick(&mut self) -> Vec<Event> {
        if self.torn_down {
            return Vec::new();
        }
        let now = self.clock.now();
        let run = self.scheduler.run();
        self.sync.prune_notices(now);

        let pause = self.sleep.should_pause_timer(now.local);
        let outcome = self.sync.on_sleep_window(pause, now, self.state.is_counting());
        let mut events = self.apply(outcome, now).await;
        events.extend(self.reschedule(now).await);

        if self.scheduler.accepts(run) {
            events.extend(self.recompute(now, false).await);
        }
        if self.scheduler.is_running() {
            self.notify_minute(now);
        }
        events.extend(self.check_milestones(now).await);
        events
    }

    /// Stop ticking, cancel in-flight persistence and ignore every later call.
    pub async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        let now = self.clock.now();
        self.scheduler.halt();
        self.analytics.end_session(now.utc);
        self.store.set(keys::ANALYTICS, self.analytics.data()).await;
        self.token.cancel();
        self.torn_down = true;
        tracing::info!("torn down");
    }

    // ── Profile ──────────────────────────────────────────────────────

    /// Set the birth date.
    ///
    /// # Errors
    ///
    /// Besides format and range errors, returns
    /// [`ValidationError::BelowCurrentAge`] if the stored life expectancy is
    /// lower than the age this birth date gives. Use [`Self::set_profile`]
    /// to change both at once.
    pub async fn set_birth_date(&mut self, raw: &str) -> Result<Vec<Event>> {
        let now = self.clock.now();
        let today = now.local.date();
        let birth = validate_birth_date(raw, today)?;
        validate_life_expectancy(
            &self.state.life_expectancy.years().to_string(),
            Some(age_in_years(&birth, today)),
        )?;
        if self.torn_down {
            return Ok(Vec::new());
        }
        self.state.birth_date = Some(birth);
        self.birth_date_recorded().await;
        self.profile_changed(now).await
    }

    pub async fn set_life_expectancy(&mut self, raw: &str) -> Result<Vec<Event>> {
        let now = self.clock.now();
        let age = self
            .state
            .birth_date
            .map(|birth| age_in_years(&birth, now.local.date()));
        let life = validate_life_expectancy(raw, age)?;
        if self.torn_down {
            return Ok(Vec::new());
        }
        self.state.life_expectancy = life;
        self.persist().await;
        self.profile_changed(now).await
    }

    /// Validate and set birth date and life expectancy together.
    pub async fn set_profile(
        &mut self,
        birth_date: &str,
        life_expectancy: &str,
    ) -> Result<Vec<Event>> {
        let now = self.clock.now();
        let profile = validate_profile(birth_date, life_expectancy, now.local.date())?;
        if self.torn_down {
            return Ok(Vec::new());
        }
        self.state.birth_date = Some(profile.birth_date);
        self.state.life_expectancy = profile.life_expectancy;
        self.birth_date_recorded().await;
        self.profile_changed(now).await
    }

    /// Set or clear (blank input) the nickname.
    pub async fn set_nickname(&mut self, raw: &str) {
        if self.torn_down {
            return;
        }
        let trimmed = raw.trim();
        self.state.nickname = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self.persist().await;
    }

    // ── Countdown ────────────────────────────────────────────────────

    /// Validate the profile and start counting.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no birth date is set or the life
    /// expectancy is below the current age.
    pub async fn start(&mut self) -> Result<Vec<Event>> {
        let now = self.clock.now();
        let birth = self
            .state
            .birth_date
            .ok_or(ValidationError::MissingBirthDate)?;
        let profile = validate_profile(
            &birth.to_iso(),
            &self.state.life_expectancy.years().to_string(),
            now.local.date(),
        )?;
        if self.torn_down {
            return Ok(Vec::new());
        }

        self.state.is_active = true;
        self.persist().await;
        self.refresh_deadline();
        self.arm_override(now);

        let mut events = Vec::new();
        if let Some(deadline) = self.engine.effective_deadline() {
            let started = Event::TimerStarted {
                life_expectancy_years: profile.life_expectancy.years(),
                deadline,
                at: now.utc,
            };
            self.milestones.observe(&started);
            events.push(started);
        }
        self.analytics.timer_started(profile.life_expectancy.years());
        self.store.set(keys::ANALYTICS, self.analytics.data()).await;
        self.store.set(keys::MILESTONES, self.milestones.ledger()).await;
        tracing::info!(life_expectancy = profile.life_expectancy.years(), "countdown started");

        self.start_notifications().await;
        events.extend(self.reschedule(now).await);
        if self.scheduler.is_running() {
            events.extend(self.recompute(now, false).await);
        }
        events.extend(self.check_milestones(now).await);
        Ok(events)
    }

    pub async fn stop(&mut self) -> Vec<Event> {
        if self.torn_down || !self.state.is_active {
            return Vec::new();
        }
        let now = self.clock.now();
        self.state.is_active = false;
        self.persist().await;
        self.sync.clear_pause();
        self.engine.set_override(None);
        self.engine.invalidate();
        self.notifications.cancel();
        tracing::info!("countdown stopped");

        let mut events = vec![Event::TimerStopped { at: now.utc }];
        events.extend(self.reschedule(now).await);
        events
    }

    // ── Preferences ──────────────────────────────────────────────────

    pub async fn toggle_theme(&mut self) -> Vec<Event> {
        if self.torn_down {
            return Vec::new();
        }
        let now = self.clock.now();
        self.state.is_dark_theme = !self.state.is_dark_theme;
        self.persist().await;
        self.analytics.theme_changed();
        self.store.set(keys::ANALYTICS, self.analytics.data()).await;
        self.milestones.record(Action::ThemeChange);
        self.store.set(keys::MILESTONES, self.milestones.ledger()).await;
        self.check_milestones(now).await
    }

    /// Switch language. Unsupported codes fall back to English.
    pub async fn set_language(&mut self, code: &str) -> &str {
        let language = normalize_language(code);
        if !self.torn_down && language != self.state.language {
            self.state.language = language;
            self.persist().await;
            self.analytics.language_changed();
            self.store.set(keys::ANALYTICS, self.analytics.data()).await;
        }
        &self.state.language
    }

    pub async fn complete_onboarding(&mut self) {
        if self.torn_down || self.state.onboarding_complete {
            return;
        }
        self.state.onboarding_complete = true;
        self.persist().await;
    }

    /// Count a data export towards milestones.
    pub async fn record_export(&mut self) -> Vec<Event> {
        if self.torn_down {
            return Vec::new();
        }
        let now = self.clock.now();
        self.milestones.record(Action::DataExport);
        self.store.set(keys::MILESTONES, self.milestones.ledger()).await;
        self.check_milestones(now).await
    }

    pub async fn set_sleep_settings(&mut self, settings: SleepSettings) -> Result<Vec<Event>> {
        settings
            .window()
            .map_err(|message| crate::error::ConfigError::InvalidValue {
                key: "sleep".into(),
                message,
            })?;
        if self.torn_down {
            return Ok(Vec::new());
        }
        self.store.set(keys::SLEEP_MODE, &settings).await;
        self.sleep = settings;
        Ok(self.tick().await)
    }

    pub async fn toggle_milestones(&mut self) -> bool {
        let enabled = self.milestones.toggle_enabled();
        self.store.set(keys::MILESTONES, self.milestones.ledger()).await;
        enabled
    }

    pub async fn toggle_milestone_test_mode(&mut self) -> bool {
        let test_mode = self.milestones.toggle_test_mode();
        self.store.set(keys::MILESTONES, self.milestones.ledger()).await;
        test_mode
    }

    pub async fn reset_milestones(&mut self) {
        self.milestones.reset();
        self.store.set(keys::MILESTONES, self.milestones.ledger()).await;
    }

    /// Wipe the session back to first-launch defaults.
    ///
    /// Analytics survive (with the reset counted); so does the timezone.
    pub async fn reset(&mut self) -> Vec<Event> {
        if self.torn_down {
            return Vec::new();
        }
        let now = self.clock.now();
        let mut events = Vec::new();
        if self.state.is_active {
            events.push(Event::TimerStopped { at: now.utc });
        }

        self.store.clear().await;
        self.state = fresh_state(&self.config);
        self.engine.set_override(None);
        self.engine.set_deadline(None);
        self.sync.reset();
        self.notifications.cancel();
        self.milestones = MilestoneTracker::new(MilestoneLedger::new(now.utc));
        self.store.set(keys::MILESTONES, self.milestones.ledger()).await;
        self.sleep = self.config.sleep.clone();

        self.analytics.reset_recorded();
        self.store.set(keys::ANALYTICS, self.analytics.data()).await;
        if let Some(fingerprint) = self.sync.fingerprint().cloned() {
            self.store.set(keys::TIMEZONE_FINGERPRINT, &fingerprint).await;
        }
        tracing::info!("session reset");

        events.extend(self.reschedule(now).await);
        events
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn birth_date_recorded(&mut self) {
        self.persist().await;
        self.analytics.birthdate_set();
        self.store.set(keys::ANALYTICS, self.analytics.data()).await;
    }

    async fn profile_changed(&mut self, now: Moment) -> Result<Vec<Event>> {
        self.refresh_deadline();
        let was_running = self.scheduler.is_running();
        let mut events = self.reschedule(now).await;
        if was_running && self.scheduler.is_running() {
            events.extend(self.recompute(now, true).await);
        }
        Ok(events)
    }

    fn refresh_deadline(&mut self) {
        let deadline = self.state.birth_date.and_then(|birth| {
            self.deadline_for(birth, self.state.life_expectancy)
        });
        self.engine.set_deadline(deadline);
    }

    fn deadline_for(&self, birth: BirthDate, life: LifeExpectancy) -> Option<Deadline> {
        match compute_deadline(birth, life) {
            Ok(deadline) => Some(deadline),
            Err(err) => {
                tracing::error!(error = %err, "deadline calculation failed");
                self.crash.report_crash("deadline", &err);
                None
            }
        }
    }

    fn arm_override(&mut self, now: Moment) {
        let developer = &self.config.developer;
        let hook = DeadlineOverride::from_test_mode(developer.test_mode, developer.test_deadline_minutes);
        self.engine.set_override(hook.arm(now.local));
    }

    /// Recompute and checkpoint. `force` reports even an unchanged breakdown.
    async fn recompute(&mut self, now: Moment, force: bool) -> Vec<Event> {
        if force {
            self.engine.invalidate();
        }
        let event = self.engine.recompute(now);
        self.sync.note_tick(now);
        self.state.last_calculation_ms = Some(now.epoch_ms());
        self.store.save_checkpoint(now.epoch_ms()).await;

        if matches!(event, Some(Event::TimeExpired { .. })) {
            // isActive stays as the user left it; only this run ends.
            self.notifications.cancel();
            let conditions = self.run_conditions();
            self.scheduler.update(conditions);
            tracing::info!("countdown expired, ticking stopped");
        }
        event.into_iter().collect()
    }

    async fn apply(&mut self, outcome: SyncOutcome, now: Moment) -> Vec<Event> {
        let SyncOutcome {
            recompute,
            checkpoint_ms,
            persist_fingerprint,
            mut events,
        } = outcome;

        if let Some(ms) = checkpoint_ms {
            self.state.last_calculation_ms = Some(ms);
            self.store.save_checkpoint(ms).await;
        }
        if let Some(fingerprint) = persist_fingerprint {
            self.store.set(keys::TIMEZONE_FINGERPRINT, &fingerprint).await;
        }
        // An expired countdown stays expired until the profile changes.
        if recompute && self.state.is_counting() && !self.engine.is_expired() {
            events.extend(self.recompute(now, true).await);
        }
        events
    }

    /// Re-evaluate the run conditions. A fresh run ticks immediately.
    async fn reschedule(&mut self, now: Moment) -> Vec<Event> {
        let conditions = self.run_conditions();
        match self.scheduler.update(conditions) {
            Transition::Started { .. } => self.recompute(now, false).await,
            Transition::Stopped | Transition::Unchanged => Vec::new(),
        }
    }

    fn run_conditions(&self) -> RunConditions {
        RunConditions {
            is_active: self.state.is_active,
            has_birth_date: self.state.birth_date.is_some(),
            paused: self.sync.is_paused(),
            foreground: self.sync.lifecycle().is_active(),
            expired: self.engine.is_expired(),
        }
    }

    /// Write the whole session through the cancellable save path.
    async fn persist(&self) -> bool {
        self.store.save(&self.state, &self.token).await
    }

    async fn start_notifications(&mut self) {
        let Some(birth_date) = self.state.birth_date else {
            return;
        };
        let mut asked = self.state.has_asked_for_notification_permission;
        let permission = self.notifications.ensure_permission(&mut asked);
        if asked != self.state.has_asked_for_notification_permission
            || permission != self.state.notification_permission
        {
            self.state.has_asked_for_notification_permission = asked;
            self.state.notification_permission = permission;
            self.persist().await;
        }
        self.notifications.start(&Profile {
            birth_date,
            life_expectancy: self.state.life_expectancy,
        });
    }

    fn notify_minute(&mut self, now: Moment) {
        let muted = self.sleep.should_mute_notifications(now.local);
        let remaining = self.engine.remaining();
        let translator = self.translator();
        self.notifications.update(&remaining, &translator, muted);
    }

    async fn check_milestones(&mut self, now: Moment) -> Vec<Event> {
        let reached = self.milestones.check(now);
        if reached.is_empty() {
            return Vec::new();
        }
        self.store.set(keys::MILESTONES, self.milestones.ledger()).await;
        reached
            .into_iter()
            .map(|milestone| Event::MilestoneReached {
                id: milestone.id.to_string(),
                at: now.utc,
            })
            .collect()
    }
}

/// First-launch state from the `[defaults]` config section.
fn fresh_state(config: &Config) -> SessionState {
    let defaults = &config.defaults;
    let mut state = SessionState::with_defaults(
        defaults.auto_start,
        defaults.dark_theme,
        &normalize_language(&defaults.language),
    );
    if let Ok(life) = validate_life_expectancy(&defaults.life_expectancy.to_string(), None) {
        state.life_expectancy = life;
    }
    state
}
