//! Persistent "time left" notification.
//!
//! The platform capability is the [`Notifier`] trait. Two backends exist:
//! [`ForegroundService`] hands the profile to a long-running platform service
//! that renders the countdown itself, and [`LocalFallback`] posts the
//! rendered text as an ongoing local notification. [`Platform`] picks one at
//! composition time.
//!
//! [`NotificationCenter`] sits on top: it tracks permission, honours
//! sleep-mode muting and only refreshes the display on minute boundaries.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::countdown::RemainingTime;
use crate::i18n::Translator;
use crate::profile::Profile;
use crate::storage::PermissionState;

/// Text of one persistent notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

pub trait Notifier: Send + Sync {
    fn start_service(&self, profile: &Profile);
    fn stop_service(&self);
    fn update_persistent_display(&self, content: &NotificationContent);
    fn check_permission(&self) -> bool;
    /// Ask the user. `false` means not granted yet; the answer may arrive later.
    fn request_permission(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Desktop,
}

impl Default for Platform {
    fn default() -> Self {
        if cfg!(target_os = "android") {
            Self::Android
        } else if cfg!(target_os = "ios") {
            Self::Ios
        } else {
            Self::Desktop
        }
    }
}

impl Platform {
    /// The backend this platform uses.
    pub fn notifier(self) -> Arc<dyn Notifier> {
        match self {
            Self::Android => Arc::new(ForegroundService::new()),
            Self::Ios | Self::Desktop => Arc::new(LocalFallback::new()),
        }
    }
}

// ── Foreground service ───────────────────────────────────────────────

#[derive(Debug, Default)]
struct ServiceState {
    running: Option<Profile>,
    granted: bool,
    requested: bool,
}

/// Platform service that computes and renders the countdown on its own.
///
/// Display updates from the core are ignored while it runs.
#[derive(Debug, Default)]
pub struct ForegroundService {
    state: Mutex<ServiceState>,
}

impl ForegroundService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the answer from the system permission settings.
    pub fn set_granted(&self, granted: bool) {
        self.lock().granted = granted;
    }

    pub fn running_profile(&self) -> Option<Profile> {
        self.lock().running
    }

    pub fn was_requested(&self) -> bool {
        self.lock().requested
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for ForegroundService {
    fn start_service(&self, profile: &Profile) {
        tracing::info!(birth_date = %profile.birth_date, "starting foreground service");
        self.lock().running = Some(*profile);
    }

    fn stop_service(&self) {
        if self.lock().running.take().is_some() {
            tracing::info!("stopped foreground service");
        }
    }

    fn update_persistent_display(&self, _content: &NotificationContent) {
        tracing::trace!("foreground service renders its own display");
    }

    fn check_permission(&self) -> bool {
        self.lock().granted
    }

    fn request_permission(&self) -> bool {
        let mut state = self.lock();
        state.requested = true;
        state.granted
    }
}

// ── Local fallback ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LocalState {
    current: Option<NotificationContent>,
    posted: u64,
}

/// Ongoing local notification replaced on every update.
#[derive(Debug, Default)]
pub struct LocalFallback {
    state: Mutex<LocalState>,
}

impl LocalFallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<NotificationContent> {
        self.lock().current.clone()
    }

    /// Total number of posts since creation.
    pub fn posted(&self) -> u64 {
        self.lock().posted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for LocalFallback {
    fn start_service(&self, _profile: &Profile) {}

    fn stop_service(&self) {
        self.lock().current = None;
    }

    fn update_persistent_display(&self, content: &NotificationContent) {
        tracing::debug!(body = %content.body, "posting local notification");
        let mut state = self.lock();
        state.current = Some(content.clone());
        state.posted += 1;
    }

    fn check_permission(&self) -> bool {
        true
    }

    fn request_permission(&self) -> bool {
        true
    }
}

// ── Center ───────────────────────────────────────────────────────────

/// Render a breakdown the way the notification shows it. Leading zero
/// units are dropped down to days.
pub fn format_time_left(remaining: &RemainingTime, translator: &dyn Translator) -> String {
    let clock = format!(
        "{}:{:02}:{:02}",
        remaining.hours, remaining.minutes, remaining.seconds
    );
    let days = format!("{} {}", remaining.days, translator.translate("days"));
    if remaining.years > 0 {
        format!(
            "{} {} {} {} {days} {clock}",
            remaining.years,
            translator.translate("years"),
            remaining.months,
            translator.translate("months"),
        )
    } else if remaining.months > 0 {
        format!(
            "{} {} {days} {clock}",
            remaining.months,
            translator.translate("months"),
        )
    } else {
        format!("{days} {clock}")
    }
}

pub struct NotificationCenter {
    notifier: Arc<dyn Notifier>,
    enabled: bool,
    permission: PermissionState,
    running: bool,
}

impl NotificationCenter {
    pub fn new(notifier: Arc<dyn Notifier>, enabled: bool) -> Self {
        Self {
            notifier,
            enabled,
            permission: PermissionState::Unknown,
            running: false,
        }
    }

    pub fn permission(&self) -> PermissionState {
        self.permission
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Check the current permission and ask once if it is missing.
    ///
    /// `has_asked` is the persisted "already asked" flag; it is set when a
    /// request is made so the user is never asked twice.
    pub fn ensure_permission(&mut self, has_asked: &mut bool) -> PermissionState {
        self.permission = if self.notifier.check_permission() {
            PermissionState::Granted
        } else if *has_asked {
            PermissionState::Denied
        } else {
            *has_asked = true;
            if self.notifier.request_permission() {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            }
        };
        tracing::debug!(permission = ?self.permission, "notification permission");
        self.permission
    }

    /// Start the persistent notification. No-op unless enabled and granted.
    pub fn start(&mut self, profile: &Profile) -> bool {
        if !self.enabled || self.permission != PermissionState::Granted {
            return false;
        }
        self.notifier.start_service(profile);
        self.running = true;
        true
    }

    /// Refresh the display. Only runs on minute boundaries and when not muted.
    pub fn update(
        &mut self,
        remaining: &RemainingTime,
        translator: &dyn Translator,
        muted: bool,
    ) -> bool {
        if !self.running || muted || remaining.seconds != 0 {
            return false;
        }
        let content = NotificationContent {
            title: translator.translate("title"),
            body: format_time_left(remaining, translator),
        };
        self.notifier.update_persistent_display(&content);
        true
    }

    /// Remove the notification and stop the service.
    pub fn cancel(&mut self) {
        if self.running {
            self.notifier.stop_service();
            self.running = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Catalog;
    use crate::validation::validate_profile;
    use chrono::NaiveDate;

    fn profile() -> Profile {
        validate_profile("1990-01-01", "80", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap()
    }

    fn remaining(seconds: u32) -> RemainingTime {
        RemainingTime { years: 55, months: 11, days: 30, hours: 23, minutes: 5, seconds }
    }

    #[test]
    fn formats_by_largest_unit() {
        let en = Catalog::default();
        assert_eq!(format_time_left(&remaining(7), &en), "55 years 11 months 30 days 23:05:07");
        let short = RemainingTime { days: 2, hours: 1, minutes: 2, seconds: 3, ..RemainingTime::ZERO };
        assert_eq!(format_time_left(&short, &en), "2 days 1:02:03");
        let months = RemainingTime { months: 1, ..short };
        assert_eq!(format_time_left(&months, &en), "1 months 2 days 1:02:03");
    }

    #[test]
    fn updates_only_on_minute_boundaries() {
        let local = Arc::new(LocalFallback::new());
        let mut center = NotificationCenter::new(local.clone(), true);
        let mut asked = false;
        assert_eq!(center.ensure_permission(&mut asked), PermissionState::Granted);
        assert!(!asked);
        assert!(center.start(&profile()));

        let en = Catalog::default();
        assert!(!center.update(&remaining(1), &en, false));
        assert!(center.update(&remaining(0), &en, false));
        assert!(!center.update(&remaining(0), &en, true));
        assert_eq!(local.posted(), 1);
        assert_eq!(local.current().unwrap().title, "Time Left");

        center.cancel();
        assert!(local.current().is_none());
        assert!(!center.update(&remaining(0), &en, false));
    }

    #[test]
    fn foreground_service_asks_once() {
        let service = Arc::new(ForegroundService::new());
        let mut center = NotificationCenter::new(service.clone(), true);
        let mut asked = false;

        assert_eq!(center.ensure_permission(&mut asked), PermissionState::Denied);
        assert!(asked);
        assert!(service.was_requested());
        assert!(!center.start(&profile()));

        service.set_granted(true);
        assert_eq!(center.ensure_permission(&mut asked), PermissionState::Granted);
        assert!(center.start(&profile()));
        assert_eq!(service.running_profile(), Some(profile()));
        center.cancel();
        assert!(service.running_profile().is_none());
    }

    #[test]
    fn disabled_center_never_starts() {
        let mut center = NotificationCenter::new(Arc::new(LocalFallback::new()), false);
        center.ensure_permission(&mut false);
        assert!(!center.start(&profile()));
    }
}
