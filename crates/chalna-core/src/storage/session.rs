//! Persisted session state and its key layout.

use serde::{Deserialize, Serialize};

use crate::profile::{BirthDate, LifeExpectancy};

/// Persistence keys. The names are part of the on-disk format and are read
/// back by every app version, so they never change.
pub mod keys {
    pub const NICKNAME: &str = "nickname";
    pub const BIRTH_DATE: &str = "birthDate";
    pub const LIFE_EXPECTANCY: &str = "lifeExpectancy";
    pub const IS_ACTIVE: &str = "isActive";
    pub const LAST_CALCULATION_TIME: &str = "lastCalculationTime";
    pub const ONBOARDING_COMPLETE: &str = "onboardingComplete";
    pub const IS_DARK_THEME: &str = "isDarkTheme";
    pub const LANGUAGE: &str = "language";
    pub const NOTIFICATION_PERMISSION: &str = "notificationPermission";
    pub const HAS_ASKED_FOR_NOTIFICATION_PERMISSION: &str = "hasAskedForNotificationPermission";
    pub const TIMEZONE_FINGERPRINT: &str = "timezoneFingerprint";
    pub const SLEEP_MODE: &str = "death_clock_sleep_mode";
    pub const MILESTONES: &str = "death_clock_milestones";
    pub const ANALYTICS: &str = "death_clock_analytics";
}

/// Languages the host ships translations for.
pub const SUPPORTED_LANGUAGES: [&str; 4] = ["ko", "en", "ja", "zh"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Unknown,
    Granted,
    Denied,
}

/// Everything needed to rebuild the countdown after a restart.
///
/// The breakdown itself is never stored; it is recomputed from
/// `birth_date`, `life_expectancy` and the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub nickname: Option<String>,
    pub birth_date: Option<BirthDate>,
    pub life_expectancy: LifeExpectancy,
    pub is_active: bool,
    /// Epoch milliseconds of the last recomputation checkpoint.
    pub last_calculation_ms: Option<i64>,
    pub is_dark_theme: bool,
    pub language: String,
    pub onboarding_complete: bool,
    pub notification_permission: PermissionState,
    pub has_asked_for_notification_permission: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            nickname: None,
            birth_date: None,
            life_expectancy: LifeExpectancy::default(),
            is_active: true,
            last_calculation_ms: None,
            is_dark_theme: true,
            language: "en".to_string(),
            onboarding_complete: false,
            notification_permission: PermissionState::Unknown,
            has_asked_for_notification_permission: false,
        }
    }
}

impl SessionState {
    /// Fresh state seeded from configured defaults.
    pub fn with_defaults(auto_start: bool, dark_theme: bool, language: &str) -> Self {
        Self {
            is_active: auto_start,
            is_dark_theme: dark_theme,
            language: language.to_string(),
            ..Self::default()
        }
    }

    /// True when the countdown has everything it needs to tick.
    pub fn is_counting(&self) -> bool {
        self.is_active && self.birth_date.is_some()
    }
}

/// Normalize a language code to one of [`SUPPORTED_LANGUAGES`].
///
/// Region suffixes are dropped (`en-US` -> `en`); anything unsupported falls
/// back to English.
pub fn normalize_language(code: &str) -> String {
    let primary = code
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if SUPPORTED_LANGUAGES.contains(&primary.as_str()) {
        primary
    } else {
        "en".to_string()
    }
}
