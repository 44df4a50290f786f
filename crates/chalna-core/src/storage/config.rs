//! TOML-based application configuration.
//!
//! Stores host preferences including:
//! - First-launch defaults (life expectancy, language, theme, auto start)
//! - Background sync and notice timings
//! - Notification backend selection
//! - Sleep mode window
//! - Developer test mode
//!
//! Configuration is stored at `~/.config/chalna/config.toml`. Session data
//! (birth date, active flag, ...) lives in the key-value store instead.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::notification::Platform;
use crate::profile::DEFAULT_LIFE_EXPECTANCY;
use crate::sleep_mode::SleepSettings;
use crate::validation::validate_life_expectancy;

/// Upper bound for how long a transient notice stays on screen.
pub const MAX_NOTICE_SECS: u64 = 3_600;

/// Values a fresh session starts from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_life_expectancy")]
    pub life_expectancy: u32,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_true")]
    pub dark_theme: bool,
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

/// Background/foreground reconciliation timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Background gaps longer than this show the sync notice.
    #[serde(default = "default_sync_threshold")]
    pub sync_notice_threshold_secs: u64,
    #[serde(default = "default_sync_notice")]
    pub sync_notice_secs: u64,
    #[serde(default = "default_timezone_notice")]
    pub timezone_notice_secs: u64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub platform: Platform,
}

/// Developer aids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeveloperConfig {
    /// Count towards a deadline a few minutes out instead of the real one.
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_test_deadline")]
    pub test_deadline_minutes: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/chalna/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: DefaultsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub sleep: SleepSettings,
    #[serde(default)]
    pub developer: DeveloperConfig,
}

// Default functions
fn default_life_expectancy() -> u32 {
    DEFAULT_LIFE_EXPECTANCY
}
fn default_language() -> String {
    "en".into()
}
fn default_true() -> bool {
    true
}
fn default_sync_threshold() -> u64 {
    60
}
fn default_sync_notice() -> u64 {
    3
}
fn default_timezone_notice() -> u64 {
    5
}
fn default_tick_interval() -> u64 {
    1_000
}
fn default_test_deadline() -> u32 {
    5
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            life_expectancy: default_life_expectancy(),
            language: default_language(),
            dark_theme: true,
            auto_start: true,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_notice_threshold_secs: default_sync_threshold(),
            sync_notice_secs: default_sync_notice(),
            timezone_notice_secs: default_timezone_notice(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            platform: Platform::default(),
        }
    }
}

impl Default for DeveloperConfig {
    fn default() -> Self {
        Self {
            test_mode: false,
            test_deadline_minutes: default_test_deadline(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
                    ),
                    serde_json::Value::Number(_) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the defaults cannot be written.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving. Returns error if the key is
    /// unknown or the resulting configuration is invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// or fails validation.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value is invalid,
    /// or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_life_expectancy(&self.defaults.life_expectancy.to_string(), None).map_err(|e| {
            ConfigError::InvalidValue {
                key: "defaults.life_expectancy".into(),
                message: e.to_string(),
            }
        })?;
        self.sleep.window().map_err(|e| ConfigError::InvalidValue {
            key: "sleep".into(),
            message: e,
        })?;
        for (key, secs) in [
            ("sync.sync_notice_secs", self.sync.sync_notice_secs),
            ("sync.timezone_notice_secs", self.sync.timezone_notice_secs),
        ] {
            if secs > MAX_NOTICE_SECS {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("must be at most {MAX_NOTICE_SECS} seconds"),
                });
            }
        }
        if self.sync.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sync.tick_interval_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "using default configuration");
            Self::default()
        })
    }
}
