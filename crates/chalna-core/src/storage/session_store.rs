//! Session state persistence over a [`KeyValueStore`].
//!
//! Every value is JSON-encoded. Operations retry once after a short delay and
//! then fall back to the caller's default; nothing here returns an error to
//! the caller. Failures are logged and handed to the crash reporter.
//!
//! Whole-state `load`/`save` calls are cancellable: each one takes a
//! [`CancellationToken`] and a generation number, and a newer operation
//! supersedes any older one still in flight. A superseded or cancelled
//! operation stops writing and its result is discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::session::{keys, normalize_language, PermissionState, SessionState};
use super::KeyValueStore;
use crate::crash::CrashReporter;
use crate::error::StorageError;
use crate::profile::BirthDate;
use crate::validation::validate_life_expectancy;

const STORAGE_HEALTH_KEY: &str = "_storage_health";
const MAX_RETRIES: u32 = 1;

/// Result of [`SessionStateStore::check_health`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageHealth {
    pub healthy: bool,
    pub message: Option<String>,
}

impl StorageHealth {
    fn ok() -> Self {
        Self {
            healthy: true,
            message: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: Some(message.into()),
        }
    }
}

/// Handle for one in-flight `load` or `save`.
#[derive(Debug, Clone)]
pub struct OpTicket {
    generation: u64,
    token: CancellationToken,
    latest: Arc<AtomicU64>,
}

impl OpTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once the token is cancelled or a newer operation has started.
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled() && self.latest.load(Ordering::SeqCst) == self.generation
    }
}

pub struct SessionStateStore {
    backend: Arc<dyn KeyValueStore>,
    crash: Arc<dyn CrashReporter>,
    retry_delay: Duration,
    latest: Arc<AtomicU64>,
}

impl SessionStateStore {
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

    pub fn new(backend: Arc<dyn KeyValueStore>, crash: Arc<dyn CrashReporter>) -> Self {
        Self {
            backend,
            crash,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// Start a new generation. Older tickets stop being live.
    pub fn begin(&self, token: &CancellationToken) -> OpTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        OpTicket {
            generation,
            token: token.clone(),
            latest: Arc::clone(&self.latest),
        }
    }

    // ── Single keys ──────────────────────────────────────────────────

    /// Read and decode `key`, or `default` if it is missing, malformed, or
    /// the backend keeps failing.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_opt(key).await.unwrap_or(default)
    }

    pub async fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self
            .with_retry("get", key, |backend| backend.get(key))
            .await
            .ok()??;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "ignoring malformed stored value");
                None
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                let err = StorageError::Malformed {
                    key: key.to_string(),
                    message: err.to_string(),
                };
                tracing::error!(key, error = %err, "failed to encode value");
                self.crash.report_crash("storage", &err);
                return false;
            }
        };
        self.with_retry("set", key, |backend| backend.set(key, &raw))
            .await
            .is_ok()
    }

    pub async fn remove(&self, key: &str) -> bool {
        self.with_retry("remove", key, |backend| backend.remove(key))
            .await
            .is_ok()
    }

    pub async fn clear(&self) -> bool {
        self.with_retry("clear", "*", |backend| backend.clear())
            .await
            .is_ok()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.with_retry("keys", "*", |backend| backend.keys())
            .await
            .unwrap_or_default()
    }

    /// Write, read back and delete a throwaway key stamped with `now`.
    ///
    /// Detects media that accept writes but return nothing or garbage.
    /// Failures are reported like any other storage failure.
    pub async fn check_health(&self, now: DateTime<Utc>) -> StorageHealth {
        let stamp = now.timestamp_millis();
        let key = format!("{STORAGE_HEALTH_KEY}_{stamp}");
        let probe = serde_json::json!({ "test": true, "timestamp": stamp });

        if let Err(err) = self.backend.set(&key, &probe.to_string()) {
            return self.unhealthy(&key, format!("storage error: {err}"), err);
        }
        let read = self.backend.get(&key);
        if let Err(err) = self.backend.remove(&key) {
            tracing::warn!(key = %key, error = %err, "failed to remove health probe");
        }

        let retrieved = match read {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                let err = StorageError::Unavailable("written value was not readable".into());
                return self.unhealthy(&key, "storage read failed", err);
            }
            Err(err) => return self.unhealthy(&key, format!("storage error: {err}"), err),
        };

        match serde_json::from_str::<serde_json::Value>(&retrieved) {
            Ok(value) if value.get("test") == Some(&serde_json::Value::Bool(true)) => {
                StorageHealth::ok()
            }
            _ => {
                let err = StorageError::Malformed {
                    key: key.clone(),
                    message: "read back a different value".into(),
                };
                self.unhealthy(&key, "data integrity check failed", err)
            }
        }
    }

    fn unhealthy(&self, key: &str, message: impl Into<String>, err: StorageError) -> StorageHealth {
        tracing::error!(key, error = %err, "storage health check failed");
        self.crash.report_crash("storage", &err);
        StorageHealth::failed(message)
    }

    // ── Whole state ──────────────────────────────────────────────────

    /// Load the session, starting from `defaults` for anything missing.
    ///
    /// Returns `None` if the operation was cancelled or superseded before it
    /// finished.
    pub async fn load(
        &self,
        defaults: &SessionState,
        token: &CancellationToken,
    ) -> Option<SessionState> {
        let ticket = self.begin(token);
        if !ticket.is_live() {
            return None;
        }

        let mut state = defaults.clone();
        state.nickname = self
            .get_opt::<String>(keys::NICKNAME)
            .await
            .filter(|n| !n.trim().is_empty())
            .or(state.nickname);
        if let Some(birth) = self.load_birth_date().await {
            state.birth_date = Some(birth);
        }
        if let Some(life) = self.load_life_expectancy().await {
            state.life_expectancy = life;
        }
        state.is_active = self.get(keys::IS_ACTIVE, state.is_active).await;
        state.last_calculation_ms = self
            .get_opt(keys::LAST_CALCULATION_TIME)
            .await
            .or(state.last_calculation_ms);
        state.is_dark_theme = self.get(keys::IS_DARK_THEME, state.is_dark_theme).await;
        if let Some(language) = self.get_opt::<String>(keys::LANGUAGE).await {
            state.language = normalize_language(&language);
        }
        state.onboarding_complete = self
            .get(keys::ONBOARDING_COMPLETE, state.onboarding_complete)
            .await;
        state.notification_permission = self
            .get(keys::NOTIFICATION_PERMISSION, PermissionState::Unknown)
            .await;
        state.has_asked_for_notification_permission = self
            .get(
                keys::HAS_ASKED_FOR_NOTIFICATION_PERMISSION,
                state.has_asked_for_notification_permission,
            )
            .await;

        if !ticket.is_live() {
            tracing::debug!(generation = ticket.generation(), "load cancelled");
            return None;
        }
        Some(state)
    }

    /// Persist the whole session. Stops at the first key written after the
    /// operation was cancelled or superseded and returns `false`.
    pub async fn save(&self, state: &SessionState, token: &CancellationToken) -> bool {
        let ticket = self.begin(token);

        let life = state.life_expectancy.years().to_string();
        let entries: Vec<(&str, Option<serde_json::Value>)> = vec![
            (keys::NICKNAME, state.nickname.as_ref().map(|n| n.as_str().into())),
            (keys::BIRTH_DATE, state.birth_date.map(|b| b.to_iso().into())),
            (keys::LIFE_EXPECTANCY, Some(life.into())),
            (keys::IS_ACTIVE, Some(state.is_active.into())),
            (
                keys::LAST_CALCULATION_TIME,
                state.last_calculation_ms.map(Into::into),
            ),
            (keys::IS_DARK_THEME, Some(state.is_dark_theme.into())),
            (keys::LANGUAGE, Some(state.language.as_str().into())),
            (keys::ONBOARDING_COMPLETE, Some(state.onboarding_complete.into())),
            (
                keys::NOTIFICATION_PERMISSION,
                serde_json::to_value(state.notification_permission).ok(),
            ),
            (
                keys::HAS_ASKED_FOR_NOTIFICATION_PERMISSION,
                Some(state.has_asked_for_notification_permission.into()),
            ),
        ];

        let mut all_ok = true;
        for (key, value) in entries {
            if !ticket.is_live() {
                tracing::debug!(generation = ticket.generation(), key, "save cancelled");
                return false;
            }
            all_ok &= match value {
                Some(value) => self.set(key, &value).await,
                None => self.remove(key).await,
            };
        }
        all_ok
    }

    /// Record the last recomputation instant. Called on every tick.
    pub async fn save_checkpoint(&self, epoch_ms: i64) -> bool {
        self.set(keys::LAST_CALCULATION_TIME, &epoch_ms).await
    }

    async fn load_birth_date(&self) -> Option<BirthDate> {
        let raw = self.get_opt::<String>(keys::BIRTH_DATE).await?;
        // Older versions stored a full ISO timestamp; the date prefix is enough.
        let date_part = raw.get(..10).unwrap_or(&raw);
        match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
            Ok(date) => Some(BirthDate::new_unchecked(date)),
            Err(err) => {
                tracing::warn!(raw = %raw, error = %err, "ignoring unreadable birth date");
                None
            }
        }
    }

    async fn load_life_expectancy(&self) -> Option<crate::profile::LifeExpectancy> {
        // Stored as a string by current versions, as a number by some older ones.
        let raw = match self.get_opt::<serde_json::Value>(keys::LIFE_EXPECTANCY).await? {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                tracing::warn!(value = %other, "ignoring unreadable life expectancy");
                return None;
            }
        };
        match validate_life_expectancy(&raw, None) {
            Ok(life) => Some(life),
            Err(err) => {
                tracing::warn!(raw = %raw, error = %err, "ignoring invalid life expectancy");
                None
            }
        }
    }

    async fn with_retry<T>(
        &self,
        op: &'static str,
        key: &str,
        mut f: impl FnMut(&dyn KeyValueStore) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut attempt = 0;
        loop {
            match f(self.backend.as_ref()) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    tracing::warn!(op, key, attempt, error = %err, "storage operation failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    tracing::error!(op, key, attempts = attempt + 1, error = %err, "storage operation failed");
                    self.crash.report_crash("storage", &err);
                    return Err(err);
                }
            }
        }
    }
}
