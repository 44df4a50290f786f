//! Local usage counters, persisted under `death_clock_analytics`.
//!
//! Nothing here leaves the device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyticsData {
    pub app_launches: u32,
    pub timer_starts: u32,
    /// Seconds across all finished sessions.
    #[serde(alias = "totalTimeActive")]
    pub total_time_active_secs: u64,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_active_date: Option<DateTime<Utc>>,
    pub theme_changes: u32,
    pub language_changes: u32,
    /// Running mean of the life expectancy at each timer start, rounded.
    pub average_life_expectancy: u32,
    pub birthdate_set: bool,
    pub resets: u32,
}

/// Older records store an empty string before the first launch.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok().map(|d| d.with_timezone(&Utc))))
}

/// Counter updates plus the open session's start instant.
#[derive(Debug, Default)]
pub struct Analytics {
    data: AnalyticsData,
    session_start: Option<DateTime<Utc>>,
}

impl Analytics {
    pub fn new(data: AnalyticsData) -> Self {
        Self {
            data,
            session_start: None,
        }
    }

    pub fn data(&self) -> &AnalyticsData {
        &self.data
    }

    pub fn session_open(&self) -> bool {
        self.session_start.is_some()
    }

    pub fn launch(&mut self, now: DateTime<Utc>) {
        self.data.app_launches = self.data.app_launches.saturating_add(1);
        self.data.last_active_date = Some(now);
        self.session_start = Some(now);
    }

    pub fn timer_started(&mut self, life_expectancy: u32) {
        let starts = self.data.timer_starts.saturating_add(1);
        let total = u64::from(self.data.average_life_expectancy) * u64::from(starts - 1)
            + u64::from(life_expectancy);
        self.data.timer_starts = starts;
        self.data.average_life_expectancy =
            (total as f64 / f64::from(starts)).round() as u32;
    }

    pub fn birthdate_set(&mut self) {
        self.data.birthdate_set = true;
    }

    pub fn theme_changed(&mut self) {
        self.data.theme_changes = self.data.theme_changes.saturating_add(1);
    }

    pub fn language_changed(&mut self) {
        self.data.language_changes = self.data.language_changes.saturating_add(1);
    }

    pub fn reset_recorded(&mut self) {
        self.data.resets = self.data.resets.saturating_add(1);
    }

    /// Close the open session and add its length to the active total.
    pub fn end_session(&mut self, now: DateTime<Utc>) {
        if let Some(start) = self.session_start.take() {
            let secs = ((now - start).num_milliseconds().max(0) as f64 / 1000.0).round() as u64;
            self.data.total_time_active_secs = self.data.total_time_active_secs.saturating_add(secs);
        }
    }

    pub fn clear(&mut self) {
        self.data = AnalyticsData::default();
    }
}
