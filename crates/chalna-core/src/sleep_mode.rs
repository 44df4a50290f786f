//! Quiet-hours policy.
//!
//! A daily window (by default 22:00 to 06:00) during which the countdown can
//! pause and notifications stay quiet. Windows where the start is later than
//! the end wrap past midnight. Both boundaries are inclusive at minute
//! resolution.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Persisted under `death_clock_sleep_mode` and in the `[sleep]` config section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_start", alias = "startTime")]
    pub start_time: String,
    #[serde(default = "default_end", alias = "endTime")]
    pub end_time: String,
    #[serde(default = "default_true", alias = "pauseTimer")]
    pub pause_timer: bool,
    #[serde(default = "default_true", alias = "muteNotifications")]
    pub mute_notifications: bool,
}

fn default_start() -> String {
    "22:00".into()
}
fn default_end() -> String {
    "06:00".into()
}
fn default_true() -> bool {
    true
}

impl Default for SleepSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            start_time: default_start(),
            end_time: default_end(),
            pause_timer: true,
            mute_notifications: true,
        }
    }
}

/// Parsed window boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SleepWindow {
    /// True when `time` falls inside the window, compared at minute resolution.
    pub fn contains(&self, time: NaiveTime) -> bool {
        let current = minutes_of(time);
        let start = minutes_of(self.start);
        let end = minutes_of(self.end);
        if start > end {
            current >= start || current <= end
        } else {
            current >= start && current <= end
        }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }
}

fn minutes_of(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn parse_hhmm(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| format!("'{raw}' is not a valid HH:MM time"))
}

/// Snapshot for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SleepStatus {
    pub in_sleep_mode: bool,
    pub next_wake_up: Option<NaiveDateTime>,
    pub hours_until_wake_up: i64,
    pub minutes_until_wake_up: i64,
}

impl SleepSettings {
    /// Parse the configured boundaries.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending value if either time is not `HH:MM`.
    pub fn window(&self) -> Result<SleepWindow, String> {
        Ok(SleepWindow {
            start: parse_hhmm(&self.start_time)?,
            end: parse_hhmm(&self.end_time)?,
        })
    }

    /// True when sleep mode is enabled and `time` is inside the window.
    pub fn is_in_sleep_window(&self, time: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        match self.window() {
            Ok(window) => window.contains(time),
            Err(err) => {
                tracing::warn!(error = %err, "ignoring invalid sleep window");
                false
            }
        }
    }

    pub fn should_pause_timer(&self, now: NaiveDateTime) -> bool {
        self.pause_timer && self.is_in_sleep_window(now.time())
    }

    pub fn should_mute_notifications(&self, now: NaiveDateTime) -> bool {
        self.mute_notifications && self.is_in_sleep_window(now.time())
    }

    /// The end of the window today, or tomorrow if that has already passed.
    pub fn next_wake_up(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let end = self.window().ok()?.end;
        let today = now.date().and_time(end);
        if today <= now {
            Some(today + Duration::days(1))
        } else {
            Some(today)
        }
    }

    /// Time left until [`next_wake_up`](Self::next_wake_up), or `None`
    /// outside the window.
    pub fn time_until_wake_up(&self, now: NaiveDateTime) -> Option<Duration> {
        if !self.is_in_sleep_window(now.time()) {
            return None;
        }
        self.next_wake_up(now).map(|wake| wake - now)
    }

    pub fn status(&self, now: NaiveDateTime) -> SleepStatus {
        match self.time_until_wake_up(now) {
            Some(left) => SleepStatus {
                in_sleep_mode: true,
                next_wake_up: self.next_wake_up(now),
                hours_until_wake_up: left.num_hours(),
                minutes_until_wake_up: left.num_minutes() % 60,
            },
            None => SleepStatus {
                in_sleep_mode: false,
                next_wake_up: None,
                hours_until_wake_up: 0,
                minutes_until_wake_up: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap().and_time(t(h, m))
    }

    fn enabled() -> SleepSettings {
        SleepSettings {
            enabled: true,
            ..SleepSettings::default()
        }
    }

    #[test]
    fn disabled_by_default() {
        let settings = SleepSettings::default();
        assert!(!settings.is_in_sleep_window(t(23, 0)));
        assert!(!settings.should_pause_timer(at(23, 0)));
    }

    #[test]
    fn overnight_window_is_inclusive() {
        let settings = enabled();
        assert!(settings.is_in_sleep_window(t(22, 0)));
        assert!(settings.is_in_sleep_window(t(23, 59)));
        assert!(settings.is_in_sleep_window(t(0, 0)));
        assert!(settings.is_in_sleep_window(t(6, 0)));
        assert!(!settings.is_in_sleep_window(t(6, 1)));
        assert!(!settings.is_in_sleep_window(t(21, 59)));
        assert!(!settings.is_in_sleep_window(t(12, 0)));
    }

    #[test]
    fn daytime_window() {
        let settings = SleepSettings {
            start_time: "13:00".into(),
            end_time: "14:30".into(),
            ..enabled()
        };
        assert!(settings.is_in_sleep_window(t(13, 0)));
        assert!(settings.is_in_sleep_window(t(14, 30)));
        assert!(!settings.is_in_sleep_window(t(14, 31)));
        assert!(!settings.is_in_sleep_window(t(23, 0)));
    }

    #[test]
    fn pause_and_mute_follow_flags() {
        let settings = SleepSettings {
            pause_timer: false,
            ..enabled()
        };
        assert!(!settings.should_pause_timer(at(23, 0)));
        assert!(settings.should_mute_notifications(at(23, 0)));
    }

    #[test]
    fn next_wake_up_rolls_to_tomorrow() {
        let settings = enabled();
        assert_eq!(settings.next_wake_up(at(3, 0)), Some(at(6, 0)));
        assert_eq!(
            settings.next_wake_up(at(23, 0)),
            Some(at(6, 0) + Duration::days(1))
        );
        assert_eq!(
            settings.next_wake_up(at(6, 0)),
            Some(at(6, 0) + Duration::days(1))
        );
    }

    #[test]
    fn status_reports_time_left() {
        let status = enabled().status(at(23, 15));
        assert!(status.in_sleep_mode);
        assert_eq!(status.hours_until_wake_up, 6);
        assert_eq!(status.minutes_until_wake_up, 45);
        assert!(!enabled().status(at(12, 0)).in_sleep_mode);
    }

    #[test]
    fn invalid_times_never_match() {
        let settings = SleepSettings {
            start_time: "25:00".into(),
            ..enabled()
        };
        assert!(settings.window().is_err());
        assert!(!settings.is_in_sleep_window(t(23, 0)));
    }

    #[test]
    fn reads_camel_case_settings() {
        let settings: SleepSettings = serde_json::from_str(
            r#"{"enabled":true,"startTime":"21:30","endTime":"05:00","pauseTimer":false}"#,
        )
        .unwrap();
        assert_eq!(settings.start_time, "21:30");
        assert!(!settings.pause_timer);
        assert!(settings.mute_notifications);
    }
}
