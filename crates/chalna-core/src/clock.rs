//! Wall-clock and timezone sources.
//!
//! Everything that needs "now" receives a [`Moment`] from a [`Clock`], so the
//! engine can be driven deterministically by [`ManualClock`] in tests and
//! simulations while the host uses [`SystemClock`].

use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};

/// A single reading of the clock: the absolute instant and the wall-clock
/// time the device shows for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moment {
    pub utc: DateTime<Utc>,
    pub local: NaiveDateTime,
}

impl Moment {
    pub fn epoch_ms(&self) -> i64 {
        self.utc.timestamp_millis()
    }
}

/// Identity of the device timezone at a point in time.
///
/// Two fingerprints differ when the zone changes or when the zone's offset
/// changes (DST transition, manual clock adjustment).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimezoneFingerprint {
    pub zone: String,
    /// Local time minus UTC, in minutes.
    pub offset_minutes: i32,
}

impl TimezoneFingerprint {
    pub fn new(zone: impl Into<String>, offset_minutes: i32) -> Self {
        Self {
            zone: zone.into(),
            offset_minutes,
        }
    }
}

impl fmt::Display for TimezoneFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.zone, self.offset_minutes)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Moment;
    fn timezone(&self) -> TimezoneFingerprint;
}

/// The device clock, via `chrono::Local`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Moment {
        let now = Local::now();
        Moment {
            utc: now.with_timezone(&Utc),
            local: now.naive_local(),
        }
    }

    fn timezone(&self) -> TimezoneFingerprint {
        // TZ overrides the system setting, as it does for chrono's Local.
        let zone = std::env::var("TZ")
            .ok()
            .filter(|tz| !tz.trim().is_empty())
            .or_else(|| match iana_time_zone::get_timezone() {
                Ok(name) => Some(name),
                Err(err) => {
                    tracing::debug!(error = %err, "system timezone name unavailable");
                    None
                }
            })
            .unwrap_or_else(|| "local".to_string());
        let offset_minutes = Local::now().offset().local_minus_utc() / 60;
        TimezoneFingerprint::new(zone, offset_minutes)
    }
}

#[derive(Debug)]
struct ManualState {
    utc: DateTime<Utc>,
    zone: String,
    offset_minutes: i32,
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    /// Start at the given local wall-clock time in a zone with the given offset.
    pub fn at_local(local: NaiveDateTime, zone: impl Into<String>, offset_minutes: i32) -> Self {
        let utc = local - Duration::minutes(i64::from(offset_minutes));
        Self {
            state: Mutex::new(ManualState {
                utc: DateTime::from_naive_utc_and_offset(utc, Utc),
                zone: zone.into(),
                offset_minutes,
            }),
        }
    }

    /// Start at local time in UTC.
    pub fn utc(local: NaiveDateTime) -> Self {
        Self::at_local(local, "UTC", 0)
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.utc += by;
    }

    pub fn set_utc(&self, utc: DateTime<Utc>) {
        self.lock().utc = utc;
    }

    /// Move the device to another zone. The absolute instant is unchanged,
    /// only the wall-clock reading shifts.
    pub fn set_zone(&self, zone: impl Into<String>, offset_minutes: i32) {
        let mut state = self.lock();
        state.zone = zone.into();
        state.offset_minutes = offset_minutes;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Moment {
        let state = self.lock();
        let offset = FixedOffset::east_opt(state.offset_minutes * 60).unwrap_or(Utc.fix());
        Moment {
            utc: state.utc,
            local: state.utc.with_timezone(&offset).naive_local(),
        }
    }

    fn timezone(&self) -> TimezoneFingerprint {
        let state = self.lock();
        TimezoneFingerprint::new(state.zone.clone(), state.offset_minutes)
    }
}
