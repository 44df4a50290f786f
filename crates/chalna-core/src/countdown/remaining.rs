//! Calendar-aware remaining-time breakdown.
//!
//! Years and months are counted on the calendar, so the answer does not
//! drift with month length. Days and smaller units come from the exact
//! duration left after the whole years and months have been stepped off.

use std::fmt;

use chrono::{Datelike, Duration, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::deadline::Deadline;
use crate::error::CalculationError;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Time left until the deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemainingTime {
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl RemainingTime {
    pub const ZERO: RemainingTime = RemainingTime {
        years: 0,
        months: 0,
        days: 0,
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Step the breakdown forward from `from`: whole months on the calendar
    /// (day clamped to month end), then the exact day/hour/minute/second span.
    pub fn add_to(&self, from: NaiveDateTime) -> Option<NaiveDateTime> {
        let months = self.years.checked_mul(12)?.checked_add(self.months)?;
        let stepped = from.checked_add_months(Months::new(months))?;
        let span = Duration::days(i64::from(self.days))
            + Duration::hours(i64::from(self.hours))
            + Duration::minutes(i64::from(self.minutes))
            + Duration::seconds(i64::from(self.seconds));
        stepped.checked_add_signed(span)
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}y {}m {}d {:02}:{:02}:{:02}",
            self.years, self.months, self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Outcome of a single calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    Remaining(RemainingTime),
    /// The deadline is now or in the past.
    Expired,
}

impl Countdown {
    pub fn remaining(&self) -> RemainingTime {
        match self {
            Countdown::Remaining(remaining) => *remaining,
            Countdown::Expired => RemainingTime::ZERO,
        }
    }

    pub fn is_expired(&self) -> bool {
        matches!(self, Countdown::Expired)
    }
}

/// Compute the remaining time from `now` until `deadline`.
///
/// # Errors
///
/// Returns [`CalculationError::Overflow`] if stepping `now` forward leaves
/// chrono's representable range.
pub fn compute_remaining(
    deadline: Deadline,
    now: NaiveDateTime,
) -> Result<Countdown, CalculationError> {
    let end = deadline.at();
    if end <= now {
        return Ok(Countdown::Expired);
    }

    let mut years = end.year() - now.year();
    let mut months = end.month() as i32 - now.month() as i32;
    if months < 0 {
        years -= 1;
        months += 12;
    }

    // The last month is incomplete until the deadline's day and time of day
    // have been reached.
    if (end.day(), end.time()) < (now.day(), now.time()) {
        borrow_month(&mut years, &mut months);
    }

    let mut working = step_months(now, years, months)?;
    // Clamping to a short month can still overshoot the deadline.
    while working > end && (years > 0 || months > 0) {
        borrow_month(&mut years, &mut months);
        working = step_months(now, years, months)?;
    }

    let residual_ms = (end - working).num_milliseconds().max(0);
    let days = residual_ms / MS_PER_DAY;
    let hours = (residual_ms % MS_PER_DAY) / MS_PER_HOUR;
    let minutes = (residual_ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (residual_ms % MS_PER_MINUTE) / MS_PER_SECOND;

    Ok(Countdown::Remaining(RemainingTime {
        years: clamp(i64::from(years)),
        months: clamp(i64::from(months)),
        days: clamp(days),
        hours: clamp(hours),
        minutes: clamp(minutes),
        seconds: clamp(seconds),
    }))
}

fn borrow_month(years: &mut i32, months: &mut i32) {
    *months -= 1;
    if *months < 0 {
        *years -= 1;
        *months += 12;
    }
}

fn step_months(
    from: NaiveDateTime,
    years: i32,
    months: i32,
) -> Result<NaiveDateTime, CalculationError> {
    let total = years
        .checked_mul(12)
        .and_then(|y| y.checked_add(months))
        .and_then(|m| u32::try_from(m).ok())
        .ok_or(CalculationError::Overflow("month offset"))?;
    from.checked_add_months(Months::new(total))
        .ok_or(CalculationError::Overflow("working date"))
}

fn clamp(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    fn remaining(deadline: NaiveDateTime, now: NaiveDateTime) -> RemainingTime {
        match compute_remaining(Deadline::new(deadline), now).unwrap() {
            Countdown::Remaining(r) => r,
            Countdown::Expired => panic!("unexpected expiry"),
        }
    }

    #[test]
    fn one_second_before_deadline() {
        let r = remaining(at(2080, 1, 1, 0, 0, 0), at(2079, 12, 31, 23, 59, 59));
        assert_eq!(
            r,
            RemainingTime { years: 0, months: 0, days: 0, hours: 0, minutes: 0, seconds: 1 }
        );
    }

    #[test]
    fn whole_years_and_months() {
        let r = remaining(at(2080, 1, 1, 0, 0, 0), at(2024, 3, 1, 0, 0, 0));
        assert_eq!(
            r,
            RemainingTime { years: 55, months: 10, days: 0, hours: 0, minutes: 0, seconds: 0 }
        );
    }

    #[test]
    fn same_day_later_time_borrows_a_month() {
        // Naive subtraction would step to 2024-04-05 10:00, past the deadline.
        let r = remaining(at(2024, 4, 5, 0, 0, 0), at(2024, 3, 5, 10, 0, 0));
        assert_eq!(
            r,
            RemainingTime { years: 0, months: 0, days: 30, hours: 14, minutes: 0, seconds: 0 }
        );
    }

    #[test]
    fn day_borrow_uses_real_month_length() {
        // February 2023 has 28 days.
        let r = remaining(at(2023, 3, 10, 0, 0, 0), at(2023, 1, 20, 0, 0, 0));
        assert_eq!((r.months, r.days), (1, 18));

        // February 2024 has 29.
        let r = remaining(at(2024, 3, 10, 0, 0, 0), at(2024, 1, 20, 0, 0, 0));
        assert_eq!((r.months, r.days), (1, 19));
    }

    #[test]
    fn month_end_clamping_never_overshoots() {
        let now = at(2023, 1, 31, 10, 0, 0);
        let deadline = at(2023, 3, 1, 0, 0, 0);
        let r = remaining(deadline, now);
        assert_eq!(
            r,
            RemainingTime { years: 0, months: 1, days: 0, hours: 14, minutes: 0, seconds: 0 }
        );
        assert_eq!(r.add_to(now), Some(deadline));
    }

    #[test]
    fn expired_at_and_after_deadline() {
        let deadline = Deadline::new(at(2030, 1, 1, 0, 0, 0));
        assert_eq!(compute_remaining(deadline, at(2030, 1, 1, 0, 0, 0)), Ok(Countdown::Expired));
        assert_eq!(compute_remaining(deadline, at(2031, 6, 1, 0, 0, 0)), Ok(Countdown::Expired));
        assert!(Countdown::Expired.remaining().is_zero());
    }

    #[test]
    fn next_second_cascades_through_boundaries() {
        let deadline = at(2080, 1, 1, 0, 0, 0);
        let a = remaining(deadline, at(2079, 12, 30, 23, 59, 59));
        let b = remaining(deadline, at(2079, 12, 31, 0, 0, 0));
        let c = remaining(deadline, at(2079, 12, 31, 0, 0, 1));
        assert_eq!(
            a,
            RemainingTime { years: 0, months: 0, days: 1, hours: 0, minutes: 0, seconds: 1 }
        );
        assert_eq!(
            b,
            RemainingTime { years: 0, months: 0, days: 1, hours: 0, minutes: 0, seconds: 0 }
        );
        assert_eq!(
            c,
            RemainingTime { years: 0, months: 0, days: 0, hours: 23, minutes: 59, seconds: 59 }
        );
    }

    #[test]
    fn display_format() {
        let r = RemainingTime { years: 1, months: 2, days: 3, hours: 4, minutes: 5, seconds: 6 };
        assert_eq!(r.to_string(), "1y 2m 3d 04:05:06");
    }
}
