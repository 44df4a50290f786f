//! Deadline calculation: birth date plus life expectancy.
//!
//! The deadline keeps the birth date's month and day and the birth's local
//! midnight time of day. A Feb 29 birthday whose target year is not a leap
//! year falls back to Feb 28.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::CalculationError;
use crate::profile::{BirthDate, LifeExpectancy};

/// The local wall-clock instant the countdown runs towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Deadline(NaiveDateTime);

impl Deadline {
    pub fn new(at: NaiveDateTime) -> Self {
        Self(at)
    }

    pub fn at(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S"))
    }
}

/// Gregorian leap-year rule.
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Compute the deadline for `birth` plus `life` years.
///
/// # Errors
///
/// Returns [`CalculationError::InvalidDeadline`] only when the target year is
/// outside chrono's representable range.
pub fn compute_deadline(
    birth: BirthDate,
    life: LifeExpectancy,
) -> Result<Deadline, CalculationError> {
    let years = life.years();
    let invalid = || CalculationError::InvalidDeadline {
        birth: birth.date(),
        years,
    };

    let target_year = birth
        .year()
        .checked_add(i32::try_from(years).map_err(|_| invalid())?)
        .ok_or_else(invalid)?;

    let (month, day) = match (birth.month(), birth.day()) {
        (2, 29) if !is_leap_year(target_year) => (2, 28),
        other => other,
    };

    let date = NaiveDate::from_ymd_opt(target_year, month, day).ok_or_else(invalid)?;
    Ok(Deadline(date.and_time(NaiveTime::MIN)))
}
