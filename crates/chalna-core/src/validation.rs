//! Input validation for the birth date and life expectancy fields.
//!
//! Validators are pure: `today` is passed in rather than read from a clock,
//! and every failure is returned as a [`ValidationError`] whose `Display`
//! output is suitable for showing to the user.

use chrono::{Months, NaiveDate};

use crate::error::ValidationError;
use crate::profile::{
    BirthDate, LifeExpectancy, Profile, MAX_LIFE_EXPECTANCY, MIN_LIFE_EXPECTANCY,
};

/// Parse and validate a raw `YYYY-MM-DD` birth date against `today`.
///
/// Rejects malformed input, dates after `today`, and dates more than
/// 150 years before `today`. Exactly 150 years ago is accepted.
pub fn validate_birth_date(raw: &str, today: NaiveDate) -> Result<BirthDate, ValidationError> {
    let trimmed = raw.trim();
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|_| ValidationError::InvalidFormat(raw.to_string()))?;

    if date > today {
        return Err(ValidationError::FutureDate(date));
    }

    // Feb 29 minus 150 years lands on Feb 28 when that year is not leap.
    let oldest = today
        .checked_sub_months(Months::new(MAX_LIFE_EXPECTANCY * 12))
        .unwrap_or(NaiveDate::MIN);
    if date < oldest {
        return Err(ValidationError::TooOld(date));
    }

    Ok(BirthDate::new_unchecked(date))
}

/// Parse and validate a raw life expectancy.
///
/// `current_age_years` is `None` while the birth date has not been entered
/// yet; the age check is repeated by [`validate_profile`] once both are known.
pub fn validate_life_expectancy(
    raw: &str,
    current_age_years: Option<u32>,
) -> Result<LifeExpectancy, ValidationError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidNumber(raw.to_string()))?;

    if value < i64::from(MIN_LIFE_EXPECTANCY) || value > i64::from(MAX_LIFE_EXPECTANCY) {
        return Err(ValidationError::OutOfRange {
            value,
            min: MIN_LIFE_EXPECTANCY,
            max: MAX_LIFE_EXPECTANCY,
        });
    }

    let years = value as u32;
    if let Some(current_age) = current_age_years {
        if years < current_age {
            return Err(ValidationError::BelowCurrentAge {
                life_expectancy: years,
                current_age,
            });
        }
    }

    Ok(LifeExpectancy::new_unchecked(years))
}

/// Whole years between `birth` and `today`; a birthday not yet reached this
/// year borrows one year.
pub fn age_in_years(birth: &BirthDate, today: NaiveDate) -> u32 {
    birth.age_on(today)
}

/// Validate both fields together, as done when the countdown is started.
pub fn validate_profile(
    raw_birth_date: &str,
    raw_life_expectancy: &str,
    today: NaiveDate,
) -> Result<Profile, ValidationError> {
    let birth_date = validate_birth_date(raw_birth_date, today)?;
    let life_expectancy =
        validate_life_expectancy(raw_life_expectancy, Some(age_in_years(&birth_date, today)))?;
    Ok(Profile {
        birth_date,
        life_expectancy,
    })
}
