//! Validated user profile values.
//!
//! [`BirthDate`] and [`LifeExpectancy`] can only be obtained through the
//! validators in [`crate::validation`] (or by deserializing previously
//! persisted values), so the deadline calculator can rely on their ranges.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Lowest accepted life expectancy in years.
pub const MIN_LIFE_EXPECTANCY: u32 = 1;
/// Highest accepted life expectancy in years. Also bounds how old a birth date may be.
pub const MAX_LIFE_EXPECTANCY: u32 = 150;
/// Life expectancy used before the user picks one.
pub const DEFAULT_LIFE_EXPECTANCY: u32 = 80;

/// A calendar date of birth, interpreted as local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BirthDate(NaiveDate);

impl BirthDate {
    pub(crate) fn new_unchecked(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Whole years lived as of `today`.
    ///
    /// The current year only counts once the birthday (month, day) has been
    /// reached. Feb 29 birthdays count on Mar 1 in non-leap years.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let mut years = today.year() - self.year();
        if (today.month(), today.day()) < (self.month(), self.day()) {
            years -= 1;
        }
        years.max(0) as u32
    }

    /// ISO `YYYY-MM-DD` form used as the persisted representation.
    pub fn to_iso(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl fmt::Display for BirthDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Expected lifespan in whole years, within
/// [`MIN_LIFE_EXPECTANCY`]..=[`MAX_LIFE_EXPECTANCY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LifeExpectancy(u32);

impl LifeExpectancy {
    pub(crate) fn new_unchecked(years: u32) -> Self {
        Self(years)
    }

    pub fn years(&self) -> u32 {
        self.0
    }
}

impl Default for LifeExpectancy {
    fn default() -> Self {
        Self(DEFAULT_LIFE_EXPECTANCY)
    }
}

impl fmt::Display for LifeExpectancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A cross-validated birth date and life expectancy pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub birth_date: BirthDate,
    pub life_expectancy: LifeExpectancy,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn age_counts_only_after_birthday() {
        let birth = BirthDate::new_unchecked(date(1990, 6, 15));
        assert_eq!(birth.age_on(date(2020, 6, 14)), 29);
        assert_eq!(birth.age_on(date(2020, 6, 15)), 30);
        assert_eq!(birth.age_on(date(1990, 6, 15)), 0);
    }

    #[test]
    fn leap_day_birthday_ages_on_march_first() {
        let birth = BirthDate::new_unchecked(date(2000, 2, 29));
        assert_eq!(birth.age_on(date(2001, 2, 28)), 0);
        assert_eq!(birth.age_on(date(2001, 3, 1)), 1);
    }

    #[test]
    fn birth_date_serializes_as_iso_string() {
        let birth = BirthDate::new_unchecked(date(2000, 1, 1));
        assert_eq!(serde_json::to_string(&birth).unwrap(), "\"2000-01-01\"");
        assert_eq!(birth.to_iso(), "2000-01-01");
    }
}
