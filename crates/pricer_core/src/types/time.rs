//! Date type used to index historical results.
//!
//! This module provides:
//! - `Date`: Type-safe date wrapper around chrono::NaiveDate
//! - `tenor_sort_key`: Ordering helper for market-data point labels such as `3m` or `10y`
//!
//! # Examples
//!
//! ```
//! use pricer_core::types::time::Date;
//!
//! let start = Date::from_ymd(2024, 1, 1).unwrap();
//! let end = Date::from_ymd(2024, 1, 11).unwrap();
//! assert_eq!(end - start, 10);
//! ```

use chrono::{Datelike, NaiveDate};
use std::fmt;
use std::ops::Sub;
use std::str::FromStr;

use super::error::DateError;

/// Type-safe date wrapper around chrono::NaiveDate.
///
/// Dates are the axis along which historical results are composed,
/// so the type is `Copy`, totally ordered and hashable.
///
/// # Examples
///
/// ```
/// use pricer_core::types::time::Date;
///
/// let date = Date::from_ymd(2024, 6, 15).unwrap();
/// let parsed: Date = "2024-06-15".parse().unwrap();
/// assert_eq!(date, parsed);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Date(NaiveDate);

impl Date {
    /// Creates a Date from year, month, and day components.
    ///
    /// # Returns
    /// `Ok(Date)` if the date is valid, `Err(DateError::InvalidDate)` otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricer_core::types::time::Date;
    ///
    /// assert!(Date::from_ymd(2024, 2, 29).is_ok());
    /// assert!(Date::from_ymd(2024, 2, 30).is_err());
    /// ```
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, DateError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or(DateError::InvalidDate { year, month, day })
    }

    /// Parses a date from ISO 8601 format string (YYYY-MM-DD).
    pub fn parse(s: &str) -> Result<Self, DateError> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Date)
            .map_err(|e| DateError::ParseError(e.to_string()))
    }

    /// Returns the underlying NaiveDate.
    pub fn into_inner(self) -> NaiveDate {
        self.0
    }

    /// Returns the year component.
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Returns the month component (1-12).
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Returns the day component (1-31).
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Returns the date `days` calendar days later (earlier if negative).
    pub fn add_days(&self, days: i64) -> Self {
        Date(self.0 + chrono::Duration::days(days))
    }
}

impl From<NaiveDate> for Date {
    fn from(date: NaiveDate) -> Self {
        Date(date)
    }
}

impl Sub for Date {
    type Output = i64;

    /// Returns the number of days between two dates.
    fn sub(self, other: Self) -> i64 {
        (self.0 - other.0).num_days()
    }
}

impl FromStr for Date {
    type Err = DateError;

    fn from_str(s: &str) -> Result<Self, DateError> {
        Date::parse(s)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Sort key for tenor-like point labels (`1d`, `2w`, `3m`, `10y`).
///
/// Returns the approximate length in years, or `None` when the label is
/// not a tenor. Used to order bucketed risk the way traders read it.
///
/// # Examples
///
/// ```
/// use pricer_core::types::time::tenor_sort_key;
///
/// assert!(tenor_sort_key("3m").unwrap() < tenor_sort_key("1y").unwrap());
/// assert_eq!(tenor_sort_key("USD"), None);
/// ```
pub fn tenor_sort_key(label: &str) -> Option<f64> {
    let label = label.trim();
    let (idx, unit) = label.char_indices().last()?;
    let count: f64 = label[..idx].parse().ok()?;

    let years_per_unit = match unit.to_ascii_lowercase() {
        'd' | 'b' => 1.0 / 365.0,
        'w' => 7.0 / 365.0,
        'm' => 1.0 / 12.0,
        'y' => 1.0,
        _ => return None,
    };

    Some(count * years_per_unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_from_ymd_invalid() {
        let err = Date::from_ymd(2023, 2, 29).unwrap_err();
        assert_eq!(
            err,
            DateError::InvalidDate {
                year: 2023,
                month: 2,
                day: 29
            }
        );
    }

    #[test]
    fn test_date_parse_and_display() {
        let date = Date::parse("2024-03-05").unwrap();
        assert_eq!(date.to_string(), "2024-03-05");
        assert!(Date::parse("05/03/2024").is_err());
    }

    #[test]
    fn test_date_ordering_and_subtraction() {
        let a = Date::from_ymd(2024, 1, 1).unwrap();
        let b = a.add_days(31);
        assert!(a < b);
        assert_eq!(b - a, 31);
        assert_eq!(b.month(), 2);
    }

    #[test]
    fn test_tenor_sort_key_orders_buckets() {
        let mut labels = vec!["10y", "1w", "3m", "2y", "1d"];
        labels.sort_by(|a, b| {
            tenor_sort_key(a)
                .partial_cmp(&tenor_sort_key(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        assert_eq!(labels, vec!["1d", "1w", "3m", "2y", "10y"]);
    }

    #[test]
    fn test_tenor_sort_key_rejects_non_tenors() {
        assert_eq!(tenor_sort_key(""), None);
        assert_eq!(tenor_sort_key("EUR"), None);
        assert_eq!(tenor_sort_key("5x"), None);
    }
}
