//! Code for working with calendar months.
use anyhow::{Context, Result, ensure};
use chrono::{Datelike, NaiveDate};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A calendar month.
///
/// Input dates at any day of the month are normalised to the month itself. Where a date is needed
/// (e.g. as an x value for regression) the last day of the month is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Create a new [`Month`], checking that `month` is in the range 1-12
    pub fn new(year: i32, month: u32) -> Result<Self> {
        ensure!(
            (1..=12).contains(&month),
            "Month must be between 1 and 12, got {month}"
        );
        ensure!(
            NaiveDate::from_ymd_opt(year, month, 1).is_some(),
            "Year {year} is out of range"
        );

        Ok(Self { year, month })
    }

    /// The calendar year
    pub fn year(self) -> i32 {
        self.year
    }

    /// The month of the year (1-12)
    pub fn month(self) -> u32 {
        self.month
    }

    /// A running count of months, so that consecutive months differ by one
    pub fn index(self) -> i64 {
        self.year as i64 * 12 + (self.month as i64 - 1)
    }

    /// Inverse of [`Month::index`]
    fn from_index(index: i64) -> Self {
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// The month `n` months after this one (or before it, if `n` is negative)
    pub fn offset(self, n: i64) -> Self {
        Self::from_index(self.index() + n)
    }

    /// Number of months from `self` to `other`, inclusive of both ends
    pub fn months_until(self, other: Month) -> i64 {
        other.index() - self.index() + 1
    }

    /// The last day of the month
    pub fn last_day(self) -> NaiveDate {
        let next = self.offset(1);
        NaiveDate::from_ymd_opt(next.year, next.month, 1)
            .and_then(|d| d.pred_opt())
            .expect("Month is always constructed with a valid date")
    }

    /// Day number of the month-end date, counting from 1 January of year 1
    pub fn ordinal(self) -> i64 {
        self.last_day().num_days_from_ce() as i64
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = anyhow::Error;

    /// Parse either `YYYY-MM` or a full `YYYY-MM-DD` date
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d"))
            .with_context(|| format!("Invalid month: '{s}' (expected YYYY-MM or YYYY-MM-DD)"))?;

        Month::new(date.year(), date.month())
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    fn month(year: i32, month: u32) -> Month {
        Month::new(year, month).unwrap()
    }

    #[rstest]
    #[case("2024-03", month(2024, 3))]
    #[case("2024-03-01", month(2024, 3))]
    #[case("2024-03-31", month(2024, 3))]
    #[case(" 2023-12 ", month(2023, 12))]
    fn test_parse_month(#[case] input: &str, #[case] expected: Month) {
        assert_eq!(input.parse::<Month>().unwrap(), expected);
    }

    #[rstest]
    #[case("2024-13", "Invalid month: '2024-13' (expected YYYY-MM or YYYY-MM-DD)")]
    #[case("March 2024", "Invalid month: 'March 2024' (expected YYYY-MM or YYYY-MM-DD)")]
    #[case("", "Invalid month: '' (expected YYYY-MM or YYYY-MM-DD)")]
    fn test_parse_month_invalid(#[case] input: &str, #[case] msg: &str) {
        assert_error!(input.parse::<Month>(), msg);
    }

    #[rstest]
    #[case(month(2024, 1), 1, month(2024, 2))]
    #[case(month(2024, 12), 1, month(2025, 1))]
    #[case(month(2024, 1), -1, month(2023, 12))]
    #[case(month(2024, 5), -12, month(2023, 5))]
    #[case(month(2024, 5), 0, month(2024, 5))]
    fn test_offset(#[case] start: Month, #[case] n: i64, #[case] expected: Month) {
        assert_eq!(start.offset(n), expected);
    }

    #[test]
    fn test_months_until() {
        assert_eq!(month(2024, 4).months_until(month(2024, 9)), 6);
        assert_eq!(month(2023, 10).months_until(month(2024, 3)), 6);
        assert_eq!(month(2024, 4).months_until(month(2024, 4)), 1);
    }

    #[test]
    fn test_last_day() {
        assert_eq!(
            month(2024, 2).last_day(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            month(2023, 12).last_day(),
            NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()
        );
    }

    #[test]
    fn test_ordinal_increases_with_days_in_month() {
        let jan = month(2024, 1);
        assert_eq!(jan.offset(1).ordinal() - jan.ordinal(), 29);
    }

    #[test]
    fn test_display() {
        assert_eq!(month(2024, 3).to_string(), "2024-03");
    }
}
