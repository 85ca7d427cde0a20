//! The baseline period: the window of history treated as representative.
use crate::error::PlanningError;
use crate::month::Month;
use crate::units::Dimensionless;
use std::fmt;

/// First calendar month of the default baseline window (April)
const DEFAULT_WINDOW_FIRST_MONTH: u32 = 4;

/// Last calendar month of the default baseline window (September)
const DEFAULT_WINDOW_LAST_MONTH: u32 = 9;

/// A closed range of months, used to filter history and to scale sums to 12-month equivalents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaselinePeriod {
    start: Month,
    end: Month,
}

impl BaselinePeriod {
    /// Create a new [`BaselinePeriod`], checking that `start` is not after `end`
    pub fn new(start: Month, end: Month) -> Result<Self, PlanningError> {
        if start > end {
            return Err(PlanningError::InvalidDateOrder { start, end });
        }

        Ok(Self { start, end })
    }

    /// The most recent April-September window in which any of `months` falls
    pub fn latest_summer_window<I>(months: I) -> Option<Self>
    where
        I: IntoIterator<Item = Month>,
    {
        let year = months
            .into_iter()
            .filter(|month| {
                (DEFAULT_WINDOW_FIRST_MONTH..=DEFAULT_WINDOW_LAST_MONTH).contains(&month.month())
            })
            .map(Month::year)
            .max()?;

        Some(Self {
            start: Month::new(year, DEFAULT_WINDOW_FIRST_MONTH).ok()?,
            end: Month::new(year, DEFAULT_WINDOW_LAST_MONTH).ok()?,
        })
    }

    /// First month of the period
    pub fn start(&self) -> Month {
        self.start
    }

    /// Last month of the period
    pub fn end(&self) -> Month {
        self.end
    }

    /// Number of months in the period, counting both ends
    pub fn num_months(&self) -> u32 {
        self.start.months_until(self.end) as u32
    }

    /// Factor which converts a sum over the period into a 12-month equivalent.
    ///
    /// This is a linear extrapolation which assumes a uniform monthly rate, not a forecast.
    pub fn scaling_factor(&self) -> Dimensionless {
        Dimensionless(12.0 / self.num_months() as f64)
    }

    /// Whether `month` falls within the period
    pub fn contains(&self, month: Month) -> bool {
        (self.start..=self.end).contains(&month)
    }

    /// Every month in the period, in order
    pub fn months(&self) -> impl Iterator<Item = Month> + use<> {
        let start = self.start;
        (0..i64::from(self.num_months())).map(move |n| start.offset(n))
    }
}

impl fmt::Display for BaselinePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::month;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(month(2024, 4), month(2024, 9), 6, 2.0)]
    #[case(month(2023, 10), month(2024, 9), 12, 1.0)]
    #[case(month(2024, 1), month(2024, 1), 1, 12.0)]
    #[case(month(2023, 1), month(2024, 12), 24, 0.5)]
    fn test_scaling_factor(
        #[case] start: Month,
        #[case] end: Month,
        #[case] num_months: u32,
        #[case] factor: f64,
    ) {
        let period = BaselinePeriod::new(start, end).unwrap();
        assert_eq!(period.num_months(), num_months);
        assert_approx_eq!(Dimensionless, period.scaling_factor(), Dimensionless(factor));
        assert_eq!(period.months().count(), num_months as usize);
    }

    #[test]
    fn test_new_invalid_order() {
        assert_eq!(
            BaselinePeriod::new(month(2024, 9), month(2024, 4)),
            Err(PlanningError::InvalidDateOrder {
                start: month(2024, 9),
                end: month(2024, 4)
            })
        );
    }

    #[test]
    fn test_contains() {
        let period = BaselinePeriod::new(month(2024, 4), month(2024, 9)).unwrap();
        assert!(period.contains(month(2024, 4)));
        assert!(period.contains(month(2024, 9)));
        assert!(!period.contains(month(2024, 10)));
        assert!(!period.contains(month(2023, 6)));
    }

    #[rstest]
    #[case(vec![month(2023, 5), month(2024, 2), month(2024, 6)], Some(2024))]
    #[case(vec![month(2023, 5), month(2024, 2), month(2024, 3)], Some(2023))]
    #[case(vec![month(2024, 1), month(2024, 12)], None)]
    #[case(vec![], None)]
    fn test_latest_summer_window(#[case] months: Vec<Month>, #[case] year: Option<i32>) {
        let expected = year.map(|year| {
            BaselinePeriod::new(month(year, 4), month(year, 9)).unwrap()
        });
        assert_eq!(BaselinePeriod::latest_summer_window(months), expected);
    }
}
