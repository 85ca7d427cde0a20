//! Errors and warnings raised by the planning engine.
//!
//! Every variant of [`PlanningError`] means "the requested view cannot be computed" and names the
//! input which needs correcting. None of them should take the process down.
use crate::month::Month;
use std::path::PathBuf;
use thiserror::Error;

/// A precondition of a planning computation was not met
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    /// A required column is absent from an input table
    #[error("Required column '{column}' is missing from {}", file.display())]
    MissingColumn {
        /// The file which was read
        file: PathBuf,
        /// The (normalised) name of the missing column
        column: String,
    },
    /// There is no baseline data to work from (e.g. no records in the selected date range)
    #[error("No baseline data {0}")]
    EmptyBaseline(String),
    /// Too few points to fit a regression
    #[error("Not enough data for {what}: need at least {required} points, found {found}")]
    InsufficientData {
        /// What the data was needed for
        what: &'static str,
        /// Minimum number of points
        required: usize,
        /// Number of points available
        found: usize,
    },
    /// The start of a date range is after its end
    #[error("Start month {start} is after end month {end}")]
    InvalidDateOrder {
        /// First month of the range
        start: Month,
        /// Last month of the range
        end: Month,
    },
    /// There is no record to take a starting position from
    #[error("No data for specialty '{specialty}' at or before {month}")]
    NoDataBefore {
        /// The selected specialty
        specialty: String,
        /// The month which was searched back from
        month: Month,
    },
    /// A pipeline stage was read before it was computed
    #[error("Result of stage '{stage}' is not available; run it before '{requested_by}'")]
    MissingPrerequisite {
        /// The stage whose output is missing
        stage: String,
        /// The stage (or caller) which needed it
        requested_by: String,
    },
    /// A scalar argument is outside its valid range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// A ratio had a zero denominator, so the metric was reported as zero.
///
/// This is recovered locally: the affected output carries the warning in its `warnings` list and
/// never contains a `NaN` or infinite value because of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Denominator of '{metric}' is zero; reporting 0")]
pub struct DivisionByZeroWarning {
    /// Name of the affected metric
    pub metric: &'static str,
}

/// Divide, substituting zero (and recording a warning) when the result would not be finite.
pub fn checked_ratio(
    numerator: f64,
    denominator: f64,
    metric: &'static str,
    warnings: &mut Vec<DivisionByZeroWarning>,
) -> f64 {
    let value = numerator / denominator;
    if denominator == 0.0 || !value.is_finite() {
        let warning = DivisionByZeroWarning { metric };
        log::warn!("{warning}");
        warnings.push(warning);
        return 0.0;
    }

    value
}

/// Replace `NaN` and infinite values with zero before they reach user-visible output
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(10.0, 4.0, 2.5, false)]
    #[case(0.0, 4.0, 0.0, false)]
    #[case(10.0, 0.0, 0.0, true)]
    #[case(0.0, 0.0, 0.0, true)]
    #[case(f64::NAN, 1.0, 0.0, true)]
    fn test_checked_ratio(
        #[case] numerator: f64,
        #[case] denominator: f64,
        #[case] expected: f64,
        #[case] flagged: bool,
    ) {
        let mut warnings = Vec::new();
        assert_eq!(
            checked_ratio(numerator, denominator, "metric", &mut warnings),
            expected
        );
        assert_eq!(!warnings.is_empty(), flagged);
    }

    #[test]
    fn test_finite_or_zero() {
        assert_eq!(finite_or_zero(1.5), 1.5);
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
        assert_eq!(finite_or_zero(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_error_messages() {
        let err = PlanningError::InsufficientData {
            what: "trend fitting",
            required: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "Not enough data for trend fitting: need at least 2 points, found 1"
        );
    }
}
