//! Trend estimation for monthly additions.
//!
//! An ordinary least-squares line is fitted to additions against the month-end day number over a
//! look-back window. The line and a flat historical average are then both scored against the
//! baseline actuals, and the one with the lower mean absolute error is recommended for the forward
//! projection.
use crate::error::PlanningError;
use crate::month::Month;
use crate::stats::{mean, mean_absolute_error};
use log::debug;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// A trend with a p-value below this is considered significant
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// A fitted least-squares line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendModel {
    /// Change in value per unit of x (per day, for month ordinals)
    pub slope: f64,
    /// Value at x = 0
    pub intercept: f64,
    /// Coefficient of determination
    pub r_squared: f64,
    /// Two-sided p-value for the null hypothesis that the slope is zero
    pub p_value: f64,
    /// Standard error of the slope
    pub std_err: f64,
    /// Number of points fitted
    pub num_points: usize,
}

impl TrendModel {
    /// Whether the trend is statistically significant
    pub fn is_significant(&self) -> bool {
        self.p_value < SIGNIFICANCE_LEVEL
    }

    /// The value of the line at `x`
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit a least-squares line to `(x, y)` points.
///
/// Needs at least two points with distinct x values.
pub fn fit(history: &[(f64, f64)]) -> Result<TrendModel, PlanningError> {
    let n = history.len();
    if n < 2 {
        return Err(PlanningError::InsufficientData {
            what: "trend fitting",
            required: 2,
            found: n,
        });
    }

    let n_f = n as f64;
    let x_mean = history.iter().map(|(x, _)| x).sum::<f64>() / n_f;
    let y_mean = history.iter().map(|(_, y)| y).sum::<f64>() / n_f;
    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in history {
        let dx = x - x_mean;
        let dy = y - y_mean;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx == 0.0 {
        // All the points are in the same month
        return Err(PlanningError::InsufficientData {
            what: "trend fitting (distinct months)",
            required: 2,
            found: 1,
        });
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let r = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    let (p_value, std_err) = if n == 2 {
        // A line always passes through two points exactly
        let p_value = if syy == 0.0 { 1.0 } else { 0.0 };
        (p_value, 0.0)
    } else {
        let df = n_f - 2.0;
        let std_err = ((1.0 - r * r) * syy / sxx / df).sqrt();
        let p_value = if r.abs() == 1.0 {
            0.0
        } else {
            let t = r * (df / ((1.0 - r) * (1.0 + r))).sqrt();
            let dist = StudentsT::new(0.0, 1.0, df)
                .map_err(|err| PlanningError::InvalidParameter(err.to_string()))?;
            2.0 * dist.sf(t.abs())
        };
        (p_value, std_err)
    };

    Ok(TrendModel {
        slope,
        intercept,
        r_squared: r * r,
        p_value,
        std_err,
        num_points: n,
    })
}

/// How to project demand forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ProjectionMethod {
    /// Extend the fitted line
    #[display("regression")]
    Regression,
    /// Repeat the mean of the look-back window
    #[display("average")]
    Average,
}

/// The fitted trend, its competitor and which of the two to use
#[derive(Debug, Clone, PartialEq)]
pub struct TrendAnalysis {
    /// The least-squares line over the look-back window
    pub model: TrendModel,
    /// Mean of the look-back window
    pub lookback_mean: f64,
    /// Error of the line against the baseline actuals
    pub regression_mae: f64,
    /// Error of the flat average against the baseline actuals
    pub average_mae: f64,
    /// The method with the lower error (the average wins ties)
    pub recommended: ProjectionMethod,
}

impl TrendAnalysis {
    /// The projected value for `month` using `method`
    pub fn project_month(&self, method: ProjectionMethod, month: Month) -> f64 {
        match method {
            ProjectionMethod::Regression => self.model.predict(month.ordinal() as f64),
            ProjectionMethod::Average => self.lookback_mean,
        }
    }

    /// Projected values for the given months
    pub fn forecast<I>(&self, method: ProjectionMethod, months: I) -> Vec<(Month, f64)>
    where
        I: IntoIterator<Item = Month>,
    {
        months
            .into_iter()
            .map(|month| (month, self.project_month(method, month)))
            .collect()
    }
}

/// Fit a trend to the look-back window and choose a projection method.
///
/// # Arguments
///
/// * `lookback` - Monthly values used to fit the line and the average
/// * `baseline` - Monthly values the two predictors are scored against
pub fn analyse(
    lookback: &[(Month, f64)],
    baseline: &[(Month, f64)],
) -> Result<TrendAnalysis, PlanningError> {
    let points: Vec<_> = lookback
        .iter()
        .map(|(month, value)| (month.ordinal() as f64, *value))
        .collect();
    let model = fit(&points)?;

    let values: Vec<_> = lookback.iter().map(|(_, value)| *value).collect();
    let lookback_mean = mean(&values).unwrap_or_default();

    let regression_mae = mean_absolute_error(
        baseline
            .iter()
            .map(|(month, actual)| (model.predict(month.ordinal() as f64), *actual)),
    );
    let average_mae =
        mean_absolute_error(baseline.iter().map(|(_, actual)| (lookback_mean, *actual)));

    let recommended = if regression_mae < average_mae {
        ProjectionMethod::Regression
    } else {
        ProjectionMethod::Average
    };
    debug!(
        "Trend: slope={}, p={}, regression MAE={regression_mae}, average MAE={average_mae}",
        model.slope, model.p_value
    );

    Ok(TrendAnalysis {
        model,
        lookback_mean,
        regression_mae,
        average_mae,
        recommended,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::month;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_fit_insufficient_data() {
        assert_eq!(
            fit(&[(1.0, 2.0)]),
            Err(PlanningError::InsufficientData {
                what: "trend fitting",
                required: 2,
                found: 1
            })
        );
        assert!(fit(&[(1.0, 2.0), (1.0, 3.0)]).is_err());
    }

    #[test]
    fn test_fit_exact_line() {
        let points: Vec<_> = (0..5).map(|x| (x as f64, 3.0 + 2.0 * x as f64)).collect();
        let model = fit(&points).unwrap();
        assert_approx_eq!(f64, model.slope, 2.0);
        assert_approx_eq!(f64, model.intercept, 3.0);
        assert_approx_eq!(f64, model.r_squared, 1.0);
        assert_eq!(model.p_value, 0.0);
        assert!(model.is_significant());
    }

    #[test]
    fn test_fit_noisy_line() {
        // Values checked against scipy.stats.linregress
        let points = [(1.0, 1.0), (2.0, 3.0), (3.0, 2.0), (4.0, 5.0), (5.0, 4.0)];
        let model = fit(&points).unwrap();
        assert_approx_eq!(f64, model.slope, 0.8);
        assert_approx_eq!(f64, model.intercept, 0.6, epsilon = 1e-12);
        assert_approx_eq!(f64, model.r_squared, 0.64, epsilon = 1e-12);
        assert_approx_eq!(f64, model.std_err, 0.34641016151377546, epsilon = 1e-12);
        assert_approx_eq!(f64, model.p_value, 0.10408803866182788, epsilon = 1e-6);
        assert!(!model.is_significant());
    }

    #[test]
    fn test_fit_two_points() {
        let model = fit(&[(0.0, 1.0), (1.0, 3.0)]).unwrap();
        assert_approx_eq!(f64, model.slope, 2.0);
        assert_eq!(model.p_value, 0.0);
        let flat = fit(&[(0.0, 1.0), (1.0, 1.0)]).unwrap();
        assert_eq!(flat.p_value, 1.0);
    }

    #[test]
    fn test_analyse_flat_series_selects_average() {
        let lookback: Vec<_> = (0..12).map(|i| (month(2023, 4).offset(i), 50.0)).collect();
        let baseline: Vec<_> = (0..6).map(|i| (month(2024, 4).offset(i), 50.0)).collect();
        let analysis = analyse(&lookback, &baseline).unwrap();

        assert_eq!(analysis.model.slope, 0.0);
        assert_eq!(analysis.recommended, ProjectionMethod::Average);
        let forecast = analysis.forecast(
            analysis.recommended,
            (1..=12).map(|i| month(2024, 9).offset(i)),
        );
        assert_eq!(forecast.len(), 12);
        assert!(forecast.iter().all(|(_, value)| *value == 50.0));
    }

    #[test]
    fn test_analyse_rising_series_selects_regression() {
        let lookback: Vec<_> = (0..12)
            .map(|i| (month(2023, 4).offset(i), 100.0 + 10.0 * i as f64))
            .collect();
        let baseline: Vec<_> = (12..18)
            .map(|i| (month(2023, 4).offset(i), 100.0 + 10.0 * i as f64))
            .collect();
        let analysis = analyse(&lookback, &baseline).unwrap();

        assert!(analysis.model.is_significant());
        assert_eq!(analysis.recommended, ProjectionMethod::Regression);
        assert!(analysis.regression_mae < analysis.average_mae);
    }
}
