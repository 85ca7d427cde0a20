//! Small statistical helpers shared by the forecasting code.

/// Arithmetic mean, or `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Mean absolute difference between paired predictions and actual values.
///
/// Returns zero if there are no pairs.
pub fn mean_absolute_error<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, f64)>,
{
    let (total, count) = pairs
        .into_iter()
        .fold((0.0, 0usize), |(total, count), (predicted, actual)| {
            (total + (predicted - actual).abs(), count + 1)
        });

    if count == 0 { 0.0 } else { total / count as f64 }
}

/// Percentile of already-sorted values, interpolating linearly between closest ranks.
///
/// `p` is in the range 0-100. The rank of the percentile is `p / 100 * (n - 1)`.
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    assert!(!sorted.is_empty(), "Cannot take percentile of empty slice");

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[1.0, 2.0, 6.0]), Some(3.0));
    }

    #[test]
    fn test_mean_absolute_error() {
        assert_eq!(mean_absolute_error(Vec::<(f64, f64)>::new()), 0.0);
        assert_approx_eq!(
            f64,
            mean_absolute_error([(1.0, 2.0), (5.0, 2.0)]),
            2.0
        );
    }

    #[rstest]
    #[case(0.0, 10.0)]
    #[case(25.0, 17.5)]
    #[case(50.0, 25.0)]
    #[case(95.0, 38.5)]
    #[case(100.0, 40.0)]
    fn test_percentile_of_sorted(#[case] p: f64, #[case] expected: f64) {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert_approx_eq!(f64, percentile_of_sorted(&sorted, p), expected);
    }

    #[test]
    fn test_percentile_single_value() {
        assert_eq!(percentile_of_sorted(&[7.0], 95.0), 7.0);
    }
}
