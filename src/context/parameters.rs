//! Defines the `PlanningParameters` struct, which represents the contents of `planning.toml`.
use crate::capacity::SessionModel;
use crate::input::{
    deserialise_proportion, deserialise_proportion_nonzero, input_err_msg, read_toml,
};
use crate::month::Month;
use crate::period::BaselinePeriod;
use crate::projection::DrawMode;
use crate::units::{Dimensionless, MinutesPerSession, SessionsPerWeek, Weeks};
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const PLANNING_PARAMETERS_FILE_NAME: &str = "planning.toml";

/// The longest projection we allow, in months
pub const MAX_FUTURE_MONTHS: u32 = 60;

macro_rules! define_unit_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            <$type>::new($value)
        }
    };
}

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_num_future_months, u32, 12);
define_param_default!(default_num_simulations, u32, 100);
define_param_default!(default_lookback_months, u32, 12);
define_param_default!(default_session_duration_hours, f64, 4.0);
define_param_default!(default_weeks_per_year, u32, 48);
define_param_default!(default_sessions_per_week, f64, 10.0);
define_unit_param_default!(default_utilisation, Dimensionless, 0.8);
define_unit_param_default!(default_cancellation_rate, Dimensionless, 0.0);
define_unit_param_default!(default_target_proportion_over_18, Dimensionless, 0.4);
define_unit_param_default!(default_target_proportion_over_52, Dimensionless, 0.02);
define_unit_param_default!(default_activity_share_over_18, Dimensionless, 0.3);
define_unit_param_default!(default_activity_share_over_52, Dimensionless, 0.1);
define_param_default!(default_cohort_horizon_weeks, u32, 52);
define_param_default!(default_cohort_years, u32, 1);
define_param_default!(default_session_fit_simulations, u32, 100);
define_param_default!(default_operating_model_weeks, Vec<u32>, vec![42, 45, 48]);

/// Represents the contents of the entire planning file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlanningParameters {
    /// The specialty to plan for
    pub specialty: String,
    /// First month of the baseline period.
    ///
    /// If neither end of the baseline is given, the latest April-September window is used.
    pub baseline_start: Option<Month>,
    /// Last month of the baseline period
    pub baseline_end: Option<Month>,
    /// The month projections start from (defaults to the latest month with data)
    pub model_start: Option<Month>,
    /// Number of months to project forward
    #[serde(default = "default_num_future_months")]
    pub num_future_months: u32,
    /// Number of bootstrap trials
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    /// Seed for the random number generator.
    ///
    /// If omitted, a seed is drawn at random and logged so that the run can be repeated.
    pub seed: Option<u64>,
    /// How additions and removals are drawn in the bootstrap
    #[serde(default)]
    pub draw_mode: DrawMode,
    /// Months before the baseline used to fit the demand trend
    #[serde(default = "default_lookback_months")]
    pub lookback_months: u32,
    /// Length of one session in hours
    #[serde(default = "default_session_duration_hours")]
    pub session_duration_hours: f64,
    /// Operating weeks in a year
    #[serde(default = "default_weeks_per_year")]
    pub weeks_per_year: u32,
    /// Sessions planned in each operating week
    #[serde(default = "default_sessions_per_week")]
    pub sessions_per_week: f64,
    /// Fraction of session time used for clinical activity
    #[serde(default = "default_utilisation")]
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub utilisation: Dimensionless,
    /// Fraction of planned sessions which are cancelled
    #[serde(default = "default_cancellation_rate")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub cancellation_rate: Dimensionless,
    /// Target share of the list waiting 18 weeks or more
    #[serde(default = "default_target_proportion_over_18")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub target_proportion_over_18: Dimensionless,
    /// Target share of the list waiting 52 weeks or more
    #[serde(default = "default_target_proportion_over_52")]
    #[serde(deserialize_with = "deserialise_proportion")]
    pub target_proportion_over_52: Dimensionless,
    /// Share of session activity which can go to patients waiting 18 weeks or more
    #[serde(default = "default_activity_share_over_18")]
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub activity_share_over_18: Dimensionless,
    /// Share of session activity which can go to patients waiting 52 weeks or more
    #[serde(default = "default_activity_share_over_52")]
    #[serde(deserialize_with = "deserialise_proportion_nonzero")]
    pub activity_share_over_52: Dimensionless,
    /// Number of weekly buckets in the cohort simulation
    #[serde(default = "default_cohort_horizon_weeks")]
    pub cohort_horizon_weeks: u32,
    /// Number of years to run the cohort simulation for
    #[serde(default = "default_cohort_years")]
    pub cohort_years: u32,
    /// Number of trials used to fit procedures into a session
    #[serde(default = "default_session_fit_simulations")]
    pub session_fit_simulations: u32,
    /// Numbers of operating weeks to spread baseline sessions over
    #[serde(default = "default_operating_model_weeks")]
    pub operating_model_weeks: Vec<u32>,
}

/// Check that the baseline bounds are either both given or both omitted, and are in order
fn check_baseline(start: Option<Month>, end: Option<Month>) -> Result<Option<BaselinePeriod>> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(BaselinePeriod::new(start, end)?)),
        (None, None) => Ok(None),
        _ => Err(anyhow::anyhow!(
            "baseline_start and baseline_end must either both be given or both be omitted"
        )),
    }
}

/// Check that the `num_future_months` parameter is valid
fn check_num_future_months(value: u32) -> Result<()> {
    ensure!(
        value <= MAX_FUTURE_MONTHS,
        "num_future_months cannot be more than {MAX_FUTURE_MONTHS}"
    );

    Ok(())
}

/// Check that a trial count is valid
fn check_num_trials(name: &str, value: u32) -> Result<()> {
    ensure!(value > 0, "{name} cannot be zero");

    Ok(())
}

/// Check that the `session_duration_hours` parameter is valid
fn check_session_duration_hours(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "session_duration_hours must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that an operating-weeks count is valid
fn check_weeks(name: &str, value: u32) -> Result<()> {
    ensure!(
        (1..=52).contains(&value),
        "{name} must be between 1 and 52"
    );

    Ok(())
}

/// Check that the `sessions_per_week` parameter is valid
fn check_sessions_per_week(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "sessions_per_week must be a finite number which is not negative"
    );

    Ok(())
}

/// Check that the `cancellation_rate` parameter is valid
fn check_cancellation_rate(value: Dimensionless) -> Result<()> {
    ensure!(
        value < Dimensionless(1.0),
        "cancellation_rate must be less than 1"
    );

    Ok(())
}

/// Check that the `cohort_horizon_weeks` parameter is valid
fn check_cohort_horizon_weeks(value: u32) -> Result<()> {
    ensure!(value > 18, "cohort_horizon_weeks must be more than 18");

    Ok(())
}

impl PlanningParameters {
    /// Read a planning file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Folder containing the planning data
    ///
    /// # Returns
    ///
    /// The file contents as a [`PlanningParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(data_dir: P) -> Result<PlanningParameters> {
        let file_path = data_dir.as_ref().join(PLANNING_PARAMETERS_FILE_NAME);
        let parameters: PlanningParameters = read_toml(&file_path)?;

        parameters
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(parameters)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        ensure!(!self.specialty.is_empty(), "specialty cannot be empty");

        // baseline_start and baseline_end
        check_baseline(self.baseline_start, self.baseline_end)?;

        // num_future_months
        check_num_future_months(self.num_future_months)?;

        // num_simulations
        check_num_trials("num_simulations", self.num_simulations)?;
        if self.num_simulations < 50 {
            warn!(
                "Only {} bootstrap trials requested; percentile bands will be noisy",
                self.num_simulations
            );
        }

        // lookback_months
        check_num_trials("lookback_months", self.lookback_months)?;

        // session_duration_hours
        check_session_duration_hours(self.session_duration_hours)?;

        // weeks_per_year
        check_weeks("weeks_per_year", self.weeks_per_year)?;

        // sessions_per_week
        check_sessions_per_week(self.sessions_per_week)?;
        if self.sessions_per_week == 0.0 {
            warn!("sessions_per_week is zero; no capacity will be planned");
        }

        // utilisation, activity shares and target proportions already validated on
        // deserialisation

        // cancellation_rate
        check_cancellation_rate(self.cancellation_rate)?;

        // cohort_horizon_weeks
        check_cohort_horizon_weeks(self.cohort_horizon_weeks)?;

        // cohort_years
        check_num_trials("cohort_years", self.cohort_years)?;

        // session_fit_simulations
        check_num_trials("session_fit_simulations", self.session_fit_simulations)?;

        // operating_model_weeks
        for weeks in &self.operating_model_weeks {
            check_weeks("operating_model_weeks", *weeks)?;
        }

        Ok(())
    }

    /// The baseline period given in the file, if any
    pub fn baseline_period(&self) -> Result<Option<BaselinePeriod>> {
        check_baseline(self.baseline_start, self.baseline_end)
    }

    /// The planned session model
    pub fn session_model(&self) -> SessionModel {
        SessionModel {
            weeks_per_year: Weeks(self.weeks_per_year as f64),
            sessions_per_week: SessionsPerWeek(self.sessions_per_week),
            utilisation: self.utilisation,
            session_duration: MinutesPerSession::from_hours(self.session_duration_hours),
            cancellation_rate: self.cancellation_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::month;
    use rstest::rstest;
    use std::fmt::Display;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Helper function to assert validation result based on expected validity
    fn assert_validation_result<T, U: Display>(
        result: Result<T>,
        expected_valid: bool,
        value: U,
        expected_error_fragment: &str,
    ) {
        if expected_valid {
            assert!(
                result.is_ok(),
                "Expected value {} to be valid, but got error: {:?}",
                value,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Expected value {value} to be invalid, but it was accepted",
            );
            let error_message = result.err().unwrap().to_string();
            assert!(
                error_message.contains(expected_error_fragment),
                "Error message should mention the validation constraint, got: {error_message}",
            );
        }
    }

    fn write_planning_file(dir: &Path, contents: &str) {
        let mut file = File::create(dir.join(PLANNING_PARAMETERS_FILE_NAME)).unwrap();
        writeln!(file, "{contents}").unwrap();
    }

    #[test]
    fn test_planning_params_from_path_defaults() {
        let dir = tempdir().unwrap();
        write_planning_file(dir.path(), "specialty = \"Urology\"");

        let parameters = PlanningParameters::from_path(dir.path()).unwrap();
        assert_eq!(parameters.specialty, "Urology");
        assert_eq!(parameters.baseline_start, None);
        assert_eq!(parameters.num_future_months, 12);
        assert_eq!(parameters.num_simulations, 100);
        assert_eq!(parameters.seed, None);
        assert_eq!(parameters.draw_mode, DrawMode::Independent);
        assert_eq!(parameters.weeks_per_year, 48);
        assert_eq!(parameters.utilisation, Dimensionless(0.8));
        assert_eq!(parameters.cohort_horizon_weeks, 52);
        assert_eq!(parameters.operating_model_weeks, [42, 45, 48]);
    }

    #[test]
    fn test_planning_params_from_path() {
        let dir = tempdir().unwrap();
        write_planning_file(
            dir.path(),
            r#"specialty = "ENT"
baseline_start = "2024-04"
baseline_end = "2024-09-30"
seed = 42
draw_mode = "paired"
utilisation = 0.85
cancellation_rate = 0.05"#,
        );

        let parameters = PlanningParameters::from_path(dir.path()).unwrap();
        assert_eq!(parameters.seed, Some(42));
        assert_eq!(parameters.draw_mode, DrawMode::Paired);
        assert_eq!(
            parameters.baseline_period().unwrap(),
            Some(BaselinePeriod::new(month(2024, 4), month(2024, 9)).unwrap())
        );
        let model = parameters.session_model();
        assert_eq!(model.session_duration, MinutesPerSession(240.0));
        assert_eq!(model.cancellation_rate, Dimensionless(0.05));
    }

    #[rstest]
    #[case("paired", DrawMode::Paired)]
    #[case("Paired", DrawMode::Paired)]
    #[case("INDEPENDENT", DrawMode::Independent)]
    fn test_draw_mode_ignores_case(#[case] value: &str, #[case] expected: DrawMode) {
        let dir = tempdir().unwrap();
        write_planning_file(
            dir.path(),
            &format!("specialty = \"ENT\"\ndraw_mode = \"{value}\""),
        );
        let parameters = PlanningParameters::from_path(dir.path()).unwrap();
        assert_eq!(parameters.draw_mode, expected);
    }

    #[rstest]
    #[case("utilisation = 0.0")]
    #[case("utilisation = 1.5")]
    #[case("target_proportion_over_18 = -0.1")]
    #[case("draw_mode = \"joint\"")]
    #[case("baseline_start = \"2024-04\"")]
    #[case("baseline_start = \"2024-09\"\nbaseline_end = \"2024-04\"")]
    #[case("num_future_months = 61")]
    #[case("cohort_horizon_weeks = 18")]
    #[case("cancellation_rate = 1.0")]
    #[case("operating_model_weeks = [0]")]
    fn test_planning_params_from_path_invalid(#[case] extra: &str) {
        let dir = tempdir().unwrap();
        write_planning_file(dir.path(), &format!("specialty = \"ENT\"\n{extra}"));
        assert!(PlanningParameters::from_path(dir.path()).is_err());
    }

    #[rstest]
    #[case(0, true)]
    #[case(12, true)]
    #[case(60, true)]
    #[case(61, false)]
    fn test_check_num_future_months(#[case] value: u32, #[case] expected_valid: bool) {
        assert_validation_result(
            check_num_future_months(value),
            expected_valid,
            value,
            "num_future_months cannot be more than 60",
        );
    }

    #[rstest]
    #[case(4.0, true)]
    #[case(0.5, true)]
    #[case(0.0, false)]
    #[case(-1.0, false)]
    #[case(f64::INFINITY, false)]
    #[case(f64::NAN, false)]
    fn test_check_session_duration_hours(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_session_duration_hours(value),
            expected_valid,
            value,
            "session_duration_hours must be a finite number greater than zero",
        );
    }

    #[rstest]
    #[case(1, true)]
    #[case(52, true)]
    #[case(0, false)]
    #[case(53, false)]
    fn test_check_weeks(#[case] value: u32, #[case] expected_valid: bool) {
        assert_validation_result(
            check_weeks("weeks_per_year", value),
            expected_valid,
            value,
            "weeks_per_year must be between 1 and 52",
        );
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(0.99, true)]
    #[case(1.0, false)]
    fn test_check_cancellation_rate(#[case] value: f64, #[case] expected_valid: bool) {
        assert_validation_result(
            check_cancellation_rate(Dimensionless(value)),
            expected_valid,
            value,
            "cancellation_rate must be less than 1",
        );
    }
}
