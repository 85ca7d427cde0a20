//! The module responsible for writing output data to disk.
use crate::baseline::{BaselineSummary, SpecialtySummary};
use crate::capacity::CapacityAssessment;
use crate::cohort::OverdueRequirement;
use crate::demand::DemandSummary;
use crate::error::{DivisionByZeroWarning, finite_or_zero};
use crate::id::{ProcedureID, SpecialtyID};
use crate::month::Month;
use crate::pipeline::{CohortOutcome, PlanningResults, ProjectionOutcome, TrendOutcome};
use crate::session_fit::SessionFit;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which dataset-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "wlplan_results";

const BASELINE_SUMMARY_FILE_NAME: &str = "baseline_summary.csv";
const SPECIALTY_SUMMARY_FILE_NAME: &str = "specialty_summary.csv";
const TREND_MODEL_FILE_NAME: &str = "trend_model.csv";
const DEMAND_FORECAST_FILE_NAME: &str = "demand_forecast.csv";
const PROCEDURE_DEMAND_FILE_NAME: &str = "procedure_demand.csv";
const OPERATING_MODELS_FILE_NAME: &str = "operating_models.csv";
const CAPACITY_FILE_NAME: &str = "capacity.csv";
const BACKLOG_CLEARANCE_FILE_NAME: &str = "backlog_clearance.csv";
const PROJECTION_FILE_NAME: &str = "waiting_list_projection.csv";
const COHORT_TRACE_FILE_NAME: &str = "cohort_trace.csv";
const OVERDUE_SUMMARY_FILE_NAME: &str = "overdue_summary.csv";

/// The output file name for individual bootstrap trials
const PROJECTION_TRIALS_FILE_NAME: &str = "debug_projection_trials.csv";

/// Get the output folder for the data directory at the specified path
pub fn get_output_dir(data_dir: &Path) -> Result<PathBuf> {
    // Get the dataset name from the dir path. We need to check for all possible errors.
    let data_dir = data_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to data directory")?;

    let data_name = data_dir
        .file_name()
        .context("Data directory cannot be the root folder")?
        .to_str()
        .context("Invalid chars in data directory name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, data_name].iter().collect())
}

/// Create a new output directory.
///
/// If the folder already exists and is not empty, it is only replaced if `allow_overwrite` is set.
///
/// # Returns
///
/// Whether an existing folder was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let mut overwritten = false;
    if output_dir.is_dir() {
        if fs::read_dir(output_dir)?.next().is_none() {
            // Already exists and is empty
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder {} already exists and is not empty. Use --overwrite to replace it.",
            output_dir.display()
        );
        fs::remove_dir_all(output_dir)?;
        overwritten = true;
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwritten)
}

/// Render a list of warnings for a CSV cell
fn join_warnings(warnings: &[DivisionByZeroWarning]) -> String {
    warnings.iter().map(|warning| warning.metric).join("; ")
}

/// Represents a row of the baseline summary CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct BaselineSummaryRow {
    specialty: SpecialtyID,
    baseline_start: Month,
    baseline_end: Month,
    num_records: usize,
    scaling_factor: f64,
    additions: f64,
    removals: f64,
    cases: f64,
    sessions: f64,
    cancelled_sessions: f64,
    minutes_utilised: f64,
    additions_12m: f64,
    removals_12m: f64,
    cases_12m: f64,
    sessions_12m: f64,
    minutes_utilised_12m: f64,
    deficit_12m: f64,
    cases_per_session: f64,
    utilisation: f64,
    capacity_status: String,
    expected_change: String,
    warnings: String,
}

impl BaselineSummaryRow {
    fn new(summary: &BaselineSummary) -> Self {
        Self {
            specialty: summary.specialty.clone(),
            baseline_start: summary.period.start(),
            baseline_end: summary.period.end(),
            num_records: summary.num_records,
            scaling_factor: finite_or_zero(summary.scaling_factor.value()),
            additions: finite_or_zero(summary.additions.value()),
            removals: finite_or_zero(summary.removals.value()),
            cases: finite_or_zero(summary.cases.value()),
            sessions: finite_or_zero(summary.sessions.value()),
            cancelled_sessions: finite_or_zero(summary.cancelled_sessions.value()),
            minutes_utilised: finite_or_zero(summary.minutes_utilised.value()),
            additions_12m: finite_or_zero(summary.additions_12m.value()),
            removals_12m: finite_or_zero(summary.removals_12m.value()),
            cases_12m: finite_or_zero(summary.cases_12m.value()),
            sessions_12m: finite_or_zero(summary.sessions_12m.value()),
            minutes_utilised_12m: finite_or_zero(summary.minutes_utilised_12m.value()),
            deficit_12m: finite_or_zero(summary.deficit_12m.value()),
            cases_per_session: finite_or_zero(summary.cases_per_session.value()),
            utilisation: finite_or_zero(summary.utilisation.value()),
            capacity_status: summary.capacity_status.to_string(),
            expected_change: summary.expected_change().to_string(),
            warnings: join_warnings(&summary.warnings),
        }
    }
}

/// Represents a row of the all-specialty summary CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SpecialtySummaryRow {
    specialty: SpecialtyID,
    additions_12m: f64,
    removals_12m: f64,
    deficit_12m: f64,
    size_at_start: Option<u32>,
    size_at_end: Option<u32>,
    observed_change: Option<f64>,
    change_vs_deficit: Option<f64>,
    expected_change: String,
    capacity_status: String,
}

impl SpecialtySummaryRow {
    fn new(summary: &SpecialtySummary) -> Self {
        let baseline = &summary.baseline;
        Self {
            specialty: baseline.specialty.clone(),
            additions_12m: finite_or_zero(baseline.additions_12m.value()),
            removals_12m: finite_or_zero(baseline.removals_12m.value()),
            deficit_12m: finite_or_zero(baseline.deficit_12m.value()),
            size_at_start: summary.size_at_start,
            size_at_end: summary.size_at_end,
            observed_change: summary.observed_change().map(finite_or_zero),
            change_vs_deficit: summary.change_vs_deficit().map(finite_or_zero),
            expected_change: baseline.expected_change().to_string(),
            capacity_status: baseline.capacity_status.to_string(),
        }
    }
}

/// Represents the row of the trend model CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TrendModelRow {
    fitted: bool,
    slope: Option<f64>,
    intercept: Option<f64>,
    r_squared: Option<f64>,
    p_value: Option<f64>,
    std_err: Option<f64>,
    num_points: Option<usize>,
    significant: Option<bool>,
    lookback_mean: Option<f64>,
    regression_mae: Option<f64>,
    average_mae: Option<f64>,
    recommended: Option<String>,
    message: String,
}

impl TrendModelRow {
    fn new(trend: &TrendOutcome) -> Self {
        match trend {
            TrendOutcome::Fitted { analysis, .. } => {
                let model = &analysis.model;
                Self {
                    fitted: true,
                    slope: Some(finite_or_zero(model.slope)),
                    intercept: Some(finite_or_zero(model.intercept)),
                    r_squared: Some(finite_or_zero(model.r_squared)),
                    p_value: Some(finite_or_zero(model.p_value)),
                    std_err: Some(finite_or_zero(model.std_err)),
                    num_points: Some(model.num_points),
                    significant: Some(model.is_significant()),
                    lookback_mean: Some(finite_or_zero(analysis.lookback_mean)),
                    regression_mae: Some(finite_or_zero(analysis.regression_mae)),
                    average_mae: Some(finite_or_zero(analysis.average_mae)),
                    recommended: Some(analysis.recommended.to_string()),
                    message: String::new(),
                }
            }
            TrendOutcome::NotEnoughData(err) => Self {
                fitted: false,
                slope: None,
                intercept: None,
                r_squared: None,
                p_value: None,
                std_err: None,
                num_points: None,
                significant: None,
                lookback_mean: None,
                regression_mae: None,
                average_mae: None,
                recommended: None,
                message: err.to_string(),
            },
        }
    }
}

/// Represents a row of the demand forecast CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct DemandForecastRow {
    month: Month,
    method: String,
    additions: f64,
    predicted_cases: Option<f64>,
}

/// Represents a row of the procedure demand CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ProcedureDemandRow {
    procedure: ProcedureID,
    referrals: f64,
    average_duration: f64,
    demand_minutes: f64,
    share: f64,
    additional_cases: i64,
    additional_minutes: f64,
}

/// Represents a row of the operating models CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct OperatingModelRow {
    weeks: u32,
    sessions_per_week: f64,
}

/// Represents the row of the capacity CSV file.
///
/// This also carries the specialty-level demand figures which capacity is compared with.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CapacityRow {
    weeks_per_year: f64,
    sessions_per_week: f64,
    session_duration_minutes: f64,
    utilisation: f64,
    cancellation_rate: f64,
    planned_sessions: f64,
    delivered_sessions: f64,
    utilised_minutes_per_session: f64,
    total_utilised_minutes: f64,
    demand_cases: Option<f64>,
    demand_minutes: f64,
    mean_duration: Option<f64>,
    dtas_12m: Option<f64>,
    additions_per_dta: Option<f64>,
    cases_per_addition: Option<f64>,
    demand_multiplier: Option<f64>,
    next_year_additions: Option<i64>,
    additional_demand: Option<i64>,
    required_sessions_per_week: f64,
    meets_demand: bool,
    acpl_removals: f64,
    fitted_cases_per_session: Option<f64>,
    fitted_annual_cases: Option<f64>,
    warnings: String,
}

impl CapacityRow {
    fn new(
        capacity: &CapacityAssessment,
        demand: Option<&DemandSummary>,
        fit: Option<&SessionFit>,
    ) -> Self {
        let model = &capacity.model;
        let mut warnings = capacity.warnings.clone();
        if let Some(demand) = demand {
            warnings.extend(demand.warnings.iter().cloned());
        }

        Self {
            weeks_per_year: finite_or_zero(model.weeks_per_year.value()),
            sessions_per_week: finite_or_zero(model.sessions_per_week.value()),
            session_duration_minutes: finite_or_zero(model.session_duration.value()),
            utilisation: finite_or_zero(model.utilisation.value()),
            cancellation_rate: finite_or_zero(model.cancellation_rate.value()),
            planned_sessions: finite_or_zero(capacity.planned_sessions.value()),
            delivered_sessions: finite_or_zero(capacity.delivered_sessions.value()),
            utilised_minutes_per_session: finite_or_zero(
                capacity.utilised_minutes_per_session.value(),
            ),
            total_utilised_minutes: finite_or_zero(capacity.total_utilised_minutes.value()),
            demand_cases: demand.map(|d| finite_or_zero(d.total_cases.value())),
            demand_minutes: finite_or_zero(capacity.demand_minutes.value()),
            mean_duration: demand.map(|d| finite_or_zero(d.mean_duration.value())),
            dtas_12m: demand.map(|d| finite_or_zero(d.dtas_12m.value())),
            additions_per_dta: demand.map(|d| finite_or_zero(d.additions_per_dta.value())),
            cases_per_addition: demand.map(|d| finite_or_zero(d.cases_per_addition.value())),
            demand_multiplier: demand.map(|d| finite_or_zero(d.multiplier.value())),
            next_year_additions: demand.map(|d| d.next_year_additions),
            additional_demand: demand.map(DemandSummary::additional_demand),
            required_sessions_per_week: finite_or_zero(
                capacity.required_sessions_per_week.value(),
            ),
            meets_demand: capacity.meets_demand,
            acpl_removals: finite_or_zero(capacity.acpl_removals.value()),
            fitted_cases_per_session: fit.map(|f| finite_or_zero(f.cases_per_session.value())),
            fitted_annual_cases: fit.map(|f| finite_or_zero(f.annual_cases.value())),
            warnings: join_warnings(&warnings),
        }
    }
}

/// Represents a row of the backlog clearance CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct BacklogClearanceRow {
    backlog: String,
    size: f64,
    required_sessions_per_week: f64,
    achievable: bool,
    warnings: String,
}

/// Represents a row of the waiting-list projection CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ProjectionRow {
    month: Month,
    p5: f64,
    p25: f64,
    p50: f64,
    p75: f64,
    p95: f64,
}

/// Represents a row of the cohort trace CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct CohortTraceRow {
    month: usize,
    week: usize,
    total: f64,
    over_18: f64,
    over_52: f64,
}

/// Represents a row of the overdue summary CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct OverdueSummaryRow {
    cohort: String,
    starting_total: f64,
    annual_additions: f64,
    additions_source: String,
    annual_removals: f64,
    removals_source: String,
    year_end_list: f64,
    over_at_end: Option<f64>,
    cumulative_over: Option<f64>,
    target_proportion: Option<f64>,
    target_count: Option<f64>,
    patients_to_treat: Option<f64>,
    minutes_needed: Option<f64>,
    sessions_needed: f64,
    warnings: String,
}

impl OverdueSummaryRow {
    /// A row with the cohort-wide columns filled in
    fn for_cohort(cohort: &CohortOutcome, label: String, sessions_needed: f64) -> Self {
        Self {
            cohort: label,
            starting_total: finite_or_zero(cohort.starting_total.value()),
            annual_additions: finite_or_zero(cohort.annual_additions.value()),
            additions_source: cohort.additions_source.to_string(),
            annual_removals: finite_or_zero(cohort.annual_removals.value()),
            removals_source: cohort.removals_source.to_string(),
            year_end_list: finite_or_zero(cohort.year_end_list.value()),
            over_at_end: None,
            cumulative_over: None,
            target_proportion: None,
            target_count: None,
            patients_to_treat: None,
            minutes_needed: None,
            sessions_needed: finite_or_zero(sessions_needed),
            warnings: String::new(),
        }
    }

    fn new(cohort: &CohortOutcome, requirement: &OverdueRequirement) -> Self {
        Self {
            over_at_end: Some(finite_or_zero(requirement.over_at_end.value())),
            cumulative_over: Some(finite_or_zero(requirement.cumulative_over.value())),
            target_proportion: Some(finite_or_zero(requirement.target_proportion.value())),
            target_count: Some(finite_or_zero(requirement.target_count.value())),
            patients_to_treat: Some(finite_or_zero(requirement.patients_to_treat.value())),
            minutes_needed: Some(finite_or_zero(requirement.minutes_needed.value())),
            warnings: join_warnings(&requirement.warnings),
            ..Self::for_cohort(
                cohort,
                format!("{}+", requirement.threshold_weeks),
                requirement.sessions_needed.value(),
            )
        }
    }
}

/// Represents a row of the debug projection trials CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ProjectionTrialRow {
    trial: usize,
    month: Month,
    total: f64,
}

/// For writing every bootstrap trial
struct DebugDataWriter {
    trials_writer: csv::Writer<File>,
}

impl DebugDataWriter {
    /// Open CSV files to write debug info to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    fn create(output_path: &Path) -> Result<Self> {
        Ok(Self {
            trials_writer: csv::Writer::from_path(output_path.join(PROJECTION_TRIALS_FILE_NAME))?,
        })
    }

    /// Write the individual bootstrap trials
    fn write_trials(&mut self, projection: &ProjectionOutcome) -> Result<()> {
        for (trial, totals) in projection.result.trials.iter().enumerate() {
            for (month, total) in projection.months.iter().zip(totals) {
                self.trials_writer.serialize(ProjectionTrialRow {
                    trial,
                    month: *month,
                    total: finite_or_zero(*total),
                })?;
            }
        }

        Ok(())
    }

    /// Flush the underlying streams
    fn flush(&mut self) -> Result<()> {
        self.trials_writer.flush()?;

        Ok(())
    }
}

/// An object for writing planning results to file
pub struct DataWriter {
    baseline_writer: csv::Writer<File>,
    specialty_writer: csv::Writer<File>,
    trend_writer: csv::Writer<File>,
    forecast_writer: csv::Writer<File>,
    procedure_writer: csv::Writer<File>,
    operating_models_writer: csv::Writer<File>,
    capacity_writer: csv::Writer<File>,
    backlog_writer: csv::Writer<File>,
    projection_writer: csv::Writer<File>,
    cohort_trace_writer: csv::Writer<File>,
    overdue_writer: csv::Writer<File>,
    debug_writer: Option<DebugDataWriter>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include every bootstrap trial
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            // Create debug CSV files
            Some(DebugDataWriter::create(output_path)?)
        } else {
            None
        };

        Ok(Self {
            baseline_writer: new_writer(BASELINE_SUMMARY_FILE_NAME)?,
            specialty_writer: new_writer(SPECIALTY_SUMMARY_FILE_NAME)?,
            trend_writer: new_writer(TREND_MODEL_FILE_NAME)?,
            forecast_writer: new_writer(DEMAND_FORECAST_FILE_NAME)?,
            procedure_writer: new_writer(PROCEDURE_DEMAND_FILE_NAME)?,
            operating_models_writer: new_writer(OPERATING_MODELS_FILE_NAME)?,
            capacity_writer: new_writer(CAPACITY_FILE_NAME)?,
            backlog_writer: new_writer(BACKLOG_CLEARANCE_FILE_NAME)?,
            projection_writer: new_writer(PROJECTION_FILE_NAME)?,
            cohort_trace_writer: new_writer(COHORT_TRACE_FILE_NAME)?,
            overdue_writer: new_writer(OVERDUE_SUMMARY_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write the output of every stage which was run
    pub fn write_results(&mut self, results: &PlanningResults) -> Result<()> {
        if let Some(baseline) = results.baseline() {
            self.write_baseline(&baseline.summary, &baseline.specialties)?;
        }
        if let Some(trend) = results.trend() {
            self.write_trend(trend, results.demand())?;
        }
        if let Some(demand) = results.demand() {
            self.write_procedure_demand(demand)?;
        }
        if let Some(capacity) = results.capacity() {
            let fit = results.session_fit().and_then(Option::as_ref);
            self.write_capacity(capacity, results.demand(), fit)?;
        }
        if let Some(projection) = results.projection() {
            self.write_projection(projection)?;
        }
        if let Some(cohort) = results.cohort() {
            self.write_cohort(cohort)?;
        }

        Ok(())
    }

    /// Write the baseline summary and the all-specialty summary
    pub fn write_baseline(
        &mut self,
        summary: &BaselineSummary,
        specialties: &[SpecialtySummary],
    ) -> Result<()> {
        self.baseline_writer
            .serialize(BaselineSummaryRow::new(summary))?;
        for specialty in specialties {
            self.specialty_writer
                .serialize(SpecialtySummaryRow::new(specialty))?;
        }

        Ok(())
    }

    /// Write the trend model and the demand forecast
    pub fn write_trend(
        &mut self,
        trend: &TrendOutcome,
        demand: Option<&DemandSummary>,
    ) -> Result<()> {
        self.trend_writer.serialize(TrendModelRow::new(trend))?;

        if let TrendOutcome::Fitted { analysis, forecast } = trend {
            let predicted = demand.map(|demand| demand.predicted_cases(forecast));
            for (i, (month, additions)) in forecast.iter().enumerate() {
                self.forecast_writer.serialize(DemandForecastRow {
                    month: *month,
                    method: analysis.recommended.to_string(),
                    additions: finite_or_zero(*additions),
                    predicted_cases: predicted
                        .as_ref()
                        .map(|predicted| finite_or_zero(predicted[i].1)),
                })?;
            }
        }

        Ok(())
    }

    /// Write per-procedure demand
    pub fn write_procedure_demand(&mut self, demand: &DemandSummary) -> Result<()> {
        for procedure in &demand.procedures {
            self.procedure_writer.serialize(ProcedureDemandRow {
                procedure: procedure.procedure.clone(),
                referrals: finite_or_zero(procedure.referrals.value()),
                average_duration: finite_or_zero(procedure.average_duration.value()),
                demand_minutes: finite_or_zero(procedure.demand_minutes.value()),
                share: finite_or_zero(procedure.share.value()),
                additional_cases: procedure.additional_cases,
                additional_minutes: finite_or_zero(procedure.additional_minutes().value()),
            })?;
        }

        Ok(())
    }

    /// Write the capacity assessment and operating models
    pub fn write_capacity(
        &mut self,
        capacity: &CapacityAssessment,
        demand: Option<&DemandSummary>,
        fit: Option<&SessionFit>,
    ) -> Result<()> {
        self.capacity_writer
            .serialize(CapacityRow::new(capacity, demand, fit))?;
        for model in &capacity.operating_models {
            self.operating_models_writer.serialize(OperatingModelRow {
                weeks: model.weeks,
                sessions_per_week: finite_or_zero(model.sessions_per_week.value()),
            })?;
        }

        Ok(())
    }

    /// Write the percentile bands of the projection (and every trial, if debugging)
    pub fn write_projection(&mut self, projection: &ProjectionOutcome) -> Result<()> {
        for (month, bands) in projection.months.iter().zip(&projection.result.bands) {
            self.projection_writer.serialize(ProjectionRow {
                month: *month,
                p5: finite_or_zero(bands.p5),
                p25: finite_or_zero(bands.p25),
                p50: finite_or_zero(bands.p50),
                p75: finite_or_zero(bands.p75),
                p95: finite_or_zero(bands.p95),
            })?;
        }

        if let Some(wtr) = &mut self.debug_writer {
            wtr.write_trials(projection)?;
        }

        Ok(())
    }

    /// Write the cohort trace, overdue requirements and backlog clearance
    pub fn write_cohort(&mut self, cohort: &CohortOutcome) -> Result<()> {
        for snapshot in &cohort.simulation.weekly_trace {
            self.cohort_trace_writer.serialize(CohortTraceRow {
                month: snapshot.month,
                week: snapshot.week,
                total: finite_or_zero(snapshot.total),
                over_18: finite_or_zero(snapshot.over_18),
                over_52: finite_or_zero(snapshot.over_52),
            })?;
        }

        for requirement in &cohort.overdue {
            self.overdue_writer
                .serialize(OverdueSummaryRow::new(cohort, requirement))?;
        }
        self.overdue_writer.serialize(OverdueSummaryRow::for_cohort(
            cohort,
            "total".into(),
            cohort.total_overdue_sessions().value(),
        ))?;

        for clearance in &cohort.backlog {
            self.backlog_writer.serialize(BacklogClearanceRow {
                backlog: clearance.backlog.to_string(),
                size: finite_or_zero(clearance.size.value()),
                required_sessions_per_week: finite_or_zero(
                    clearance.required_sessions_per_week.value(),
                ),
                achievable: clearance.achievable,
                warnings: join_warnings(&clearance.warnings),
            })?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.baseline_writer.flush()?;
        self.specialty_writer.flush()?;
        self.trend_writer.flush()?;
        self.forecast_writer.flush()?;
        self.procedure_writer.flush()?;
        self.operating_models_writer.flush()?;
        self.capacity_writer.flush()?;
        self.backlog_writer.flush()?;
        self.projection_writer.flush()?;
        self.cohort_trace_writer.flush()?;
        self.overdue_writer.flush()?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::PlanningContext;
    use crate::fixture::{month, planning_context};
    use crate::pipeline::run_all;
    use crate::projection::{PercentileBands, SimulationResult};
    use itertools::assert_equal;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::{fixture, rstest};
    use serde::de::DeserializeOwned;
    use tempfile::tempdir;

    fn read_rows<T: DeserializeOwned>(dir: &Path, file_name: &str) -> Vec<T> {
        csv::Reader::from_path(dir.join(file_name))
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap()
    }

    #[fixture]
    fn projection() -> ProjectionOutcome {
        let bands = PercentileBands {
            p5: 90.0,
            p25: 95.0,
            p50: 100.0,
            p75: 105.0,
            p95: f64::NAN,
        };
        ProjectionOutcome {
            starting_total: 100.0,
            months: vec![month(2025, 1), month(2025, 2)],
            result: SimulationResult {
                trials: vec![vec![99.0, 101.0], vec![100.0, 102.0], vec![98.0, 97.0]],
                bands: vec![bands; 2],
            },
        }
    }

    #[rstest]
    fn test_write_projection(projection: ProjectionOutcome) {
        let dir = tempdir().unwrap();

        // Write the bands
        {
            let mut writer = DataWriter::create(dir.path(), false).unwrap();
            writer.write_projection(&projection).unwrap();
            writer.flush().unwrap();
        }

        // Read back and compare. Non-finite values are written as zero.
        let expected = [month(2025, 1), month(2025, 2)].map(|month| ProjectionRow {
            month,
            p5: 90.0,
            p25: 95.0,
            p50: 100.0,
            p75: 105.0,
            p95: 0.0,
        });
        let records: Vec<ProjectionRow> = read_rows(dir.path(), PROJECTION_FILE_NAME);
        assert_equal(records, expected);
        assert!(!dir.path().join(PROJECTION_TRIALS_FILE_NAME).exists());
    }

    #[rstest]
    fn test_write_projection_trials(projection: ProjectionOutcome) {
        let dir = tempdir().unwrap();

        // Write the bands with debug info
        {
            let mut writer = DataWriter::create(dir.path(), true).unwrap();
            writer.write_projection(&projection).unwrap();
            writer.flush().unwrap();
        }

        let records: Vec<ProjectionTrialRow> = read_rows(dir.path(), PROJECTION_TRIALS_FILE_NAME);
        assert_eq!(records.len(), 6);
        assert_eq!(
            records[3],
            ProjectionTrialRow {
                trial: 1,
                month: month(2025, 2),
                total: 102.0
            }
        );
    }

    #[rstest]
    fn test_write_results(planning_context: PlanningContext) {
        let mut rng = StdRng::seed_from_u64(42);
        let results = run_all(&planning_context, &mut rng).unwrap();
        let dir = tempdir().unwrap();

        // Write everything
        {
            let mut writer = DataWriter::create(dir.path(), false).unwrap();
            writer.write_results(&results).unwrap();
            writer.flush().unwrap();
        }

        let baseline: Vec<BaselineSummaryRow> = read_rows(dir.path(), BASELINE_SUMMARY_FILE_NAME);
        assert_equal(
            baseline,
            [BaselineSummaryRow::new(&results.baseline().unwrap().summary)],
        );

        let specialties: Vec<SpecialtySummaryRow> =
            read_rows(dir.path(), SPECIALTY_SUMMARY_FILE_NAME);
        assert_eq!(specialties.len(), 2);

        let models: Vec<OperatingModelRow> = read_rows(dir.path(), OPERATING_MODELS_FILE_NAME);
        assert_equal(models.iter().map(|model| model.weeks), [42, 45, 48]);

        let capacity: Vec<CapacityRow> = read_rows(dir.path(), CAPACITY_FILE_NAME);
        assert_eq!(capacity.len(), 1);
        assert_eq!(
            capacity[0].meets_demand,
            results.capacity().unwrap().meets_demand
        );
        assert!(capacity[0].fitted_cases_per_session.is_some());

        let procedures: Vec<ProcedureDemandRow> = read_rows(dir.path(), PROCEDURE_DEMAND_FILE_NAME);
        assert_equal(
            procedures.iter().map(|row| row.procedure.to_string()),
            ["Cystoscopy", "TURP"].map(String::from),
        );

        let projection: Vec<ProjectionRow> = read_rows(dir.path(), PROJECTION_FILE_NAME);
        assert_eq!(projection.len(), 12);
        assert_eq!(projection[0].month, month(2025, 1));

        let overdue: Vec<OverdueSummaryRow> = read_rows(dir.path(), OVERDUE_SUMMARY_FILE_NAME);
        assert_equal(
            overdue.iter().map(|row| row.cohort.as_str()),
            ["18+", "52+", "total"],
        );
        assert!(overdue[2].over_at_end.is_none());

        let backlog: Vec<BacklogClearanceRow> = read_rows(dir.path(), BACKLOG_CLEARANCE_FILE_NAME);
        assert_eq!(backlog.len(), 3);

        let trace: Vec<CohortTraceRow> = read_rows(dir.path(), COHORT_TRACE_FILE_NAME);
        assert_eq!(trace.len(), 12);
    }

    #[test]
    fn test_create_output_directory() {
        let root = tempdir().unwrap();
        let output_dir = root.path().join("results");

        // New folder
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());

        // Existing empty folder
        assert!(!create_output_directory(&output_dir, false).unwrap());

        // Existing non-empty folder
        fs::write(output_dir.join("file.txt"), "").unwrap();
        assert!(create_output_directory(&output_dir, false).is_err());
        assert!(create_output_directory(&output_dir, true).unwrap());
        assert!(!output_dir.join("file.txt").exists());
    }

    #[test]
    fn test_get_output_dir() {
        let root = tempdir().unwrap();
        let data_dir = root.path().join("my_model");
        fs::create_dir(&data_dir).unwrap();

        assert_eq!(
            get_output_dir(&data_dir).unwrap(),
            Path::new(OUTPUT_DIRECTORY_ROOT).join("my_model")
        );
    }
}
