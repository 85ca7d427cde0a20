//! The planning context: the loaded tables and the resolved parameters for one planning run.
use crate::capacity::SessionModel;
use crate::catalog::ProcedureCatalog;
use crate::id::{IDCollection, SpecialtyID};
use crate::input::{read_procedures, read_waiting_list};
use crate::month::Month;
use crate::period::BaselinePeriod;
use crate::series::WaitingListSeries;
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

pub mod parameters;
pub use parameters::PlanningParameters;

/// Everything needed to run the planning stages.
///
/// A context is immutable once created. Each run owns its own copy of the tables.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningContext {
    /// The waiting-list time series
    pub series: WaitingListSeries,
    /// The procedure catalog
    pub catalog: ProcedureCatalog,
    /// Parameters from `planning.toml`
    pub parameters: PlanningParameters,
    /// The selected specialty
    pub specialty: SpecialtyID,
    /// The resolved baseline period
    pub period: BaselinePeriod,
    /// The resolved month projections start from
    pub model_start: Month,
}

impl PlanningContext {
    /// Read a planning context from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Folder containing `planning.toml`, `waiting_list.csv` and `procedures.csv`
    pub fn from_path<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let parameters = PlanningParameters::from_path(data_dir)?;
        let series = read_waiting_list(data_dir)?;
        let catalog = read_procedures(data_dir)?;

        Self::new(series, catalog, parameters)
    }

    /// Create a context, resolving the specialty, baseline period and model start
    pub fn new(
        series: WaitingListSeries,
        catalog: ProcedureCatalog,
        parameters: PlanningParameters,
    ) -> Result<Self> {
        let specialty = series
            .specialty_ids()
            .get_id_by_str(&parameters.specialty)
            .with_context(|| {
                format!(
                    "Specialty '{}' has no waiting-list data",
                    parameters.specialty
                )
            })?;

        let period = match parameters.baseline_period()? {
            Some(period) => period,
            None => {
                let period = BaselinePeriod::latest_summer_window(
                    series.records(&specialty).map(|record| record.month),
                )
                .with_context(|| {
                    format!(
                        "No April-September data for specialty '{specialty}'; set baseline_start \
                        and baseline_end"
                    )
                })?;
                info!("No baseline period given; using {period}");
                period
            }
        };

        let model_start = match parameters.model_start {
            Some(month) => month,
            None => series
                .latest_month(&specialty)
                .with_context(|| format!("No data for specialty '{specialty}'"))?,
        };

        Ok(Self {
            series,
            catalog,
            parameters,
            specialty,
            period,
            model_start,
        })
    }

    /// The planned session model
    pub fn session_model(&self) -> SessionModel {
        self.parameters.session_model()
    }

    /// Monthly additions and removals in the baseline period, in month order
    pub fn baseline_flows(&self) -> (Vec<u32>, Vec<u32>) {
        self.series
            .records_in(&self.specialty, &self.period)
            .map(|record| (record.additions, record.removals))
            .unzip()
    }

    /// Monthly additions in the baseline period
    pub fn baseline_additions(&self) -> Vec<(Month, f64)> {
        self.series
            .records_in(&self.specialty, &self.period)
            .map(|record| (record.month, record.additions as f64))
            .collect()
    }

    /// Monthly additions in the `lookback_months` months before the baseline starts
    pub fn lookback_additions(&self) -> Vec<(Month, f64)> {
        let end = self.period.start().offset(-1);
        let start = self
            .period
            .start()
            .offset(-i64::from(self.parameters.lookback_months));

        self.series
            .records(&self.specialty)
            .filter(|record| (start..=end).contains(&record.month))
            .map(|record| (record.month, record.additions as f64))
            .collect()
    }

    /// Monthly additions over the specialty's whole history, oldest first
    pub fn additions_history(&self) -> Vec<f64> {
        self.series
            .records(&self.specialty)
            .map(|record| record.additions as f64)
            .collect()
    }

    /// The months after the model start which are projected
    pub fn future_months(&self) -> Vec<Month> {
        (1..=i64::from(self.parameters.num_future_months))
            .map(|n| self.model_start.offset(n))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, month, planning_context, planning_parameters};
    use rstest::rstest;

    #[rstest]
    fn test_default_period_and_model_start(planning_context: PlanningContext) {
        // The fixture series runs from 2023-01 to 2024-12
        assert_eq!(
            planning_context.period,
            BaselinePeriod::new(month(2024, 4), month(2024, 9)).unwrap()
        );
        assert_eq!(planning_context.model_start, month(2024, 12));
    }

    #[rstest]
    fn test_flows_and_windows(planning_context: PlanningContext) {
        let (additions, removals) = planning_context.baseline_flows();
        assert_eq!(additions.len(), 6);
        assert_eq!(removals.len(), 6);

        let lookback = planning_context.lookback_additions();
        assert_eq!(lookback.len(), 12);
        assert_eq!(lookback[0].0, month(2023, 4));
        assert_eq!(lookback[11].0, month(2024, 3));

        assert_eq!(planning_context.additions_history().len(), 24);

        let future = planning_context.future_months();
        assert_eq!(future.len(), 12);
        assert_eq!(future[0], month(2025, 1));
    }

    #[rstest]
    fn test_replan_for_other_specialty(planning_context: PlanningContext) {
        let mut parameters = planning_context.parameters.clone();
        parameters.specialty = "ENT".into();
        let ent = PlanningContext::new(
            planning_context.series.clone(),
            planning_context.catalog.clone(),
            parameters,
        )
        .unwrap();

        assert_eq!(ent.specialty, SpecialtyID::from("ENT"));
        assert_eq!(ent.additions_history().len(), 6);
        // The original context is untouched
        assert_eq!(planning_context.clone(), planning_context);
        assert_eq!(planning_context.specialty, SpecialtyID::from("Urology"));
    }

    #[rstest]
    fn test_unknown_specialty(
        planning_context: PlanningContext,
        mut planning_parameters: PlanningParameters,
    ) {
        planning_parameters.specialty = "Cardiology".into();
        assert_error!(
            PlanningContext::new(
                planning_context.series,
                planning_context.catalog,
                planning_parameters
            ),
            "Specialty 'Cardiology' has no waiting-list data"
        );
    }
}
