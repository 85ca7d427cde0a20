//! The planning pipeline: an explicit graph of stages, each with declared prerequisites.
//!
//! Each stage reads the [`PlanningContext`] and the outputs of earlier stages, and stores its own
//! output in [`PlanningResults`]. Asking for a stage whose output is absent is a
//! [`PlanningError::MissingPrerequisite`].
use crate::baseline::{BaselineSummary, SpecialtySummary, aggregate, summarise_specialties};
use crate::capacity::{CapacityAssessment, assess};
use crate::cohort::{CohortResult, OverdueRequirement, overdue_requirement, simulate};
use crate::context::PlanningContext;
use crate::demand::{DemandInputs, DemandSummary, summarise_demand};
use crate::dynamics::{Backlog, BacklogClearance, backlog_clearance, year_end_waiting_list};
use crate::error::PlanningError;
use crate::month::Month;
use crate::projection::{SimulationResult, project};
use crate::session_fit::{ProcedureMix, SessionFit};
use crate::trend::{ProjectionMethod, TrendAnalysis, analyse};
use crate::units::{Minutes, Patients, Sessions};
use anyhow::{Result, anyhow};
use indexmap::IndexSet;
use log::{info, warn};
use petgraph::algo::toposort;
use petgraph::graph::{Graph, NodeIndex};
use rand::Rng;
use std::collections::HashMap;
use strum::{EnumIter, IntoEnumIterator};

/// Number of weeks in one simulated cohort year
const WEEKS_PER_YEAR: usize = 52;

/// A step of the planning calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, EnumIter)]
pub enum Stage {
    /// Summarise the baseline period
    #[display("baseline")]
    Baseline,
    /// Fit a trend to historical additions
    #[display("trend")]
    Trend,
    /// Work out procedure demand
    #[display("demand")]
    Demand,
    /// Compare planned capacity with demand
    #[display("capacity")]
    Capacity,
    /// Fit the procedure mix into sessions
    #[display("session_fit")]
    SessionFit,
    /// Bootstrap the future list size
    #[display("projection")]
    Projection,
    /// Age the list week by week
    #[display("cohort")]
    Cohort,
}

impl Stage {
    /// Stages whose output this stage cannot do without
    pub fn requires(self) -> &'static [Stage] {
        match self {
            Self::Baseline | Self::Trend => &[],
            Self::Demand | Self::Projection => &[Self::Baseline],
            Self::Capacity => &[Self::Baseline, Self::Demand],
            Self::SessionFit => &[Self::Capacity],
            Self::Cohort => &[Self::Baseline, Self::Demand, Self::Capacity],
        }
    }

    /// Stages whose output this stage uses if it is available
    pub fn uses(self) -> &'static [Stage] {
        match self {
            Self::Cohort => &[Self::Trend, Self::SessionFit],
            _ => &[],
        }
    }
}

/// Get a stage output, or the error saying it is missing
pub fn required<'a, T>(
    value: Option<&'a T>,
    stage: Stage,
    requested_by: Stage,
) -> Result<&'a T, PlanningError> {
    value.ok_or_else(|| PlanningError::MissingPrerequisite {
        stage: stage.to_string(),
        requested_by: requested_by.to_string(),
    })
}

/// Output of the baseline stage
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineOutcome {
    /// Summary for the selected specialty
    pub summary: BaselineSummary,
    /// Summary of every specialty with data in the period
    pub specialties: Vec<SpecialtySummary>,
}

/// Output of the trend stage
#[derive(Debug, Clone, PartialEq)]
pub enum TrendOutcome {
    /// A trend was fitted
    Fitted {
        /// The fitted trend and method comparison
        analysis: TrendAnalysis,
        /// Forecast additions for the future months, by the recommended method
        forecast: Vec<(Month, f64)>,
    },
    /// There were too few points to fit a trend
    NotEnoughData(PlanningError),
}

impl TrendOutcome {
    /// The analysis, if a trend was fitted
    pub fn analysis(&self) -> Option<&TrendAnalysis> {
        match self {
            Self::Fitted { analysis, .. } => Some(analysis),
            Self::NotEnoughData(_) => None,
        }
    }
}

/// Output of the projection stage
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionOutcome {
    /// List size the trials start from
    pub starting_total: f64,
    /// The projected months
    pub months: Vec<Month>,
    /// Trials and percentile bands
    pub result: SimulationResult,
}

/// Where the cohort simulation's annual additions came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum AdditionsSource {
    /// The trend forecast for the next 12 months
    #[display("trend ({_0})")]
    Trend(ProjectionMethod),
    /// Baseline 12-month additions
    #[display("baseline")]
    Baseline,
}

/// Where the cohort simulation's annual removals came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum RemovalsSource {
    /// Mix-based cases from session fitting
    #[display("session fit")]
    SessionFit,
    /// Baseline cases per list times delivered sessions
    #[display("ACPL")]
    Acpl,
}

/// Output of the cohort stage
#[derive(Debug, Clone, PartialEq)]
pub struct CohortOutcome {
    /// List size at the model start
    pub starting_total: Patients,
    /// Additions over a year
    pub annual_additions: Patients,
    /// Where the additions came from
    pub additions_source: AdditionsSource,
    /// Removals over a year
    pub annual_removals: Patients,
    /// Where the removals came from
    pub removals_source: RemovalsSource,
    /// List size at the end of the simulated years
    pub year_end_list: Patients,
    /// The week-by-week simulation
    pub simulation: CohortResult,
    /// Sessions needed for the 18+ and 52+ week cohorts
    pub overdue: Vec<OverdueRequirement>,
    /// Sessions per week needed to clear each observed backlog
    pub backlog: Vec<BacklogClearance>,
}

impl CohortOutcome {
    /// Total sessions needed across the overdue cohorts
    pub fn total_overdue_sessions(&self) -> Sessions {
        self.overdue.iter().map(|req| req.sessions_needed).sum()
    }
}

/// Outputs of the stages which have been run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanningResults {
    stages_run: Vec<Stage>,
    baseline: Option<BaselineOutcome>,
    trend: Option<TrendOutcome>,
    demand: Option<DemandSummary>,
    capacity: Option<CapacityAssessment>,
    session_fit: Option<Option<SessionFit>>,
    projection: Option<ProjectionOutcome>,
    cohort: Option<CohortOutcome>,
}

impl PlanningResults {
    /// The stages which were run, in order
    pub fn stages_run(&self) -> &[Stage] {
        &self.stages_run
    }

    /// Baseline output
    pub fn baseline(&self) -> Option<&BaselineOutcome> {
        self.baseline.as_ref()
    }

    /// Trend output
    pub fn trend(&self) -> Option<&TrendOutcome> {
        self.trend.as_ref()
    }

    /// Demand output
    pub fn demand(&self) -> Option<&DemandSummary> {
        self.demand.as_ref()
    }

    /// Capacity output
    pub fn capacity(&self) -> Option<&CapacityAssessment> {
        self.capacity.as_ref()
    }

    /// Session-fit output (`None` within if the specialty has no usable procedures)
    pub fn session_fit(&self) -> Option<&Option<SessionFit>> {
        self.session_fit.as_ref()
    }

    /// Projection output
    pub fn projection(&self) -> Option<&ProjectionOutcome> {
        self.projection.as_ref()
    }

    /// Cohort output
    pub fn cohort(&self) -> Option<&CohortOutcome> {
        self.cohort.as_ref()
    }
}

/// Order stages so that every stage comes after those it requires or uses
fn stage_order() -> Result<Vec<Stage>> {
    let mut graph = Graph::<Stage, ()>::new();
    let nodes: HashMap<Stage, NodeIndex> = Stage::iter()
        .map(|stage| (stage, graph.add_node(stage)))
        .collect();
    for stage in Stage::iter() {
        for prerequisite in stage.requires().iter().chain(stage.uses()) {
            graph.add_edge(nodes[prerequisite], nodes[&stage], ());
        }
    }

    let order = toposort(&graph, None).map_err(|cycle| {
        anyhow!(
            "Cycle detected in stage graph at stage {}",
            graph[cycle.node_id()]
        )
    })?;

    Ok(order.into_iter().map(|node| graph[node]).collect())
}

/// The requested stages and everything they require, transitively
fn with_prerequisites(stages: &[Stage]) -> IndexSet<Stage> {
    let mut selected = IndexSet::new();
    let mut pending: Vec<_> = stages.to_vec();
    while let Some(stage) = pending.pop() {
        if selected.insert(stage) {
            pending.extend_from_slice(stage.requires());
        }
    }

    selected
}

/// Run the requested stages, plus the stages they require, in dependency order.
///
/// # Arguments
///
/// * `context` - The loaded data and parameters
/// * `stages` - Stages to run
/// * `rng` - Source of randomness for the bootstrap and session fitting
pub fn run_stages<R: Rng + ?Sized>(
    context: &PlanningContext,
    stages: &[Stage],
    rng: &mut R,
) -> Result<PlanningResults> {
    let selected = with_prerequisites(stages);
    let mut results = PlanningResults::default();
    for stage in stage_order()? {
        if !selected.contains(&stage) {
            continue;
        }

        info!("Running stage: {stage}");
        run_stage(stage, context, &mut results, rng)?;
        results.stages_run.push(stage);
    }

    Ok(results)
}

/// Run every stage
pub fn run_all<R: Rng + ?Sized>(
    context: &PlanningContext,
    rng: &mut R,
) -> Result<PlanningResults> {
    let stages: Vec<_> = Stage::iter().collect();
    run_stages(context, &stages, rng)
}

/// Run a single stage, storing its output in `results`
pub fn run_stage<R: Rng + ?Sized>(
    stage: Stage,
    context: &PlanningContext,
    results: &mut PlanningResults,
    rng: &mut R,
) -> Result<(), PlanningError> {
    match stage {
        Stage::Baseline => results.baseline = Some(run_baseline(context)?),
        Stage::Trend => results.trend = Some(run_trend(context)?),
        Stage::Demand => results.demand = Some(run_demand(context, results)?),
        Stage::Capacity => results.capacity = Some(run_capacity(context, results)?),
        Stage::SessionFit => results.session_fit = Some(run_session_fit(context, results, rng)?),
        Stage::Projection => results.projection = Some(run_projection(context, results, rng)?),
        Stage::Cohort => results.cohort = Some(run_cohort(context, results)?),
    }

    Ok(())
}

fn run_baseline(context: &PlanningContext) -> Result<BaselineOutcome, PlanningError> {
    let session_minutes = context.session_model().session_duration;
    let summary = aggregate(
        context.series.records(&context.specialty),
        &context.specialty,
        &context.period,
        session_minutes,
    )?;
    info!(
        "Baseline {}: {} ({})",
        context.period,
        summary.capacity_status,
        summary.expected_change()
    );

    Ok(BaselineOutcome {
        summary,
        specialties: summarise_specialties(&context.series, &context.period, session_minutes),
    })
}

fn run_trend(context: &PlanningContext) -> Result<TrendOutcome, PlanningError> {
    match analyse(&context.lookback_additions(), &context.baseline_additions()) {
        Ok(analysis) => {
            if analysis.model.is_significant() {
                info!(
                    "Significant trend in additions (p = {:.3}); consider adjusting next year's \
                    demand",
                    analysis.model.p_value
                );
            }
            let forecast = analysis.forecast(analysis.recommended, context.future_months());
            Ok(TrendOutcome::Fitted { analysis, forecast })
        }
        Err(err @ PlanningError::InsufficientData { .. }) => {
            warn!("{err}; continuing without a trend");
            Ok(TrendOutcome::NotEnoughData(err))
        }
        Err(err) => Err(err),
    }
}

fn run_demand(
    context: &PlanningContext,
    results: &PlanningResults,
) -> Result<DemandSummary, PlanningError> {
    let baseline = &required(results.baseline(), Stage::Baseline, Stage::Demand)?.summary;
    let history = context.additions_history();

    Ok(summarise_demand(
        &context.catalog,
        &context.specialty,
        DemandInputs {
            period: &context.period,
            additions_12m: baseline.additions_12m,
            cases_12m: baseline.cases_12m,
            history: &history,
        },
    ))
}

fn run_capacity(
    context: &PlanningContext,
    results: &PlanningResults,
) -> Result<CapacityAssessment, PlanningError> {
    let baseline = &required(results.baseline(), Stage::Baseline, Stage::Capacity)?.summary;
    let demand = required(results.demand(), Stage::Demand, Stage::Capacity)?;
    let assessment = assess(
        &context.session_model(),
        baseline,
        demand.total_minutes,
        &context.parameters.operating_model_weeks,
    );
    info!(
        "Capacity: {} sessions per week required, {} planned",
        assessment.required_sessions_per_week, assessment.model.sessions_per_week
    );

    Ok(assessment)
}

fn run_session_fit<R: Rng + ?Sized>(
    context: &PlanningContext,
    results: &mut PlanningResults,
    rng: &mut R,
) -> Result<Option<SessionFit>, PlanningError> {
    let capacity = required(results.capacity(), Stage::Capacity, Stage::SessionFit)?;
    let budget = Minutes(capacity.utilised_minutes_per_session.value());
    let sessions = capacity.delivered_sessions;
    let mut warnings = Vec::new();
    let mix = ProcedureMix::from_catalog(&context.catalog, &context.specialty, &mut warnings);
    if let Some(capacity) = results.capacity.as_mut() {
        capacity.warnings.extend(warnings);
    }
    let Some(mix) = mix else {
        return Ok(None);
    };

    let fit = SessionFit::new(
        &mix,
        budget,
        sessions,
        context.parameters.session_fit_simulations as usize,
        rng,
    )?;

    Ok(Some(fit))
}

fn run_projection<R: Rng + ?Sized>(
    context: &PlanningContext,
    results: &PlanningResults,
    rng: &mut R,
) -> Result<ProjectionOutcome, PlanningError> {
    required(results.baseline(), Stage::Baseline, Stage::Projection)?;
    let (additions, removals) = context.baseline_flows();
    let starting_total = context
        .series
        .starting_total(&context.specialty, context.model_start)?;
    let months = context.future_months();
    let result = project(
        &additions,
        &removals,
        starting_total,
        months.len(),
        context.parameters.num_simulations as usize,
        context.parameters.draw_mode,
        rng,
    )?;

    Ok(ProjectionOutcome {
        starting_total,
        months,
        result,
    })
}

/// Annual additions for the cohort: the trend forecast if there is one, else the baseline
fn cohort_additions(
    context: &PlanningContext,
    baseline: &BaselineSummary,
    trend: Option<&TrendOutcome>,
) -> (Patients, AdditionsSource) {
    match trend.and_then(TrendOutcome::analysis) {
        Some(analysis) => {
            let next_year = (1..=12).map(|n| context.model_start.offset(n));
            let total = analysis
                .forecast(analysis.recommended, next_year)
                .iter()
                .map(|(_, value)| value)
                .sum();
            (
                Patients(total),
                AdditionsSource::Trend(analysis.recommended),
            )
        }
        None => {
            warn!("No trend available; using baseline 12-month additions for the cohort");
            (baseline.additions_12m, AdditionsSource::Baseline)
        }
    }
}

fn run_cohort(
    context: &PlanningContext,
    results: &PlanningResults,
) -> Result<CohortOutcome, PlanningError> {
    let baseline = &required(results.baseline(), Stage::Baseline, Stage::Cohort)?.summary;
    let demand = required(results.demand(), Stage::Demand, Stage::Cohort)?;
    let capacity = required(results.capacity(), Stage::Capacity, Stage::Cohort)?;
    let parameters = &context.parameters;

    let starting_total = Patients(
        context
            .series
            .starting_total(&context.specialty, context.model_start)?,
    );
    let (annual_additions, additions_source) =
        cohort_additions(context, baseline, results.trend());
    let (annual_removals, removals_source) = match results.session_fit() {
        Some(Some(fit)) => (fit.annual_cases, RemovalsSource::SessionFit),
        _ => (capacity.acpl_removals, RemovalsSource::Acpl),
    };

    let simulation = simulate(
        starting_total.value(),
        annual_additions.value(),
        annual_removals.value(),
        parameters.cohort_horizon_weeks as usize,
        WEEKS_PER_YEAR * parameters.cohort_years as usize,
    )?;
    let year_end_list = year_end_waiting_list(
        starting_total,
        annual_additions,
        annual_removals,
        parameters.cohort_years,
    );

    let overdue = [
        (
            18,
            simulation.over_18,
            simulation.cumulative_over_18,
            parameters.target_proportion_over_18,
            parameters.activity_share_over_18,
        ),
        (
            52,
            simulation.over_52,
            simulation.cumulative_over_52,
            parameters.target_proportion_over_52,
            parameters.activity_share_over_52,
        ),
    ]
    .into_iter()
    .map(|(threshold, over, cumulative, target, share)| {
        overdue_requirement(
            threshold,
            over,
            cumulative,
            year_end_list.value(),
            target,
            demand.mean_duration,
            capacity.utilised_minutes_per_session,
            share,
        )
    })
    .collect();

    let model = context.session_model();
    let backlog = match context
        .series
        .latest_at_or_before(&context.specialty, context.model_start)
    {
        Some(record) => Backlog::iter()
            .map(|band| {
                backlog_clearance(
                    band,
                    band.size(record),
                    annual_additions,
                    baseline.cases_per_session,
                    model.weeks_per_year,
                    model.sessions_per_week,
                )
            })
            .collect(),
        None => Vec::new(),
    };

    info!(
        "Cohort: {:.0} waiting 18+ weeks and {:.0} waiting 52+ weeks after {} year(s)",
        simulation.over_18, simulation.over_52, parameters.cohort_years
    );

    Ok(CohortOutcome {
        starting_total,
        annual_additions,
        additions_source,
        annual_removals,
        removals_source,
        year_end_list,
        simulation,
        overdue,
        backlog,
    })
}
