//! Week-by-week ageing of the waiting list.
//!
//! The list is held as a histogram of patients by weeks waited. Every week everyone ages by one
//! week, new arrivals join at week zero and a share of every bucket is removed. Removals are blind
//! to how long a patient has waited: they are proportional, not longest-waiting first.
use crate::error::{DivisionByZeroWarning, PlanningError, checked_ratio};
use crate::units::{
    Dimensionless, Minutes, MinutesPerPatient, MinutesPerSession, Patients, Sessions,
};
use log::debug;

/// Average number of weeks in a month
pub const WEEKS_PER_MONTH: f64 = 4.345;

/// Waits at or beyond this many weeks count as overdue
pub const OVERDUE_WEEKS: usize = 18;

/// Patients waiting for a given number of weeks, indexed by weeks waited.
///
/// The last bucket is saturating: it holds everyone who has waited at least that long.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortState(Vec<f64>);

impl CohortState {
    /// Spread `total` patients evenly across `horizon_weeks` buckets
    pub fn uniform(total: f64, horizon_weeks: usize) -> Self {
        Self(vec![total / horizon_weeks as f64; horizon_weeks])
    }

    /// Number of buckets
    pub fn horizon(&self) -> usize {
        self.0.len()
    }

    /// Total patients on the list
    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Patients who have waited at least `weeks` weeks
    pub fn waiting_at_least(&self, weeks: usize) -> f64 {
        self.0.iter().skip(weeks).sum()
    }

    /// Patients in the saturating bucket
    pub fn terminal(&self) -> f64 {
        self.0.last().copied().unwrap_or_default()
    }

    /// Move the list forward by one week
    fn advance(&mut self, weekly_additions: f64, weekly_removals: f64) {
        let buckets = &mut self.0;
        let last = buckets.len() - 1;

        // Age everyone by one week, with the last bucket absorbing the one before it
        buckets[last] += buckets[last - 1];
        for i in (1..last).rev() {
            buckets[i] = buckets[i - 1];
        }
        buckets[0] = weekly_additions;

        let total: f64 = buckets.iter().sum();
        let removal_rate = if total > 0.0 {
            weekly_removals / total
        } else {
            0.0
        };
        let keep = (1.0 - removal_rate).max(0.0);
        for bucket in buckets.iter_mut() {
            *bucket *= keep;
        }
    }
}

/// The state of the list at the end of a simulated month
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CohortSnapshot {
    /// Simulated month (1-based)
    pub month: usize,
    /// Week at the end of that month (1-based)
    pub week: usize,
    /// Total patients waiting
    pub total: f64,
    /// Patients waiting 18 weeks or more
    pub over_18: f64,
    /// Patients in the terminal bucket
    pub over_52: f64,
}

/// The outcome of a cohort simulation
#[derive(Debug, Clone, PartialEq)]
pub struct CohortResult {
    /// Patients waiting 18 weeks or more at the end of the run
    pub over_18: f64,
    /// Patients in the terminal bucket at the end of the run
    pub over_52: f64,
    /// Sum of the 18+ counts over all month ends
    pub cumulative_over_18: f64,
    /// Sum of the terminal-bucket counts over all month ends
    pub cumulative_over_52: f64,
    /// Month-end snapshots
    pub weekly_trace: Vec<CohortSnapshot>,
    /// The final state
    pub state: CohortState,
}

/// The (0-based) simulated month containing `week` (1-based)
fn month_of_week(week: usize) -> usize {
    ((week - 1) as f64 / WEEKS_PER_MONTH) as usize
}

/// Simulate the ageing of the waiting list.
///
/// # Arguments
///
/// * `starting_total` - Current list size, spread evenly across the buckets
/// * `annual_additions` - Expected additions over a year
/// * `annual_removals` - Expected removals over a year
/// * `horizon_weeks` - Number of buckets; must exceed 18
/// * `num_weeks` - Number of weeks to simulate
pub fn simulate(
    starting_total: f64,
    annual_additions: f64,
    annual_removals: f64,
    horizon_weeks: usize,
    num_weeks: usize,
) -> Result<CohortResult, PlanningError> {
    if horizon_weeks <= OVERDUE_WEEKS {
        return Err(PlanningError::InvalidParameter(format!(
            "cohort horizon must be more than {OVERDUE_WEEKS} weeks, got {horizon_weeks}"
        )));
    }

    let weekly_additions = annual_additions / (12.0 * WEEKS_PER_MONTH);
    let weekly_removals = annual_removals / (12.0 * WEEKS_PER_MONTH);
    debug!(
        "Cohort simulation: weekly additions={weekly_additions}, weekly removals={weekly_removals}"
    );

    let mut state = CohortState::uniform(starting_total.max(0.0), horizon_weeks);
    let mut weekly_trace = Vec::new();
    for week in 1..=num_weeks {
        state.advance(weekly_additions, weekly_removals);

        let month = month_of_week(week);
        if week == num_weeks || month_of_week(week + 1) != month {
            weekly_trace.push(CohortSnapshot {
                month: month + 1,
                week,
                total: state.total(),
                over_18: state.waiting_at_least(OVERDUE_WEEKS),
                over_52: state.terminal(),
            });
        }
    }

    Ok(CohortResult {
        over_18: state.waiting_at_least(OVERDUE_WEEKS),
        over_52: state.terminal(),
        cumulative_over_18: weekly_trace.iter().map(|s| s.over_18).sum(),
        cumulative_over_52: weekly_trace.iter().map(|s| s.over_52).sum(),
        weekly_trace,
        state,
    })
}

/// Patients who must be treated to bring an overdue cohort down to a target share of the list.
///
/// This is the gap between the year-end overdue count and the target, plus the overdue exposure
/// accumulated during the year beyond the year-end count. Never negative.
pub fn patients_to_treat(
    over_at_end: f64,
    cumulative_over: f64,
    end_list_size: f64,
    target_proportion: Dimensionless,
) -> f64 {
    let target_count = end_list_size * target_proportion.value();
    ((over_at_end - target_count) + (cumulative_over - over_at_end)).max(0.0)
}

/// Sessions needed to clear an overdue cohort down to its target
#[derive(Debug, Clone, PartialEq)]
pub struct OverdueRequirement {
    /// Threshold in weeks (18 or 52)
    pub threshold_weeks: usize,
    /// Overdue patients at the end of the run
    pub over_at_end: Patients,
    /// Overdue patients summed over month ends
    pub cumulative_over: Patients,
    /// Target share of the year-end list
    pub target_proportion: Dimensionless,
    /// Target number of overdue patients
    pub target_count: Patients,
    /// Patients who need treatment
    pub patients_to_treat: Patients,
    /// Minutes of activity needed to treat them
    pub minutes_needed: Minutes,
    /// Sessions needed, given the share of activity which can go to this cohort
    pub sessions_needed: Sessions,
    /// Ratios which were reported as zero
    pub warnings: Vec<DivisionByZeroWarning>,
}

/// Work out the sessions needed to bring an overdue cohort down to its target.
///
/// # Arguments
///
/// * `threshold_weeks` - The threshold the cohort is defined by
/// * `over_at_end` - Overdue patients at the end of the simulation
/// * `cumulative_over` - Overdue patients summed over month ends
/// * `end_list_size` - List size at the end of the year
/// * `target_proportion` - Target share of the list which may be overdue
/// * `mean_duration` - Average minutes per case
/// * `utilised_minutes_per_session` - Utilised minutes in one session
/// * `activity_share` - Share of session activity available for this cohort
#[allow(clippy::too_many_arguments)]
pub fn overdue_requirement(
    threshold_weeks: usize,
    over_at_end: f64,
    cumulative_over: f64,
    end_list_size: f64,
    target_proportion: Dimensionless,
    mean_duration: MinutesPerPatient,
    utilised_minutes_per_session: MinutesPerSession,
    activity_share: Dimensionless,
) -> OverdueRequirement {
    let patients = Patients(patients_to_treat(
        over_at_end,
        cumulative_over,
        end_list_size,
        target_proportion,
    ));
    let minutes_needed = mean_duration * patients;

    let mut warnings = Vec::new();
    let sessions = checked_ratio(
        minutes_needed.value(),
        utilised_minutes_per_session.value(),
        "overdue sessions",
        &mut warnings,
    );
    let sessions_needed = Sessions(checked_ratio(
        sessions,
        activity_share.value(),
        "overdue sessions (activity share)",
        &mut warnings,
    ));

    OverdueRequirement {
        threshold_weeks,
        over_at_end: Patients(over_at_end),
        cumulative_over: Patients(cumulative_over),
        target_proportion,
        target_count: Patients(end_list_size * target_proportion.value()),
        patients_to_treat: patients,
        minutes_needed,
        sessions_needed,
        warnings,
    }
}
