//! Reduction of the baseline period to summary figures and a capacity status.
//!
//! The 12-month figures are linear extrapolations of the baseline sums (`sum * 12 / num_months`).
//! They assume a uniform monthly rate with no seasonality and are not forecasts.
use crate::error::{DivisionByZeroWarning, PlanningError, checked_ratio};
use crate::id::SpecialtyID;
use crate::period::BaselinePeriod;
use crate::series::{MonthlyRecord, WaitingListSeries};
use crate::units::{
    Dimensionless, Minutes, MinutesPerSession, Patients, PatientsPerSession, Sessions,
};
use log::{debug, warn};

/// How baseline capacity compares with baseline demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum CapacityStatus {
    /// Removals exceed additions
    #[display("surplus, list will shrink")]
    Surplus,
    /// Removals equal additions
    #[display("balanced")]
    Balanced,
    /// Cancelled sessions alone would have covered the shortfall
    #[display("insufficient but more sessions would close the gap")]
    Recoverable,
    /// The list is growing and lost sessions would not make up the difference
    #[display("not meeting demand, list will grow")]
    NotMeetingDemand,
}

/// The expected change in the waiting list over 12 months, from the 12-month deficit
#[derive(Debug, Clone, Copy, PartialEq, derive_more::Display)]
pub enum ExpectedChange {
    /// The list grows by the given number of patients
    #[display("Increase in waiting list by {_0:.0}")]
    Increase(f64),
    /// The list shrinks by the given number of patients
    #[display("Decrease in waiting list by {_0:.0}")]
    Decrease(f64),
    /// Additions and removals balance
    #[display("No change in waiting list")]
    NoChange,
}

impl ExpectedChange {
    /// Classify a 12-month deficit (additions minus removals)
    pub fn from_deficit(deficit: Patients) -> Self {
        if deficit.value() > 0.0 {
            Self::Increase(deficit.value())
        } else if deficit.value() < 0.0 {
            Self::Decrease(-deficit.value())
        } else {
            Self::NoChange
        }
    }
}

/// Summary of a specialty's activity over the baseline period
#[derive(Debug, Clone, PartialEq)]
pub struct BaselineSummary {
    /// The specialty summarised
    pub specialty: SpecialtyID,
    /// The baseline period
    pub period: BaselinePeriod,
    /// Number of records which fell in the period (may be fewer than its months)
    pub num_records: usize,
    /// Multiplier from baseline sums to 12-month equivalents
    pub scaling_factor: Dimensionless,
    /// Sum of additions
    pub additions: Patients,
    /// Sum of removals
    pub removals: Patients,
    /// Sum of cases
    pub cases: Patients,
    /// Sum of sessions which went ahead
    pub sessions: Sessions,
    /// Sum of cancelled sessions
    pub cancelled_sessions: Sessions,
    /// Sum of utilised minutes
    pub minutes_utilised: Minutes,
    /// 12-month equivalent additions
    pub additions_12m: Patients,
    /// 12-month equivalent removals
    pub removals_12m: Patients,
    /// 12-month equivalent cases
    pub cases_12m: Patients,
    /// 12-month equivalent sessions
    pub sessions_12m: Sessions,
    /// 12-month equivalent utilised minutes
    pub minutes_utilised_12m: Minutes,
    /// 12-month additions minus 12-month removals
    pub deficit_12m: Patients,
    /// Average cases per list (ACPL)
    pub cases_per_session: PatientsPerSession,
    /// Fraction of available session minutes which were utilised
    pub utilisation: Dimensionless,
    /// Capacity status, by the first matching rule
    pub capacity_status: CapacityStatus,
    /// Ratios which were reported as zero
    pub warnings: Vec<DivisionByZeroWarning>,
}

impl BaselineSummary {
    /// The expected change in the list over the next 12 months
    pub fn expected_change(&self) -> ExpectedChange {
        ExpectedChange::from_deficit(self.deficit_12m)
    }
}

/// Classify capacity against demand.
///
/// The rules are checked in order and the first match wins.
fn capacity_status(
    additions_12m: Patients,
    removals_12m: Patients,
    sessions: Sessions,
    cancelled_sessions: Sessions,
    minutes_utilised: Minutes,
    scaling_factor: Dimensionless,
    session_minutes: MinutesPerSession,
) -> CapacityStatus {
    if removals_12m > additions_12m {
        CapacityStatus::Surplus
    } else if removals_12m == additions_12m {
        CapacityStatus::Balanced
    } else if session_minutes * (sessions + cancelled_sessions) >= minutes_utilised * scaling_factor
    {
        CapacityStatus::Recoverable
    } else {
        CapacityStatus::NotMeetingDemand
    }
}

/// Summarise a specialty's records over the baseline period.
///
/// Records for other specialties or outside the period are ignored.
///
/// # Arguments
///
/// * `records` - Monthly records (typically all records for the specialty)
/// * `specialty` - The specialty to summarise
/// * `period` - The baseline period
/// * `session_minutes` - Length of one session in minutes
///
/// # Returns
///
/// The summary, or [`PlanningError::EmptyBaseline`] if no records fall in the period
pub fn aggregate<'a, I>(
    records: I,
    specialty: &SpecialtyID,
    period: &BaselinePeriod,
    session_minutes: MinutesPerSession,
) -> Result<BaselineSummary, PlanningError>
where
    I: IntoIterator<Item = &'a MonthlyRecord>,
{
    let records: Vec<_> = records
        .into_iter()
        .filter(|record| record.specialty == *specialty && period.contains(record.month))
        .collect();
    if records.is_empty() {
        return Err(PlanningError::EmptyBaseline(format!(
            "for specialty '{specialty}' between {} and {}",
            period.start(),
            period.end()
        )));
    }

    let additions = Patients(records.iter().map(|r| r.additions as f64).sum());
    let removals = Patients(records.iter().map(|r| r.removals as f64).sum());
    let cases = Patients(records.iter().map(|r| r.cases as f64).sum());
    let sessions = Sessions(records.iter().map(|r| r.sessions as f64).sum());
    let cancelled_sessions = Sessions(records.iter().map(|r| r.cancelled_sessions as f64).sum());
    let minutes_utilised = Minutes(records.iter().map(|r| r.minutes_utilised).sum());

    let scaling_factor = period.scaling_factor();
    let additions_12m = additions * scaling_factor;
    let removals_12m = removals * scaling_factor;

    let mut warnings = Vec::new();
    let cases_per_session = PatientsPerSession(checked_ratio(
        cases.value(),
        sessions.value(),
        "cases per session",
        &mut warnings,
    ));
    let utilisation = Dimensionless(checked_ratio(
        minutes_utilised.value(),
        (session_minutes * sessions).value(),
        "baseline utilisation",
        &mut warnings,
    ));

    let capacity_status = capacity_status(
        additions_12m,
        removals_12m,
        sessions,
        cancelled_sessions,
        minutes_utilised,
        scaling_factor,
        session_minutes,
    );
    debug!(
        "Baseline for {specialty} ({period}): additions_12m={additions_12m}, \
        removals_12m={removals_12m}, status={capacity_status}"
    );

    Ok(BaselineSummary {
        specialty: specialty.clone(),
        period: *period,
        num_records: records.len(),
        scaling_factor,
        additions,
        removals,
        cases,
        sessions,
        cancelled_sessions,
        minutes_utilised,
        additions_12m,
        removals_12m,
        cases_12m: cases * scaling_factor,
        sessions_12m: sessions * scaling_factor,
        minutes_utilised_12m: minutes_utilised * scaling_factor,
        deficit_12m: additions_12m - removals_12m,
        cases_per_session,
        utilisation,
        capacity_status,
        warnings,
    })
}

/// One row of the all-specialty summary table
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialtySummary {
    /// Baseline figures for the specialty
    pub baseline: BaselineSummary,
    /// List size in the first month of the period, if observed
    pub size_at_start: Option<u32>,
    /// List size in the last month of the period, if observed
    pub size_at_end: Option<u32>,
}

impl SpecialtySummary {
    /// Observed change in list size across the period
    pub fn observed_change(&self) -> Option<f64> {
        Some(self.size_at_end? as f64 - self.size_at_start? as f64)
    }

    /// Observed change less the 12-month deficit
    pub fn change_vs_deficit(&self) -> Option<f64> {
        Some(self.observed_change()? - self.baseline.deficit_12m.value())
    }
}

/// Summarise every specialty over the same baseline period.
///
/// Specialties with no records in the period are skipped.
pub fn summarise_specialties(
    series: &WaitingListSeries,
    period: &BaselinePeriod,
    session_minutes: MinutesPerSession,
) -> Vec<SpecialtySummary> {
    let mut summaries = Vec::new();
    for specialty in series.specialties() {
        let baseline = match aggregate(
            series.records(specialty),
            specialty,
            period,
            session_minutes,
        ) {
            Ok(baseline) => baseline,
            Err(err) => {
                warn!("Skipping specialty {specialty} in summary: {err}");
                continue;
            }
        };

        let size_at = |month| {
            series
                .get(specialty, month)
                .map(|record| record.total_size)
        };
        summaries.push(SpecialtySummary {
            size_at_start: size_at(period.start()),
            size_at_end: size_at(period.end()),
            baseline,
        });
    }

    summaries
}
