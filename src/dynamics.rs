//! Year-end list size and the sessions needed to clear long-wait backlogs.
use crate::error::{DivisionByZeroWarning, checked_ratio};
use crate::series::MonthlyRecord;
use crate::units::{Dimensionless, Patients, PatientsPerSession, SessionsPerWeek, Weeks};
use derive_more::Display;
use strum::EnumIter;

/// List size after `years` years of constant annual additions and removals
pub fn year_end_waiting_list(
    starting_total: Patients,
    annual_additions: Patients,
    annual_removals: Patients,
    years: u32,
) -> Patients {
    starting_total + (annual_additions - annual_removals) * Dimensionless(years as f64)
}

/// A backlog of patients who have waited beyond a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum Backlog {
    /// Waiting 18 weeks or more
    #[display("18+ weeks")]
    Over18,
    /// Waiting 40 weeks or more
    #[display("40+ weeks")]
    Over40,
    /// Waiting 52 weeks or more
    #[display("52+ weeks")]
    Over52,
}

impl Backlog {
    /// The size of this backlog in a monthly record
    pub fn size(self, record: &MonthlyRecord) -> Patients {
        let count = match self {
            Self::Over18 => record.backlog_18,
            Self::Over40 => record.backlog_40,
            Self::Over52 => record.backlog_52,
        };
        Patients(count as f64)
    }
}

/// Sessions per week needed to treat a year of additions plus a backlog
#[derive(Debug, Clone, PartialEq)]
pub struct BacklogClearance {
    /// The backlog being cleared
    pub backlog: Backlog,
    /// Its size
    pub size: Patients,
    /// Sessions per week needed
    pub required_sessions_per_week: SessionsPerWeek,
    /// Whether the planned sessions are enough
    pub achievable: bool,
    /// Ratios which were reported as zero
    pub warnings: Vec<DivisionByZeroWarning>,
}

/// Work out the sessions per week needed to clear a backlog within a year.
///
/// # Arguments
///
/// * `backlog` - Which backlog to clear
/// * `size` - Patients in the backlog
/// * `annual_additions` - Additions expected over the year
/// * `cases_per_session` - Average cases per list
/// * `weeks_per_year` - Operating weeks
/// * `planned` - Planned sessions per week
pub fn backlog_clearance(
    backlog: Backlog,
    size: Patients,
    annual_additions: Patients,
    cases_per_session: PatientsPerSession,
    weeks_per_year: Weeks,
    planned: SessionsPerWeek,
) -> BacklogClearance {
    let mut warnings = Vec::new();
    let sessions = checked_ratio(
        (annual_additions + size).value(),
        cases_per_session.value(),
        "backlog sessions",
        &mut warnings,
    );
    let required = SessionsPerWeek(checked_ratio(
        sessions,
        weeks_per_year.value(),
        "backlog sessions per week",
        &mut warnings,
    ));

    BacklogClearance {
        backlog,
        size,
        required_sessions_per_week: required,
        achievable: planned >= required,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{month, record};
    use float_cmp::assert_approx_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn test_year_end_waiting_list() {
        assert_eq!(
            year_end_waiting_list(Patients(1000.0), Patients(1200.0), Patients(1100.0), 1),
            Patients(1100.0)
        );
        assert_eq!(
            year_end_waiting_list(Patients(1000.0), Patients(1200.0), Patients(1100.0), 3),
            Patients(1300.0)
        );
    }

    #[test]
    fn test_backlog_size() {
        let mut rec = record("Urology", month(2024, 9), 0, 0, 500);
        rec.backlog_18 = 200;
        rec.backlog_40 = 50;
        rec.backlog_52 = 10;
        let sizes: Vec<_> = Backlog::iter().map(|b| b.size(&rec).value()).collect();
        assert_eq!(sizes, [200.0, 50.0, 10.0]);
    }

    #[test]
    fn test_backlog_clearance() {
        let clearance = backlog_clearance(
            Backlog::Over18,
            Patients(200.0),
            Patients(1000.0),
            PatientsPerSession(2.5),
            Weeks(48.0),
            SessionsPerWeek(10.0),
        );
        assert_approx_eq!(
            SessionsPerWeek,
            clearance.required_sessions_per_week,
            SessionsPerWeek(10.0)
        );
        assert!(clearance.achievable);
        assert!(clearance.warnings.is_empty());
    }

    #[test]
    fn test_backlog_clearance_zero_acpl() {
        let clearance = backlog_clearance(
            Backlog::Over52,
            Patients(10.0),
            Patients(1000.0),
            PatientsPerSession(0.0),
            Weeks(48.0),
            SessionsPerWeek(10.0),
        );
        assert_eq!(clearance.required_sessions_per_week, SessionsPerWeek(0.0));
        assert_eq!(clearance.warnings.len(), 1);
    }
}
