//! Fixtures for tests

use crate::capacity::SessionModel;
use crate::catalog::{ProcedureCatalog, ProcedureRecord};
use crate::context::{PlanningContext, PlanningParameters};
use crate::month::Month;
use crate::series::{MonthlyRecord, WaitingListSeries};
use crate::units::{Dimensionless, MinutesPerSession, SessionsPerWeek, Weeks};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Shorthand for creating a [`Month`]
pub fn month(year: i32, month: u32) -> Month {
    Month::new(year, month).unwrap()
}

/// A monthly record with the given flows and everything else zero
pub fn record(
    specialty: &str,
    month: Month,
    additions: u32,
    removals: u32,
    total_size: u32,
) -> MonthlyRecord {
    MonthlyRecord {
        specialty: specialty.into(),
        month,
        additions,
        removals,
        total_size,
        sessions: 0,
        cancelled_sessions: 0,
        minutes_utilised: 0.0,
        cases: 0,
        backlog_18: 0,
        backlog_40: 0,
        backlog_52: 0,
    }
}

/// A procedure record without a month
pub fn procedure(
    specialty: &str,
    procedure: &str,
    total_referrals: u32,
    average_duration: f64,
) -> ProcedureRecord {
    ProcedureRecord {
        specialty: specialty.into(),
        procedure: procedure.into(),
        month: None,
        total_referrals,
        average_duration,
    }
}

/// 10 sessions a week for 48 weeks, 4 hours at 80% utilisation with 10% cancelled
#[fixture]
pub fn session_model() -> SessionModel {
    SessionModel {
        weeks_per_year: Weeks(48.0),
        sessions_per_week: SessionsPerWeek(10.0),
        utilisation: Dimensionless(0.8),
        session_duration: MinutesPerSession(240.0),
        cancellation_rate: Dimensionless(0.1),
    }
}

/// Two years (2023-01 to 2024-12) of Urology data, plus a few months of ENT
#[fixture]
pub fn waiting_list_series() -> WaitingListSeries {
    let urology = (0..24).map(|i| {
        let mut record = record(
            "Urology",
            month(2023, 1).offset(i64::from(i)),
            100 + (i % 5) * 5,
            95 + (i % 3) * 5,
            1000 + i * 10,
        );
        record.sessions = 40;
        record.cancelled_sessions = 4;
        record.minutes_utilised = 8000.0;
        record.cases = 100;
        record.backlog_18 = 300;
        record.backlog_40 = 80;
        record.backlog_52 = 20;
        record
    });
    let ent = (4..=9).map(|m| record("ENT", month(2024, m), 50, 55, 400));

    WaitingListSeries::from_records(urology.chain(ent)).unwrap()
}

#[fixture]
pub fn procedure_catalog() -> ProcedureCatalog {
    ProcedureCatalog::new(vec![
        procedure("Urology", "Cystoscopy", 300, 20.0),
        procedure("Urology", "TURP", 100, 90.0),
        procedure("ENT", "Tonsillectomy", 80, 45.0),
    ])
}

/// Default parameters for Urology with a fixed seed
#[fixture]
pub fn planning_parameters() -> PlanningParameters {
    toml::from_str("specialty = \"Urology\"\nseed = 42").unwrap()
}

#[fixture]
pub fn planning_context(
    waiting_list_series: WaitingListSeries,
    procedure_catalog: ProcedureCatalog,
    planning_parameters: PlanningParameters,
) -> PlanningContext {
    PlanningContext::new(waiting_list_series, procedure_catalog, planning_parameters).unwrap()
}
