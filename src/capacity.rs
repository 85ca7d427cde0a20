//! The session model: what capacity a pattern of theatre or clinic sessions provides.
use crate::baseline::BaselineSummary;
use crate::error::{DivisionByZeroWarning, checked_ratio};
use crate::units::{
    Dimensionless, Minutes, MinutesPerSession, Patients, PatientsPerSession, Sessions,
    SessionsPerWeek, Weeks,
};
use log::debug;

/// A planned pattern of sessions over a year
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionModel {
    /// Operating weeks in a year
    pub weeks_per_year: Weeks,
    /// Sessions planned in each operating week
    pub sessions_per_week: SessionsPerWeek,
    /// Fraction of session minutes used for clinical activity
    pub utilisation: Dimensionless,
    /// Length of one session
    pub session_duration: MinutesPerSession,
    /// Fraction of planned sessions which are cancelled
    pub cancellation_rate: Dimensionless,
}

impl SessionModel {
    /// Sessions planned in a year
    pub fn planned_sessions(&self) -> Sessions {
        self.sessions_per_week * self.weeks_per_year
    }

    /// Sessions which go ahead after cancellations
    pub fn delivered_sessions(&self) -> Sessions {
        self.planned_sessions() * (Dimensionless(1.0) - self.cancellation_rate)
    }

    /// Minutes of clinical activity in one session
    pub fn utilised_minutes_per_session(&self) -> MinutesPerSession {
        self.session_duration * self.utilisation
    }

    /// Minutes of clinical activity in a year of delivered sessions
    pub fn total_utilised_minutes(&self) -> Minutes {
        self.utilised_minutes_per_session() * self.delivered_sessions()
    }

    /// Sessions per week needed to deliver `demand` minutes of activity in a year
    pub fn required_sessions_per_week(
        &self,
        demand: Minutes,
        warnings: &mut Vec<DivisionByZeroWarning>,
    ) -> SessionsPerWeek {
        let sessions = checked_ratio(
            demand.value(),
            self.utilised_minutes_per_session().value(),
            "required sessions",
            warnings,
        );

        SessionsPerWeek(checked_ratio(
            sessions,
            self.weeks_per_year.value(),
            "required sessions per week",
            warnings,
        ))
    }

    /// Whether the planned sessions meet a requirement
    pub fn meets(&self, required: SessionsPerWeek) -> bool {
        self.sessions_per_week >= required
    }

    /// Annual removals if every delivered session achieves the given cases per list
    pub fn acpl_removals(&self, cases_per_session: PatientsPerSession) -> Patients {
        cases_per_session * self.delivered_sessions()
    }
}

/// Sessions per week needed to match baseline activity in a given number of operating weeks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingModel {
    /// Operating weeks in a year
    pub weeks: u32,
    /// Sessions per week
    pub sessions_per_week: SessionsPerWeek,
}

/// Spread a year of sessions over each of the given numbers of operating weeks
pub fn operating_models(sessions_12m: Sessions, weeks: &[u32]) -> Vec<OperatingModel> {
    weeks
        .iter()
        .map(|&weeks| OperatingModel {
            weeks,
            sessions_per_week: sessions_12m / Weeks(weeks as f64),
        })
        .collect()
}

/// How planned capacity compares with demand
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityAssessment {
    /// The session model assessed
    pub model: SessionModel,
    /// Sessions planned in a year
    pub planned_sessions: Sessions,
    /// Sessions delivered in a year
    pub delivered_sessions: Sessions,
    /// Utilised minutes in one session
    pub utilised_minutes_per_session: MinutesPerSession,
    /// Utilised minutes in a year
    pub total_utilised_minutes: Minutes,
    /// Demand in minutes over a year
    pub demand_minutes: Minutes,
    /// Sessions per week needed to meet the demand
    pub required_sessions_per_week: SessionsPerWeek,
    /// Whether planned sessions meet the demand
    pub meets_demand: bool,
    /// Annual removals at the baseline cases per list
    pub acpl_removals: Patients,
    /// Baseline sessions spread over different numbers of operating weeks
    pub operating_models: Vec<OperatingModel>,
    /// Ratios which were reported as zero
    pub warnings: Vec<DivisionByZeroWarning>,
}

/// Assess a session model against demand and the baseline.
///
/// # Arguments
///
/// * `model` - The planned session model
/// * `baseline` - Baseline summary for the specialty
/// * `demand_minutes` - Demand over a year in minutes
/// * `operating_weeks` - Numbers of operating weeks to compare
pub fn assess(
    model: &SessionModel,
    baseline: &BaselineSummary,
    demand_minutes: Minutes,
    operating_weeks: &[u32],
) -> CapacityAssessment {
    let mut warnings = Vec::new();
    let required = model.required_sessions_per_week(demand_minutes, &mut warnings);
    let meets_demand = model.meets(required);
    debug!(
        "Capacity: planned {} sessions/week, {required} required",
        model.sessions_per_week
    );

    let mut weeks = operating_weeks.to_vec();
    let model_weeks = model.weeks_per_year.value() as u32;
    if !weeks.contains(&model_weeks) {
        weeks.push(model_weeks);
    }

    CapacityAssessment {
        model: *model,
        planned_sessions: model.planned_sessions(),
        delivered_sessions: model.delivered_sessions(),
        utilised_minutes_per_session: model.utilised_minutes_per_session(),
        total_utilised_minutes: model.total_utilised_minutes(),
        demand_minutes,
        required_sessions_per_week: required,
        meets_demand,
        acpl_removals: model.acpl_removals(baseline.cases_per_session),
        operating_models: operating_models(baseline.sessions_12m, &weeks),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::session_model;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_session_model(session_model: SessionModel) {
        // 10 sessions/week for 48 weeks, 4 hours at 80% utilisation, 10% cancelled
        assert_approx_eq!(Sessions, session_model.planned_sessions(), Sessions(480.0));
        assert_approx_eq!(Sessions, session_model.delivered_sessions(), Sessions(432.0));
        assert_approx_eq!(
            MinutesPerSession,
            session_model.utilised_minutes_per_session(),
            MinutesPerSession(192.0)
        );
        assert_approx_eq!(
            Minutes,
            session_model.total_utilised_minutes(),
            Minutes(82944.0)
        );
        assert_approx_eq!(
            Patients,
            session_model.acpl_removals(PatientsPerSession(2.5)),
            Patients(1080.0)
        );
    }

    #[rstest]
    #[case(92160.0, 10.0, true)]
    #[case(96000.0, 96000.0 / 192.0 / 48.0, false)]
    #[case(0.0, 0.0, true)]
    fn test_required_sessions_per_week(
        session_model: SessionModel,
        #[case] demand: f64,
        #[case] expected: f64,
        #[case] meets: bool,
    ) {
        let mut warnings = Vec::new();
        let required = session_model.required_sessions_per_week(Minutes(demand), &mut warnings);
        assert_approx_eq!(SessionsPerWeek, required, SessionsPerWeek(expected));
        assert_eq!(session_model.meets(required), meets);
        assert!(warnings.is_empty());
    }

    #[rstest]
    fn test_required_sessions_zero_utilisation(mut session_model: SessionModel) {
        session_model.utilisation = Dimensionless(0.0);
        let mut warnings = Vec::new();
        let required = session_model.required_sessions_per_week(Minutes(1000.0), &mut warnings);
        assert_eq!(required, SessionsPerWeek(0.0));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_operating_models() {
        let models = operating_models(Sessions(480.0), &[42, 45, 48]);
        assert_eq!(models.len(), 3);
        assert_eq!(models[2].weeks, 48);
        assert_approx_eq!(
            SessionsPerWeek,
            models[2].sessions_per_week,
            SessionsPerWeek(10.0)
        );
        assert_approx_eq!(
            SessionsPerWeek,
            models[0].sessions_per_week,
            SessionsPerWeek(480.0 / 42.0)
        );
    }
}
