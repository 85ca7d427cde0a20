//! Procedure-level demand and next-year demand growth.
use crate::catalog::ProcedureCatalog;
use crate::error::{DivisionByZeroWarning, checked_ratio};
use crate::id::{ProcedureID, SpecialtyID};
use crate::month::Month;
use crate::period::BaselinePeriod;
use crate::units::{Dimensionless, Minutes, MinutesPerPatient, Patients};
use indexmap::IndexMap;
use log::warn;

/// Demand for one procedure
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureDemand {
    /// The procedure
    pub procedure: ProcedureID,
    /// Referrals, pooled over every row for the procedure
    pub referrals: Patients,
    /// Referral-weighted mean duration (zero if no row has a usable duration)
    pub average_duration: MinutesPerPatient,
    /// Referrals multiplied by duration
    pub demand_minutes: Minutes,
    /// Share of the specialty's referrals
    pub share: Dimensionless,
    /// Additional cases next year, from distributing the growth in demand by share
    pub additional_cases: i64,
}

impl ProcedureDemand {
    /// Minutes needed for the additional cases
    pub fn additional_minutes(&self) -> Minutes {
        self.average_duration * Patients(self.additional_cases as f64)
    }
}

/// Demand for each of a specialty's procedures, in catalog order.
///
/// Additional cases are left at zero; see [`distribute_additional_demand`].
pub fn procedure_demand(
    catalog: &ProcedureCatalog,
    specialty: &SpecialtyID,
    warnings: &mut Vec<DivisionByZeroWarning>,
) -> Vec<ProcedureDemand> {
    // Referrals, and referrals and minutes for rows with a usable duration
    let mut pooled: IndexMap<ProcedureID, (f64, f64, f64)> = IndexMap::new();
    for record in catalog.for_specialty(specialty) {
        let referrals = record.total_referrals as f64;
        let entry = pooled.entry(record.procedure.clone()).or_default();
        entry.0 += referrals;
        if record.has_usable_duration() {
            entry.1 += referrals;
            entry.2 += referrals * record.average_duration;
        }
    }

    let total_referrals: f64 = pooled.values().map(|(referrals, _, _)| referrals).sum();
    pooled
        .into_iter()
        .map(|(procedure, (referrals, timed_referrals, minutes))| {
            let average_duration = if timed_referrals > 0.0 {
                minutes / timed_referrals
            } else {
                0.0
            };
            ProcedureDemand {
                procedure,
                referrals: Patients(referrals),
                average_duration: MinutesPerPatient(average_duration),
                demand_minutes: Minutes(referrals * average_duration),
                share: Dimensionless(checked_ratio(
                    referrals,
                    total_referrals,
                    "procedure referral share",
                    warnings,
                )),
                additional_cases: 0,
            }
        })
        .collect()
}

/// Suggested multiplier for next year's demand.
///
/// The percentage change from the first to the last value is spread evenly over the number of
/// values and extended to 12 months: `1 + (pct / n) / 100 * 12`. With fewer than two values or a
/// zero first value the multiplier is 1.
pub fn demand_multiplier(
    history: &[f64],
    warnings: &mut Vec<DivisionByZeroWarning>,
) -> Dimensionless {
    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        return Dimensionless(1.0);
    };
    if history.len() < 2 {
        return Dimensionless(1.0);
    }

    let fraction = checked_ratio(last - first, *first, "demand growth", warnings);
    let monthly_pct = fraction * 100.0 / history.len() as f64;
    Dimensionless(1.0 + monthly_pct / 100.0 * 12.0)
}

/// Round half to even, as used for case counts
fn round_cases(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Share additional demand out between procedures.
///
/// Each procedure gets its rounded share. Any rounding residue is then corrected one case at a
/// time, cycling through the procedures in order. A correction never takes a procedure below zero,
/// so a negative residue may be left partly uncorrected.
pub fn distribute_additional_demand(shares: &[f64], additional: i64) -> Vec<i64> {
    let mut cases: Vec<_> = shares
        .iter()
        .map(|share| round_cases(share * additional as f64))
        .collect();
    if cases.is_empty() {
        return cases;
    }

    let difference = additional - cases.iter().sum::<i64>();
    let num_procedures = cases.len();
    for i in 0..difference.unsigned_abs() as usize {
        let case = &mut cases[i % num_procedures];
        if difference > 0 {
            *case += 1;
        } else if *case > 0 {
            *case -= 1;
        }
    }

    cases
}

/// Demand figures for a specialty
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSummary {
    /// Per-procedure demand
    pub procedures: Vec<ProcedureDemand>,
    /// Total referrals
    pub total_cases: Patients,
    /// Total demand in minutes
    pub total_minutes: Minutes,
    /// Referral-weighted mean duration
    pub mean_duration: MinutesPerPatient,
    /// Referrals (decisions to admit) in the baseline, scaled to 12 months
    pub dtas_12m: Patients,
    /// 12-month additions per decision to admit
    pub additions_per_dta: Dimensionless,
    /// 12-month cases per addition
    pub cases_per_addition: Dimensionless,
    /// Additions summed over the whole history
    pub total_additions: Patients,
    /// Suggested multiplier for next year
    pub multiplier: Dimensionless,
    /// Projected additions next year (rounded)
    pub next_year_additions: i64,
    /// Ratios which were reported as zero
    pub warnings: Vec<DivisionByZeroWarning>,
}

impl DemandSummary {
    /// Extra demand next year over this year
    pub fn additional_demand(&self) -> i64 {
        self.next_year_additions - round_cases(self.total_additions.value())
    }

    /// Predicted cases for a forecast of additions
    pub fn predicted_cases(&self, additions: &[(Month, f64)]) -> Vec<(Month, f64)> {
        additions
            .iter()
            .map(|(month, value)| (*month, value * self.cases_per_addition.value()))
            .collect()
    }
}

/// Inputs to [`summarise_demand`] taken from the baseline and history
#[derive(Debug, Clone, Copy)]
pub struct DemandInputs<'a> {
    /// The baseline period
    pub period: &'a BaselinePeriod,
    /// 12-month equivalent additions in the baseline
    pub additions_12m: Patients,
    /// 12-month equivalent cases in the baseline
    pub cases_12m: Patients,
    /// Monthly additions over the specialty's history, oldest first
    pub history: &'a [f64],
}

/// Work out procedure demand, conversion ratios and next year's demand for a specialty.
///
/// Referrals in a catalog broken down by month are filtered to the baseline and scaled to 12
/// months. Referrals in a catalog without months are taken to already cover a year.
pub fn summarise_demand(
    catalog: &ProcedureCatalog,
    specialty: &SpecialtyID,
    inputs: DemandInputs,
) -> DemandSummary {
    let mut warnings = Vec::new();
    let mut procedures = procedure_demand(catalog, specialty, &mut warnings);
    if procedures.is_empty() {
        warn!("No procedures found for specialty {specialty}");
    }

    let total_cases: Patients = procedures.iter().map(|p| p.referrals).sum();
    let total_minutes: Minutes = procedures.iter().map(|p| p.demand_minutes).sum();
    let mean_duration = MinutesPerPatient(checked_ratio(
        total_minutes.value(),
        total_cases.value(),
        "mean procedure duration",
        &mut warnings,
    ));

    let dtas_12m = if catalog.is_monthly(specialty) {
        let referrals: f64 = catalog
            .in_period(specialty, inputs.period)
            .map(|record| record.total_referrals as f64)
            .sum();
        Patients(referrals) * inputs.period.scaling_factor()
    } else {
        total_cases
    };
    let additions_per_dta = Dimensionless(checked_ratio(
        inputs.additions_12m.value(),
        dtas_12m.value(),
        "additions per DTA",
        &mut warnings,
    ));
    let cases_per_addition = Dimensionless(checked_ratio(
        inputs.cases_12m.value(),
        inputs.additions_12m.value(),
        "cases per addition",
        &mut warnings,
    ));

    let multiplier = demand_multiplier(inputs.history, &mut warnings);
    let total_additions = Patients(inputs.history.iter().sum());
    let next_year_additions = round_cases((total_additions * multiplier).value());
    let additional = next_year_additions - round_cases(total_additions.value());

    let shares: Vec<_> = procedures.iter().map(|p| p.share.value()).collect();
    for (procedure, cases) in procedures
        .iter_mut()
        .zip(distribute_additional_demand(&shares, additional))
    {
        procedure.additional_cases = cases;
    }

    DemandSummary {
        procedures,
        total_cases,
        total_minutes,
        mean_duration,
        dtas_12m,
        additions_per_dta,
        cases_per_addition,
        total_additions,
        multiplier,
        next_year_additions,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{month, procedure};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[test]
    fn test_procedure_demand() {
        let catalog = ProcedureCatalog::new(vec![
            procedure("Urology", "Cystoscopy", 30, 20.0),
            procedure("Urology", "TURP", 10, 90.0),
            procedure("Urology", "Unknown", 10, 0.0),
            procedure("ENT", "Tonsillectomy", 8, 45.0),
        ]);
        let mut warnings = Vec::new();
        let demand = procedure_demand(&catalog, &"Urology".into(), &mut warnings);

        assert_eq!(demand.len(), 3);
        assert_approx_eq!(Minutes, demand[0].demand_minutes, Minutes(600.0));
        assert_approx_eq!(Dimensionless, demand[0].share, Dimensionless(0.6));
        assert_eq!(demand[2].average_duration, MinutesPerPatient(0.0));
        assert_eq!(demand[2].demand_minutes, Minutes(0.0));
        assert!(warnings.is_empty());
    }

    #[rstest]
    #[case(&[100.0, 110.0, 120.0, 130.0], 1.0 + 30.0 / 4.0 / 100.0 * 12.0)]
    #[case(&[100.0, 100.0], 1.0)]
    #[case(&[100.0], 1.0)]
    #[case(&[], 1.0)]
    fn test_demand_multiplier(#[case] history: &[f64], #[case] expected: f64) {
        let mut warnings = Vec::new();
        assert_approx_eq!(
            Dimensionless,
            demand_multiplier(history, &mut warnings),
            Dimensionless(expected)
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_demand_multiplier_zero_start() {
        let mut warnings = Vec::new();
        assert_eq!(
            demand_multiplier(&[0.0, 10.0], &mut warnings),
            Dimensionless(1.0)
        );
        assert_eq!(warnings.len(), 1);
    }

    #[rstest]
    #[case(&[0.5, 0.5], 11, vec![5, 6])]
    #[case(&[1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0], 10, vec![4, 3, 3])]
    #[case(&[0.5, 0.5], -3, vec![-1, -2])]
    #[case(&[0.6, 0.4], 0, vec![0, 0])]
    #[case(&[], 5, vec![])]
    fn test_distribute_additional_demand(
        #[case] shares: &[f64],
        #[case] additional: i64,
        #[case] expected: Vec<i64>,
    ) {
        assert_eq!(distribute_additional_demand(shares, additional), expected);
    }

    #[test]
    fn test_summarise_demand() {
        let catalog = ProcedureCatalog::new(vec![
            procedure("Urology", "Cystoscopy", 300, 20.0),
            procedure("Urology", "TURP", 100, 90.0),
        ]);
        let period = BaselinePeriod::new(month(2024, 4), month(2024, 9)).unwrap();
        let history = [100.0; 12];
        let summary = summarise_demand(
            &catalog,
            &"Urology".into(),
            DemandInputs {
                period: &period,
                additions_12m: Patients(1200.0),
                cases_12m: Patients(900.0),
                history: &history,
            },
        );

        assert_approx_eq!(Patients, summary.total_cases, Patients(400.0));
        assert_approx_eq!(Minutes, summary.total_minutes, Minutes(15000.0));
        assert_approx_eq!(MinutesPerPatient, summary.mean_duration, MinutesPerPatient(37.5));
        assert_approx_eq!(Patients, summary.dtas_12m, Patients(400.0));
        assert_approx_eq!(Dimensionless, summary.additions_per_dta, Dimensionless(3.0));
        assert_approx_eq!(Dimensionless, summary.cases_per_addition, Dimensionless(0.75));
        assert_eq!(summary.multiplier, Dimensionless(1.0));
        assert_eq!(summary.next_year_additions, 1200);
        assert_eq!(summary.additional_demand(), 0);
        assert!(summary.warnings.is_empty());

        let predicted = summary.predicted_cases(&[(month(2024, 10), 100.0)]);
        assert_approx_eq!(f64, predicted[0].1, 75.0);
    }

    #[test]
    fn test_summarise_demand_monthly_catalog() {
        let mut in_baseline = procedure("Urology", "TURP", 60, 90.0);
        in_baseline.month = Some(month(2024, 5));
        let mut before = procedure("Urology", "TURP", 500, 90.0);
        before.month = Some(month(2023, 5));
        let catalog = ProcedureCatalog::new(vec![in_baseline, before]);
        let period = BaselinePeriod::new(month(2024, 4), month(2024, 9)).unwrap();
        let summary = summarise_demand(
            &catalog,
            &"Urology".into(),
            DemandInputs {
                period: &period,
                additions_12m: Patients(240.0),
                cases_12m: Patients(0.0),
                history: &[10.0, 20.0],
            },
        );

        assert_approx_eq!(Patients, summary.dtas_12m, Patients(120.0));
        assert_approx_eq!(Dimensionless, summary.additions_per_dta, Dimensionless(2.0));
        // 100% growth over 2 months, extended to a year
        assert_approx_eq!(Dimensionless, summary.multiplier, Dimensionless(7.0));
        assert_eq!(summary.next_year_additions, 210);
        assert_eq!(summary.procedures[0].additional_cases, 180);
    }
}
