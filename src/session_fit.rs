//! Monte Carlo fitting of procedures into session minutes.
//!
//! Procedures are drawn at random, weighted by their share of referrals, and packed greedily into
//! a minutes budget until the next draw would overrun it. Averaging the number packed over many
//! trials turns a minutes budget into an expected case count for the specialty's actual case mix.
use crate::catalog::ProcedureCatalog;
use crate::error::{DivisionByZeroWarning, PlanningError};
use crate::id::{ProcedureID, SpecialtyID};
use crate::units::{Minutes, Patients, PatientsPerSession, Sessions};
use indexmap::IndexMap;
use log::warn;
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

/// Durations and referral weights for a specialty's procedures
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureMix {
    /// The procedures, in catalog order
    pub procedures: Vec<ProcedureID>,
    /// Minutes per case for each procedure
    pub durations: Vec<f64>,
    /// Share of referrals for each procedure (sums to one)
    pub weights: Vec<f64>,
}

impl ProcedureMix {
    /// Build the mix for a specialty from the catalog.
    ///
    /// Referrals for a procedure listed more than once (e.g. per month) are pooled and its
    /// duration is the referral-weighted mean. Procedures without a usable duration are left out.
    ///
    /// Returns `None` (with a warning) when no referrals remain.
    pub fn from_catalog(
        catalog: &ProcedureCatalog,
        specialty: &SpecialtyID,
        warnings: &mut Vec<DivisionByZeroWarning>,
    ) -> Option<Self> {
        let mut pooled: IndexMap<ProcedureID, (f64, f64)> = IndexMap::new();
        for record in catalog.for_specialty(specialty) {
            if !record.has_usable_duration() {
                warn!(
                    "Procedure {} has no usable duration and is excluded from session fitting",
                    record.procedure
                );
                continue;
            }

            let referrals = record.total_referrals as f64;
            let entry = pooled.entry(record.procedure.clone()).or_default();
            entry.0 += referrals;
            entry.1 += referrals * record.average_duration;
        }

        let total_referrals: f64 = pooled.values().map(|(referrals, _)| referrals).sum();
        if total_referrals <= 0.0 {
            let warning = DivisionByZeroWarning {
                metric: "procedure referral share",
            };
            warn!("{warning}");
            warnings.push(warning);
            return None;
        }

        let mut mix = Self {
            procedures: Vec::new(),
            durations: Vec::new(),
            weights: Vec::new(),
        };
        for (procedure, (referrals, minutes)) in pooled {
            if referrals == 0.0 {
                continue;
            }

            mix.procedures.push(procedure);
            mix.durations.push(minutes / referrals);
            mix.weights.push(referrals / total_referrals);
        }

        Some(mix)
    }
}

/// The average number of procedures which fit into a minutes budget.
///
/// # Arguments
///
/// * `available_minutes` - The budget to fill
/// * `durations` - Minutes per case of each procedure (all positive)
/// * `weights` - Probability of drawing each procedure
/// * `num_simulations` - Number of trials to average over
/// * `rng` - Source of randomness
pub fn fit_procedures<R: Rng + ?Sized>(
    available_minutes: Minutes,
    durations: &[f64],
    weights: &[f64],
    num_simulations: usize,
    rng: &mut R,
) -> Result<f64, PlanningError> {
    if durations.len() != weights.len() {
        return Err(PlanningError::InvalidParameter(format!(
            "got {} procedure durations but {} weights",
            durations.len(),
            weights.len()
        )));
    }
    if num_simulations == 0 {
        return Err(PlanningError::InvalidParameter(
            "number of session-fitting simulations must be greater than zero".into(),
        ));
    }
    if durations.iter().any(|d| !d.is_finite() || *d <= 0.0) {
        return Err(PlanningError::InvalidParameter(
            "procedure durations must be positive".into(),
        ));
    }
    let dist = WeightedIndex::new(weights)
        .map_err(|err| PlanningError::InvalidParameter(format!("procedure weights: {err}")))?;

    let mut total_count = 0usize;
    for _ in 0..num_simulations {
        let mut used = 0.0;
        loop {
            let duration = durations[dist.sample(rng)];
            if used + duration > available_minutes.value() {
                break;
            }
            used += duration;
            total_count += 1;
        }
    }

    Ok(total_count as f64 / num_simulations as f64)
}

/// Mix-based throughput of a specialty
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFit {
    /// Utilised minutes in one session (the budget each trial fills)
    pub minutes_per_session: Minutes,
    /// Expected cases in one session
    pub cases_per_session: PatientsPerSession,
    /// Sessions delivered in a year
    pub delivered_sessions: Sessions,
    /// Expected cases in a year
    pub annual_cases: Patients,
}

impl SessionFit {
    /// Fit the procedure mix into one session and scale up to a year of delivered sessions
    pub fn new<R: Rng + ?Sized>(
        mix: &ProcedureMix,
        minutes_per_session: Minutes,
        delivered_sessions: Sessions,
        num_simulations: usize,
        rng: &mut R,
    ) -> Result<Self, PlanningError> {
        let per_session = PatientsPerSession(fit_procedures(
            minutes_per_session,
            &mix.durations,
            &mix.weights,
            num_simulations,
            rng,
        )?);

        Ok(Self {
            minutes_per_session,
            cases_per_session: per_session,
            delivered_sessions,
            annual_cases: per_session * delivered_sessions,
        })
    }
}
