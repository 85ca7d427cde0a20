//! Bootstrap projection of the waiting-list size.
//!
//! Each trial starts from the current list size and, for every future month, adds a monthly
//! addition count and subtracts a monthly removal count, both resampled with replacement from the
//! baseline period. The trials are then reduced to percentile bands for each month.
//!
//! Projected totals are not clamped at zero. A negative total is an artefact of the model rather
//! than something to be corrected.
use crate::error::PlanningError;
use crate::stats::percentile_of_sorted;
use rand::Rng;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// The percentiles reported for each future month
pub const PERCENTILES: [f64; 5] = [5.0, 25.0, 50.0, 75.0, 95.0];

/// How additions and removals are drawn from the baseline
#[derive(
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
)]
pub enum DrawMode {
    /// Additions and removals are drawn independently of one another
    #[default]
    #[string = "independent"]
    Independent,
    /// Additions and removals are drawn together from the same historical month
    #[string = "paired"]
    Paired,
}

/// Percentiles of the projected list size for one month
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentileBands {
    /// 5th percentile
    pub p5: f64,
    /// 25th percentile
    pub p25: f64,
    /// Median: the point forecast
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 95th percentile
    pub p95: f64,
}

impl PercentileBands {
    /// Calculate the bands from one month's values across all trials
    fn from_values(values: &mut [f64]) -> Self {
        values.sort_by(f64::total_cmp);
        let [p5, p25, p50, p75, p95] = PERCENTILES.map(|p| percentile_of_sorted(values, p));

        Self {
            p5,
            p25,
            p50,
            p75,
            p95,
        }
    }
}

/// The outcome of a projection run
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    /// Projected list size for every trial (outer) and future month (inner)
    pub trials: Vec<Vec<f64>>,
    /// Percentile bands for each future month
    pub bands: Vec<PercentileBands>,
}

impl SimulationResult {
    /// The median trajectory
    pub fn median(&self) -> impl Iterator<Item = f64> + '_ {
        self.bands.iter().map(|bands| bands.p50)
    }
}

/// Project the list size forward by resampling baseline additions and removals.
///
/// # Arguments
///
/// * `additions` - Monthly additions in the baseline period
/// * `removals` - Monthly removals in the baseline period
/// * `starting_total` - List size at the start of the projection
/// * `num_future_months` - How many months to project (zero gives an empty result)
/// * `num_simulations` - Number of trials
/// * `draw_mode` - Whether to draw additions and removals independently or in pairs
/// * `rng` - Source of randomness
pub fn project<R: Rng + ?Sized>(
    additions: &[u32],
    removals: &[u32],
    starting_total: f64,
    num_future_months: usize,
    num_simulations: usize,
    draw_mode: DrawMode,
    rng: &mut R,
) -> Result<SimulationResult, PlanningError> {
    if additions.is_empty() || removals.is_empty() {
        return Err(PlanningError::EmptyBaseline(
            "to resample additions and removals from".into(),
        ));
    }
    if num_simulations == 0 {
        return Err(PlanningError::InvalidParameter(
            "number of simulations must be greater than zero".into(),
        ));
    }
    if draw_mode == DrawMode::Paired && additions.len() != removals.len() {
        return Err(PlanningError::InvalidParameter(format!(
            "paired draws need the same number of additions ({}) and removals ({})",
            additions.len(),
            removals.len()
        )));
    }

    let trials: Vec<Vec<f64>> = (0..num_simulations)
        .map(|_| {
            let mut current_total = starting_total;
            (0..num_future_months)
                .map(|_| {
                    let (addition, removal) = match draw_mode {
                        DrawMode::Independent => {
                            let addition = additions[rng.gen_range(0..additions.len())];
                            let removal = removals[rng.gen_range(0..removals.len())];
                            (addition, removal)
                        }
                        DrawMode::Paired => {
                            let idx = rng.gen_range(0..additions.len());
                            (additions[idx], removals[idx])
                        }
                    };
                    current_total += addition as f64 - removal as f64;
                    current_total
                })
                .collect()
        })
        .collect();

    let bands = (0..num_future_months)
        .map(|month| {
            let mut values: Vec<_> = trials.iter().map(|trial| trial[month]).collect();
            PercentileBands::from_values(&mut values)
        })
        .collect();

    Ok(SimulationResult { trials, bands })
}
