//! Functionality for running a complete planning run and saving its results.
use crate::context::PlanningContext;
use crate::output::DataWriter;
use crate::output::metadata::write_metadata;
use crate::pipeline::run_all;
use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

/// Pick the seed for a run.
///
/// An explicit seed takes precedence over one in `planning.toml`. If neither is given, a seed is
/// drawn at random and logged so that the run can be repeated.
pub fn resolve_seed(context: &PlanningContext, seed: Option<u64>) -> u64 {
    if let Some(seed) = seed.or(context.parameters.seed) {
        return seed;
    }

    let seed = u64::from(rand::random::<u32>());
    info!("No seed given; using seed {seed}");
    seed
}

/// Run every planning stage and write the results.
///
/// # Arguments:
///
/// * `context` - The loaded planning context
/// * `data_path` - Folder the inputs were read from
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write every bootstrap trial
/// * `seed` - Overrides the seed in `planning.toml`
pub fn run(
    context: &PlanningContext,
    data_path: &Path,
    output_path: &Path,
    debug_model: bool,
    seed: Option<u64>,
) -> Result<()> {
    let seed = resolve_seed(context, seed);
    let mut rng = StdRng::seed_from_u64(seed);

    info!(
        "Planning for {} with baseline {} from {}",
        context.specialty, context.period, context.model_start
    );
    let results = run_all(context, &mut rng)?;
    info!(
        "Ran stages: {}",
        results.stages_run().iter().join(", ")
    );

    write_metadata(output_path, data_path, context, seed)
        .context("Failed to save metadata")?;
    let mut writer = DataWriter::create(output_path, debug_model)?;
    writer.write_results(&results)?;
    writer.flush()?;

    Ok(())
}
