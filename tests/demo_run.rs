//! Integration tests for running the demo dataset.
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use wlplan::cli::{RunOpts, handle_run_command};
use wlplan::context::PlanningContext;
use wlplan::settings::Settings;
use wlplan::simulation;

/// Get the path to the demo dataset.
fn get_data_dir() -> PathBuf {
    PathBuf::from("demos/simple")
}

/// Read the percentile columns of the projection file
fn read_bands(output_dir: &Path) -> Vec<Vec<f64>> {
    let mut reader =
        csv::Reader::from_path(output_dir.join("waiting_list_projection.csv")).unwrap();
    reader
        .records()
        .map(|record| {
            let record = record.unwrap();
            record
                .iter()
                .skip(1)
                .map(|value| value.parse().unwrap())
                .collect()
        })
        .collect()
}

/// An integration test for the `run` command.
#[test]
fn test_handle_run_command() {
    unsafe { std::env::set_var("WLPLAN_LOG_LEVEL", "off") };

    // Save results to non-existent directory to check that directory creation works
    let tempdir = tempdir().unwrap();
    let output_dir = tempdir.path().join("results");
    let opts = RunOpts {
        output_dir: Some(output_dir.clone()),
        debug_model: true,
        seed: Some(99),
        ..Default::default()
    };
    handle_run_command(&get_data_dir(), &opts, Some(Settings::default())).unwrap();

    for file_name in [
        "metadata.toml",
        "wlplan_info.log",
        "baseline_summary.csv",
        "specialty_summary.csv",
        "trend_model.csv",
        "demand_forecast.csv",
        "procedure_demand.csv",
        "operating_models.csv",
        "capacity.csv",
        "backlog_clearance.csv",
        "waiting_list_projection.csv",
        "cohort_trace.csv",
        "overdue_summary.csv",
        "debug_projection_trials.csv",
    ] {
        assert!(output_dir.join(file_name).is_file(), "{file_name} missing");
    }

    // One row per future month, with ordered percentiles
    let bands = read_bands(&output_dir);
    assert_eq!(bands.len(), 12);
    for row in &bands {
        assert_eq!(row.len(), 5);
        assert!(row.iter().tuple_windows().all(|(a, b)| a <= b));
    }

    // The output folder now has files in it, so it can't be reused without --overwrite
    let err = handle_run_command(&get_data_dir(), &opts, Some(Settings::default())).unwrap_err();
    assert!(
        err.chain()
            .next()
            .unwrap()
            .to_string()
            .starts_with("Failed to create output directory")
    );
}

/// Runs with the same seed give identical results
#[test]
fn test_seeded_runs_are_repeatable() {
    let context = PlanningContext::from_path(get_data_dir()).unwrap();

    let dirs = [tempdir().unwrap(), tempdir().unwrap()];
    for dir in &dirs {
        simulation::run(&context, &get_data_dir(), dir.path(), false, Some(5)).unwrap();
    }

    for file_name in ["waiting_list_projection.csv", "capacity.csv", "overdue_summary.csv"] {
        let [first, second] = dirs
            .each_ref()
            .map(|dir| fs::read_to_string(dir.path().join(file_name)).unwrap());
        assert_eq!(first, second, "{file_name} differs");
    }
}
