//! Code for writing metadata to file
use crate::context::PlanningContext;
use crate::id::SpecialtyID;
use crate::month::Month;
use crate::projection::DrawMode;
use anyhow::{Context, Result};
use chrono::prelude::*;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

/// Information about the program build via `built` crate
mod built_info {
    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Get information about program version from git
fn get_git_hash() -> String {
    let Some(hash) = built_info::GIT_COMMIT_HASH_SHORT else {
        return "unknown".into();
    };

    if built_info::GIT_DIRTY == Some(true) {
        format!("{hash}-dirty")
    } else {
        hash.into()
    }
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata<'a>,
    platform: PlatformMetadata,
}

/// Information about the planning run
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the input data
    data_path: &'a Path,
    /// The date and time on which the run started
    datetime: String,
    /// The specialty planned for
    specialty: &'a SpecialtyID,
    baseline_start: Month,
    baseline_end: Month,
    model_start: Month,
    /// The seed used for every random draw, so the run can be repeated
    seed: u64,
    draw_mode: DrawMode,
}

impl<'a> RunMetadata<'a> {
    fn new(data_path: &'a Path, context: &'a PlanningContext, seed: u64) -> Self {
        let dt = Local::now();
        Self {
            data_path,
            datetime: dt.to_rfc2822(),
            specialty: &context.specialty,
            baseline_start: context.period.start(),
            baseline_end: context.period.end(),
            model_start: context.model_start,
            seed,
            draw_mode: context.parameters.draw_mode,
        }
    }
}

#[derive(Serialize)]
struct ProgramMetadata<'a> {
    /// The program name
    name: &'a str,
    /// The program version as specified in Cargo.toml
    version: &'a str,
    /// The target architecture for the build (e.g. x86_64-unknown-linux-gnu)
    target: &'a str,
    /// Whether it is a debug build
    is_debug: bool,
    /// The version of rustc used to compile wlplan
    rustc_version: &'a str,
    /// When wlplan was built
    build_time_utc: &'a str,
    /// The git commit hash for the version of wlplan (if known)
    git_commit_hash: String,
}

impl Default for ProgramMetadata<'_> {
    fn default() -> Self {
        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            target: built_info::TARGET,
            is_debug: built_info::DEBUG,
            rustc_version: built_info::RUSTC_VERSION,
            build_time_utc: built_info::BUILT_TIME_UTC,
            git_commit_hash: get_git_hash(),
        }
    }
}

/// Information about the platform on which wlplan is running.
///
/// The fields correspond to different data available from the [`PlatformInfo`] struct.
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    nodename: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl PlatformMetadata {
    fn new() -> Result<Self> {
        let info = PlatformInfo::new()
            .map_err(|err| anyhow::anyhow!("{err}"))
            .context("Unable to determine platform info")?;
        Ok(Self {
            sysname: info.sysname().to_string_lossy().into(),
            nodename: info.nodename().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            version: info.version().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
            osname: info.osname().to_string_lossy().into(),
        })
    }
}

/// Write metadata to the specified output path in TOML format
pub fn write_metadata(
    output_path: &Path,
    data_path: &Path,
    context: &PlanningContext,
    seed: u64,
) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata::new(data_path, context, seed),
        program: ProgramMetadata::default(),
        platform: PlatformMetadata::new()?,
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::planning_context;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn test_write_metadata(planning_context: PlanningContext) {
        let dir = tempdir().unwrap();
        write_metadata(dir.path(), Path::new("data"), &planning_context, 42).unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let table: toml::Table = toml::from_str(&contents).unwrap();
        let run = table["run"].as_table().unwrap();
        assert_eq!(run["specialty"].as_str(), Some("Urology"));
        assert_eq!(run["seed"].as_integer(), Some(42));
        assert_eq!(run["draw_mode"].as_str(), Some("independent"));
        assert_eq!(run["baseline_start"].as_str(), Some("2024-04"));
        assert!(table.contains_key("program"));
    }
}
