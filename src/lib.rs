//! Waiting-list demand and capacity planning.
//!
//! Reads monthly waiting-list activity and a procedure catalog for a specialty, then estimates
//! baseline flows, demand trends, theatre capacity and the sessions needed to meet waiting-time
//! targets.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod baseline;
pub mod capacity;
pub mod catalog;
pub mod cli;
pub mod cohort;
pub mod context;
pub mod demand;
pub mod dynamics;
pub mod error;
pub mod id;
pub mod input;
pub mod log;
pub mod month;
pub mod output;
pub mod period;
pub mod pipeline;
pub mod projection;
pub mod series;
pub mod session_fit;
pub mod settings;
pub mod simulation;
pub mod stats;
pub mod trend;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the folder in which program-wide configuration files are stored
pub fn get_wlplan_config_dir() -> PathBuf {
    let Some(mut config_dir) = dirs::config_dir() else {
        // No config dir on this platform; use the current folder
        return PathBuf::new();
    };

    config_dir.push("wlplan");
    config_dir
}
