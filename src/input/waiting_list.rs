//! Code for reading the waiting-list time series from a CSV file.
use super::*;
use crate::id::SpecialtyID;
use crate::month::Month;
use crate::series::{MonthlyRecord, WaitingListSeries};
use serde::Deserialize;

const WAITING_LIST_FILE_NAME: &str = "waiting_list.csv";

const REQUIRED_COLUMNS: [&str; 5] = [
    "month",
    "specialty",
    "additions to waiting list",
    "removals from waiting list",
    "total waiting list",
];

const OPTIONAL_COLUMNS: [&str; 7] = [
    "sessions",
    "cancelled sessions",
    "minutes utilised",
    "cases",
    "18+",
    "40+",
    "52+",
];

/// A row of the waiting-list CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct WaitingListRaw {
    month: Month,
    specialty: String,
    #[serde(rename = "additions to waiting list")]
    additions: u32,
    #[serde(rename = "removals from waiting list")]
    removals: u32,
    #[serde(rename = "total waiting list")]
    total_size: u32,
    #[serde(default)]
    sessions: u32,
    #[serde(default, rename = "cancelled sessions")]
    cancelled_sessions: u32,
    #[serde(default, rename = "minutes utilised")]
    minutes_utilised: f64,
    #[serde(default)]
    cases: u32,
    #[serde(default, rename = "18+")]
    backlog_18: u32,
    #[serde(default, rename = "40+")]
    backlog_40: u32,
    #[serde(default, rename = "52+")]
    backlog_52: u32,
}

/// Read the waiting-list time series from the data directory.
///
/// # Arguments
///
/// * `data_dir` - Folder containing the planning data
///
/// # Returns
///
/// The series, or an error if the file is missing, malformed or contains duplicate rows
pub fn read_waiting_list(data_dir: &Path) -> Result<WaitingListSeries> {
    let file_path = data_dir.join(WAITING_LIST_FILE_NAME);
    let rows = read_csv(&file_path, &REQUIRED_COLUMNS, &OPTIONAL_COLUMNS)?;
    read_waiting_list_from_iter(rows.into_iter()).with_context(|| input_err_msg(&file_path))
}

fn read_waiting_list_from_iter<I>(iter: I) -> Result<WaitingListSeries>
where
    I: Iterator<Item = WaitingListRaw>,
{
    let records = iter
        .map(|raw| {
            ensure!(
                !raw.specialty.is_empty(),
                "Empty specialty name for month {}",
                raw.month
            );
            ensure!(
                raw.minutes_utilised.is_finite() && raw.minutes_utilised >= 0.0,
                "Invalid minutes utilised for specialty {} in month {}: {}",
                raw.specialty,
                raw.month,
                raw.minutes_utilised
            );

            Ok(MonthlyRecord {
                specialty: SpecialtyID::from(raw.specialty),
                month: raw.month,
                additions: raw.additions,
                removals: raw.removals,
                total_size: raw.total_size,
                sessions: raw.sessions,
                cancelled_sessions: raw.cancelled_sessions,
                minutes_utilised: raw.minutes_utilised,
                cases: raw.cases,
                backlog_18: raw.backlog_18,
                backlog_40: raw.backlog_40,
                backlog_52: raw.backlog_52,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    WaitingListSeries::from_records(records)
}
