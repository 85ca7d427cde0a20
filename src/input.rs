//! Common routines for handling input data.
use crate::error::PlanningError;
use crate::units::Dimensionless;
use anyhow::{Context, Result, ensure};
use csv::StringRecord;
use log::warn;
use serde::de::{Deserialize, DeserializeOwned, Deserializer};
use std::fs;
use std::path::Path;

pub mod procedures;
pub use procedures::read_procedures;
pub mod waiting_list;
pub use waiting_list::read_waiting_list;

/// Format an error message for a problem with an input file
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Normalise a CSV header so that matching ignores case and surrounding whitespace
pub fn normalise_header(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Check that a CSV file has the columns we need, warning about absent optional ones
fn check_columns(
    file_path: &Path,
    headers: &StringRecord,
    required: &[&str],
    optional: &[&str],
) -> Result<()> {
    let has_column = |column: &str| headers.iter().any(|header| header == column);

    if let Some(column) = required.iter().find(|column| !has_column(column)) {
        Err(PlanningError::MissingColumn {
            file: file_path.to_path_buf(),
            column: (*column).to_string(),
        })?;
    }

    for column in optional.iter().filter(|column| !has_column(column)) {
        warn!(
            "Column '{column}' not found in {}; assuming zero for every row",
            file_path.display()
        );
    }

    Ok(())
}

/// Read a series of type `T`s from a CSV file.
///
/// Headers are normalised with [`normalise_header`] before rows are deserialised, so `T`'s field
/// names should be given in lower case.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
/// * `required` - Columns which must be present
/// * `optional` - Columns which may be absent (the fields must have serde defaults)
///
/// # Returns
///
/// The rows of the file, or an error if a required column is missing, a row is malformed or the
/// file has no rows.
pub fn read_csv<T: DeserializeOwned>(
    file_path: &Path,
    required: &[&str],
    optional: &[&str],
) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?;

    let headers: StringRecord = reader
        .headers()
        .with_context(|| input_err_msg(file_path))?
        .iter()
        .map(normalise_header)
        .collect();
    check_columns(file_path, &headers, required, optional)
        .with_context(|| input_err_msg(file_path))?;
    reader.set_headers(headers);

    let rows = reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .with_context(|| input_err_msg(file_path))?;
    ensure!(
        !rows.is_empty(),
        "{}: CSV file cannot be empty",
        input_err_msg(file_path)
    );

    Ok(rows)
}

/// Read a [`Dimensionless`] value, checking that it is between 0 and 1
pub fn deserialise_proportion<'de, D>(deserialiser: D) -> Result<Dimensionless, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserialiser)?;
    if !(0.0..=1.0).contains(&value) {
        Err(serde::de::Error::custom("Value must be between 0 and 1"))?;
    }

    Ok(Dimensionless(value))
}

/// Read a [`Dimensionless`] value, checking that it is between 0 (exclusive) and 1 (inclusive)
pub fn deserialise_proportion_nonzero<'de, D>(deserialiser: D) -> Result<Dimensionless, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserialiser)?;
    if !(value > 0.0 && value <= 1.0) {
        Err(serde::de::Error::custom(
            "Value must be greater than 0 and less than or equal to 1",
        ))?;
    }

    Ok(Dimensionless(value))
}
