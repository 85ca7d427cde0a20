//! Code for reading the procedure catalog from a CSV file.
use super::*;
use crate::catalog::{ProcedureCatalog, ProcedureRecord};
use crate::id::{ProcedureID, SpecialtyID};
use crate::month::Month;
use serde::Deserialize;

const PROCEDURES_FILE_NAME: &str = "procedures.csv";

const REQUIRED_COLUMNS: [&str; 4] = [
    "specialty",
    "procedure",
    "total referrals",
    "average duration",
];

/// A row of the procedures CSV file
#[derive(Debug, Deserialize, PartialEq)]
struct ProcedureRaw {
    specialty: String,
    procedure: String,
    #[serde(default)]
    month: Option<Month>,
    #[serde(rename = "total referrals")]
    total_referrals: u32,
    #[serde(rename = "average duration")]
    average_duration: f64,
}

/// Read the procedure catalog from the data directory.
///
/// # Arguments
///
/// * `data_dir` - Folder containing the planning data
///
/// # Returns
///
/// The catalog, in file order, or an error if the file is missing or malformed
pub fn read_procedures(data_dir: &Path) -> Result<ProcedureCatalog> {
    let file_path = data_dir.join(PROCEDURES_FILE_NAME);
    let rows = read_csv(&file_path, &REQUIRED_COLUMNS, &[])?;
    read_procedures_from_iter(rows.into_iter()).with_context(|| input_err_msg(&file_path))
}

fn read_procedures_from_iter<I>(iter: I) -> Result<ProcedureCatalog>
where
    I: Iterator<Item = ProcedureRaw>,
{
    let records = iter
        .map(|raw| {
            ensure!(
                !raw.specialty.is_empty() && !raw.procedure.is_empty(),
                "Specialty and procedure names cannot be empty"
            );
            ensure!(
                raw.average_duration.is_finite() && raw.average_duration >= 0.0,
                "Invalid average duration for procedure {}: {}",
                raw.procedure,
                raw.average_duration
            );
            if raw.average_duration == 0.0 {
                warn!(
                    "Procedure {} ({}) has an average duration of zero and will be excluded \
                    from duration-based calculations",
                    raw.procedure, raw.specialty
                );
            }

            Ok(ProcedureRecord {
                specialty: SpecialtyID::from(raw.specialty),
                procedure: ProcedureID::from(raw.procedure),
                month: raw.month,
                total_referrals: raw.total_referrals,
                average_duration: raw.average_duration,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ProcedureCatalog::new(records))
}
