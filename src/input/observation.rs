//! Code for reading flood observations from a DIM CSV file.
use super::read_csv;
use crate::observation::Observation;
use anyhow::Result;
use std::path::Path;

/// Read flood observations from a CSV file.
///
/// The file must have `ID_RWKEL` and `KETINGGIAN` columns. Any other columns (such as `DURASI`)
/// are ignored, as each row counts as a single observation.
pub fn read_observations(file_path: &Path) -> Result<Vec<Observation>> {
    Ok(read_csv(file_path)?.collect())
}
