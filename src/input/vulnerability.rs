//! Code for reading and writing vulnerability tables.
use super::{input_err_msg, read_csv};
use crate::vulnerability::{VulnerabilityRecord, VulnerabilityTable};
use anyhow::{Context, Result};
use std::path::Path;

/// Read a vulnerability table from a CSV file.
///
/// The file must have the columns `TYPE`, `PRICE` and `A1` to `C3`. Any invalid row is an error
/// for the whole table.
pub fn read_vulnerability_table(file_path: &Path) -> Result<VulnerabilityTable> {
    let records = read_csv::<VulnerabilityRecord>(file_path)?;
    VulnerabilityTable::from_records(records).with_context(|| input_err_msg(file_path))
}

/// Write a vulnerability table to a CSV file in the same format as it is read
pub fn write_vulnerability_table(file_path: &Path, table: &VulnerabilityTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(file_path)?;
    for record in table.to_records() {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}
