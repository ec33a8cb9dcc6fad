//! The module responsible for writing output data to disk.
use crate::aggregate::{Report, ReportRow};
use crate::feature::Layer;
use crate::impact::ImpactResult;
use crate::input::layer::write_layer;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which project-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "riskmap_results";

/// The output file name for the loss report
const REPORT_FILE_NAME: &str = "report.csv";

/// The output file name for the impact layer
const IMPACT_LAYER_FILE_NAME: &str = "impact.geojson";

/// The output file name for buffered hazard rings
const HAZARD_RINGS_FILE_NAME: &str = "hazard_rings.geojson";

/// Get the output folder for the project in the specified directory
pub fn get_output_dir(project_dir: &Path) -> Result<PathBuf> {
    // canonicalise in case the user has specified "."
    let project_dir = project_dir
        .canonicalize()
        .context("Could not resolve path to project")?;

    let project_name = project_dir
        .file_name()
        .context("Project cannot be in root folder")?
        .to_str()
        .context("Invalid chars in project dir name")?;

    Ok([OUTPUT_DIRECTORY_ROOT, project_name].iter().collect())
}

/// Create a new output directory.
///
/// A non-empty directory which already exists is an error unless `allow_overwrite` is set.
///
/// # Returns
///
/// Whether existing files in the folder will be overwritten.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        let is_empty = output_dir.read_dir()?.next().is_none();
        if is_empty {
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Use --overwrite or set overwrite \
            in settings.toml to overwrite it."
        );

        return Ok(true);
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(false)
}

/// Represents a row in the report CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ReportCsvRow {
    building_type: String,
    count_affected: usize,
    estimated_loss: f64,
    total_count: usize,
    total_value: f64,
    percentage_of_loss: f64,
}

impl ReportCsvRow {
    fn new(building_type: &str, row: &ReportRow) -> Self {
        Self {
            building_type: building_type.to_string(),
            count_affected: row.count_affected,
            estimated_loss: row.estimated_loss.value(),
            total_count: row.total_count,
            total_value: row.total_value.value(),
            percentage_of_loss: row.percentage_of_loss,
        }
    }
}

/// Write a loss report to a CSV file, with the roll-up row first
pub fn write_report(output_path: &Path, report: &Report) -> Result<()> {
    let file_path = output_path.join(REPORT_FILE_NAME);
    let mut writer = csv::Writer::from_path(&file_path)
        .with_context(|| format!("Failed to create {}", file_path.display()))?;
    for (building_type, row) in report.iter() {
        writer.serialize(ReportCsvRow::new(building_type, row))?;
    }
    writer.flush()?;

    Ok(())
}

/// Write the results of an impact assessment to the output folder
///
/// # Arguments
///
/// * `output_path` - Folder where files will be saved
/// * `result` - The result of the impact function
/// * `hazard_rings` - Buffered hazard rings, if the hazard was buffered
pub fn write_results(
    output_path: &Path,
    result: &ImpactResult,
    hazard_rings: Option<&Layer>,
) -> Result<()> {
    write_report(output_path, &result.report)?;
    write_layer(&output_path.join(IMPACT_LAYER_FILE_NAME), &result.impact_layer)?;
    if let Some(rings) = hazard_rings {
        write_layer(&output_path.join(HAZARD_RINGS_FILE_NAME), rings)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{ALL_LABEL, aggregate};
    use crate::category::CategoryCode;
    use crate::fixture::vulnerability_table;
    use crate::join::EnrichedRecord;
    use crate::vulnerability::VulnerabilityTable;
    use itertools::Itertools;
    use rstest::rstest;
    use tempfile::tempdir;

    #[test]
    fn test_create_output_directory_new() {
        let dir = tempdir().unwrap();
        let output_dir = dir.path().join("results").join("flood");
        assert!(!create_output_directory(&output_dir, false).unwrap());
        assert!(output_dir.is_dir());
    }

    #[test]
    fn test_create_output_directory_existing_empty() {
        let dir = tempdir().unwrap();
        assert!(!create_output_directory(dir.path(), false).unwrap());
    }

    #[test]
    fn test_create_output_directory_not_empty() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(REPORT_FILE_NAME), "").unwrap();
        assert!(create_output_directory(dir.path(), false).is_err());
        assert!(create_output_directory(dir.path(), true).unwrap());
    }

    #[rstest]
    fn test_write_report(vulnerability_table: VulnerabilityTable) {
        let records = [EnrichedRecord {
            feature_id: "1".into(),
            affected: true,
            category: Some(CategoryCode::B2),
            building_type: "school".into(),
        }];
        let report = aggregate(&records, &vulnerability_table).unwrap();

        let dir = tempdir().unwrap();
        write_report(dir.path(), &report).unwrap();

        let rows: Vec<ReportCsvRow> = csv::Reader::from_path(dir.path().join(REPORT_FILE_NAME))
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap();
        assert_eq!(
            rows.iter().map(|row| row.building_type.as_str()).collect_vec(),
            [ALL_LABEL, "place_of_worship", "residential", "school"]
        );
        assert_eq!(rows[0].estimated_loss, 200.0);
        assert_eq!(rows[3].count_affected, 1);
    }
}
