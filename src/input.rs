//! Common routines for handling input data.
use crate::crs::Crs;
use crate::feature::{FeatureSource, Layer};
use crate::id::get_id_by_str;
use crate::impact::{HazardData, HazardKind};
use crate::project::Project;
use crate::project::parameters::ProjectParameters;
use crate::vulnerability::BuildingType;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use itertools::Itertools;
use log::{info, warn};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

pub mod layer;
use layer::{read_depth_grid, read_layer};
pub mod observation;
pub mod vulnerability;
use vulnerability::read_vulnerability_table;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    ensure!(!vec.is_empty(), "CSV file {} cannot be empty", file_path.display());

    Ok(vec.into_iter())
}

fn read_csv_internal<'a, T: DeserializeOwned + 'a>(file_path: &'a Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
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

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Resolve a path given in the project file relative to the project directory
fn project_file(project_dir: &Path, file_name: &str) -> PathBuf {
    project_dir.join(file_name)
}

/// Warn about aliases whose target is not a building type in the vulnerability table
fn check_alias_targets<'a, I>(aliases: I, building_types: &IndexSet<BuildingType>)
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    for (from, to) in aliases {
        if get_id_by_str(building_types, BuildingType::normalised(to).as_str()).is_err() {
            warn!("Alias '{from}' refers to '{to}', which is not in the vulnerability table");
        }
    }
}

/// Read the hazard data for a project
fn read_hazard(
    project_dir: &Path,
    parameters: &ProjectParameters,
    exposure: &Layer,
) -> Result<HazardData> {
    let Some(hazard_file) = parameters.hazard_file.as_deref() else {
        ensure!(
            parameters.hazard_kind == HazardKind::Interpolated,
            "No hazard file given"
        );
        return Ok(HazardData::Interpolated);
    };

    let file_path = project_file(project_dir, hazard_file);
    let hazard = match parameters.hazard_kind {
        HazardKind::Polygon => HazardData::Polygons(read_layer(&file_path)?),
        HazardKind::Buffer => HazardData::Buffer(read_layer(&file_path)?),
        HazardKind::Raster => {
            let crs = match parameters.raster_crs.as_deref() {
                Some(crs) => crs
                    .parse::<Crs>()
                    .with_context(|| format!("Invalid raster_crs: {crs}"))?,
                None => *exposure.crs(),
            };
            HazardData::Raster {
                grid: read_depth_grid(&file_path)?,
                crs,
            }
        }
        HazardKind::Interpolated => {
            warn!("hazard_file is ignored for interpolated hazards");
            HazardData::Interpolated
        }
    };

    Ok(hazard)
}

/// Read a project from the specified directory.
///
/// # Arguments
///
/// * `project_dir` - Folder containing project files
///
/// # Returns
///
/// The loaded [`Project`] or an error if any input is invalid.
pub fn load_project<P: AsRef<Path>>(project_dir: P) -> Result<Project> {
    let project_dir = project_dir.as_ref();
    let parameters = ProjectParameters::from_path(project_dir)?;

    // The table is loaded first, so that configuration errors are reported before any features
    // are read
    let vulnerability =
        read_vulnerability_table(&project_file(project_dir, &parameters.vulnerability_file))?;
    let building_types: IndexSet<BuildingType> =
        vulnerability.building_types().cloned().collect();
    check_alias_targets(&parameters.aliases, &building_types);
    if !building_types.contains(BuildingType::other().as_str()) {
        warn!(
            "The vulnerability table has no entry for '{}'; unclassified features will cause an \
            error",
            BuildingType::other()
        );
    }

    let exposure = read_layer(&project_file(project_dir, &parameters.exposure_file))?;
    let hazard = read_hazard(project_dir, &parameters, &exposure)?;
    info!(
        "Loaded {} exposure features and {} building types",
        exposure.feature_count(),
        vulnerability.len()
    );

    Ok(Project {
        parameters,
        hazard,
        exposure,
        vulnerability,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    /// Create an example CSV file in dir_path
    fn create_csv_file(dir_path: &Path, contents: &str) -> PathBuf {
        let file_path = dir_path.join("test.csv");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{contents}").unwrap();
        file_path
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = create_csv_file(dir.path(), "id,value\nhello,1\n world , 2\n");
        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            &[
                Record {
                    id: "hello".to_string(),
                    value: 1,
                },
                Record {
                    id: "world".to_string(),
                    value: 2,
                }
            ]
        );

        // File with no data rows
        let file_path = create_csv_file(dir.path(), "id,value\n");
        assert!(read_csv::<Record>(&file_path).is_err());
    }

    #[test]
    fn test_read_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id = \"hello\"\nvalue = 1").unwrap();
        }

        assert_eq!(
            read_toml::<Record>(&file_path).unwrap(),
            Record {
                id: "hello".to_string(),
                value: 1,
            }
        );

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "bad toml syntax").unwrap();
        }

        assert!(read_toml::<Record>(&file_path).is_err());
    }

    #[test]
    fn test_input_err_msg() {
        assert_eq!(
            input_err_msg(Path::new("model/hazard.geojson")),
            "Error reading model/hazard.geojson"
        );
    }
}
