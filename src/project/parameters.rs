//! Defines the `ProjectParameters` struct, which represents the contents of `project.toml`.
use crate::buffer::{BufferRadius, DEFAULT_SEGMENTS_PER_QUARTER, check_radii, check_segments};
use crate::category::CategoryCode;
use crate::classify::{DEFAULT_ALIASES, DEFAULT_CANDIDATE_KEYS};
use crate::definitions::Definitions;
use crate::hazard::DEFAULT_DEPTH_THRESHOLD;
use crate::id::get_id_by_str;
use crate::impact::{HazardKind, IMPACT_FUNCTIONS};
use crate::input::{input_err_msg, read_toml};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use log::warn;
use serde::Deserialize;
use std::path::Path;

/// The name of the project parameters file
pub const PROJECT_FILE_NAME: &str = "project.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_hazard_kind, HazardKind, HazardKind::Polygon);
define_param_default!(default_exposure_file, String, "exposure.geojson".into());
define_param_default!(
    default_vulnerability_file,
    String,
    IMPACT_FUNCTIONS[0].vulnerability_file.into()
);
define_param_default!(default_depth_threshold, f64, DEFAULT_DEPTH_THRESHOLD);
define_param_default!(default_segments_per_quarter, u32, DEFAULT_SEGMENTS_PER_QUARTER);
define_param_default!(
    default_candidate_keys,
    Vec<String>,
    DEFAULT_CANDIDATE_KEYS.iter().map(ToString::to_string).collect()
);
define_param_default!(
    default_aliases,
    IndexMap<String, String>,
    DEFAULT_ALIASES
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
);

/// Represents the contents of the entire project file.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ProjectParameters {
    /// File containing hazard data, relative to the project directory.
    ///
    /// Not needed for interpolated hazards.
    pub hazard_file: Option<String>,
    /// How the hazard is represented
    #[serde(default = "default_hazard_kind")]
    pub hazard_kind: HazardKind,
    /// File containing exposure features, relative to the project directory
    #[serde(default = "default_exposure_file")]
    pub exposure_file: String,
    /// Vulnerability table, relative to the project directory
    #[serde(default = "default_vulnerability_file")]
    pub vulnerability_file: String,
    /// Depth at or above which a raster cell counts as flooded, in metres
    #[serde(default = "default_depth_threshold")]
    pub depth_threshold: f64,
    /// Category given to features flooded according to a raster hazard
    #[serde(default)]
    pub raster_category: Option<CategoryCode>,
    /// CRS of a raster hazard (e.g. `"EPSG:32748"`). Defaults to the CRS of the exposure layer.
    #[serde(default)]
    pub raster_crs: Option<String>,
    /// Number of segments used to approximate a quarter circle when buffering
    #[serde(default = "default_segments_per_quarter")]
    pub segments_per_quarter: u32,
    /// Radii and labels of buffered hazard rings, in increasing order
    #[serde(default)]
    pub buffer_radii: Vec<BufferRadius>,
    /// Category for each buffer ring label
    #[serde(default)]
    pub buffer_category: IndexMap<String, CategoryCode>,
    /// Attributes used to classify exposure features, in priority order
    #[serde(default = "default_candidate_keys")]
    pub candidate_keys: Vec<String>,
    /// Usage values mapped onto building types
    #[serde(default = "default_aliases")]
    pub aliases: IndexMap<String, String>,
    /// Names of the fields read and written
    #[serde(default)]
    pub definitions: Definitions,
}

impl Default for ProjectParameters {
    fn default() -> Self {
        Self {
            hazard_file: None,
            hazard_kind: default_hazard_kind(),
            exposure_file: default_exposure_file(),
            vulnerability_file: default_vulnerability_file(),
            depth_threshold: default_depth_threshold(),
            raster_category: None,
            raster_crs: None,
            segments_per_quarter: default_segments_per_quarter(),
            buffer_radii: Vec::new(),
            buffer_category: IndexMap::new(),
            candidate_keys: default_candidate_keys(),
            aliases: default_aliases(),
            definitions: Definitions::default(),
        }
    }
}

/// Check that the `depth_threshold` parameter is valid
fn check_depth_threshold(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value > 0.0,
        "depth_threshold must be a finite number greater than zero"
    );

    Ok(())
}

/// Check that every label in `buffer_category` names a buffer ring
fn check_buffer_category(
    radii: &[BufferRadius],
    categories: &IndexMap<String, CategoryCode>,
) -> Result<()> {
    let labels: IndexSet<String> = radii.iter().map(|radius| radius.label.clone()).collect();
    for label in categories.keys() {
        get_id_by_str(&labels, label)
            .with_context(|| format!("Invalid label in buffer_category: {label}"))?;
    }

    Ok(())
}

impl ProjectParameters {
    /// Read a project file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `project_dir` - Folder containing project files
    ///
    /// # Returns
    ///
    /// The project file contents as a [`ProjectParameters`] struct or an error if the file is
    /// invalid
    pub fn from_path<P: AsRef<Path>>(project_dir: P) -> Result<ProjectParameters> {
        let file_path = project_dir.as_ref().join(PROJECT_FILE_NAME);
        let parameters: ProjectParameters = read_toml(&file_path)?;

        parameters
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(parameters)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        // hazard_file
        ensure!(
            self.hazard_file.is_some() || self.hazard_kind == HazardKind::Interpolated,
            "hazard_file must be given unless hazard_kind is \"interpolated\""
        );

        // depth_threshold
        check_depth_threshold(self.depth_threshold)?;

        // segments_per_quarter
        check_segments(self.segments_per_quarter)?;

        // buffer_radii and buffer_category
        if self.hazard_kind == HazardKind::Buffer {
            check_radii(&self.buffer_radii)?;
            check_buffer_category(&self.buffer_radii, &self.buffer_category)?;
        } else if !self.buffer_radii.is_empty() {
            warn!("buffer_radii is ignored unless hazard_kind is \"buffer\"");
        }

        if self.raster_category.is_some() && self.hazard_kind != HazardKind::Raster {
            warn!("raster_category is ignored unless hazard_kind is \"raster\"");
        }

        // candidate_keys
        ensure!(!self.candidate_keys.is_empty(), "candidate_keys is empty");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_project_file(dir: &Path, contents: &str) {
        let mut file = File::create(dir.join(PROJECT_FILE_NAME)).unwrap();
        writeln!(file, "{contents}").unwrap();
    }

    #[test]
    fn test_project_params_from_path_defaults() {
        let dir = tempdir().unwrap();
        write_project_file(dir.path(), "hazard_file = \"hazard.geojson\"");

        let parameters = ProjectParameters::from_path(dir.path()).unwrap();
        assert_eq!(
            parameters,
            ProjectParameters {
                hazard_file: Some("hazard.geojson".into()),
                ..ProjectParameters::default()
            }
        );
        assert_eq!(parameters.vulnerability_file, "vulnerability.csv");
        assert_eq!(parameters.candidate_keys[0], "type");
        assert_eq!(parameters.aliases["supermarket"], "commercial");
    }

    #[test]
    fn test_project_params_from_path_buffer() {
        let dir = tempdir().unwrap();
        write_project_file(
            dir.path(),
            r#"
hazard_file = "volcano.geojson"
hazard_kind = "buffer"
segments_per_quarter = 16
buffer_radii = [
    {radius = 3000.0, label = "High"},
    {radius = 5000.0, label = "Medium"},
]

[buffer_category]
High = "C3"
Medium = "B2"

[definitions]
category = "KATEGORI"
"#,
        );

        let parameters = ProjectParameters::from_path(dir.path()).unwrap();
        assert_eq!(parameters.hazard_kind, HazardKind::Buffer);
        assert_eq!(parameters.segments_per_quarter, 16);
        assert_eq!(parameters.buffer_radii[1], BufferRadius::new(5000.0, "Medium"));
        assert_eq!(parameters.buffer_category["High"], CategoryCode::C3);
        assert_eq!(parameters.definitions.category, "KATEGORI");
        assert_eq!(parameters.definitions.affected, "affected");
    }

    #[test]
    fn test_project_params_interpolated_no_hazard_file() {
        let dir = tempdir().unwrap();
        write_project_file(dir.path(), "hazard_kind = \"interpolated\"");
        assert!(ProjectParameters::from_path(dir.path()).is_ok());
    }

    #[test]
    fn test_project_params_missing_hazard_file() {
        let parameters = ProjectParameters::default();
        assert_error!(
            parameters.validate(),
            "hazard_file must be given unless hazard_kind is \"interpolated\""
        );
    }

    #[rstest]
    #[case(1.0, true)]
    #[case(0.01, true)]
    #[case(0.0, false)]
    #[case(-1.0, false)]
    #[case(f64::INFINITY, false)]
    #[case(f64::NAN, false)]
    fn test_check_depth_threshold(#[case] value: f64, #[case] expected_valid: bool) {
        assert_eq!(check_depth_threshold(value).is_ok(), expected_valid);
    }

    #[test]
    fn test_buffer_params_invalid_radii() {
        let parameters = ProjectParameters {
            hazard_file: Some("volcano.geojson".into()),
            hazard_kind: HazardKind::Buffer,
            buffer_radii: vec![BufferRadius::new(5.0, "a"), BufferRadius::new(5.0, "b")],
            ..ProjectParameters::default()
        };
        assert!(parameters.validate().is_err());
    }

    #[test]
    fn test_buffer_params_unknown_label() {
        let parameters = ProjectParameters {
            hazard_file: Some("volcano.geojson".into()),
            hazard_kind: HazardKind::Buffer,
            buffer_radii: vec![BufferRadius::new(5.0, "High")],
            buffer_category: [("Extreme".to_string(), CategoryCode::C3)]
                .into_iter()
                .collect(),
            ..ProjectParameters::default()
        };
        assert_error!(
            parameters.validate(),
            "Invalid label in buffer_category: Extreme"
        );
    }

    #[test]
    fn test_segments_too_low() {
        let parameters = ProjectParameters {
            hazard_file: Some("hazard.geojson".into()),
            segments_per_quarter: 4,
            ..ProjectParameters::default()
        };
        assert!(parameters.validate().is_err());
    }
}
