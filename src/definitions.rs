//! Names of the attribute fields read from hazard layers and written to impact layers.
use serde::Deserialize;

/// Field names used by the impact pipeline.
///
/// Loaded once per run and passed to each stage of the pipeline. Every field is read
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Definitions {
    /// Flag marking a hazard feature as affected (`1` or `true`)
    pub affected: String,
    /// String attribute marking a hazard feature as flood-prone (`"yes"`)
    pub flood_prone: String,
    /// Flag marking an exposure feature as lying within a hazard polygon
    pub in_polygon: String,
    /// Hazard category code (`A1`..`C3`)
    pub category: String,
    /// Label given to each buffered hazard ring
    pub hazard_value: String,
    /// Output field for the hazard category of each exposure feature
    pub hazard_class: String,
    /// Output field for the building type of each exposure feature
    pub exposure_class: String,
}

impl Default for Definitions {
    fn default() -> Self {
        Self {
            affected: "affected".into(),
            flood_prone: "FLOODPRONE".into(),
            in_polygon: "inapolygon".into(),
            category: "CATEGORY".into(),
            hazard_value: "haz_value".into(),
            hazard_class: "haz_class".into(),
            exposure_class: "exp_class".into(),
        }
    }
}
