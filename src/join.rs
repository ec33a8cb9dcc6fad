//! Joining hazard observations and building types onto exposure features.
use crate::category::CategoryCode;
use crate::classify::{Classifier, Vocabulary};
use crate::definitions::Definitions;
use crate::error::{ImpactError, Stage};
use crate::feature::{AttributeValue, Feature, FeatureID, FeatureSource, Layer, Progress};
use crate::hazard::HazardReader;
use crate::vulnerability::BuildingType;

/// Determines the building type of exposure features
pub trait ExposureReader {
    /// Classify a single feature
    fn classify(&self, feature: &Feature) -> BuildingType;
}

/// Exposure made of structures, classified from their usage attributes
#[derive(Debug, Clone)]
pub struct StructureExposure {
    classifier: Classifier,
    vocabulary: Vocabulary,
}

impl StructureExposure {
    /// Create a new exposure reader
    pub fn new(classifier: Classifier, vocabulary: Vocabulary) -> Self {
        Self {
            classifier,
            vocabulary,
        }
    }
}

impl ExposureReader for StructureExposure {
    fn classify(&self, feature: &Feature) -> BuildingType {
        self.classifier
            .classify(&feature.attributes, &self.vocabulary)
    }
}

/// An exposure feature tagged with its hazard and building type
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    /// The exposure feature
    pub feature_id: FeatureID,
    /// Whether the feature is affected by the hazard
    pub affected: bool,
    /// The hazard category. Only ever present for affected features.
    pub category: Option<CategoryCode>,
    /// The feature's building type
    pub building_type: BuildingType,
}

/// Check that the hazard and exposure share a CRS
fn check_crs(hazard: &dyn HazardReader, exposure: &Layer) -> Result<(), ImpactError> {
    match hazard.crs() {
        Some(crs) if crs != exposure.crs() => Err(ImpactError::Config(format!(
            "Hazard CRS ({crs}) does not match exposure CRS ({})",
            exposure.crs()
        ))),
        _ => Ok(()),
    }
}

/// Tag every feature of an exposure layer with its hazard observation and building type.
///
/// # Arguments
///
/// * `hazard` - Source of hazard observations
/// * `exposure` - Classifier for exposure features
/// * `layer` - The exposure features
/// * `progress` - Called after each feature is processed
pub fn join(
    hazard: &dyn HazardReader,
    exposure: &dyn ExposureReader,
    layer: &Layer,
    mut progress: Option<Progress>,
) -> Result<Vec<EnrichedRecord>, ImpactError> {
    check_crs(hazard, layer)?;

    let total = layer.feature_count();
    let mut records = Vec::with_capacity(total);
    for (i, feature) in layer.features().iter().enumerate() {
        let observation = hazard.observe(feature)?;
        records.push(EnrichedRecord {
            feature_id: feature.id.clone(),
            affected: observation.affected,
            category: observation.category.filter(|_| observation.affected),
            building_type: exposure.classify(feature),
        });

        if let Some(progress) = progress.as_mut() {
            progress(i, total, Stage::Join);
        }
    }

    Ok(records)
}

/// Create the impact layer: the exposure features with affected flag, category and building
/// type attached.
///
/// `records` must be in the same order as the layer's features, as returned by [`join`].
pub fn enrich_layer(
    layer: &Layer,
    records: &[EnrichedRecord],
    definitions: &Definitions,
) -> Result<Layer, ImpactError> {
    let fields = layer.fields().iter().map(String::as_str).chain([
        definitions.affected.as_str(),
        definitions.hazard_class.as_str(),
        definitions.exposure_class.as_str(),
    ]);
    let mut enriched = Layer::new("impact", *layer.crs(), fields);

    for (feature, record) in layer.features().iter().zip(records) {
        if feature.id != record.feature_id {
            return Err(ImpactError::geometry(
                &feature.id,
                Stage::Join,
                format!("Record is for a different feature ({})", record.feature_id),
            ));
        }

        let mut attributes = feature.attributes.clone();
        attributes.insert(
            definitions.affected.as_str(),
            AttributeValue::Int(i64::from(record.affected)),
        );
        attributes.insert(
            definitions.hazard_class.as_str(),
            record
                .category
                .map_or(AttributeValue::Null, |code| code.to_string().into()),
        );
        attributes.insert(
            definitions.exposure_class.as_str(),
            record.building_type.to_string().into(),
        );

        enriched
            .add_feature(Feature::new(
                feature.id.clone(),
                feature.geometry.clone(),
                attributes,
            ))
            .map_err(|err| ImpactError::Config(err.to_string()))?;
    }

    Ok(enriched)
}
