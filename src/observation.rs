//! Merging flood observations (DIM records) onto a layer of administrative units.
//!
//! Each observation records the flood depth seen in a unit at one point in time. Observations
//! are grouped by unit and depth band, with the number of observations in a group taken as the
//! flood duration. The resulting layer can be used directly as a polygon hazard.
use crate::category::{Band, CategoryCode};
use crate::definitions::Definitions;
use crate::feature::{AttributeValue, Feature, FeatureSource, Layer};
use anyhow::Result;
use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;

/// Attribute identifying the administrative unit of an observation
pub const UNIT_FIELD: &str = "ID_RWKEL";

/// Deepest flood counted as shallow, in centimetres
const SHALLOW_DEPTH_CM: u32 = 70;

/// Deepest flood counted as medium depth, in centimetres
const MEDIUM_DEPTH_CM: u32 = 150;

/// Longest flood counted as medium duration, in observations
const MEDIUM_DURATION: usize = 6;

/// A single flood observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Observation {
    /// The administrative unit
    #[serde(rename = "ID_RWKEL")]
    pub unit: i64,
    /// Flood depth in centimetres
    #[serde(rename = "KETINGGIAN")]
    pub depth_cm: u32,
}

/// The depth band for a depth in centimetres
pub fn depth_band(depth_cm: u32) -> Band {
    if depth_cm <= SHALLOW_DEPTH_CM {
        Band::Low
    } else if depth_cm <= MEDIUM_DEPTH_CM {
        Band::Medium
    } else {
        Band::High
    }
}

/// The duration band for a number of observations
pub fn duration_band(duration: usize) -> Band {
    if duration < 2 {
        Band::Low
    } else if duration <= MEDIUM_DURATION {
        Band::Medium
    } else {
        Band::High
    }
}

/// Get the worst category observed in each unit, in order of first observation
pub fn categorise<I>(observations: I) -> IndexMap<i64, CategoryCode>
where
    I: IntoIterator<Item = Observation>,
{
    let mut durations: IndexMap<(i64, Band), usize> = IndexMap::new();
    for observation in observations {
        *durations
            .entry((observation.unit, depth_band(observation.depth_cm)))
            .or_default() += 1;
    }

    let mut categories: IndexMap<i64, CategoryCode> = IndexMap::new();
    for ((unit, depth), duration) in durations {
        let duration = duration_band(duration);
        if duration == Band::High {
            warn!("Unit {unit} was flooded for more than {MEDIUM_DURATION} observations");
        }

        let code = CategoryCode::from_bands(depth, duration);
        categories
            .entry(unit)
            .and_modify(|worst| *worst = worst.worst(code))
            .or_insert(code);
    }

    categories
}

/// Join unit categories onto a layer by its [`UNIT_FIELD`] attribute.
///
/// Matched features are marked as affected and given the unit's category. All other features
/// are marked as unaffected.
pub fn merge_observations(
    layer: &Layer,
    categories: &IndexMap<i64, CategoryCode>,
    definitions: &Definitions,
) -> Result<Layer> {
    let mut fields = layer.fields().clone();
    fields.insert(definitions.affected.clone());
    fields.insert(definitions.category.clone());
    let name = format!("{} with flood category", layer.name);
    let mut merged = Layer::new(&name, *layer.crs(), fields);

    let mut unmatched = 0;
    for feature in layer.features() {
        let category = feature
            .attributes
            .get(UNIT_FIELD)
            .and_then(AttributeValue::as_int)
            .and_then(|unit| categories.get(&unit));

        let mut attributes = feature.attributes.clone();
        let (affected, category) = match category {
            Some(code) => (1, AttributeValue::String(code.to_string())),
            None => {
                unmatched += 1;
                (0, AttributeValue::Null)
            }
        };
        attributes.insert(definitions.affected.as_str(), AttributeValue::Int(affected));
        attributes.insert(definitions.category.as_str(), category);

        merged.add_feature(Feature::new(
            feature.id.clone(),
            feature.geometry.clone(),
            attributes,
        ))?;
    }

    if unmatched > 0 {
        warn!(
            "{unmatched} of {} features in '{}' have no flood observations",
            layer.feature_count(),
            layer.name
        );
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::Crs;
    use crate::fixture::square;
    use crate::hazard::PolygonHazard;
    use rstest::rstest;

    fn observation(unit: i64, depth_cm: u32) -> Observation {
        Observation { unit, depth_cm }
    }

    #[rstest]
    #[case(0, Band::Low)]
    #[case(70, Band::Low)]
    #[case(71, Band::Medium)]
    #[case(150, Band::Medium)]
    #[case(151, Band::High)]
    fn test_depth_band(#[case] depth_cm: u32, #[case] expected: Band) {
        assert_eq!(depth_band(depth_cm), expected);
    }

    #[rstest]
    #[case(1, Band::Low)]
    #[case(2, Band::Medium)]
    #[case(6, Band::Medium)]
    #[case(7, Band::High)]
    fn test_duration_band(#[case] duration: usize, #[case] expected: Band) {
        assert_eq!(duration_band(duration), expected);
    }

    #[test]
    fn test_categorise() {
        let observations = [
            // Unit 1: shallow for three observations (B1) and deep once (A3)
            observation(1, 50),
            observation(1, 60),
            observation(1, 10),
            observation(1, 200),
            // Unit 2: medium depth for seven observations
            observation(2, 100),
            observation(2, 100),
            observation(2, 100),
            observation(2, 100),
            observation(2, 100),
            observation(2, 100),
            observation(2, 100),
            // Unit 3: a single shallow observation
            observation(3, 5),
        ];

        let categories = categorise(observations);
        assert_eq!(
            categories.into_iter().collect::<Vec<_>>(),
            [(1, CategoryCode::A3), (2, CategoryCode::C2), (3, CategoryCode::A1)]
        );
    }

    #[test]
    fn test_merge_observations() {
        let features = [1i64, 2]
            .into_iter()
            .map(|unit| {
                Feature::new(
                    unit.to_string(),
                    square((unit as f64 * 10.0, 0.0), 10.0).into(),
                    [(UNIT_FIELD, AttributeValue::Int(unit))].into_iter().collect(),
                )
            })
            .collect();
        let layer = Layer::from_features("rw", Crs::Wgs84, features);
        let categories = [(1, CategoryCode::B2)].into_iter().collect();
        let definitions = Definitions::default();

        let merged = merge_observations(&layer, &categories, &definitions).unwrap();
        assert_eq!(merged.name, "rw with flood category");
        assert_eq!(
            merged.fields().iter().collect::<Vec<_>>(),
            [UNIT_FIELD, "affected", "CATEGORY"]
        );

        let first = &merged.features()[0].attributes;
        assert_eq!(first.get("affected"), Some(&AttributeValue::Int(1)));
        assert_eq!(first.get("CATEGORY"), Some(&"B2".into()));
        let second = &merged.features()[1].attributes;
        assert_eq!(second.get("affected"), Some(&AttributeValue::Int(0)));
        assert_eq!(second.get("CATEGORY"), Some(&AttributeValue::Null));

        let hazard = PolygonHazard::from_layer(&merged, &definitions).unwrap();
        assert_eq!(hazard.len(), 2);
    }
}
