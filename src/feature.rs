//! Features and layers: geometries with typed attributes in a stated coordinate reference system.
use crate::crs::Crs;
use crate::error::Stage;
use crate::id::define_id_type;
use anyhow::{Result, ensure};
use geo::Geometry;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use unicase::UniCase;

define_id_type! {FeatureID}

/// A callback invoked after each feature is processed with `(current, total, stage)`
pub type Progress<'a> = &'a mut dyn FnMut(usize, usize, Stage);

/// A typed attribute value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttributeValue {
    /// No value
    #[default]
    Null,
    /// A boolean
    Bool(bool),
    /// An integer
    Int(i64),
    /// A floating-point number
    Double(f64),
    /// A string
    String(String),
}

impl AttributeValue {
    /// Whether the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the value is null, zero, false or a blank string.
    ///
    /// Such values carry no information about a feature's usage.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::Double(d) => *d == 0.0,
            Self::String(s) => {
                let s = s.trim();
                s.is_empty() || s == "0"
            }
        }
    }

    /// Interpret the value as a boolean flag.
    ///
    /// Integers are true when equal to 1. Strings are accepted if they spell out a boolean
    /// (`true`/`false`, `yes`/`no`, `1`/`0`). Anything else yields `None`.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(i) => Some(*i == 1),
            Self::Double(d) => Some(*d == 1.0),
            Self::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            Self::Null => None,
        }
    }

    /// Get the value as a string slice, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer, if it holds a whole number
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Double(d) if d.fract() == 0.0 => Some(*d as i64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// The attributes of a feature, in field order.
///
/// Lookups fall back to a case-insensitive match so that `type` and `TYPE` refer to the same
/// attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes(IndexMap<String, AttributeValue>);

impl Attributes {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value for `key`, matching the key case-insensitively.
    ///
    /// An exact match is preferred, but a null value under one spelling of the key gives way to
    /// a non-null value under another (e.g. `type` is null and `TYPE` is not).
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        let exact = self.0.get(key);
        if exact.is_some_and(|value| !value.is_null()) {
            return exact;
        }

        let key = UniCase::new(key);
        self.0
            .iter()
            .filter(|(k, _)| UniCase::new(k.as_str()) == key)
            .map(|(_, v)| v)
            .find(|v| !v.is_null())
            .or(exact)
            .or_else(|| {
                self.0
                    .iter()
                    .find(|(k, _)| UniCase::new(k.as_str()) == key)
                    .map(|(_, v)| v)
            })
    }

    /// Get the value for `key`, treating null values as absent
    pub fn get_non_null(&self, key: &str) -> Option<&AttributeValue> {
        self.get(key).filter(|value| !value.is_null())
    }

    /// Set the value for `key`, returning the previous value if there was one
    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) -> Option<AttributeValue> {
        self.0.insert(key.into(), value)
    }

    /// Iterate over attributes in field order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate over the attribute names in field order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no attributes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, AttributeValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// An exposure or hazard record
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Identity of the feature, stable across the pipeline
    pub id: FeatureID,
    /// The feature's geometry, in the CRS of its layer
    pub geometry: Geometry<f64>,
    /// The feature's attributes
    pub attributes: Attributes,
}

impl Feature {
    /// Create a new feature
    pub fn new(id: impl Into<FeatureID>, geometry: Geometry<f64>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            geometry,
            attributes,
        }
    }

    /// The feature's geometry
    pub fn geometry(&self) -> &Geometry<f64> {
        &self.geometry
    }

    /// The feature's attributes
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

/// Read access to a collection of features sharing a CRS
pub trait FeatureSource {
    /// The coordinate reference system of the features
    fn crs(&self) -> &Crs;

    /// The features in the collection
    fn features(&self) -> &[Feature];

    /// The number of features in the collection
    fn feature_count(&self) -> usize {
        self.features().len()
    }
}

/// An in-memory layer of features with a fixed attribute schema
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// A human-readable name for the layer
    pub name: String,
    crs: Crs,
    fields: IndexSet<String>,
    features: Vec<Feature>,
}

impl Layer {
    /// Create an empty layer with the given schema
    pub fn new<I, S>(name: &str, crs: Crs, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            crs,
            fields: fields.into_iter().map(Into::into).collect(),
            features: Vec::new(),
        }
    }

    /// Create a layer from existing features, deriving the schema from their attributes
    pub fn from_features(name: &str, crs: Crs, features: Vec<Feature>) -> Self {
        let fields = features
            .iter()
            .flat_map(|feature| feature.attributes.keys())
            .map(str::to_string)
            .collect();

        Self {
            name: name.to_string(),
            crs,
            fields,
            features,
        }
    }

    /// The names of the layer's fields
    pub fn fields(&self) -> &IndexSet<String> {
        &self.fields
    }

    /// Add a feature to the layer.
    ///
    /// The feature's attributes are rearranged into the layer's field order, with missing
    /// fields set to null. Attributes which are not part of the schema are an error.
    pub fn add_feature(&mut self, mut feature: Feature) -> Result<()> {
        for key in feature.attributes.keys() {
            ensure!(
                self.fields.contains(key),
                "Attribute '{key}' of feature {} is not a field of layer '{}'",
                feature.id,
                self.name
            );
        }

        feature.attributes = self
            .fields
            .iter()
            .map(|field| {
                let value = feature.attributes.0.get(field).cloned().unwrap_or_default();
                (field.clone(), value)
            })
            .collect();
        self.features.push(feature);

        Ok(())
    }
}

impl FeatureSource for Layer {
    fn crs(&self) -> &Crs {
        &self.crs
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;
    use rstest::rstest;

    #[test]
    fn test_attributes_get_case_insensitive() {
        let attributes: Attributes = [("TYPE", "school".into())].into_iter().collect();
        assert_eq!(attributes.get("type"), Some(&"school".into()));
        assert_eq!(attributes.get("Type"), Some(&"school".into()));
        assert_eq!(attributes.get("amenity"), None);
    }

    #[test]
    fn test_attributes_get_prefers_exact() {
        let attributes: Attributes = [("TYPE", "upper".into()), ("type", "lower".into())]
            .into_iter()
            .collect();
        assert_eq!(attributes.get("type"), Some(&"lower".into()));
        assert_eq!(attributes.get("TYPE"), Some(&"upper".into()));
    }

    #[test]
    fn test_attributes_get_skips_null_spelling() {
        let attributes: Attributes = [
            ("type", AttributeValue::Null),
            ("TYPE", "school".into()),
            ("amenity", AttributeValue::Null),
        ]
        .into_iter()
        .collect();
        assert_eq!(attributes.get("type"), Some(&"school".into()));
        assert_eq!(attributes.get("Type"), Some(&"school".into()));
        assert_eq!(attributes.get("AMENITY"), Some(&AttributeValue::Null));
        assert_eq!(attributes.get_non_null("amenity"), None);
    }

    #[rstest]
    #[case(AttributeValue::Int(1), Some(true))]
    #[case(AttributeValue::Int(0), Some(false))]
    #[case(AttributeValue::Bool(true), Some(true))]
    #[case(AttributeValue::String("True".into()), Some(true))]
    #[case(AttributeValue::String("no".into()), Some(false))]
    #[case(AttributeValue::String("maybe".into()), None)]
    #[case(AttributeValue::Null, None)]
    fn test_as_flag(#[case] value: AttributeValue, #[case] expected: Option<bool>) {
        assert_eq!(value.as_flag(), expected);
    }

    #[rstest]
    #[case(AttributeValue::Null, true)]
    #[case(AttributeValue::Int(0), true)]
    #[case(AttributeValue::String(" ".into()), true)]
    #[case(AttributeValue::String("0".into()), true)]
    #[case(AttributeValue::String("house".into()), false)]
    #[case(AttributeValue::Double(2.5), false)]
    fn test_is_empty(#[case] value: AttributeValue, #[case] expected: bool) {
        assert_eq!(value.is_empty(), expected);
    }

    #[test]
    fn test_layer_add_feature() {
        let mut layer = Layer::new("out", Crs::Wgs84, ["a", "b"]);
        let feature = Feature::new(
            "1",
            point!(x: 0.0, y: 0.0).into(),
            [("b", 2i64.into())].into_iter().collect(),
        );
        layer.add_feature(feature).unwrap();

        let stored = &layer.features()[0];
        assert_eq!(
            stored.attributes.keys().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(stored.attributes.get("a"), Some(&AttributeValue::Null));
        assert_eq!(layer.feature_count(), 1);
    }

    #[test]
    fn test_layer_add_feature_unknown_field() {
        let mut layer = Layer::new("out", Crs::Wgs84, ["a"]);
        let feature = Feature::new(
            "1",
            point!(x: 0.0, y: 0.0).into(),
            [("c", 2i64.into())].into_iter().collect(),
        );
        assert!(layer.add_feature(feature).is_err());
    }
}
