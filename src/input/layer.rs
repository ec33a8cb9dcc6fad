//! Code for reading and writing layers as GeoJSON and depth grids as ESRI ASCII grids.
use super::input_err_msg;
use crate::crs::Crs;
use crate::feature::{AttributeValue, Attributes, Feature, FeatureSource, Layer};
use crate::hazard::DepthGrid;
use anyhow::{Context, Result, bail, ensure};
use geojson::{FeatureCollection, GeoJson, JsonObject, JsonValue, feature::Id};
use std::fs;
use std::path::Path;

/// Foreign member of a feature collection naming its CRS
const CRS_MEMBER: &str = "crs";

/// Convert a JSON property value to an attribute value
fn attribute_from_json(value: &JsonValue) -> AttributeValue {
    match value {
        JsonValue::Null => AttributeValue::Null,
        JsonValue::Bool(b) => AttributeValue::Bool(*b),
        JsonValue::Number(n) => n
            .as_i64()
            .map(AttributeValue::Int)
            .or_else(|| n.as_f64().map(AttributeValue::Double))
            .unwrap_or_default(),
        JsonValue::String(s) => AttributeValue::String(s.clone()),
        other => AttributeValue::String(other.to_string()),
    }
}

/// Convert an attribute value to a JSON property value
fn attribute_to_json(value: &AttributeValue) -> JsonValue {
    match value {
        AttributeValue::Null => JsonValue::Null,
        AttributeValue::Bool(b) => JsonValue::Bool(*b),
        AttributeValue::Int(i) => JsonValue::from(*i),
        AttributeValue::Double(d) => JsonValue::from(*d),
        AttributeValue::String(s) => JsonValue::String(s.clone()),
    }
}

/// Read the CRS of a feature collection.
///
/// Accepts either a plain string (`"EPSG:32748"`) or a named CRS object. Defaults to WGS 84.
fn read_crs(foreign_members: Option<&JsonObject>) -> Result<Crs> {
    let Some(crs) = foreign_members.and_then(|members| members.get(CRS_MEMBER)) else {
        return Ok(Crs::Wgs84);
    };

    let name = match crs {
        JsonValue::String(name) => name.as_str(),
        JsonValue::Object(object) => object
            .get("properties")
            .and_then(|properties| properties.get("name"))
            .and_then(JsonValue::as_str)
            .context("CRS object has no name")?,
        _ => bail!("Invalid CRS: {crs}"),
    };

    name.parse()
}

/// Build a layer from a feature collection
fn layer_from_collection(name: &str, collection: FeatureCollection) -> Result<Layer> {
    let crs = read_crs(collection.foreign_members.as_ref())?;

    let mut features = Vec::with_capacity(collection.features.len());
    for (i, feature) in collection.features.into_iter().enumerate() {
        let id = match &feature.id {
            Some(Id::String(id)) => id.clone(),
            Some(Id::Number(id)) => id.to_string(),
            None => i.to_string(),
        };
        let geometry = feature
            .geometry
            .with_context(|| format!("Feature {id} has no geometry"))?;
        let geometry: geo::Geometry<f64> = geometry
            .value
            .try_into()
            .with_context(|| format!("Invalid geometry for feature {id}"))?;
        let attributes: Attributes = feature
            .properties
            .iter()
            .flatten()
            .map(|(key, value)| (key.as_str(), attribute_from_json(value)))
            .collect();

        features.push(Feature::new(id, geometry, attributes));
    }

    // Features may omit properties, so the schema is the union of all their attributes
    let fields = features
        .iter()
        .flat_map(|feature| feature.attributes.keys().map(str::to_string))
        .collect::<Vec<_>>();
    let mut layer = Layer::new(name, crs, fields);
    for feature in features {
        layer.add_feature(feature)?;
    }

    Ok(layer)
}

/// Read a layer from a GeoJSON feature collection.
///
/// The layer's name is the file stem. The CRS is read from the collection's `crs` member.
pub fn read_layer(file_path: &Path) -> Result<Layer> {
    let name = file_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("layer");
    let contents = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let geojson: GeoJson = contents.parse().with_context(|| input_err_msg(file_path))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        bail!(
            "{}: GeoJSON must be a FeatureCollection",
            input_err_msg(file_path)
        );
    };

    layer_from_collection(name, collection).with_context(|| input_err_msg(file_path))
}

/// Convert a layer into a GeoJSON feature collection
pub fn layer_to_collection(layer: &Layer) -> FeatureCollection {
    let features = layer
        .features()
        .iter()
        .map(|feature| geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(
                &feature.geometry,
            ))),
            id: Some(Id::String(feature.id.to_string())),
            properties: Some(
                feature
                    .attributes
                    .iter()
                    .map(|(key, value)| (key.to_string(), attribute_to_json(value)))
                    .collect(),
            ),
            foreign_members: None,
        })
        .collect();

    let mut foreign_members = JsonObject::new();
    foreign_members.insert(CRS_MEMBER.into(), layer.crs().to_string().into());

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    }
}

/// Write a layer to a GeoJSON file
pub fn write_layer(file_path: &Path, layer: &Layer) -> Result<()> {
    let collection = layer_to_collection(layer);
    let contents = serde_json::to_string_pretty(&collection)?;
    fs::write(file_path, contents)
        .with_context(|| format!("Failed to write {}", file_path.display()))?;

    Ok(())
}

/// Parse the value of a header line from an ESRI ASCII grid
fn header_value<T: std::str::FromStr>(line: Option<&str>, key: &str) -> Result<T> {
    let line = line.with_context(|| format!("Missing {key} header"))?;
    let mut parts = line.split_whitespace();
    let found = parts.next().unwrap_or_default();
    ensure!(
        found.eq_ignore_ascii_case(key),
        "Expected {key} header, found '{found}'"
    );
    let value = parts.next().with_context(|| format!("Missing value for {key}"))?;
    value
        .parse()
        .ok()
        .with_context(|| format!("Invalid value for {key}: {value}"))
}

/// Parse an ESRI ASCII grid.
///
/// Corner coordinates may be given as `xllcorner`/`yllcorner` or `xllcenter`/`yllcenter`. The
/// `NODATA_value` header is optional.
pub fn parse_depth_grid(contents: &str) -> Result<DepthGrid> {
    let mut lines = contents.lines().filter(|line| !line.trim().is_empty()).peekable();
    let ncols: usize = header_value(lines.next(), "ncols")?;
    let nrows: usize = header_value(lines.next(), "nrows")?;

    let x_line = lines.next();
    let y_line = lines.next();
    let centre = x_line.is_some_and(|line| line.trim_start().to_lowercase().starts_with("xllcenter"));
    let (x, y): (f64, f64) = if centre {
        (
            header_value(x_line, "xllcenter")?,
            header_value(y_line, "yllcenter")?,
        )
    } else {
        (
            header_value(x_line, "xllcorner")?,
            header_value(y_line, "yllcorner")?,
        )
    };
    let cell_size: f64 = header_value(lines.next(), "cellsize")?;
    let (x, y) = if centre {
        (x - cell_size / 2.0, y - cell_size / 2.0)
    } else {
        (x, y)
    };

    let no_data = match lines.peek() {
        Some(line) if line.trim_start().to_lowercase().starts_with("nodata_value") => {
            Some(header_value(lines.next(), "NODATA_value")?)
        }
        _ => None,
    };

    let values = lines
        .flat_map(str::split_whitespace)
        .map(|value| {
            value
                .parse::<f64>()
                .with_context(|| format!("Invalid grid value: {value}"))
        })
        .collect::<Result<Vec<_>>>()?;

    DepthGrid::new(ncols, nrows, (x, y), cell_size, no_data, values)
}

/// Read a depth grid from an ESRI ASCII grid file
pub fn read_depth_grid(file_path: &Path) -> Result<DepthGrid> {
    let contents = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    parse_depth_grid(&contents).with_context(|| input_err_msg(file_path))
}
