//! Buffering of hazard points and lines into nested rings.
//!
//! Each feature is dilated by a series of increasing radii. Every ring except the innermost
//! has the previous ring's outer boundary as its hole, so the rings tile the buffered area
//! without gaps or overlaps.
use crate::crs::{CoordinateTransform, Crs, UtmProjection};
use crate::error::{ImpactError, Stage};
use crate::feature::{AttributeValue, Attributes, Feature, FeatureSource, Layer, Progress};
use geo::algorithm::buffer::{Buffer, BufferStyle, LineCap, LineJoin};
use geo::{Area, Centroid, Contains, Geometry, LineString, MapCoords, Polygon};
use serde::Deserialize;
use std::f64::consts::FRAC_PI_2;

/// The smallest permitted number of segments used to approximate a quarter circle
pub const MIN_SEGMENTS_PER_QUARTER: u32 = 8;

/// The default number of segments used to approximate a quarter circle.
///
/// Higher values give smoother rings at the cost of larger geometries.
pub const DEFAULT_SEGMENTS_PER_QUARTER: u32 = 30;

/// A buffer distance and the label given to the ring it produces
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BufferRadius {
    /// Buffer distance in metres (or the units of a projected CRS)
    pub radius: f64,
    /// Label for the ring, e.g. the hazard class
    pub label: String,
}

impl BufferRadius {
    /// Create a new [`BufferRadius`]
    pub fn new(radius: f64, label: &str) -> Self {
        Self {
            radius,
            label: label.to_string(),
        }
    }
}

/// One annular polygon in a buffered hazard
#[derive(Debug, Clone, PartialEq)]
pub struct HazardRing {
    /// Outer boundary of the ring
    pub outer: LineString<f64>,
    /// Inner boundary, equal to the previous ring's outer boundary. Absent for the innermost.
    pub hole: Option<LineString<f64>>,
    /// The label for the ring's radius
    pub label: String,
    /// Attributes copied from the buffered feature
    pub attributes: Attributes,
}

impl HazardRing {
    /// The ring as a polygon with an optional hole
    pub fn polygon(&self) -> Polygon<f64> {
        Polygon::new(self.outer.clone(), self.hole.iter().cloned().collect())
    }
}

/// Check that the radii are positive and strictly increasing
pub fn check_radii(radii: &[BufferRadius]) -> Result<(), ImpactError> {
    if radii.is_empty() {
        return Err(ImpactError::Config("No buffer radii provided".into()));
    }

    let mut previous = 0.0;
    for radius in radii {
        if !(radius.radius.is_finite() && radius.radius > previous) {
            return Err(ImpactError::Config(format!(
                "Buffer radii must be positive and strictly increasing (found {} after {})",
                radius.radius, previous
            )));
        }
        previous = radius.radius;
    }

    Ok(())
}

/// Check that the number of segments per quarter circle is acceptable
pub fn check_segments(segments_per_quarter: u32) -> Result<(), ImpactError> {
    if segments_per_quarter < MIN_SEGMENTS_PER_QUARTER {
        return Err(ImpactError::Config(format!(
            "segments_per_quarter must be at least {MIN_SEGMENTS_PER_QUARTER} (found \
            {segments_per_quarter})"
        )));
    }

    Ok(())
}

/// Buffer a single feature into nested rings.
///
/// Geographic coordinates are projected into the UTM zone containing the feature's centroid
/// before buffering and the rings are projected back afterwards.
///
/// # Arguments
///
/// * `feature` - A point or line feature
/// * `crs` - The CRS of the feature's geometry
/// * `radii` - Radii in increasing order, with the label for each ring
/// * `segments_per_quarter` - Number of segments used to approximate a quarter circle
pub fn buffer(
    feature: &Feature,
    crs: Crs,
    radii: &[BufferRadius],
    segments_per_quarter: u32,
) -> Result<Vec<HazardRing>, ImpactError> {
    check_radii(radii)?;
    check_segments(segments_per_quarter)?;

    let projection = if crs.is_geographic() {
        let centroid = feature
            .geometry
            .centroid()
            .ok_or_else(|| ImpactError::geometry(&feature.id, Stage::Buffer, "Empty geometry"))?;
        let projection = UtmProjection::for_location(centroid.x(), centroid.y())
            .map_err(|err| ImpactError::geometry(&feature.id, Stage::Buffer, err.to_string()))?;
        Some(projection)
    } else {
        None
    };

    let geometry = match &projection {
        Some(utm) => feature
            .geometry
            .try_map_coords(|c| utm.forward(c))
            .map_err(|err| ImpactError::geometry(&feature.id, Stage::Buffer, err.to_string()))?,
        None => feature.geometry.clone(),
    };

    let mut rings = Vec::with_capacity(radii.len());
    let mut previous: Option<Polygon<f64>> = None;
    for radius in radii {
        let outer = dilate(&geometry, radius.radius, segments_per_quarter)
            .map_err(|msg| ImpactError::geometry(&feature.id, Stage::Buffer, msg))?;
        check_ring(&outer, previous.as_ref())
            .map_err(|msg| ImpactError::geometry(&feature.id, Stage::Buffer, msg))?;

        let exterior = match &projection {
            Some(utm) => outer
                .exterior()
                .try_map_coords(|c| utm.inverse(c))
                .map_err(|err| {
                    ImpactError::geometry(&feature.id, Stage::Buffer, err.to_string())
                })?,
            None => outer.exterior().clone(),
        };
        let hole = rings.last().map(|ring: &HazardRing| ring.outer.clone());
        rings.push(HazardRing {
            outer: exterior,
            hole,
            label: radius.label.clone(),
            attributes: feature.attributes.clone(),
        });
        previous = Some(outer);
    }

    Ok(rings)
}

/// Buffer every feature of a layer into a new polygon layer.
///
/// The output keeps the input's attributes and adds `label_field` holding each ring's label.
pub fn buffer_layer(
    layer: &Layer,
    radii: &[BufferRadius],
    segments_per_quarter: u32,
    label_field: &str,
    mut progress: Option<Progress>,
) -> Result<Layer, ImpactError> {
    let fields = layer
        .fields()
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(label_field));
    let mut buffered = Layer::new("buffer", *layer.crs(), fields);

    let total = layer.feature_count();
    for (i, feature) in layer.features().iter().enumerate() {
        let rings = buffer(feature, *layer.crs(), radii, segments_per_quarter)?;
        for (j, ring) in rings.into_iter().enumerate() {
            let mut attributes = ring.attributes.clone();
            attributes.insert(label_field, AttributeValue::String(ring.label.clone()));
            let ring_feature = Feature::new(
                format!("{}_{j}", feature.id),
                ring.polygon().into(),
                attributes,
            );
            buffered
                .add_feature(ring_feature)
                .map_err(|err| ImpactError::Config(err.to_string()))?;
        }

        if let Some(progress) = progress.as_mut() {
            progress(i, total, Stage::Buffer);
        }
    }

    Ok(buffered)
}

/// Check that a newly dilated outer boundary is usable and encloses the previous one
fn check_ring(outer: &Polygon<f64>, previous: Option<&Polygon<f64>>) -> Result<(), String> {
    if outer.exterior().coords().any(|c| !(c.x.is_finite() && c.y.is_finite())) {
        return Err("Buffer contains non-finite coordinates".into());
    }

    let area = outer.unsigned_area();
    if area <= 0.0 {
        return Err("Buffer has zero area".into());
    }

    if let Some(previous) = previous {
        let previous = Polygon::new(previous.exterior().clone(), vec![]);
        if area <= previous.unsigned_area() {
            return Err("Buffer ring is not larger than the previous ring".into());
        }
        if !Polygon::new(outer.exterior().clone(), vec![]).contains(&previous) {
            return Err("Buffer ring intersects the previous ring".into());
        }
    }

    Ok(())
}

/// Dilate a geometry by `radius` with round caps and joins, returning the outer polygon of the
/// result
fn dilate(geometry: &Geometry<f64>, radius: f64, segments: u32) -> Result<Polygon<f64>, String> {
    let angle = FRAC_PI_2 / f64::from(segments);
    let style = BufferStyle::new(radius)
        .line_cap(LineCap::Round(angle))
        .line_join(LineJoin::Round(angle));
    let buffered = geometry.buffer_with_style(style);

    match buffered.0.as_slice() {
        [polygon] => Ok(Polygon::new(polygon.exterior().clone(), vec![])),
        [] => Err("Buffer is empty".into()),
        parts => Err(format!("Buffer is not a single polygon ({} parts)", parts.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use geo::{MultiPoint, line_string, point};
    use rstest::{fixture, rstest};
    use std::f64::consts::PI;

    #[fixture]
    fn radii() -> Vec<BufferRadius> {
        vec![
            BufferRadius::new(500.0, "high"),
            BufferRadius::new(1000.0, "medium"),
            BufferRadius::new(2000.0, "low"),
        ]
    }

    fn point_feature(x: f64, y: f64) -> Feature {
        let attributes = [("name", "volcano".into())].into_iter().collect();
        Feature::new("p1", point!(x: x, y: y).into(), attributes)
    }

    #[rstest]
    fn test_buffer_point_projected(radii: Vec<BufferRadius>) {
        let feature = point_feature(700_000.0, 9_300_000.0);
        let rings = buffer(&feature, Crs::from_epsg(32748), &radii, 30).unwrap();

        assert_eq!(rings.len(), 3);
        assert_eq!(
            rings.iter().map(|r| r.label.as_str()).collect::<Vec<_>>(),
            vec!["high", "medium", "low"]
        );
        assert!(rings[0].hole.is_none());
        for i in 1..rings.len() {
            assert_eq!(rings[i].hole.as_ref(), Some(&rings[i - 1].outer));
        }

        // Outer areas are close to those of true circles and strictly increasing
        let mut previous_area = 0.0;
        for (ring, radius) in rings.iter().zip(&radii) {
            let area = Polygon::new(ring.outer.clone(), vec![]).unsigned_area();
            let expected = PI * radius.radius * radius.radius;
            assert!((area - expected).abs() / expected < 0.001);
            assert!(area > previous_area);
            previous_area = area;
        }

        // Attributes are carried forward
        assert!(rings.iter().all(|r| r.attributes.get("name") == Some(&"volcano".into())));
    }

    #[rstest]
    fn test_buffer_point_geographic(radii: Vec<BufferRadius>) {
        let feature = point_feature(110.44, -7.54);
        let rings = buffer(&feature, Crs::Wgs84, &radii, 16).unwrap();
        assert_eq!(rings.len(), 3);
        for i in 1..rings.len() {
            assert_eq!(rings[i].hole.as_ref(), Some(&rings[i - 1].outer));
        }

        // The innermost ring reaches roughly 500 m (about 0.0045 degrees) north of the point
        let max_lat = rings[0]
            .outer
            .coords()
            .map(|c| c.y)
            .fold(f64::MIN, f64::max);
        assert_approx_eq!(f64, max_lat - (-7.54), 500.0 / 110_600.0, epsilon = 5e-5);
    }

    #[test]
    fn test_buffer_line() {
        let feature = Feature::new(
            "l1",
            line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)].into(),
            Attributes::new(),
        );
        let radii = [BufferRadius::new(10.0, "near")];
        let rings = buffer(&feature, Crs::Projected(3857), &radii, 30).unwrap();

        let area = rings[0].polygon().unsigned_area();
        let expected = 2.0 * 10.0 * 100.0 + PI * 100.0;
        assert!((area - expected).abs() / expected < 0.001);
    }

    #[test]
    fn test_buffer_bent_line() {
        let feature = Feature::new(
            "l2",
            line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0), (x: 100.0, y: 100.0)].into(),
            Attributes::new(),
        );
        let radii = [BufferRadius::new(5.0, "a"), BufferRadius::new(10.0, "b")];
        let rings = buffer(&feature, Crs::Projected(3857), &radii, 8).unwrap();
        assert_eq!(rings.len(), 2);
        assert!(rings[1].polygon().unsigned_area() > 0.0);
    }

    #[rstest]
    #[case(vec![BufferRadius::new(1000.0, "a"), BufferRadius::new(500.0, "b")])]
    #[case(vec![BufferRadius::new(500.0, "a"), BufferRadius::new(500.0, "b")])]
    #[case(vec![BufferRadius::new(0.0, "a")])]
    #[case(vec![BufferRadius::new(f64::NAN, "a")])]
    #[case(vec![])]
    fn test_buffer_invalid_radii(#[case] radii: Vec<BufferRadius>) {
        let feature = point_feature(0.0, 0.0);
        assert!(matches!(
            buffer(&feature, Crs::Projected(3857), &radii, 30),
            Err(ImpactError::Config(_))
        ));
    }

    #[rstest]
    fn test_buffer_too_few_segments(radii: Vec<BufferRadius>) {
        let feature = point_feature(0.0, 0.0);
        assert_error!(
            buffer(&feature, Crs::Projected(3857), &radii, 4),
            "Configuration error: segments_per_quarter must be at least 8 (found 4)"
        );
    }

    #[test]
    fn test_buffer_multi_part_is_error() {
        let feature = Feature::new(
            "mp",
            MultiPoint::from(vec![(0.0, 0.0), (1000.0, 0.0)]).into(),
            Attributes::new(),
        );
        let radii = [BufferRadius::new(10.0, "a")];
        let result = buffer(&feature, Crs::Projected(3857), &radii, 8);
        assert!(matches!(
            result,
            Err(ImpactError::Geometry {
                stage: Stage::Buffer,
                ..
            })
        ));
    }

    #[rstest]
    fn test_buffer_layer(radii: Vec<BufferRadius>) {
        let layer = Layer::from_features(
            "volcanoes",
            Crs::from_epsg(32748),
            vec![
                point_feature(700_000.0, 9_300_000.0),
                point_feature(710_000.0, 9_300_000.0),
            ],
        );

        let mut calls = Vec::new();
        let mut progress =
            |current: usize, total: usize, stage: Stage| calls.push((current, total, stage));
        let buffered = buffer_layer(&layer, &radii, 30, "haz_value", Some(&mut progress)).unwrap();

        assert_eq!(buffered.feature_count(), 6);
        assert_eq!(
            buffered.fields().iter().collect::<Vec<_>>(),
            vec!["name", "haz_value"]
        );
        assert_eq!(
            buffered.features()[1].attributes.get("haz_value"),
            Some(&"medium".into())
        );
        assert_eq!(
            calls,
            vec![(0, 2, Stage::Buffer), (1, 2, Stage::Buffer)]
        );
    }
}
