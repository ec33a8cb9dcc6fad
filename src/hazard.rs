//! Readers which determine the hazard affecting each exposure feature.
use crate::category::CategoryCode;
use crate::crs::Crs;
use crate::definitions::Definitions;
use crate::error::{ImpactError, Stage};
use crate::feature::{Attributes, Feature, FeatureSource, Layer};
use anyhow::{Result, ensure};
use geo::{BoundingRect, Centroid, Geometry, Intersects, MultiPolygon, Point};
use indexmap::IndexMap;
use rstar::{AABB, RTree, RTreeObject};

/// Default depth above which a raster cell counts as flooded, in metres
pub const DEFAULT_DEPTH_THRESHOLD: f64 = 1.0;

/// The hazard affecting a single exposure feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HazardObservation {
    /// Whether the feature is affected
    pub affected: bool,
    /// The hazard category, if the feature is affected and the hazard carries one
    pub category: Option<CategoryCode>,
}

/// Determines the hazard affecting exposure features
pub trait HazardReader {
    /// The CRS of the hazard data, or `None` if the hazard is already attached to the exposure
    fn crs(&self) -> Option<&Crs>;

    /// Observe the hazard at an exposure feature
    fn observe(&self, feature: &Feature) -> Result<HazardObservation, ImpactError>;
}

/// Resolve whether a feature is affected from its attributes.
///
/// Signals are checked in order: the `affected` flag, then `FLOODPRONE == "yes"`, then the
/// in-polygon flag (if `in_polygon` is given). Returns `None` if no signal is present.
pub fn resolve_affected(
    attributes: &Attributes,
    definitions: &Definitions,
    in_polygon: Option<&str>,
) -> Option<bool> {
    if let Some(flag) = attributes
        .get_non_null(&definitions.affected)
        .and_then(|value| value.as_flag())
    {
        return Some(flag);
    }

    if let Some(value) = attributes.get_non_null(&definitions.flood_prone) {
        return Some(value.to_string().trim().eq_ignore_ascii_case("yes"));
    }

    in_polygon
        .and_then(|field| attributes.get_non_null(field))
        .and_then(|value| value.as_flag())
}

/// Parse a category code attribute. Null and blank values give `None`.
pub fn parse_category(
    attributes: &Attributes,
    field: &str,
    feature: &Feature,
) -> Result<Option<CategoryCode>, ImpactError> {
    let Some(value) = attributes.get_non_null(field) else {
        return Ok(None);
    };

    let code = value.to_string();
    let code = code.trim();
    if code.is_empty() {
        return Ok(None);
    }

    code.parse().map(Some).map_err(|_| {
        ImpactError::Config(format!(
            "Unknown category code '{code}' for feature {}",
            feature.id
        ))
    })
}

/// A grid of flood depths, as read from an ESRI ASCII grid
#[derive(Debug, Clone, PartialEq)]
pub struct DepthGrid {
    ncols: usize,
    nrows: usize,
    x_min: f64,
    y_min: f64,
    cell_size: f64,
    no_data: Option<f64>,
    /// Depths in row-major order, with the northernmost row first
    values: Vec<f64>,
}

impl DepthGrid {
    /// Create a new depth grid.
    ///
    /// # Arguments
    ///
    /// * `ncols`, `nrows` - Grid dimensions
    /// * `lower_left` - Coordinates of the lower-left corner of the grid
    /// * `cell_size` - Width and height of each cell
    /// * `no_data` - Value marking cells without data
    /// * `values` - Depths in row-major order, northernmost row first
    pub fn new(
        ncols: usize,
        nrows: usize,
        lower_left: (f64, f64),
        cell_size: f64,
        no_data: Option<f64>,
        values: Vec<f64>,
    ) -> Result<Self> {
        ensure!(ncols > 0 && nrows > 0, "Grid must have at least one cell");
        ensure!(
            cell_size.is_finite() && cell_size > 0.0,
            "Cell size must be a positive number"
        );
        ensure!(
            values.len() == ncols * nrows,
            "Expected {} values for a {ncols}x{nrows} grid, found {}",
            ncols * nrows,
            values.len()
        );

        Ok(Self {
            ncols,
            nrows,
            x_min: lower_left.0,
            y_min: lower_left.1,
            cell_size,
            no_data,
            values,
        })
    }

    /// The depth at a point, or `None` if the point is outside the grid or has no data
    pub fn sample(&self, point: Point<f64>) -> Option<f64> {
        let col = ((point.x() - self.x_min) / self.cell_size).floor();
        let row_from_bottom = ((point.y() - self.y_min) / self.cell_size).floor();
        if !(col >= 0.0 && row_from_bottom >= 0.0) {
            return None;
        }

        let (col, row_from_bottom) = (col as usize, row_from_bottom as usize);
        if col >= self.ncols || row_from_bottom >= self.nrows {
            return None;
        }

        let value = self.values[(self.nrows - 1 - row_from_bottom) * self.ncols + col];
        if value.is_nan() || self.no_data == Some(value) {
            None
        } else {
            Some(value)
        }
    }
}

/// A raster depth hazard, sampled at the centroid of each exposure feature.
///
/// Rasters carry no category of their own. Affected features are given the category set with
/// [`RasterHazard::with_category`], if any.
#[derive(Debug)]
pub struct RasterHazard {
    grid: DepthGrid,
    crs: Crs,
    threshold: f64,
    category: Option<CategoryCode>,
}

impl RasterHazard {
    /// Create a new raster hazard with the given wet/dry depth threshold
    pub fn new(grid: DepthGrid, crs: Crs, threshold: f64) -> Result<Self, ImpactError> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(ImpactError::Config(format!(
                "Depth threshold must be a positive number (found {threshold})"
            )));
        }

        Ok(Self {
            grid,
            crs,
            threshold,
            category: None,
        })
    }

    /// Set the category given to affected features
    pub fn with_category(mut self, category: Option<CategoryCode>) -> Self {
        self.category = category;
        self
    }
}

impl HazardReader for RasterHazard {
    fn crs(&self) -> Option<&Crs> {
        Some(&self.crs)
    }

    fn observe(&self, feature: &Feature) -> Result<HazardObservation, ImpactError> {
        let centroid = feature
            .geometry
            .centroid()
            .ok_or_else(|| ImpactError::geometry(&feature.id, Stage::Join, "Empty geometry"))?;
        let affected = self
            .grid
            .sample(centroid)
            .is_some_and(|depth| depth >= self.threshold);

        Ok(HazardObservation {
            affected,
            category: self.category.filter(|_| affected),
        })
    }
}

/// A hazard polygon stored in the R-tree
#[derive(Debug)]
struct HazardEntry {
    envelope: AABB<[f64; 2]>,
    geometry: Geometry<f64>,
    affected: bool,
    category: Option<CategoryCode>,
}

impl RTreeObject for HazardEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// A vector hazard made of polygons, joined to exposure features by intersection.
///
/// Each polygon's affected status is taken from its own attributes; a polygon with no
/// affected or flood-prone attribute counts as affected wherever it intersects a feature.
/// Where several affected polygons intersect a feature, the worst category wins.
#[derive(Debug)]
pub struct PolygonHazard {
    tree: RTree<HazardEntry>,
    crs: Crs,
}

impl PolygonHazard {
    /// Build a polygon hazard from a layer, reading category codes from the category field
    pub fn from_layer(layer: &Layer, definitions: &Definitions) -> Result<Self, ImpactError> {
        Self::build(layer, definitions, |feature| {
            parse_category(&feature.attributes, &definitions.category, feature)
        })
    }

    /// Build a polygon hazard from a layer of buffered rings.
    ///
    /// Category codes are looked up from each ring's label. Labels without a category give no
    /// category code.
    pub fn from_rings(
        layer: &Layer,
        definitions: &Definitions,
        categories: &IndexMap<String, CategoryCode>,
    ) -> Result<Self, ImpactError> {
        Self::build(layer, definitions, |feature| {
            let label = feature
                .attributes
                .get_non_null(&definitions.hazard_value)
                .map(ToString::to_string);
            Ok(label.and_then(|label| categories.get(&label).copied()))
        })
    }

    fn build<F>(layer: &Layer, definitions: &Definitions, category_of: F) -> Result<Self, ImpactError>
    where
        F: Fn(&Feature) -> Result<Option<CategoryCode>, ImpactError>,
    {
        let mut entries = Vec::with_capacity(layer.feature_count());
        for feature in layer.features() {
            let geometry = match &feature.geometry {
                Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon.clone()]),
                Geometry::MultiPolygon(multi) => multi.clone(),
                _ => {
                    return Err(ImpactError::Config(format!(
                        "Hazard feature {} is not a polygon",
                        feature.id
                    )));
                }
            };
            let Some(rect) = geometry.bounding_rect() else {
                return Err(ImpactError::geometry(
                    &feature.id,
                    Stage::Join,
                    "Empty geometry",
                ));
            };

            entries.push(HazardEntry {
                envelope: AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                ),
                geometry: Geometry::MultiPolygon(geometry),
                affected: resolve_affected(&feature.attributes, definitions, None).unwrap_or(true),
                category: category_of(feature)?,
            });
        }

        Ok(Self {
            tree: RTree::bulk_load(entries),
            crs: *layer.crs(),
        })
    }

    /// The number of hazard polygons
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether there are no hazard polygons
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl HazardReader for PolygonHazard {
    fn crs(&self) -> Option<&Crs> {
        Some(&self.crs)
    }

    fn observe(&self, feature: &Feature) -> Result<HazardObservation, ImpactError> {
        let Some(rect) = feature.geometry.bounding_rect() else {
            return Err(ImpactError::geometry(
                &feature.id,
                Stage::Join,
                "Empty geometry",
            ));
        };
        let query = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);

        let mut observation = HazardObservation::default();
        for entry in self.tree.locate_in_envelope_intersecting(&query) {
            if !entry.affected || !entry.geometry.intersects(&feature.geometry) {
                continue;
            }

            observation.affected = true;
            observation.category = match (observation.category, entry.category) {
                (Some(current), Some(category)) => Some(current.worst(category)),
                (current, category) => current.or(category),
            };
        }

        Ok(observation)
    }
}

/// Hazard values already interpolated onto the exposure features' attributes
#[derive(Debug)]
pub struct InterpolatedHazard {
    definitions: Definitions,
}

impl InterpolatedHazard {
    /// Create a new reader using the given field names
    pub fn new(definitions: Definitions) -> Self {
        Self { definitions }
    }
}

impl HazardReader for InterpolatedHazard {
    fn crs(&self) -> Option<&Crs> {
        None
    }

    fn observe(&self, feature: &Feature) -> Result<HazardObservation, ImpactError> {
        let affected = resolve_affected(
            &feature.attributes,
            &self.definitions,
            Some(&self.definitions.in_polygon),
        )
        .ok_or_else(|| ImpactError::AttributeResolution {
            feature: feature.id.to_string(),
        })?;

        let category = if affected {
            parse_category(&feature.attributes, &self.definitions.category, feature)?
        } else {
            None
        };

        Ok(HazardObservation { affected, category })
    }
}
