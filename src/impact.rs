//! Impact functions: a hazard reader, an exposure reader and an impact computer composed for one
//! kind of hazard.
use crate::aggregate::{ImpactComputer, LossComputer, Report};
use crate::buffer::{buffer_layer, check_radii, check_segments};
use crate::classify::{Classifier, Vocabulary};
use crate::crs::Crs;
use crate::definitions::Definitions;
use crate::error::ImpactError;
use crate::feature::{FeatureSource, Layer, Progress};
use crate::hazard::{DepthGrid, HazardReader, InterpolatedHazard, PolygonHazard, RasterHazard};
use crate::join::{EnrichedRecord, ExposureReader, StructureExposure, enrich_layer, join};
use crate::project::parameters::ProjectParameters;
use crate::vulnerability::VulnerabilityTable;
use log::{debug, info};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// The way in which hazard data is represented
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeLabeledStringEnum, DeserializeLabeledStringEnum,
)]
pub enum HazardKind {
    /// Polygons with affected and category attributes
    #[string = "polygon"]
    Polygon,
    /// A grid of flood depths
    #[string = "raster"]
    Raster,
    /// Hazard attributes already attached to the exposure features
    #[string = "interpolated"]
    Interpolated,
    /// Points or lines to be buffered into rings
    #[string = "buffer"]
    Buffer,
}

/// Hazard data loaded for a run
#[derive(Debug, Clone, PartialEq)]
pub enum HazardData {
    /// A layer of hazard polygons
    Polygons(Layer),
    /// A depth grid
    Raster {
        /// Flood depths
        grid: DepthGrid,
        /// CRS of the grid coordinates
        crs: Crs,
    },
    /// No separate hazard data; hazard attributes are on the exposure
    Interpolated,
    /// A layer of hazard points or lines
    Buffer(Layer),
}

impl HazardData {
    /// The kind of hazard data
    pub fn kind(&self) -> HazardKind {
        match self {
            Self::Polygons(_) => HazardKind::Polygon,
            Self::Raster { .. } => HazardKind::Raster,
            Self::Interpolated => HazardKind::Interpolated,
            Self::Buffer(_) => HazardKind::Buffer,
        }
    }
}

/// Metadata describing an impact function
#[derive(Debug, PartialEq)]
pub struct ImpactFunctionInfo {
    /// Unique identifier
    pub id: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// The kinds of hazard the function accepts
    pub hazard_kinds: &'static [HazardKind],
    /// The default name of the vulnerability table file
    pub vulnerability_file: &'static str,
}

/// The registry of available impact functions
pub const IMPACT_FUNCTIONS: &[ImpactFunctionInfo] = &[ImpactFunctionInfo {
    id: "FloodVulnerableBuildingImpactFunction",
    name: "Estimate flood losses to buildings",
    hazard_kinds: &[
        HazardKind::Polygon,
        HazardKind::Raster,
        HazardKind::Interpolated,
        HazardKind::Buffer,
    ],
    vulnerability_file: "vulnerability.csv",
}];

/// Find the first registered impact function accepting the given kind of hazard
pub fn select_impact_function(kind: HazardKind) -> Result<&'static ImpactFunctionInfo, ImpactError> {
    IMPACT_FUNCTIONS
        .iter()
        .find(|info| info.hazard_kinds.contains(&kind))
        .ok_or_else(|| ImpactError::Config(format!("No impact function accepts {kind:?} hazards")))
}

/// The output of an impact function
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactResult {
    /// One record per exposure feature, in feature order
    pub records: Vec<EnrichedRecord>,
    /// Loss statistics
    pub report: Report,
    /// Exposure features with hazard and building type attached
    pub impact_layer: Layer,
}

/// An impact function ready to run against exposure layers
pub struct ImpactFunction {
    info: &'static ImpactFunctionInfo,
    definitions: Definitions,
    hazard: Box<dyn HazardReader>,
    exposure: Box<dyn ExposureReader>,
    computer: Box<dyn ImpactComputer>,
    hazard_rings: Option<Layer>,
}

impl ImpactFunction {
    /// Build an impact function for the given hazard.
    ///
    /// Hazard points and lines are buffered into rings at this stage, so `progress` is called once
    /// per buffered feature.
    pub fn build(
        hazard: HazardData,
        parameters: &ProjectParameters,
        table: VulnerabilityTable,
        progress: Option<Progress>,
    ) -> Result<Self, ImpactError> {
        let info = select_impact_function(hazard.kind())?;
        info!("Selected impact function: {} ({})", info.name, info.id);

        let definitions = parameters.definitions.clone();
        let mut hazard_rings = None;
        let hazard: Box<dyn HazardReader> = match hazard {
            HazardData::Polygons(layer) => {
                Box::new(PolygonHazard::from_layer(&layer, &definitions)?)
            }
            HazardData::Raster { grid, crs } => Box::new(
                RasterHazard::new(grid, crs, parameters.depth_threshold)?
                    .with_category(parameters.raster_category),
            ),
            HazardData::Interpolated => Box::new(InterpolatedHazard::new(definitions.clone())),
            HazardData::Buffer(layer) => {
                check_radii(&parameters.buffer_radii)?;
                check_segments(parameters.segments_per_quarter)?;
                let rings = buffer_layer(
                    &layer,
                    &parameters.buffer_radii,
                    parameters.segments_per_quarter,
                    &definitions.hazard_value,
                    progress,
                )?;
                debug!(
                    "Buffered {} hazard features into {} rings",
                    layer.feature_count(),
                    rings.feature_count()
                );
                let reader =
                    PolygonHazard::from_rings(&rings, &definitions, &parameters.buffer_category)?;
                hazard_rings = Some(rings);
                Box::new(reader)
            }
        };

        let vocabulary: Vocabulary = table.building_types().collect();
        let classifier = Classifier::new(&parameters.candidate_keys, &parameters.aliases);

        Ok(Self {
            info,
            definitions,
            hazard,
            exposure: Box::new(StructureExposure::new(classifier, vocabulary)),
            computer: Box::new(LossComputer::new(table)),
            hazard_rings,
        })
    }

    /// Metadata for this impact function
    pub fn info(&self) -> &'static ImpactFunctionInfo {
        self.info
    }

    /// The buffered hazard rings, if the hazard was buffered
    pub fn hazard_rings(&self) -> Option<&Layer> {
        self.hazard_rings.as_ref()
    }

    /// Run the impact function against an exposure layer
    pub fn run(
        &self,
        exposure: &Layer,
        progress: Option<Progress>,
    ) -> Result<ImpactResult, ImpactError> {
        let records = join(self.hazard.as_ref(), self.exposure.as_ref(), exposure, progress)?;
        let report = self.computer.compute(&records)?;
        let impact_layer = enrich_layer(exposure, &records, &self.definitions)?;

        Ok(ImpactResult {
            records,
            report,
            impact_layer,
        })
    }
}
