//! Coordinate reference systems and the UTM projection used to buffer geographic data in metres.
use anyhow::{Context, Result, anyhow, bail};
use geo::Coord;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use std::fmt;
use std::str::FromStr;

/// EPSG code for WGS 84 geographic coordinates
const EPSG_WGS84: u32 = 4326;

/// Offset of EPSG codes for WGS 84 / UTM zones in the northern hemisphere
const EPSG_UTM_NORTH: u32 = 32600;

/// Offset of EPSG codes for WGS 84 / UTM zones in the southern hemisphere
const EPSG_UTM_SOUTH: u32 = 32700;

/// A coordinate reference system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// WGS 84 longitude/latitude in degrees
    Wgs84,
    /// WGS 84 / UTM, in metres
    Utm {
        /// The UTM zone (1-60)
        zone: u8,
        /// Whether the zone is in the northern hemisphere
        north: bool,
    },
    /// Any other projected CRS, identified by its EPSG code. Units are assumed to be linear.
    Projected(u32),
}

impl Crs {
    /// Get the CRS for an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        match code {
            EPSG_WGS84 => Self::Wgs84,
            c if (EPSG_UTM_NORTH + 1..=EPSG_UTM_NORTH + 60).contains(&c) => Self::Utm {
                zone: (c - EPSG_UTM_NORTH) as u8,
                north: true,
            },
            c if (EPSG_UTM_SOUTH + 1..=EPSG_UTM_SOUTH + 60).contains(&c) => Self::Utm {
                zone: (c - EPSG_UTM_SOUTH) as u8,
                north: false,
            },
            c => Self::Projected(c),
        }
    }

    /// The EPSG code for this CRS
    pub fn epsg(self) -> u32 {
        match self {
            Self::Wgs84 => EPSG_WGS84,
            Self::Utm { zone, north: true } => EPSG_UTM_NORTH + u32::from(zone),
            Self::Utm { zone, north: false } => EPSG_UTM_SOUTH + u32::from(zone),
            Self::Projected(code) => code,
        }
    }

    /// Whether coordinates are expressed in degrees
    pub fn is_geographic(self) -> bool {
        self == Self::Wgs84
    }

    /// The UTM zone containing the given longitude/latitude
    pub fn utm_for(lon: f64, lat: f64) -> Self {
        Self::Utm {
            zone: utm_zone(lon),
            north: lat >= 0.0,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

impl FromStr for Crs {
    type Err = anyhow::Error;

    /// Parse an authority identifier such as `EPSG:4326`, `urn:ogc:def:crs:EPSG::32748` or
    /// `OGC:CRS84`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.to_ascii_uppercase().ends_with("CRS84") {
            return Ok(Self::Wgs84);
        }

        let code = s
            .rsplit(':')
            .next()
            .and_then(|code| code.parse().ok())
            .with_context(|| format!("Unrecognised CRS identifier: {s}"))?;

        Ok(Self::from_epsg(code))
    }
}

/// A reversible transformation between two coordinate reference systems
pub trait CoordinateTransform {
    /// Transform a coordinate from the source CRS to the target CRS
    fn forward(&self, coord: Coord) -> Result<Coord>;

    /// Transform a coordinate from the target CRS back to the source CRS
    fn inverse(&self, coord: Coord) -> Result<Coord>;
}

/// Create a projection from its PROJ definition
fn proj_from_string(definition: &str) -> Result<Proj> {
    Proj::from_proj_string(definition)
        .map_err(|err| anyhow!("Invalid projection '{definition}': {err:?}"))
}

/// Projection of WGS 84 longitude/latitude into a UTM zone
pub struct UtmProjection {
    crs: Crs,
    geographic: Proj,
    utm: Proj,
}

impl UtmProjection {
    /// Create the projection for a UTM CRS
    pub fn new(crs: Crs) -> Result<Self> {
        let Crs::Utm { zone, north } = crs else {
            bail!("{crs} is not a WGS 84 / UTM zone");
        };
        let hemisphere = if north { "" } else { " +south" };

        Ok(Self {
            crs,
            geographic: proj_from_string("+proj=longlat +ellps=WGS84 +no_defs")?,
            utm: proj_from_string(&format!(
                "+proj=utm +zone={zone}{hemisphere} +ellps=WGS84 +units=m +no_defs"
            ))?,
        })
    }

    /// Create the projection for the UTM zone containing the given longitude/latitude
    pub fn for_location(lon: f64, lat: f64) -> Result<Self> {
        Self::new(Crs::utm_for(lon, lat))
    }

    /// The UTM CRS projected into
    pub fn crs(&self) -> Crs {
        self.crs
    }
}

impl CoordinateTransform for UtmProjection {
    fn forward(&self, coord: Coord) -> Result<Coord> {
        let mut point = (coord.x.to_radians(), coord.y.to_radians(), 0.0);
        transform(&self.geographic, &self.utm, &mut point)
            .map_err(|err| anyhow!("Could not project ({}, {}): {err:?}", coord.x, coord.y))?;

        Ok(Coord {
            x: point.0,
            y: point.1,
        })
    }

    fn inverse(&self, coord: Coord) -> Result<Coord> {
        let mut point = (coord.x, coord.y, 0.0);
        transform(&self.utm, &self.geographic, &mut point)
            .map_err(|err| anyhow!("Could not unproject ({}, {}): {err:?}", coord.x, coord.y))?;

        Ok(Coord {
            x: point.0.to_degrees(),
            y: point.1.to_degrees(),
        })
    }
}

/// The UTM zone number (1-60) for a longitude
fn utm_zone(lon: f64) -> u8 {
    ((((lon + 180.0) / 6.0).floor() as i64).rem_euclid(60) + 1) as u8
}
