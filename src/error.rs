//! Error types raised by the impact engine.
use crate::feature::FeatureID;
use strum::Display;
use thiserror::Error;

/// The pipeline stage at which a per-feature error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    /// Buffering hazard geometries into rings
    Buffer,
    /// Joining hazard information onto exposure features
    Join,
}

/// An error raised while computing an impact.
///
/// Configuration errors are raised before any feature is processed. The remaining variants
/// carry the identity of the offending feature so that the caller can correct the input.
#[derive(Debug, Error)]
pub enum ImpactError {
    /// Invalid configuration or reference data
    #[error("Configuration error: {0}")]
    Config(String),
    /// A degenerate or failed geometric operation
    #[error("Geometry error for feature {feature} during {stage}: {message}")]
    Geometry {
        /// The feature being processed
        feature: String,
        /// The stage at which the error occurred
        stage: Stage,
        /// Description of the problem
        message: String,
    },
    /// No usable hazard status signal for a feature
    #[error(
        "Could not determine hazard status for feature {feature}: no affected, FLOODPRONE or \
        in-polygon attribute found"
    )]
    AttributeResolution {
        /// The feature being processed
        feature: String,
    },
    /// The classified building type has no vulnerability entry
    #[error("No vulnerability entry for building type '{building_type}' (feature {feature})")]
    MissingVulnerability {
        /// The feature being processed
        feature: String,
        /// The building type which could not be found
        building_type: String,
    },
}

impl ImpactError {
    /// Create a new geometry error
    pub fn geometry(feature: &FeatureID, stage: Stage, message: impl Into<String>) -> Self {
        Self::Geometry {
            feature: feature.to_string(),
            stage,
            message: message.into(),
        }
    }
}
