//! Hazard category codes: a 3x3 matrix of flood depth against flood duration.
//!
//! The letter gives the duration band (A shortest, C longest) and the digit gives the depth
//! band (1 shallowest, 3 deepest).
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Category codes from least to most severe, as used by [`CategoryCode::severity_rank`].
///
/// Where several observations apply to the same exposure unit, the one that comes last in
/// this list wins.
pub const SEVERITY_ORDER: [CategoryCode; 9] = [
    CategoryCode::A1,
    CategoryCode::A2,
    CategoryCode::B1,
    CategoryCode::A3,
    CategoryCode::C1,
    CategoryCode::B2,
    CategoryCode::B3,
    CategoryCode::C2,
    CategoryCode::C3,
];

/// A hazard category code
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum CategoryCode {
    /// Short duration, shallow
    A1,
    /// Short duration, medium depth
    A2,
    /// Short duration, deep
    A3,
    /// Medium duration, shallow
    B1,
    /// Medium duration, medium depth
    B2,
    /// Medium duration, deep
    B3,
    /// Long duration, shallow
    C1,
    /// Long duration, medium depth
    C2,
    /// Long duration, deep
    C3,
}

/// A band of a continuous quantity (depth or duration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    /// The first band
    Low,
    /// The second band
    Medium,
    /// The third band
    High,
}

impl CategoryCode {
    /// The category for a depth band and a duration band
    pub fn from_bands(depth: Band, duration: Band) -> Self {
        match (duration, depth) {
            (Band::Low, Band::Low) => Self::A1,
            (Band::Low, Band::Medium) => Self::A2,
            (Band::Low, Band::High) => Self::A3,
            (Band::Medium, Band::Low) => Self::B1,
            (Band::Medium, Band::Medium) => Self::B2,
            (Band::Medium, Band::High) => Self::B3,
            (Band::High, Band::Low) => Self::C1,
            (Band::High, Band::Medium) => Self::C2,
            (Band::High, Band::High) => Self::C3,
        }
    }

    /// Position in [`SEVERITY_ORDER`]: higher is worse
    pub fn severity_rank(self) -> usize {
        SEVERITY_ORDER
            .iter()
            .position(|code| *code == self)
            .expect("All codes appear in SEVERITY_ORDER")
    }

    /// The more severe of two categories
    pub fn worst(self, other: Self) -> Self {
        if other.severity_rank() > self.severity_rank() {
            other
        } else {
            self
        }
    }

    /// Index of the code within the matrix, in declaration order (A1 = 0, C3 = 8)
    pub fn index(self) -> usize {
        self as usize
    }
}
