//! Fixtures for tests
use crate::vulnerability::{VulnerabilityRecord, VulnerabilityTable};
use geo::{Polygon, Rect, coord};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!($result.unwrap_err().to_string(), $msg);
    };
}
pub(crate) use assert_error;

/// An axis-aligned square with its lower-left corner at `origin`
pub fn square(origin: (f64, f64), size: f64) -> Polygon<f64> {
    Rect::new(
        coord! { x: origin.0, y: origin.1 },
        coord! { x: origin.0 + size, y: origin.1 + size },
    )
    .to_polygon()
}

/// A raw vulnerability record with the same damage factor for every category
pub fn vulnerability_record(building_type: &str, price: &str, factor: &str) -> VulnerabilityRecord {
    VulnerabilityRecord {
        building_type: building_type.into(),
        price: price.into(),
        a1: factor.into(),
        a2: factor.into(),
        a3: factor.into(),
        b1: factor.into(),
        b2: factor.into(),
        b3: factor.into(),
        c1: factor.into(),
        c2: factor.into(),
        c3: factor.into(),
    }
}

#[fixture]
pub fn vulnerability_table() -> VulnerabilityTable {
    VulnerabilityTable::from_records([
        vulnerability_record("Place of Worship", "1.000", "0,5"),
        vulnerability_record("Residential", "100", "0,1"),
        vulnerability_record("School", "500", "0,4"),
    ])
    .unwrap()
}
