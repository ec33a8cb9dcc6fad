//! Vulnerability of building types: replacement price and damage factor per hazard category.
use crate::category::CategoryCode;
use crate::id::define_id_type;
use crate::units::{Dimensionless, Money};
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

define_id_type! {BuildingType}

impl BuildingType {
    /// The building type given to features which can't be classified
    pub fn other() -> Self {
        Self::new("other")
    }

    /// Normalise a building type name from a vulnerability table.
    ///
    /// Names are lower-cased, trimmed and have spaces replaced with underscores, e.g.
    /// `"Place of Worship"` becomes `place_of_worship`.
    pub fn normalised(name: &str) -> Self {
        Self::from(name.trim().to_lowercase().replace(' ', "_"))
    }
}

/// The price of a building type and its damage factor for each hazard category
#[derive(Debug, Clone, PartialEq)]
pub struct VulnerabilityEntry {
    /// Replacement value of one building
    pub price: Money,
    /// Damage factor for each category code, indexed by [`CategoryCode::index`]
    factors: [Dimensionless; 9],
}

impl VulnerabilityEntry {
    /// Create a new entry from a price and a factor for every category code
    pub fn new(price: Money, factors: [Dimensionless; 9]) -> Result<Self> {
        ensure!(
            price.is_finite() && price >= Money(0.0),
            "Price must be a finite, non-negative number"
        );
        for (code, factor) in CategoryCode::iter().zip(factors) {
            ensure!(
                factor.is_finite() && factor >= Dimensionless(0.0),
                "Factor for {code} must be a finite, non-negative number"
            );
        }

        Ok(Self { price, factors })
    }

    /// The damage factor for a category
    pub fn factor(&self, code: CategoryCode) -> Dimensionless {
        self.factors[code.index()]
    }

    /// The estimated loss for one building of this type in the given category
    pub fn loss(&self, code: CategoryCode) -> Money {
        self.price * self.factor(code)
    }
}

/// A row of a vulnerability table, with numbers in the table's locale format.
///
/// Prices use `.` as a thousands separator; factors use `,` as the decimal separator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[allow(missing_docs)]
pub struct VulnerabilityRecord {
    #[serde(rename = "TYPE")]
    pub building_type: String,
    #[serde(rename = "PRICE")]
    pub price: String,
    #[serde(rename = "A1")]
    pub a1: String,
    #[serde(rename = "A2")]
    pub a2: String,
    #[serde(rename = "A3")]
    pub a3: String,
    #[serde(rename = "B1")]
    pub b1: String,
    #[serde(rename = "B2")]
    pub b2: String,
    #[serde(rename = "B3")]
    pub b3: String,
    #[serde(rename = "C1")]
    pub c1: String,
    #[serde(rename = "C2")]
    pub c2: String,
    #[serde(rename = "C3")]
    pub c3: String,
}

impl VulnerabilityRecord {
    /// The raw factor strings in category code order
    fn factor_strs(&self) -> [&str; 9] {
        [
            &self.a1, &self.a2, &self.a3, &self.b1, &self.b2, &self.b3, &self.c1, &self.c2,
            &self.c3,
        ]
    }
}

/// Vulnerability entries keyed by normalised building type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VulnerabilityTable(IndexMap<BuildingType, VulnerabilityEntry>);

impl VulnerabilityTable {
    /// Build a table from raw records.
    ///
    /// Any record which fails numeric conversion is an error for the whole table.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = VulnerabilityRecord>,
    {
        let mut table = IndexMap::new();
        for record in records {
            let building_type = BuildingType::normalised(&record.building_type);
            ensure!(!building_type.as_str().is_empty(), "Empty building type");

            let entry = parse_record(&record)
                .with_context(|| format!("Invalid entry for building type {building_type}"))?;
            ensure!(
                table.insert(building_type.clone(), entry).is_none(),
                "Duplicate entry for building type {building_type}"
            );
        }
        ensure!(!table.is_empty(), "Vulnerability table is empty");

        Ok(Self(table))
    }

    /// Convert the table back into raw records in the table's locale format
    pub fn to_records(&self) -> Vec<VulnerabilityRecord> {
        self.0
            .iter()
            .map(|(building_type, entry)| {
                let f = |code| format_decimal_comma(entry.factor(code).value());
                VulnerabilityRecord {
                    building_type: building_type.to_string(),
                    price: format_price(entry.price.value()),
                    a1: f(CategoryCode::A1),
                    a2: f(CategoryCode::A2),
                    a3: f(CategoryCode::A3),
                    b1: f(CategoryCode::B1),
                    b2: f(CategoryCode::B2),
                    b3: f(CategoryCode::B3),
                    c1: f(CategoryCode::C1),
                    c2: f(CategoryCode::C2),
                    c3: f(CategoryCode::C3),
                }
            })
            .collect()
    }

    /// Get the entry for a building type
    pub fn get(&self, building_type: &str) -> Option<&VulnerabilityEntry> {
        self.0.get(building_type)
    }

    /// The building types in the table, in table order
    pub fn building_types(&self) -> impl Iterator<Item = &BuildingType> {
        self.0.keys()
    }

    /// Iterate over building types and their entries
    pub fn iter(&self) -> impl Iterator<Item = (&BuildingType, &VulnerabilityEntry)> {
        self.0.iter()
    }

    /// The number of building types
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(BuildingType, VulnerabilityEntry)> for VulnerabilityTable {
    fn from_iter<I: IntoIterator<Item = (BuildingType, VulnerabilityEntry)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn parse_record(record: &VulnerabilityRecord) -> Result<VulnerabilityEntry> {
    let price = parse_price(&record.price)?;
    let mut factors = [Dimensionless(0.0); 9];
    for ((factor, raw), code) in factors
        .iter_mut()
        .zip(record.factor_strs())
        .zip(CategoryCode::iter())
    {
        *factor = Dimensionless(
            parse_decimal_comma(raw).with_context(|| format!("Invalid factor for {code}"))?,
        );
    }

    VulnerabilityEntry::new(Money(price), factors)
}

/// Parse a price, stripping `.` thousands separators (e.g. `"1.234.567"` or `"1.234,56"`)
pub fn parse_price(s: &str) -> Result<f64> {
    parse_decimal_comma(&s.replace('.', "")).with_context(|| format!("Invalid price: '{s}'"))
}

/// Parse a number written with `,` as the decimal separator.
///
/// If the string also contains `.` characters alongside a `,`, they are treated as thousands
/// separators.
pub fn parse_decimal_comma(s: &str) -> Result<f64> {
    let s = s.trim();
    let normalised = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else {
        s.to_string()
    };

    let value: f64 = normalised
        .parse()
        .with_context(|| format!("Invalid number: '{s}'"))?;
    ensure!(value.is_finite(), "Number is not finite: '{s}'");

    Ok(value)
}

/// Format a number with `,` as the decimal separator
pub fn format_decimal_comma(value: f64) -> String {
    value.to_string().replace('.', ",")
}

/// Format a price with `.` as the thousands separator and `,` as the decimal separator
pub fn format_price(value: f64) -> String {
    let formatted = value.abs().to_string();
    let (whole, fraction) = match formatted.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (formatted.as_str(), None),
    };

    let digits: Vec<char> = whole.chars().collect();
    let mut out = String::new();
    if value < 0.0 {
        out.push('-');
    }
    for (i, digit) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(*digit);
    }
    if let Some(fraction) = fraction {
        out.push(',');
        out.push_str(fraction);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, vulnerability_record};
    use rstest::rstest;

    #[rstest]
    #[case("1.234.567", 1_234_567.0)]
    #[case("1.234,56", 1234.56)]
    #[case("500", 500.0)]
    #[case(" 100 ", 100.0)]
    fn test_parse_price(#[case] s: &str, #[case] expected: f64) {
        assert_eq!(parse_price(s).unwrap(), expected);
    }

    #[rstest]
    #[case("0,4", 0.4)]
    #[case("0.4", 0.4)]
    #[case("1", 1.0)]
    #[case("1.234,5", 1234.5)]
    fn test_parse_decimal_comma(#[case] s: &str, #[case] expected: f64) {
        assert_eq!(parse_decimal_comma(s).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("1,2,3")]
    #[case("inf")]
    fn test_parse_decimal_comma_invalid(#[case] s: &str) {
        assert!(parse_decimal_comma(s).is_err());
    }

    #[rstest]
    #[case(1234.56, "1.234,56")]
    #[case(1_234_567.0, "1.234.567")]
    #[case(500.0, "500")]
    #[case(0.0, "0")]
    fn test_format_price(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_price(value), expected);
    }

    #[test]
    fn test_building_type_normalised() {
        assert_eq!(
            BuildingType::normalised(" Place of Worship "),
            BuildingType::new("place_of_worship")
        );
    }

    #[test]
    fn test_from_records() {
        let table = VulnerabilityTable::from_records([
            vulnerability_record("Residential", "100", "0,1"),
            vulnerability_record("School", "1.000", "0,4"),
        ])
        .unwrap();

        assert_eq!(table.len(), 2);
        let school = table.get("school").unwrap();
        assert_eq!(school.price, Money(1000.0));
        assert_eq!(school.factor(CategoryCode::B2), Dimensionless(0.4));
        assert_eq!(school.loss(CategoryCode::C3), Money(400.0));
        assert!(table.get("School").is_none());
    }

    #[test]
    fn test_from_records_bad_number() {
        let mut record = vulnerability_record("Residential", "100", "0,1");
        record.b3 = "lots".into();
        assert_error!(
            VulnerabilityTable::from_records([record]),
            "Invalid entry for building type residential"
        );
    }

    #[test]
    fn test_from_records_negative_factor() {
        assert!(
            VulnerabilityTable::from_records([vulnerability_record("house", "100", "-0,1")])
                .is_err()
        );
    }

    #[test]
    fn test_from_records_duplicate() {
        assert_error!(
            VulnerabilityTable::from_records([
                vulnerability_record("House", "100", "0,1"),
                vulnerability_record("house", "200", "0,2"),
            ]),
            "Duplicate entry for building type house"
        );
    }

    #[test]
    fn test_from_records_empty() {
        assert!(VulnerabilityTable::from_records([]).is_err());
    }

    #[test]
    fn test_records_round_trip() {
        let table = VulnerabilityTable::from_records([
            vulnerability_record("Residential", "1.234,56", "0,25"),
            vulnerability_record("Commercial", "2.500.000", "1"),
        ])
        .unwrap();

        let reloaded = VulnerabilityTable::from_records(table.to_records()).unwrap();
        assert_eq!(reloaded, table);
        assert_eq!(reloaded.get("residential").unwrap().price, Money(1234.56));
    }
}
