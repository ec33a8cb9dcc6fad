//! Aggregation of enriched records into loss statistics per building type.
use crate::error::ImpactError;
use crate::join::EnrichedRecord;
use crate::units::Money;
use crate::vulnerability::{BuildingType, VulnerabilityTable};
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Label of the roll-up row summing every building type
pub const ALL_LABEL: &str = "All";

/// Loss statistics for one building type
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ReportRow {
    /// Number of buildings with a hazard category
    pub count_affected: usize,
    /// Sum of the losses of affected buildings
    pub estimated_loss: Money,
    /// Number of buildings
    pub total_count: usize,
    /// Value of all buildings. Affected buildings contribute their loss rather than their price.
    pub total_value: Money,
    /// `estimated_loss` as a percentage of `total_value`, or zero if there is no value
    pub percentage_of_loss: f64,
}

impl ReportRow {
    /// Recompute `percentage_of_loss` from the loss and value
    fn update_percentage(&mut self) {
        self.percentage_of_loss = if self.total_value == Money(0.0) {
            0.0
        } else {
            (self.estimated_loss / self.total_value).value() * 100.0
        };
    }
}

impl std::ops::AddAssign for ReportRow {
    fn add_assign(&mut self, rhs: Self) {
        self.count_affected += rhs.count_affected;
        self.estimated_loss += rhs.estimated_loss;
        self.total_count += rhs.total_count;
        self.total_value += rhs.total_value;
    }
}

/// Accumulates report rows one record at a time.
///
/// Builders over disjoint sets of records can be combined with [`ReportBuilder::merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReportBuilder<'a> {
    table: &'a VulnerabilityTable,
    rows: BTreeMap<BuildingType, ReportRow>,
}

impl<'a> ReportBuilder<'a> {
    /// Create a builder with an empty row for every building type in the table
    pub fn new(table: &'a VulnerabilityTable) -> Self {
        let rows = table
            .building_types()
            .map(|building_type| (building_type.clone(), ReportRow::default()))
            .collect();

        Self { table, rows }
    }

    /// Add a single record to the report
    pub fn add_record(&mut self, record: &EnrichedRecord) -> Result<(), ImpactError> {
        let entry = self
            .table
            .get(record.building_type.as_str())
            .ok_or_else(|| ImpactError::MissingVulnerability {
                feature: record.feature_id.to_string(),
                building_type: record.building_type.to_string(),
            })?;

        let row = self.rows.entry(record.building_type.clone()).or_default();
        if let Some(code) = record.category {
            let loss = entry.loss(code);
            row.count_affected += 1;
            row.estimated_loss += loss;
            row.total_count += 1;
            row.total_value += loss;
        } else {
            row.total_count += 1;
            row.total_value += entry.price;
        }

        Ok(())
    }

    /// Combine with another builder over the same table
    pub fn merge(mut self, other: Self) -> Self {
        for (building_type, row) in other.rows {
            *self.rows.entry(building_type).or_default() += row;
        }

        self
    }

    /// Compute percentages and the roll-up row
    pub fn finish(self) -> Report {
        let mut rows = self.rows;
        let mut all = ReportRow::default();
        for row in rows.values_mut() {
            row.update_percentage();
            all += *row;
        }
        all.update_percentage();

        Report { all, rows }
    }
}

/// Loss statistics per building type plus a roll-up over all types
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    all: ReportRow,
    rows: BTreeMap<BuildingType, ReportRow>,
}

impl Report {
    /// Get the row for a building type, or the roll-up for [`ALL_LABEL`]
    pub fn get(&self, label: &str) -> Option<&ReportRow> {
        if label == ALL_LABEL {
            Some(&self.all)
        } else {
            self.rows.get(label)
        }
    }

    /// The roll-up row
    pub fn all(&self) -> &ReportRow {
        &self.all
    }

    /// Iterate over the rows, starting with the roll-up and then by building type
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ReportRow)> {
        std::iter::once((ALL_LABEL, &self.all)).chain(
            self.rows
                .iter()
                .map(|(building_type, row)| (building_type.as_str(), row)),
        )
    }

    /// Rows for building types with at least one building, sorted by display label
    pub fn breakdown(&self) -> Vec<(String, &ReportRow)> {
        self.rows
            .iter()
            .filter(|(_, row)| row.total_count > 0)
            .map(|(building_type, row)| (display_label(building_type.as_str()), row))
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .collect()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<24}{:>10}{:>16}{:>10}{:>16}{:>8}",
            "Building type", "Affected", "Loss", "Total", "Value", "Loss %"
        )?;
        let all = (ALL_LABEL.to_string(), &self.all);
        for (label, row) in self.breakdown().iter().chain(std::iter::once(&all)) {
            writeln!(
                f,
                "{:<24}{:>10}{:>16.2}{:>10}{:>16.2}{:>8.1}",
                label,
                row.count_affected,
                row.estimated_loss.value(),
                row.total_count,
                row.total_value.value(),
                row.percentage_of_loss
            )?;
        }

        Ok(())
    }
}

/// Human-readable label for a building type, e.g. `place_of_worship` -> `Place of worship`
pub fn display_label(building_type: &str) -> String {
    let label = building_type.replace('_', " ");
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => label,
    }
}

/// Computes an impact report from enriched records
pub trait ImpactComputer {
    /// Aggregate the records into a report
    fn compute(&self, records: &[EnrichedRecord]) -> Result<Report, ImpactError>;
}

/// Computes building losses from a vulnerability table
#[derive(Debug, Clone)]
pub struct LossComputer {
    table: VulnerabilityTable,
}

impl LossComputer {
    /// Create a new loss computer
    pub fn new(table: VulnerabilityTable) -> Self {
        Self { table }
    }

    /// The vulnerability table used for losses
    pub fn table(&self) -> &VulnerabilityTable {
        &self.table
    }
}

impl ImpactComputer for LossComputer {
    fn compute(&self, records: &[EnrichedRecord]) -> Result<Report, ImpactError> {
        aggregate(records, &self.table)
    }
}

/// Aggregate records into a report in a single pass
pub fn aggregate(
    records: &[EnrichedRecord],
    table: &VulnerabilityTable,
) -> Result<Report, ImpactError> {
    let mut builder = ReportBuilder::new(table);
    for record in records {
        builder.add_record(record)?;
    }

    Ok(builder.finish())
}
