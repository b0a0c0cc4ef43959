use crate::domain::model::{display_value, Direction, Itinerary, NamingPolicy, Record};
use crate::utils::error::ExportError;
use serde_json::Value;
use std::collections::HashSet;

const MAX_CELL_WIDTH: usize = 40;

/// A record-shaped table. Columns are the union of field names across rows,
/// in first-seen order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn from_records(rows: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for row in &rows {
            for name in row.field_names() {
                if seen.insert(name) {
                    columns.push(name.to_string());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// `None` for a missing field; such cells render empty.
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row)?.get(column)
    }

    /// Display strings for one row, aligned with [`Table::columns`].
    pub fn row_cells(&self, row: usize) -> Vec<String> {
        self.columns
            .iter()
            .map(|column| self.cell(row, column).map(display_value).unwrap_or_default())
            .collect()
    }

    /// Fixed-width text rendering of at most `max_rows` rows.
    pub fn render_text(&self, max_rows: Option<usize>) -> String {
        if self.columns.is_empty() {
            return match self.len() {
                0 => "(no rows)".to_string(),
                n => format!("({} rows, no fields)", n),
            };
        }

        let shown = max_rows.map_or(self.len(), |max| max.min(self.len()));
        let header: Vec<String> = self.columns.iter().map(|c| clip(c)).collect();
        let body: Vec<Vec<String>> = (0..shown)
            .map(|row| self.row_cells(row).iter().map(|c| clip(c)).collect())
            .collect();

        let widths: Vec<usize> = (0..header.len())
            .map(|i| {
                body.iter()
                    .map(|cells| cells[i].chars().count())
                    .chain(std::iter::once(header[i].chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut lines = Vec::with_capacity(shown + 3);
        lines.push(format_line(&header, &widths));
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for cells in &body {
            lines.push(format_line(cells, &widths));
        }
        if shown < self.len() {
            lines.push(format!("... {} more rows", self.len() - shown));
        }
        lines.join("\n")
    }
}

fn clip(text: &str) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= MAX_CELL_WIDTH {
        return single_line;
    }
    let kept: String = single_line.chars().take(MAX_CELL_WIDTH - 3).collect();
    format!("{}...", kept)
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

/// Ordered name → table mapping. Re-inserting a name replaces the table but
/// keeps the name's original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedTables {
    entries: Vec<(String, Table)>,
}

impl NamedTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, table: Table) -> Option<Table> {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, table)),
            None => {
                self.entries.push((name, table));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, table)| table)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.entries.iter().map(|(name, table)| (name.as_str(), table))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn directional_name(section: &str, direction: Direction) -> String {
    format!("{}_{}", section, direction)
}

pub fn penalty_table_name(passenger_type: &str, direction: Direction) -> String {
    format!("Penalties_{}_{}", passenger_type, direction)
}

/// Flatten an itinerary into its fixed set of named tables.
///
/// Penalty entries sharing a passenger type collapse onto the same table
/// names and the later entry wins.
pub fn project(itin: &Itinerary) -> NamedTables {
    let mut tables = NamedTables::new();

    for (section, records) in [
        ("Segments", &itin.segments),
        ("Baggage", &itin.baggage),
        ("SegmentDetails", &itin.segment_details),
    ] {
        for direction in Direction::ALL {
            tables.insert(
                directional_name(section, direction),
                Table::from_records(records.get(direction).to_vec()),
            );
        }
    }

    tables.insert("FareInfo", Table::from_records(itin.fare_info.clone()));
    tables.insert("Taxes", Table::from_records(itin.taxes.clone()));

    for penalty in &itin.penalties {
        for direction in Direction::ALL {
            let name = penalty_table_name(&penalty.passenger_type, direction);
            let table =
                Table::from_records(penalty.penalties_by_direction.get(direction).to_vec());
            if tables.insert(name.clone(), table).is_some() {
                tracing::warn!(
                    "⚠️ Itinerary {}: table {} overwritten by a later penalty entry",
                    itin.itinerary_id,
                    name
                );
            }
        }
    }

    tables
}

/// Like [`project`], but a repeated passenger type is an error.
pub fn project_strict(itin: &Itinerary) -> Result<NamedTables, ExportError> {
    let mut seen = HashSet::new();
    for passenger_type in itin.passenger_types() {
        if !seen.insert(passenger_type) {
            return Err(ExportError::DuplicateTableName {
                name: penalty_table_name(passenger_type, Direction::Outbound),
            });
        }
    }
    Ok(project(itin))
}

pub fn project_with(itin: &Itinerary, policy: NamingPolicy) -> Result<NamedTables, ExportError> {
    match policy {
        NamingPolicy::Lenient => Ok(project(itin)),
        NamingPolicy::Strict => project_strict(itin),
    }
}
