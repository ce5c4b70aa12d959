//! Tabular view of the record list and the exported report.
//!
//! The per-record "Total Defects" here sums every defect counter on the row
//! (what was physically found). It is a different quantity from
//! the dashboard KPI of the same name, which only counts `actualMajor`.

use crate::error::{Error, Result};
use crate::fields::{is_date_field, EXPORT_COLUMNS, HIDDEN_COLUMNS, TOTAL_DEFECT_FIELDS};
use crate::types::{InspectionDate, InspectionRecord};
use crate::util::format_count;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

pub const TOTAL_DEFECTS_COLUMN: &str = "Total Defects";
pub const EMPTY_CELL: &str = "-";

/// Sum of all defect counters on one record.
pub fn total_defects(record: &InspectionRecord) -> f64 {
    TOTAL_DEFECT_FIELDS.iter().map(|f| record.count(f)).sum()
}

/// Display text for one cell of the wire map.
pub fn render_cell(key: &str, value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => EMPTY_CELL.to_string(),
        Some(Value::String(s)) if is_date_field(key) => InspectionDate::parse(s).to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.as_f64().map(format_count).unwrap_or_else(|| n.to_string()),
        Some(other) => other.to_string(),
    }
}

/// Columns in order of first appearance across the records, without server
/// bookkeeping keys.
fn visible_columns(maps: &[Map<String, Value>]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for map in maps {
        for key in map.keys() {
            if HIDDEN_COLUMNS.contains(&key.as_str()) {
                continue;
            }
            if seen.insert(key.clone()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    /// Server id, kept for edit/delete actions.
    pub id: Option<String>,
    pub cells: Vec<String>,
    pub total_defects: f64,
}

/// The record list as rendered in the table, with free-text search and fixed
/// size pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl TableView {
    pub fn build(records: &[InspectionRecord]) -> Self {
        let maps: Vec<Map<String, Value>> = records.iter().map(|r| r.to_json_map()).collect();
        let columns = visible_columns(&maps);
        let rows = records
            .iter()
            .zip(&maps)
            .map(|(record, map)| TableRow {
                id: record.id.clone(),
                cells: columns.iter().map(|c| render_cell(c, map.get(c))).collect(),
                total_defects: total_defects(record),
            })
            .collect();
        Self { columns, rows }
    }

    /// Keep rows where any cell contains `term`, ignoring case.
    pub fn search(&self, term: &str) -> TableView {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return self.clone();
        }
        let rows = self
            .rows
            .iter()
            .filter(|row| row.cells.iter().any(|c| c.to_lowercase().contains(&needle)))
            .cloned()
            .collect();
        TableView {
            columns: self.columns.clone(),
            rows,
        }
    }

    pub fn total_pages(&self, rows_per_page: usize) -> usize {
        page_count(self.rows.len(), rows_per_page)
    }

    /// Rows of 1-based `page`; out of range pages are clamped.
    pub fn page(&self, page: usize, rows_per_page: usize) -> &[TableRow] {
        page_slice(&self.rows, page, rows_per_page)
    }
}

pub fn page_count(len: usize, rows_per_page: usize) -> usize {
    if rows_per_page == 0 {
        return 1;
    }
    len.div_ceil(rows_per_page).max(1)
}

pub fn page_slice<T>(items: &[T], page: usize, rows_per_page: usize) -> &[T] {
    if rows_per_page == 0 {
        return items;
    }
    let page = page.clamp(1, page_count(items.len(), rows_per_page));
    let start = (page - 1) * rows_per_page;
    let end = (start + rows_per_page).min(items.len());
    &items[start.min(end)..end]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPage {
    pub number: usize,
    pub rows: Vec<Vec<String>>,
}

impl ExportPage {
    pub fn footer(&self) -> String {
        format!("Page {}", self.number)
    }
}

/// Paginated report of the fixed export columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportDocument {
    pub title: String,
    pub generated_at: String,
    pub columns: Vec<String>,
    pub pages: Vec<ExportPage>,
}

impl ExportDocument {
    /// Only export columns present on at least one record are included,
    /// followed by the per-record "Total Defects".
    pub fn build(records: &[InspectionRecord], generated_at: &str, rows_per_page: usize) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::NothingToExport);
        }
        let maps: Vec<Map<String, Value>> = records.iter().map(|r| r.to_json_map()).collect();
        let present: Vec<&str> = EXPORT_COLUMNS
            .iter()
            .copied()
            .filter(|c| maps.iter().any(|m| m.contains_key(*c)))
            .collect();

        let rows: Vec<Vec<String>> = records
            .iter()
            .zip(&maps)
            .map(|(record, map)| {
                let mut cells: Vec<String> = present.iter().map(|c| render_cell(c, map.get(*c))).collect();
                cells.push(format_count(total_defects(record)));
                cells
            })
            .collect();

        let per_page = rows_per_page.max(1);
        let pages = rows
            .chunks(per_page)
            .enumerate()
            .map(|(i, chunk)| ExportPage {
                number: i + 1,
                rows: chunk.to_vec(),
            })
            .collect();

        let mut columns: Vec<String> = present.iter().map(|c| c.to_string()).collect();
        columns.push(TOTAL_DEFECTS_COLUMN.to_string());

        Ok(Self {
            title: "Inspection Report".to_string(),
            generated_at: generated_at.to_string(),
            columns,
            pages,
        })
    }
}
