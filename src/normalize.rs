//! Spreadsheet row normalization.
//!
//! Turns one row of untyped `header -> cell` pairs into a canonical
//! [`InspectionRecord`]. Nothing here fails: unparsable cells are defaulted
//! and reported as [`Diagnostic`]s instead.

use crate::fields::{canonical_header, is_date_field, is_numeric_field};
use crate::types::{InspectionDate, InspectionRecord};
use crate::util::{month_name, parse_date_safe, parse_f64_safe};
use chrono::Datelike;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Something worth telling the user about a row that was still imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Two headers resolved to the same field; the later column won.
    HeaderCollision {
        field: String,
        kept_header: String,
        dropped_header: String,
    },
    /// A date cell was kept as text because it could not be parsed.
    UnparsableDate { field: String, value: String },
    /// A numeric cell was not a number and was replaced by zero.
    UnparsableNumber { field: String, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub record: InspectionRecord,
    pub diagnostics: Vec<Diagnostic>,
}

/// Canonical field name for a raw header: synonym table first, otherwise the
/// header with all whitespace removed.
pub fn canonical_field_name(raw: &str) -> String {
    match canonical_header(raw) {
        Some(field) => field.to_string(),
        None => raw.chars().filter(|c| !c.is_whitespace()).collect(),
    }
}

/// Normalize one spreadsheet row. Cells are taken in column order, which
/// decides the winner when two headers map to the same field.
pub fn normalize<I, K, V>(raw_row: I) -> NormalizedRow
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut diagnostics = Vec::new();

    // 1. header reconciliation
    // Column order is kept; a later duplicate replaces the cell in place.
    let mut cells: Vec<(String, String, String)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (header, value) in raw_row {
        let header = header.as_ref();
        let field = canonical_field_name(header);
        if field.is_empty() {
            continue;
        }
        let cell = (field.clone(), header.to_string(), value.as_ref().to_string());
        let previous = match positions.get(&field) {
            Some(&i) => Some(std::mem::replace(&mut cells[i], cell).1),
            None => {
                positions.insert(field.clone(), cells.len());
                cells.push(cell);
                None
            }
        };
        if let Some(dropped_header) = previous {
            warn!(
                field = %field,
                kept = %header,
                dropped = %dropped_header,
                "two columns map to the same field, keeping the later one"
            );
            diagnostics.push(Diagnostic::HeaderCollision {
                field,
                kept_header: header.to_string(),
                dropped_header,
            });
        }
    }

    let mut record = InspectionRecord::default();
    for (field, _, cell) in &cells {
        let value = if is_date_field(field) {
            // 2. date coercion
            coerce_date(field, cell, &mut diagnostics)
        } else if is_numeric_field(field) {
            // 3. numeric coercion
            coerce_numeric(field, cell, &mut diagnostics)
        } else {
            Value::String(cell.clone())
        };
        record.set(field, value);
    }

    // Fields missing from the sheet still read as zero on the typed record;
    // only `year` needs care because zero there means "absent".
    if record.year == Some(0) {
        record.year = None;
    }

    // 4. derived classification backfill
    if let Some(date) = record.date() {
        if record.year.is_none() {
            record.year = Some(date.year());
        }
        if record.month.is_none() {
            record.month = Some(month_name(date).to_string());
        }
    }

    debug!(
        fields = cells.len(),
        diagnostics = diagnostics.len(),
        "normalized row"
    );
    NormalizedRow { record, diagnostics }
}

fn coerce_date(field: &str, cell: &str, diagnostics: &mut Vec<Diagnostic>) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match parse_date_safe(Some(trimmed)) {
        Some(date) => Value::String(InspectionDate::Parsed(date).to_wire()),
        None => {
            diagnostics.push(Diagnostic::UnparsableDate {
                field: field.to_string(),
                value: cell.to_string(),
            });
            Value::String(cell.to_string())
        }
    }
}

fn coerce_numeric(field: &str, cell: &str, diagnostics: &mut Vec<Diagnostic>) -> Value {
    match parse_f64_safe(Some(cell)) {
        Some(n) => Value::from(n),
        None => {
            if !cell.trim().is_empty() {
                diagnostics.push(Diagnostic::UnparsableNumber {
                    field: field.to_string(),
                    value: cell.to_string(),
                });
            }
            Value::from(0.0)
        }
    }
}
