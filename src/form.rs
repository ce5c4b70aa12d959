//! Inspection entry and edit drafts.
//!
//! A draft holds the form as text cells, exactly as typed. Disposition cells
//! are mutually exclusive, and the quality indices derive from their inputs
//! until the user types into them.

use crate::error::ValidationError;
use crate::fields::{field_label, FORM_SECTIONS, PROCESS_DEFECTS};
use crate::normalize::normalize;
use crate::table::render_cell;
use crate::types::{DerivedOverrides, Disposition, InspectionRecord, Overridable};
use crate::util::{coerce_number, MONTH_NAMES};
use std::collections::BTreeMap;

const DERIVED_FIELDS: [&str; 3] = ["oql", "dpi", "actualOql"];
/// Cells the derived indices are computed from.
const INDEX_INPUTS: [&str; 3] = ["sampleSize", "major", "actualMajor"];

#[derive(Debug, Clone, PartialEq)]
pub struct InspectionDraft {
    values: BTreeMap<&'static str, String>,
    oql: Overridable<String>,
    dpi: Overridable<String>,
    actual_oql: Overridable<String>,
    /// Record being edited; its id and unknown keys survive the save.
    base: Option<InspectionRecord>,
}

fn form_fields() -> impl Iterator<Item = &'static str> {
    FORM_SECTIONS.iter().flat_map(|(_, fields)| fields.iter().copied())
}

/// `defects / sample * 100` with two decimals, blank without a sample.
fn derive_index(defects: f64, sample: f64) -> String {
    if sample > 0.0 {
        format!("{:.2}", defects / sample * 100.0)
    } else {
        String::new()
    }
}

impl InspectionDraft {
    /// Blank entry form for `year`; the month starts at January and process
    /// defects at zero.
    pub fn new(year: i32) -> Self {
        let mut values: BTreeMap<&'static str, String> = form_fields()
            .filter(|f| !DERIVED_FIELDS.contains(f))
            .map(|f| (f, String::new()))
            .collect();
        values.insert("year", year.to_string());
        values.insert("month", MONTH_NAMES[0].to_string());
        for f in PROCESS_DEFECTS {
            values.insert(f, "0".to_string());
        }
        Self {
            values,
            oql: Overridable::default(),
            dpi: Overridable::default(),
            actual_oql: Overridable::default(),
            base: None,
        }
    }

    /// Draft for editing an existing record. Indices the record marks as
    /// typed by hand stay fixed; the others follow their inputs again.
    pub fn from_record(record: &InspectionRecord) -> Self {
        let map = record.to_json_map();
        let cell = |key: &str| match map.get(key) {
            Some(v) if !v.is_null() => render_cell(key, Some(v)),
            _ => String::new(),
        };
        let values = form_fields()
            .filter(|f| !DERIVED_FIELDS.contains(f))
            .map(|f| (f, cell(f)))
            .collect();
        let restore = |key: &str| {
            record
                .derived_index(key)
                .unwrap_or_default()
                .map(|v| format!("{:.2}", v))
        };

        Self {
            values,
            oql: restore("oql"),
            dpi: restore("dpi"),
            actual_oql: restore("actualOql"),
            base: Some(record.clone()),
        }
    }

    pub fn get(&self, field: &str) -> &str {
        match field {
            "oql" => &self.oql.value,
            "dpi" => &self.dpi.value,
            "actualOql" => &self.actual_oql.value,
            _ => self.values.get(field).map(String::as_str).unwrap_or(""),
        }
    }

    pub fn is_overridden(&self, field: &str) -> bool {
        match field {
            "oql" => self.oql.user_provided,
            "dpi" => self.dpi.user_provided,
            "actualOql" => self.actual_oql.user_provided,
            _ => false,
        }
    }

    /// Apply one keystroke-level edit.
    pub fn set(&mut self, field: &str, value: &str) -> Result<(), ValidationError> {
        if let Some(disposition) = Disposition::from_key(field) {
            return self.set_disposition_cell(disposition, value);
        }
        match field {
            "oql" => self.oql.set_manual(value.to_string()),
            "dpi" => self.dpi.set_manual(value.to_string()),
            "actualOql" => self.actual_oql.set_manual(value.to_string()),
            _ => {
                if let Some(slot) = self.values.get_mut(field) {
                    *slot = value.to_string();
                } else if let Some(key) = form_fields().find(|f| *f == field) {
                    self.values.insert(key, value.to_string());
                }
            }
        }
        if INDEX_INPUTS.contains(&field) {
            self.recompute();
        }
        Ok(())
    }

    fn set_disposition_cell(&mut self, disposition: Disposition, value: &str) -> Result<(), ValidationError> {
        match value {
            "1" => {
                for other in Disposition::ALL {
                    let cell = if other == disposition { "1" } else { "0" };
                    self.values.insert(other.key(), cell.to_string());
                }
                self.values
                    .insert("inspectionStatus", disposition.label().to_string());
            }
            "0" | "" => {
                self.values.insert(disposition.key(), value.to_string());
            }
            other => return Err(ValidationError::InvalidDisposition(other.to_string())),
        }
        Ok(())
    }

    fn recompute(&mut self) {
        let sample = coerce_number(self.get("sampleSize"));
        let major = coerce_number(self.get("major"));
        let actual_major = coerce_number(self.get("actualMajor"));
        self.oql.recompute(|| derive_index(major, sample));
        self.dpi.recompute(|| derive_index(major, sample));
        self.actual_oql.recompute(|| derive_index(actual_major, sample));
    }

    /// Every field filled in, and cartons not exceeding packs.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(empty) = form_fields().find(|f| self.get(f).trim().is_empty()) {
            return Err(ValidationError::MissingField(field_label(empty)));
        }
        let ctn = coerce_number(self.get("offeredQtyCtn"));
        let packs = coerce_number(self.get("offeredQtyPacks"));
        if ctn > packs {
            return Err(ValidationError::CtnExceedsPacks);
        }
        Ok(())
    }

    /// Convert the cells into a record through the import coercion rules.
    fn to_record(&self) -> InspectionRecord {
        let cells = form_fields().map(|f| (f, self.get(f)));
        let mut record = normalize(cells).record;
        record.overrides = DerivedOverrides {
            oql: self.oql.user_provided,
            dpi: self.dpi.user_provided,
            actual_oql: self.actual_oql.user_provided,
        };
        if let Some(base) = &self.base {
            record.id = base.id.clone();
            for (key, value) in &base.extra {
                record.extra.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        record
    }

    /// Validated record for a new inspection.
    pub fn submit(&self) -> Result<InspectionRecord, ValidationError> {
        self.validate()?;
        Ok(self.to_record())
    }

    /// Replacement record for an edit. Edits are saved as typed; only the
    /// carton/pack rule is enforced.
    pub fn save_edit(&self) -> Result<InspectionRecord, ValidationError> {
        let ctn = coerce_number(self.get("offeredQtyCtn"));
        let packs = coerce_number(self.get("offeredQtyPacks"));
        if ctn > packs {
            return Err(ValidationError::CtnExceedsPacks);
        }
        Ok(self.to_record())
    }
}
