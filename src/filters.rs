//! Dashboard filters.
//!
//! A filter is a conjunction of equality checks, each of which may be the
//! wildcard `All`. Absent values compare as `Self Set`, the same label the
//! grouping code uses, so every option offered can actually be selected.

use crate::fields::{ALL, SELF_SET};
use crate::types::InspectionRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterSpec {
    pub year: String,
    pub month: String,
    pub inspector: String,
    pub inspection_type: String,
    pub customer: String,
    pub status: String,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            year: ALL.to_string(),
            month: ALL.to_string(),
            inspector: ALL.to_string(),
            inspection_type: ALL.to_string(),
            customer: ALL.to_string(),
            status: ALL.to_string(),
        }
    }
}

fn selects(selected: &str, value: &str) -> bool {
    selected == ALL || selected == value
}

impl FilterSpec {
    pub fn is_unfiltered(&self) -> bool {
        *self == FilterSpec::default()
    }

    pub fn matches(&self, record: &InspectionRecord) -> bool {
        selects(&self.year, &record.year_key())
            && selects(&self.month, record.month_key())
            && selects(&self.inspector, record.inspector_key())
            && selects(&self.inspection_type, record.inspection_type_key())
            && selects(&self.customer, record.customer_key())
            && status_matches(&self.status, record.status_key())
    }

    pub fn apply<'a>(&self, records: &'a [InspectionRecord]) -> Vec<&'a InspectionRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Map a raw status to the label shown in the status picker.
/// `Passed`/`Pass` become `Pass`, `Failed`/`Fail` become `Fail`, and
/// `Aborted` is not offered at all.
pub fn display_status(raw: &str) -> Option<String> {
    match raw.trim().to_lowercase().as_str() {
        "aborted" => None,
        "passed" | "pass" => Some("Pass".to_string()),
        "failed" | "fail" => Some("Fail".to_string()),
        _ => Some(raw.to_string()),
    }
}

fn status_matches(selected: &str, raw: &str) -> bool {
    let raw_lower = raw.trim().to_lowercase();
    match selected {
        ALL => true,
        "Pass" => raw_lower == "pass" || raw_lower == "passed",
        "Fail" => raw_lower == "fail" || raw_lower == "failed",
        other => raw == other,
    }
}

/// Picker contents for each filter, `All` first, then values in the order
/// they first appear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub years: Vec<String>,
    pub months: Vec<String>,
    pub inspectors: Vec<String>,
    pub inspection_types: Vec<String>,
    pub customers: Vec<String>,
    pub statuses: Vec<String>,
}

fn distinct<I: IntoIterator<Item = String>>(values: I) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = vec![ALL.to_string()];
    for v in values {
        if seen.insert(v.clone()) {
            out.push(v);
        }
    }
    out
}

impl FilterOptions {
    pub fn from_records(records: &[InspectionRecord]) -> Self {
        Self {
            years: distinct(records.iter().map(|r| r.year_key())),
            months: distinct(records.iter().map(|r| r.month_key().to_string())),
            inspectors: distinct(records.iter().map(|r| r.inspector_key().to_string())),
            inspection_types: distinct(records.iter().map(|r| r.inspection_type_key().to_string())),
            customers: distinct(records.iter().map(|r| r.customer_key().to_string())),
            statuses: distinct(records.iter().filter_map(|r| display_status(r.status_key()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(month: Option<&str>, status: Option<&str>, inspector: Option<&str>) -> InspectionRecord {
        InspectionRecord {
            year: Some(2024),
            month: month.map(String::from),
            inspection_status: status.map(String::from),
            inspector_name: inspector.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn pass_selection_matches_passed_and_pass() {
        let records = vec![
            rec(Some("May"), Some("Passed"), None),
            rec(Some("May"), Some("Pass"), None),
            rec(Some("May"), Some("Fail"), None),
        ];
        let spec = FilterSpec {
            status: "Pass".into(),
            ..Default::default()
        };
        assert_eq!(spec.apply(&records).len(), 2);
    }

    #[test]
    fn missing_values_filter_as_self_set() {
        let records = vec![rec(None, None, None), rec(Some("June"), None, Some("Asif"))];
        let spec = FilterSpec {
            month: SELF_SET.into(),
            ..Default::default()
        };
        assert_eq!(spec.apply(&records).len(), 1);
        let spec = FilterSpec {
            inspector: "Asif".into(),
            year: "2024".into(),
            ..Default::default()
        };
        assert_eq!(spec.apply(&records).len(), 1);
    }

    #[test]
    fn options_hide_aborted_and_merge_spellings() {
        let records = vec![
            rec(Some("May"), Some("Passed"), None),
            rec(Some("May"), Some("Aborted"), None),
            rec(Some("June"), Some("Pass"), None),
            rec(None, None, None),
        ];
        let options = FilterOptions::from_records(&records);
        assert_eq!(options.statuses, vec!["All", "Pass", "Self Set"]);
        assert_eq!(options.months, vec!["All", "May", "June", "Self Set"]);
        assert_eq!(options.years, vec!["All", "2024"]);
    }

    #[test]
    fn aborted_records_still_count_under_all() {
        let records = vec![rec(None, Some("Aborted"), None)];
        assert_eq!(FilterSpec::default().apply(&records).len(), 1);
        assert!(FilterSpec::default().is_unfiltered());
    }
}
