// Static field tables shared by the importer, the dashboard and the table view.
//
// Every list here uses the canonical camelCase wire names.
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const SELF_SET: &str = "Self Set";
pub const ALL: &str = "All";

pub const MAJOR_DEFECTS: &[&str] = &[
    "pulledTerry",
    "rawEdge",
    "weaving",
    "uncutThread",
    "stainMajor",
    "skipStitch",
    "brokenStitch",
    "runoffStitch",
    "poorShape",
    "pleat",
    "insecureLabel",
    "missingLabel",
    "contaminationMajor",
    "slantLabel",
    "damageFabric",
    "hole",
    "looseStitch",
];

pub const MINOR_DEFECTS: &[&str] = &[
    "singleUntrimmedThread",
    "contaminationMinor",
    "flyYarn",
    "dustMark",
    "stainMinor",
];

pub const PROCESS_DEFECTS: &[&str] = &["lassar", "patta", "shadeOut"];

/// Summary counters that precede the physical defect counters in the table's
/// "Total Defects" sum.
pub const SUMMARY_DEFECTS: &[&str] = &[
    "major",
    "minor",
    "critical",
    "actualMajor",
    "actualMinor",
    "actualOql",
];

/// Radar categories. Fields may belong to more than one category.
pub const DEFECT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Stitching",
        &[
            "pulledTerry",
            "rawEdge",
            "weaving",
            "uncutThread",
            "stainMajor",
            "skipStitch",
            "brokenStitch",
            "runoffStitch",
            "poorShape",
            "pleat",
            "insecureLabel",
            "missingLabel",
            "slantLabel",
            "damageFabric",
            "hole",
            "looseStitch",
            "shortSize",
        ],
    ),
    ("Workmanship", &["uncutThread", "stainMinor", "damageFabric", "hole"]),
    ("Process", &["lassar", "patta", "shadeOut"]),
    (
        "Weaving",
        &["misPick", "doublePick", "flyYarn", "contaminationMajor", "contaminationMinor"],
    ),
];

/// Radar-only fields that are not typed counters on the record.
pub const UNTYPED_DEFECTS: &[&str] = &["shortSize", "misPick", "doublePick"];

/// Scalar numeric fields of a record besides the defect counters.
pub const NUMERIC_SCALARS: &[&str] = &[
    "year",
    "offeredQtyCtn",
    "offeredQtyPacks",
    "noOfInspection",
    "pass",
    "fail",
    "abort",
    "pending",
    "sampleSize",
    "major",
    "minor",
    "oql",
    "dpi",
    "percentAllowed",
    "critical",
    "actualMajor",
    "actualMinor",
    "actualOql",
];

pub const TEXT_FIELDS: &[&str] = &[
    "serialNo",
    "inspectionId",
    "month",
    "servicePerformed",
    "inspectionType",
    "bvFinal",
    "aktiSelf",
    "inspectorName",
    "customer",
    "inspectionStatus",
];

pub const DATE_FIELDS: &[&str] = &["inspectionDate"];

pub const DISPOSITION_FIELDS: &[&str] = &["pass", "fail", "abort", "pending"];

/// Columns offered by the export, in order. Only columns present in at least
/// one record are emitted.
pub const EXPORT_COLUMNS: &[&str] = &[
    "inspectionId",
    "inspectionDate",
    "year",
    "month",
    "inspectorName",
    "inspectionStatus",
    "pass",
    "fail",
    "abort",
    "pending",
];

/// Keys hidden from the table view.
pub const HIDDEN_COLUMNS: &[&str] = &[
    "_id",
    "__v",
    "createdAt",
    "updatedAt",
    "oqlUserProvided",
    "dpiUserProvided",
    "actualOqlUserProvided",
];

/// Keys stripped from a record before it is sent as a replacement.
pub const SERVER_METADATA: &[&str] = &["_id", "__v"];

/// Every numeric field coerced during import: scalars then defect counters.
pub static NUMERIC_FIELDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    NUMERIC_SCALARS
        .iter()
        .chain(MAJOR_DEFECTS)
        .chain(MINOR_DEFECTS)
        .chain(PROCESS_DEFECTS)
        .copied()
        .collect()
});

/// Fields summed into the table's per-record "Total Defects".
pub static TOTAL_DEFECT_FIELDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    SUMMARY_DEFECTS
        .iter()
        .chain(MAJOR_DEFECTS)
        .chain(MINOR_DEFECTS)
        .chain(PROCESS_DEFECTS)
        .copied()
        .collect()
});

/// Entry form layout: section title and its fields, in display order.
pub const FORM_SECTIONS: &[(&str, &[&str])] = &[
    (
        "BASIC INFORMATION",
        &[
            "serialNo",
            "year",
            "month",
            "inspectionId",
            "inspectionDate",
            "servicePerformed",
            "inspectionType",
            "customer",
            "dpi",
            "bvFinal",
            "aktiSelf",
            "inspectorName",
            "offeredQtyCtn",
            "offeredQtyPacks",
            "noOfInspection",
            "pass",
            "fail",
            "abort",
            "pending",
            "inspectionStatus",
            "sampleSize",
        ],
    ),
    ("REQUIRED OQL 2.5 (M) / 4.0 (m)", &["major", "minor", "oql", "percentAllowed"]),
    ("ACTUAL FINDINGS", &["critical", "actualMajor", "actualMinor", "actualOql"]),
    ("MAJOR DEFECTS DETAILS", MAJOR_DEFECTS),
    ("PROCESS DEFECTS DETAILS", PROCESS_DEFECTS),
    ("MINOR DEFECTS DETAILS", MINOR_DEFECTS),
];

// Spellings seen in exported sheets that the camelCase split does not cover.
const EXTRA_SYNONYMS: &[(&str, &str)] = &[
    ("stain", "stainMinor"),
    ("s no", "serialNo"),
    ("s.no", "serialNo"),
    ("sr no", "serialNo"),
    ("serial no.", "serialNo"),
    ("serial number", "serialNo"),
    ("inspection no", "inspectionId"),
    ("inspection no.", "inspectionId"),
    ("date", "inspectionDate"),
    ("inspection date (yyyy-mm-dd)", "inspectionDate"),
    ("inspector", "inspectorName"),
    ("status", "inspectionStatus"),
    ("type", "inspectionType"),
    ("% allowed", "percentAllowed"),
    ("percent allowed", "percentAllowed"),
    ("offered qty (ctn)", "offeredQtyCtn"),
    ("offered qty (packs)", "offeredQtyPacks"),
    ("no. of inspection", "noOfInspection"),
    ("no of inspections", "noOfInspection"),
    ("bv / final", "bvFinal"),
    ("akti / self", "aktiSelf"),
    ("run off stitch", "runoffStitch"),
    ("single untrimmed thread", "singleUntrimmedThread"),
    ("shade out", "shadeOut"),
    ("short size", "shortSize"),
    ("mis pick", "misPick"),
    ("double pick", "doublePick"),
];

/// Lowercase a header and collapse whitespace runs to a single space.
pub fn header_lookup_key(header: &str) -> String {
    header.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Split a camelCase key into lowercase words: `offeredQtyCtn` -> `offered qty ctn`.
pub fn split_camel(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push(' ');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

/// Human-readable label for a canonical field: `offeredQtyCtn` -> `offered Qty Ctn`.
pub fn field_label(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

fn canonical_fields() -> impl Iterator<Item = &'static str> {
    NUMERIC_SCALARS
        .iter()
        .chain(TEXT_FIELDS)
        .chain(DATE_FIELDS)
        .chain(MAJOR_DEFECTS)
        .chain(MINOR_DEFECTS)
        .chain(PROCESS_DEFECTS)
        .chain(UNTYPED_DEFECTS)
        .copied()
}

/// Header synonym table: normalized header -> canonical field name.
pub static HEADER_SYNONYMS: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for field in canonical_fields() {
        map.insert(split_camel(field), field);
        map.insert(field.to_lowercase(), field);
    }
    for (variant, field) in EXTRA_SYNONYMS {
        map.insert(header_lookup_key(variant), *field);
    }
    map
});

/// Resolve a raw spreadsheet header to its canonical field name, if known.
pub fn canonical_header(raw: &str) -> Option<&'static str> {
    let key = header_lookup_key(raw);
    if let Some(field) = HEADER_SYNONYMS.get(&key) {
        return Some(*field);
    }
    let compact: String = key.chars().filter(|c| !c.is_whitespace()).collect();
    HEADER_SYNONYMS.get(&compact).copied()
}

pub fn is_numeric_field(key: &str) -> bool {
    NUMERIC_FIELDS.contains(&key)
}

pub fn is_date_field(key: &str) -> bool {
    DATE_FIELDS.contains(&key)
}
