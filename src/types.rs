use crate::fields::SELF_SET;
use crate::util::{coerce_number, format_count, month_name, parse_date_safe, parse_i32_safe};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use tabled::Tabled;

// Lenient conversions for values arriving from the data service or a sheet.
// Numbers may come as strings, strings as numbers, anything may be null.
pub(crate) mod lenient {
    use super::*;

    pub fn value_to_f64(v: &Value) -> f64 {
        match v {
            Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
            Value::String(s) => coerce_number(s),
            Value::Bool(b) => f64::from(u8::from(*b)),
            _ => 0.0,
        }
    }

    pub fn value_to_text(v: &Value) -> Option<String> {
        match v {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn value_to_i32(v: &Value) -> Option<i32> {
        match v {
            Value::Number(n) => match n.as_i64() {
                Some(i) => i32::try_from(i).ok(),
                None => n
                    .as_f64()
                    .map(f64::trunc)
                    .filter(|f| (f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(f))
                    .map(|f| f as i32),
            },
            Value::String(s) => parse_i32_safe(Some(s)),
            _ => None,
        }
    }

    pub fn value_to_flag(v: &Value) -> bool {
        match v {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
            Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
            _ => false,
        }
    }

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(value_to_flag(&Value::deserialize(d)?))
    }

    pub fn is_false(b: &bool) -> bool {
        !*b
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(value_to_f64(&Value::deserialize(d)?))
    }

    pub fn opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(value_to_text(&Value::deserialize(d)?))
    }

    pub fn opt_i32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i32>, D::Error> {
        Ok(value_to_i32(&Value::deserialize(d)?))
    }

    pub fn opt_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<InspectionDate>, D::Error> {
        Ok(InspectionDate::from_value(&Value::deserialize(d)?))
    }
}

/// Inspection date as stored on a record. Cells that could not be parsed are
/// kept verbatim so they can be corrected by hand later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectionDate {
    Parsed(NaiveDate),
    Raw(String),
}

impl InspectionDate {
    pub fn parse(s: &str) -> Self {
        match parse_date_safe(Some(s)) {
            Some(d) => InspectionDate::Parsed(d),
            None => InspectionDate::Raw(s.to_string()),
        }
    }

    fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(Self::parse(s)),
            Value::Number(n) => Some(Self::parse(&n.to_string())),
            _ => None,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            InspectionDate::Parsed(d) => Some(*d),
            InspectionDate::Raw(_) => None,
        }
    }

    /// Wire form: ISO-8601 timestamp at UTC midnight, or the raw text.
    pub fn to_wire(&self) -> String {
        match self {
            InspectionDate::Parsed(d) => format!("{}T00:00:00.000Z", d.format("%Y-%m-%d")),
            InspectionDate::Raw(s) => s.clone(),
        }
    }
}

impl fmt::Display for InspectionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectionDate::Parsed(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            InspectionDate::Raw(s) => f.write_str(s),
        }
    }
}

impl Serialize for InspectionDate {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_wire())
    }
}

/// A derived value that the user may override by hand. Once overridden the
/// value is never recomputed from its inputs again.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Overridable<T> {
    pub value: T,
    pub user_provided: bool,
}

impl<T> Overridable<T> {
    pub fn derived(value: T) -> Self {
        Self { value, user_provided: false }
    }

    pub fn manual(value: T) -> Self {
        Self { value, user_provided: true }
    }

    pub fn set_manual(&mut self, value: T) {
        self.value = value;
        self.user_provided = true;
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Overridable<U> {
        Overridable {
            value: f(self.value),
            user_provided: self.user_provided,
        }
    }

    /// Replace the value with `compute()` unless the user entered it.
    pub fn recompute(&mut self, compute: impl FnOnce() -> T) {
        if !self.user_provided {
            self.value = compute();
        }
    }
}

/// Mutually exclusive outcome of an inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Disposition {
    Pass,
    Fail,
    Abort,
    Pending,
}

impl Disposition {
    pub const ALL: [Disposition; 4] = [
        Disposition::Pass,
        Disposition::Fail,
        Disposition::Abort,
        Disposition::Pending,
    ];

    /// Counter field name on the record.
    pub fn key(self) -> &'static str {
        match self {
            Disposition::Pass => "pass",
            Disposition::Fail => "fail",
            Disposition::Abort => "abort",
            Disposition::Pending => "pending",
        }
    }

    /// Value written to `inspectionStatus`.
    pub fn label(self) -> &'static str {
        match self {
            Disposition::Pass => "Pass",
            Disposition::Fail => "Fail",
            Disposition::Abort => "Abort",
            Disposition::Pending => "Pending",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }
}

// Generates the typed defect counters together with key-based access, so the
// wire names live in exactly one place.
macro_rules! defect_counters {
    ($($field:ident => $key:literal),* $(,)?) => {
        /// Physical defect tallies of one inspection.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct DefectCounts {
            $(
                #[serde(rename = $key, default, deserialize_with = "lenient::number")]
                pub $field: f64,
            )*
        }

        impl DefectCounts {
            pub fn get(&self, key: &str) -> Option<f64> {
                match key {
                    $($key => Some(self.$field),)*
                    _ => None,
                }
            }

            /// Returns `false` when `key` is not a defect counter.
            pub fn set(&mut self, key: &str, value: f64) -> bool {
                match key {
                    $($key => { self.$field = value; true })*
                    _ => false,
                }
            }
        }
    };
}

defect_counters! {
    pulled_terry => "pulledTerry",
    raw_edge => "rawEdge",
    weaving => "weaving",
    uncut_thread => "uncutThread",
    stain_major => "stainMajor",
    skip_stitch => "skipStitch",
    broken_stitch => "brokenStitch",
    runoff_stitch => "runoffStitch",
    poor_shape => "poorShape",
    pleat => "pleat",
    insecure_label => "insecureLabel",
    missing_label => "missingLabel",
    contamination_major => "contaminationMajor",
    slant_label => "slantLabel",
    damage_fabric => "damageFabric",
    hole => "hole",
    loose_stitch => "looseStitch",
    single_untrimmed_thread => "singleUntrimmedThread",
    contamination_minor => "contaminationMinor",
    fly_yarn => "flyYarn",
    dust_mark => "dustMark",
    stain_minor => "stainMinor",
    lassar => "lassar",
    patta => "patta",
    shade_out => "shadeOut",
}

/// Which quality indices on a record were typed by hand. Persisted with the
/// record so a later edit keeps them fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedOverrides {
    #[serde(rename = "oqlUserProvided", default, skip_serializing_if = "lenient::is_false", deserialize_with = "lenient::flag")]
    pub oql: bool,
    #[serde(rename = "dpiUserProvided", default, skip_serializing_if = "lenient::is_false", deserialize_with = "lenient::flag")]
    pub dpi: bool,
    #[serde(rename = "actualOqlUserProvided", default, skip_serializing_if = "lenient::is_false", deserialize_with = "lenient::flag")]
    pub actual_oql: bool,
}

/// One inspection as exchanged with the data service.
///
/// Every numeric field is zero when absent or unparsable. Keys outside the
/// known schema are kept in `extra` and round-trip unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionRecord {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub serial_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub inspection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_i32")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub month: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_date")]
    pub inspection_date: Option<InspectionDate>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub service_performed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub inspection_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub bv_final: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub akti_self: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub inspector_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub customer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_text")]
    pub inspection_status: Option<String>,

    #[serde(default, deserialize_with = "lenient::number")]
    pub offered_qty_ctn: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub offered_qty_packs: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub no_of_inspection: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub pass: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub fail: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub abort: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub pending: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub sample_size: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub major: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub minor: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub oql: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub dpi: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub percent_allowed: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub critical: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub actual_major: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub actual_minor: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub actual_oql: f64,

    #[serde(flatten)]
    pub defects: DefectCounts,

    #[serde(flatten)]
    pub overrides: DerivedOverrides,

    /// Unknown keys in the order they were first seen.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InspectionRecord {
    /// Numeric value of a field by wire name. Unknown keys fall back to the
    /// extra map with the zero-fill policy; `None` only when the key is absent
    /// everywhere.
    pub fn number(&self, key: &str) -> Option<f64> {
        let typed = match key {
            "year" => Some(self.effective_year().map(f64::from).unwrap_or(0.0)),
            "offeredQtyCtn" => Some(self.offered_qty_ctn),
            "offeredQtyPacks" => Some(self.offered_qty_packs),
            "noOfInspection" => Some(self.no_of_inspection),
            "pass" => Some(self.pass),
            "fail" => Some(self.fail),
            "abort" => Some(self.abort),
            "pending" => Some(self.pending),
            "sampleSize" => Some(self.sample_size),
            "major" => Some(self.major),
            "minor" => Some(self.minor),
            "oql" => Some(self.oql),
            "dpi" => Some(self.dpi),
            "percentAllowed" => Some(self.percent_allowed),
            "critical" => Some(self.critical),
            "actualMajor" => Some(self.actual_major),
            "actualMinor" => Some(self.actual_minor),
            "actualOql" => Some(self.actual_oql),
            _ => self.defects.get(key),
        };
        typed.or_else(|| self.extra.get(key).map(lenient::value_to_f64))
    }

    /// Numeric value with the zero-fill policy applied.
    pub fn count(&self, key: &str) -> f64 {
        self.number(key).unwrap_or(0.0)
    }

    /// Assign a field by wire name. Known fields are converted leniently,
    /// anything else lands in `extra` untouched.
    pub fn set(&mut self, key: &str, value: Value) {
        use lenient::{value_to_f64 as num, value_to_text as text};
        match key {
            "_id" => self.id = text(&value),
            "serialNo" => self.serial_no = text(&value),
            "inspectionId" => self.inspection_id = text(&value),
            "year" => self.year = lenient::value_to_i32(&value),
            "month" => self.month = text(&value),
            "inspectionDate" => self.inspection_date = InspectionDate::from_value(&value),
            "servicePerformed" => self.service_performed = text(&value),
            "inspectionType" => self.inspection_type = text(&value),
            "bvFinal" => self.bv_final = text(&value),
            "aktiSelf" => self.akti_self = text(&value),
            "inspectorName" => self.inspector_name = text(&value),
            "customer" => self.customer = text(&value),
            "inspectionStatus" => self.inspection_status = text(&value),
            "offeredQtyCtn" => self.offered_qty_ctn = num(&value),
            "offeredQtyPacks" => self.offered_qty_packs = num(&value),
            "noOfInspection" => self.no_of_inspection = num(&value),
            "pass" => self.pass = num(&value),
            "fail" => self.fail = num(&value),
            "abort" => self.abort = num(&value),
            "pending" => self.pending = num(&value),
            "sampleSize" => self.sample_size = num(&value),
            "major" => self.major = num(&value),
            "minor" => self.minor = num(&value),
            "oql" => self.oql = num(&value),
            "dpi" => self.dpi = num(&value),
            "percentAllowed" => self.percent_allowed = num(&value),
            "critical" => self.critical = num(&value),
            "actualMajor" => self.actual_major = num(&value),
            "actualMinor" => self.actual_minor = num(&value),
            "actualOql" => self.actual_oql = num(&value),
            "oqlUserProvided" => self.overrides.oql = lenient::value_to_flag(&value),
            "dpiUserProvided" => self.overrides.dpi = lenient::value_to_flag(&value),
            "actualOqlUserProvided" => self.overrides.actual_oql = lenient::value_to_flag(&value),
            _ => {
                if !self.defects.set(key, num(&value)) {
                    self.extra.insert(key.to_string(), value);
                }
            }
        }
    }

    /// `oql`, `dpi` or `actualOql` together with its hand-typed flag.
    pub fn derived_index(&self, key: &str) -> Option<Overridable<f64>> {
        let (value, user_provided) = match key {
            "oql" => (self.oql, self.overrides.oql),
            "dpi" => (self.dpi, self.overrides.dpi),
            "actualOql" => (self.actual_oql, self.overrides.actual_oql),
            _ => return None,
        };
        Some(Overridable { value, user_provided })
    }

    /// Set one disposition to 1, the other three to 0, and align the status.
    pub fn set_disposition(&mut self, disposition: Disposition) {
        self.pass = 0.0;
        self.fail = 0.0;
        self.abort = 0.0;
        self.pending = 0.0;
        match disposition {
            Disposition::Pass => self.pass = 1.0,
            Disposition::Fail => self.fail = 1.0,
            Disposition::Abort => self.abort = 1.0,
            Disposition::Pending => self.pending = 1.0,
        }
        self.inspection_status = Some(disposition.label().to_string());
    }

    pub fn disposition(&self) -> Option<Disposition> {
        let set: Vec<Disposition> = Disposition::ALL
            .into_iter()
            .filter(|d| self.count(d.key()) == 1.0)
            .collect();
        match set.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.inspection_date.as_ref().and_then(InspectionDate::date)
    }

    /// Explicit year, else the calendar year of the inspection date.
    pub fn effective_year(&self) -> Option<i32> {
        self.year.or_else(|| self.date().map(|d| d.year()))
    }

    pub fn year_key(&self) -> String {
        self.effective_year()
            .map(|y| y.to_string())
            .unwrap_or_else(|| SELF_SET.to_string())
    }

    /// Explicit month, else the month of the inspection date.
    pub fn month_key(&self) -> &str {
        self.month
            .as_deref()
            .or_else(|| self.date().map(month_name))
            .unwrap_or(SELF_SET)
    }

    pub fn inspector_key(&self) -> &str {
        self.inspector_name.as_deref().unwrap_or(SELF_SET)
    }

    pub fn status_key(&self) -> &str {
        self.inspection_status.as_deref().unwrap_or(SELF_SET)
    }

    pub fn customer_key(&self) -> &str {
        self.customer.as_deref().unwrap_or(SELF_SET)
    }

    pub fn inspection_type_key(&self) -> &str {
        self.inspection_type.as_deref().unwrap_or(SELF_SET)
    }

    /// Precomputed quality level carried by the record, if any.
    /// `actualOql` wins over `oql`; zero means "not provided".
    pub fn stored_oql(&self) -> Option<f64> {
        [self.actual_oql, self.oql].into_iter().find(|v| *v > 0.0)
    }

    pub fn stored_dpi(&self) -> Option<f64> {
        Some(self.dpi).filter(|v| *v > 0.0)
    }

    /// Wire representation as a JSON object.
    pub fn to_json_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Body for a full-record replace: server metadata stripped.
    pub fn to_payload(&self) -> Value {
        let mut map = self.to_json_map();
        for key in crate::fields::SERVER_METADATA {
            map.remove(*key);
        }
        Value::Object(map)
    }
}

fn display_count(v: &f64) -> String {
    format_count(*v)
}

fn display_2dp(v: &f64) -> String {
    format!("{:.2}", v)
}

/// Headline numbers of the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct KpiSummary {
    #[tabled(rename = "Total Inspections")]
    pub total: usize,
    #[tabled(rename = "Pass", display_with = "display_count")]
    pub total_pass: f64,
    #[tabled(rename = "Fail", display_with = "display_count")]
    pub total_fail: f64,
    #[tabled(rename = "Abort", display_with = "display_count")]
    pub total_abort: f64,
    #[tabled(rename = "Pending", display_with = "display_count")]
    pub total_pending: f64,
    /// Sum of `actualMajor`: qualifying major defects only.
    #[tabled(rename = "Total Defects", display_with = "display_count")]
    pub total_defects: f64,
    #[tabled(rename = "OQL", display_with = "display_2dp")]
    pub actual_oql: f64,
    #[tabled(rename = "Pass Rate (%)", display_with = "display_2dp")]
    pub pass_rate: f64,
    #[tabled(rename = "Fail Rate (%)", display_with = "display_2dp")]
    pub fail_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct MonthlyStatusRow {
    #[tabled(rename = "Month")]
    pub month: String,
    #[tabled(rename = "Pass", display_with = "display_count")]
    pub pass: f64,
    #[tabled(rename = "Fail", display_with = "display_count")]
    pub fail: f64,
    #[tabled(rename = "Abort", display_with = "display_count")]
    pub abort: f64,
    #[tabled(rename = "Pending", display_with = "display_count")]
    pub pending: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
#[serde(rename_all = "camelCase")]
pub struct InspectorRow {
    #[tabled(rename = "Inspector")]
    pub inspector_name: String,
    #[tabled(rename = "Pass", display_with = "display_count")]
    pub pass: f64,
    #[tabled(rename = "Fail", display_with = "display_count")]
    pub fail: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CriticalTrendRow {
    #[tabled(rename = "Month")]
    pub month: String,
    #[tabled(rename = "Critical", display_with = "display_count")]
    pub critical: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DefectRatioRow {
    #[tabled(rename = "Month")]
    pub month: String,
    #[serde(rename = "Major")]
    #[tabled(rename = "Major", display_with = "display_count")]
    pub major: f64,
    #[serde(rename = "Minor")]
    #[tabled(rename = "Minor", display_with = "display_count")]
    pub minor: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct StatusTrendRow {
    #[tabled(rename = "Month")]
    pub month: String,
    #[tabled(rename = "Abort", display_with = "display_count")]
    pub abort: f64,
    #[tabled(rename = "Pending", display_with = "display_count")]
    pub pending: f64,
}

/// How a month's quality index was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendMode {
    /// Mean of the values stored on the records.
    Stored,
    /// `sum(defects) / sum(sampleSize) * 100` over the bucket.
    Weighted,
}

impl fmt::Display for TrendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendMode::Stored => f.write_str("stored"),
            TrendMode::Weighted => f.write_str("weighted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct QualityTrendRow {
    #[tabled(rename = "Month")]
    pub month: String,
    #[tabled(rename = "Value", display_with = "display_2dp")]
    pub value: f64,
    #[tabled(rename = "Mode")]
    pub mode: TrendMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DefectDetail {
    pub name: String,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRadarEntry {
    pub category: String,
    pub count: f64,
    pub details: Vec<DefectDetail>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefectClass {
    Major,
    Minor,
}

impl fmt::Display for DefectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefectClass::Major => f.write_str("Major"),
            DefectClass::Minor => f.write_str("Minor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct DefectDistributionRow {
    #[tabled(rename = "Defect")]
    pub name: String,
    #[tabled(rename = "Class")]
    pub class: DefectClass,
    #[tabled(rename = "Count", display_with = "display_count")]
    pub count: f64,
}

/// Everything the dashboard renders, recomputed from scratch per filter change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardViewModel {
    pub kpi: KpiSummary,
    pub monthly_status: Vec<MonthlyStatusRow>,
    pub inspectors: Vec<InspectorRow>,
    pub critical_trend: Vec<CriticalTrendRow>,
    pub defect_ratio: Vec<DefectRatioRow>,
    pub status_trend: Vec<StatusTrendRow>,
    pub oql_trend: Vec<QualityTrendRow>,
    pub dpi_trend: Vec<QualityTrendRow>,
    pub category_radar: Vec<CategoryRadarEntry>,
    pub defects_distribution: Vec<DefectDistributionRow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_loose_server_documents() {
        let rec: InspectionRecord = serde_json::from_value(json!({
            "_id": "abc",
            "__v": 0,
            "year": "2024",
            "inspectionDate": "2024-03-05T00:00:00.000Z",
            "pass": "1",
            "fail": null,
            "sampleSize": "1,250",
            "rawEdge": 3,
            "remarks": "rework"
        }))
        .unwrap();
        assert_eq!(rec.id.as_deref(), Some("abc"));
        assert_eq!(rec.year, Some(2024));
        assert_eq!(rec.pass, 1.0);
        assert_eq!(rec.fail, 0.0);
        assert_eq!(rec.sample_size, 1250.0);
        assert_eq!(rec.defects.raw_edge, 3.0);
        assert_eq!(rec.extra.get("remarks"), Some(&json!("rework")));
        assert_eq!(rec.extra.get("__v"), Some(&json!(0)));
        assert!(!rec.extra.contains_key("rawEdge"));
    }

    #[test]
    fn payload_strips_server_metadata() {
        let mut rec = InspectionRecord {
            id: Some("abc".into()),
            ..Default::default()
        };
        rec.extra.insert("__v".into(), json!(3));
        rec.extra.insert("remarks".into(), json!("ok"));
        let payload = rec.to_payload();
        assert!(payload.get("_id").is_none());
        assert!(payload.get("__v").is_none());
        assert_eq!(payload["remarks"], json!("ok"));
    }

    #[test]
    fn setting_fail_clears_other_dispositions() {
        let mut rec = InspectionRecord {
            pass: 1.0,
            pending: 1.0,
            ..Default::default()
        };
        rec.set_disposition(Disposition::Fail);
        assert_eq!((rec.pass, rec.fail, rec.abort, rec.pending), (0.0, 1.0, 0.0, 0.0));
        assert_eq!(rec.inspection_status.as_deref(), Some("Fail"));
        assert_eq!(rec.disposition(), Some(Disposition::Fail));
    }

    #[test]
    fn overridden_values_survive_recompute() {
        let mut oql = Overridable::derived(1.0);
        oql.recompute(|| 2.0);
        assert_eq!(oql.value, 2.0);
        oql.set_manual(5.0);
        oql.recompute(|| 9.0);
        assert_eq!(oql.value, 5.0);
    }

    #[test]
    fn year_falls_back_to_date() {
        let rec = InspectionRecord {
            inspection_date: Some(InspectionDate::parse("2023-07-14")),
            ..Default::default()
        };
        assert_eq!(rec.effective_year(), Some(2023));
        assert_eq!(rec.month_key(), "July");
        assert_eq!(rec.year_key(), "2023");

        let raw = InspectionRecord {
            inspection_date: Some(InspectionDate::parse("soon")),
            ..Default::default()
        };
        assert_eq!(raw.month_key(), "Self Set");
        assert_eq!(raw.year_key(), "Self Set");
    }

    #[test]
    fn out_of_range_year_is_absent() {
        for year in [json!(4_294_967_297_i64), json!(1e12), json!(-3e10)] {
            let rec: InspectionRecord = serde_json::from_value(json!({ "year": year })).unwrap();
            assert_eq!(rec.year, None);
        }
        let rec: InspectionRecord = serde_json::from_value(json!({ "year": 2024.0 })).unwrap();
        assert_eq!(rec.year, Some(2024));
    }

    #[test]
    fn override_flags_round_trip() {
        let rec: InspectionRecord = serde_json::from_value(json!({
            "oql": 2, "oqlUserProvided": true, "dpiUserProvided": "false"
        }))
        .unwrap();
        assert_eq!(rec.derived_index("oql"), Some(Overridable::manual(2.0)));
        assert_eq!(rec.derived_index("dpi"), Some(Overridable::derived(0.0)));
        assert!(!rec.extra.contains_key("oqlUserProvided"));

        let wire = serde_json::to_value(&rec).unwrap();
        assert_eq!(wire["oqlUserProvided"], json!(true));
        assert!(wire.get("dpiUserProvided").is_none());
    }

    #[test]
    fn unknown_keys_keep_their_order() {
        let rec: InspectionRecord =
            serde_json::from_str(r#"{"zeta":1,"pass":1,"alpha":2,"mid":3}"#).unwrap();
        let keys: Vec<&str> = rec.extra.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn stored_quality_prefers_actual_oql() {
        let rec = InspectionRecord {
            oql: 4.0,
            actual_oql: 2.5,
            ..Default::default()
        };
        assert_eq!(rec.stored_oql(), Some(2.5));
        assert_eq!(InspectionRecord::default().stored_oql(), None);
    }
}
