use crate::fields::{DEFECT_CATEGORIES, MAJOR_DEFECTS, MINOR_DEFECTS};
use crate::filters::FilterSpec;
use crate::types::{
    CategoryRadarEntry, CriticalTrendRow, DashboardViewModel, DefectClass, DefectDetail,
    DefectDistributionRow, DefectRatioRow, InspectionRecord, InspectorRow, KpiSummary,
    MonthlyStatusRow, QualityTrendRow, StatusTrendRow, TrendMode,
};
use crate::util::{average, percent, round2};
use std::collections::HashMap;
use tracing::debug;

pub const NO_DEFECTS_RECORDED: &str = "No defects recorded";

/// Build every dashboard series from the records that pass `filters`.
/// Pure: the input is only read, and an empty selection yields zero KPIs and
/// empty series.
pub fn aggregate(records: &[InspectionRecord], filters: &FilterSpec) -> DashboardViewModel {
    let filtered = filters.apply(records);
    debug!(total = records.len(), selected = filtered.len(), "aggregating dashboard");
    let months = group_by(&filtered, |r| r.month_key());
    let inspectors = group_by(&filtered, |r| r.inspector_key());

    DashboardViewModel {
        kpi: kpi_summary(&filtered),
        monthly_status: monthly_status(&months),
        inspectors: inspector_rollup(&inspectors),
        critical_trend: critical_trend(&months),
        defect_ratio: defect_ratio(&months),
        status_trend: status_trend(&months),
        oql_trend: oql_trend(&months),
        dpi_trend: dpi_trend(&months),
        category_radar: category_radar(&filtered),
        defects_distribution: defects_distribution(&filtered),
    }
}

/// Records sharing a grouping key, in the order keys first appear.
pub type Bucket<'a> = (String, Vec<&'a InspectionRecord>);

pub fn group_by<'a, F>(records: &[&'a InspectionRecord], key: F) -> Vec<Bucket<'a>>
where
    F: Fn(&InspectionRecord) -> &str,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<Bucket<'a>> = Vec::new();
    for &r in records {
        let k = key(r);
        match index.get(k) {
            Some(&i) => buckets[i].1.push(r),
            None => {
                index.insert(k.to_string(), buckets.len());
                buckets.push((k.to_string(), vec![r]));
            }
        }
    }
    buckets
}

fn sum<F: Fn(&InspectionRecord) -> f64>(records: &[&InspectionRecord], f: F) -> f64 {
    records.iter().map(|&r| f(r)).sum()
}

pub fn kpi_summary(records: &[&InspectionRecord]) -> KpiSummary {
    let total_pass = sum(records, |r| r.pass);
    let total_fail = sum(records, |r| r.fail);
    let total_abort = sum(records, |r| r.abort);
    let total_pending = sum(records, |r| r.pending);
    let dispositions = total_pass + total_fail + total_abort + total_pending;
    let oqls: Vec<f64> = records.iter().map(|r| r.actual_oql).collect();

    KpiSummary {
        total: records.len(),
        total_pass,
        total_fail,
        total_abort,
        total_pending,
        total_defects: sum(records, |r| r.actual_major),
        actual_oql: round2(average(&oqls)),
        pass_rate: percent(total_pass, dispositions),
        fail_rate: percent(total_fail, dispositions),
    }
}

pub fn monthly_status(months: &[Bucket<'_>]) -> Vec<MonthlyStatusRow> {
    months
        .iter()
        .map(|(month, rs)| MonthlyStatusRow {
            month: month.clone(),
            pass: sum(rs, |r| r.pass),
            fail: sum(rs, |r| r.fail),
            abort: sum(rs, |r| r.abort),
            pending: sum(rs, |r| r.pending),
        })
        .collect()
}

pub fn inspector_rollup(inspectors: &[Bucket<'_>]) -> Vec<InspectorRow> {
    inspectors
        .iter()
        .map(|(name, rs)| InspectorRow {
            inspector_name: name.clone(),
            pass: sum(rs, |r| r.pass),
            fail: sum(rs, |r| r.fail),
        })
        .collect()
}

pub fn critical_trend(months: &[Bucket<'_>]) -> Vec<CriticalTrendRow> {
    months
        .iter()
        .map(|(month, rs)| CriticalTrendRow {
            month: month.clone(),
            critical: sum(rs, |r| r.critical),
        })
        .collect()
}

pub fn defect_ratio(months: &[Bucket<'_>]) -> Vec<DefectRatioRow> {
    months
        .iter()
        .map(|(month, rs)| DefectRatioRow {
            month: month.clone(),
            major: sum(rs, |r| r.major),
            minor: sum(rs, |r| r.minor),
        })
        .collect()
}

pub fn status_trend(months: &[Bucket<'_>]) -> Vec<StatusTrendRow> {
    months
        .iter()
        .map(|(month, rs)| StatusTrendRow {
            month: month.clone(),
            abort: sum(rs, |r| r.abort),
            pending: sum(rs, |r| r.pending),
        })
        .collect()
}

/// Per bucket: mean of the stored values when at least one record carries
/// one, otherwise `sum(defects) / sum(sampleSize) * 100`.
fn quality_trend<S, D>(months: &[Bucket<'_>], stored: S, defects: D) -> Vec<QualityTrendRow>
where
    S: Fn(&InspectionRecord) -> Option<f64>,
    D: Fn(&InspectionRecord) -> f64,
{
    months
        .iter()
        .map(|(month, rs)| {
            let provided: Vec<f64> = rs.iter().filter_map(|&r| stored(r)).collect();
            let (value, mode) = if !provided.is_empty() {
                (average(&provided), TrendMode::Stored)
            } else {
                let sample = sum(rs, |r| r.sample_size);
                let value = if sample > 0.0 {
                    sum(rs, &defects) / sample * 100.0
                } else {
                    0.0
                };
                (value, TrendMode::Weighted)
            };
            QualityTrendRow {
                month: month.clone(),
                value: round2(value),
                mode,
            }
        })
        .collect()
}

pub fn oql_trend(months: &[Bucket<'_>]) -> Vec<QualityTrendRow> {
    quality_trend(months, InspectionRecord::stored_oql, |r| r.actual_major)
}

pub fn dpi_trend(months: &[Bucket<'_>]) -> Vec<QualityTrendRow> {
    quality_trend(months, InspectionRecord::stored_dpi, |r| r.major)
}

pub fn category_radar(records: &[&InspectionRecord]) -> Vec<CategoryRadarEntry> {
    DEFECT_CATEGORIES
        .iter()
        .map(|(category, fields)| {
            let mut details: Vec<DefectDetail> = fields
                .iter()
                .map(|f| DefectDetail {
                    name: f.to_string(),
                    count: sum(records, |r| r.count(f)),
                })
                .filter(|d| d.count > 0.0)
                .collect();
            let count: f64 = details.iter().map(|d| d.count).sum();
            if details.is_empty() {
                details.push(DefectDetail {
                    name: NO_DEFECTS_RECORDED.to_string(),
                    count: 0.0,
                });
            }
            CategoryRadarEntry {
                category: category.to_string(),
                count,
                details,
            }
        })
        .collect()
}

/// Major then minor defects, leaving out any that never occurred.
pub fn defects_distribution(records: &[&InspectionRecord]) -> Vec<DefectDistributionRow> {
    let major = MAJOR_DEFECTS.iter().map(|f| (*f, DefectClass::Major));
    let minor = MINOR_DEFECTS.iter().map(|f| (*f, DefectClass::Minor));
    major
        .chain(minor)
        .map(|(name, class)| DefectDistributionRow {
            name: name.to_string(),
            class,
            count: sum(records, |r| r.count(name)),
        })
        .filter(|row| row.count > 0.0)
        .collect()
}
