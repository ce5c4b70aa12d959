use crate::error::{Error, Result};
use crate::normalize::{normalize, Diagnostic};
use crate::types::InspectionRecord;
use calamine::{Data, Reader, Xlsx};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub imported_rows: usize,
    pub blank_rows: usize,
    pub header_collisions: usize,
    pub unparsable_dates: usize,
    pub zero_filled_numbers: usize,
    pub diagnostics: Vec<(usize, Diagnostic)>,
}

/// Read and normalize a spreadsheet. `.xlsx` workbooks contribute their
/// first worksheet; `.csv` files (or files without an extension) are read
/// as a single sheet.
pub fn load_and_clean(path: &Path) -> Result<(Vec<InspectionRecord>, LoadReport)> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    let loaded = match extension.as_deref() {
        Some("xlsx") | Some("xlsm") => load_xlsx_from_reader(BufReader::new(File::open(path)?))?,
        Some("csv") | None => load_from_reader(File::open(path)?)?,
        Some(other) => return Err(Error::UnsupportedFormat(other.to_string())),
    };
    info!(
        path = %path.display(),
        rows = loaded.1.imported_rows,
        "spreadsheet loaded"
    );
    Ok(loaded)
}

/// CSV over any reader. The first line is the header row; short rows are
/// padded with empty cells.
pub fn load_from_reader<R: Read>(reader: R) -> Result<(Vec<InspectionRecord>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let rows = rdr
        .records()
        .map(|row| -> Result<Vec<String>> { Ok(row?.iter().map(str::to_string).collect()) });
    clean_rows(&headers, rows)
}

/// First worksheet of an `.xlsx` workbook. Its first row is the header row
/// and empty cells read as empty text.
pub fn load_xlsx_from_reader<R: Read + Seek>(reader: R) -> Result<(Vec<InspectionRecord>, LoadReport)> {
    let mut workbook: Xlsx<R> = Xlsx::new(reader)?;
    let range = workbook.worksheet_range_at(0).ok_or(Error::NoWorksheet)??;
    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
    let headers = rows.next().unwrap_or_default();
    clean_rows(&headers, rows.map(Ok::<_, Error>))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        // Serial day number; the date coercion understands it.
        Data::DateTime(dt) => dt.as_f64().to_string(),
        other => other.to_string(),
    }
}

fn clean_rows<I>(headers: &[String], rows: I) -> Result<(Vec<InspectionRecord>, LoadReport)>
where
    I: IntoIterator<Item = Result<Vec<String>>>,
{
    let headers: Vec<&str> = headers
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}'))
        .collect();

    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for row in rows {
        let row = row?;
        report.total_rows += 1;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            report.blank_rows += 1;
            continue;
        }

        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (*header, row.get(i).map(String::as_str).unwrap_or("")));
        let normalized = normalize(cells);

        for diagnostic in normalized.diagnostics {
            match diagnostic {
                Diagnostic::HeaderCollision { .. } => report.header_collisions += 1,
                Diagnostic::UnparsableDate { .. } => report.unparsable_dates += 1,
                Diagnostic::UnparsableNumber { .. } => report.zero_filled_numbers += 1,
            }
            report.diagnostics.push((report.total_rows, diagnostic));
        }
        records.push(normalized.record);
    }

    report.imported_rows = records.len();
    Ok((records, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_CSV: &str = "\
Inspection Date,Inspector Name,Inspection Type,Pass,Fail,Sample Size,Actual Major,Raw Edge,Remarks
2024-01-10,Asif,Final,1,0,\"1,250\",2,3,ok
not a date,Bilal,DPI,0,1,80,,x,
,,,,,,,,
2024-02-02,Asif,Final,1,0,200,1,0
";

    #[test]
    fn load_sample_csv() {
        let (records, report) = load_from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(report.total_rows, 4);
        assert_eq!(report.blank_rows, 1);
        assert_eq!(report.imported_rows, 3);
        assert_eq!(records[0].sample_size, 1250.0);
        assert_eq!(records[0].month.as_deref(), Some("January"));
        assert_eq!(records[0].extra["Remarks"], "ok");
        assert_eq!(records[1].defects.raw_edge, 0.0);
        assert_eq!(records[2].month.as_deref(), Some("February"));
    }

    #[test]
    fn parse_failures_do_not_drop_rows() {
        let (records, report) = load_from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(report.unparsable_dates, 1);
        assert_eq!(report.zero_filled_numbers, 1);
        assert_eq!(records[1].inspector_name.as_deref(), Some("Bilal"));
        assert_eq!(report.diagnostics[0].0, 2);
    }

    #[test]
    fn unknown_extension_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inspections.ods");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(
            load_and_clean(&path),
            Err(Error::UnsupportedFormat(ext)) if ext == "ods"
        ));
    }

    #[test]
    fn workbook_cells_become_text() {
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::Float(1250.0)), "1250");
        assert_eq!(cell_text(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::String("Asif".into())), "Asif");
    }
}
