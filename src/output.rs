use crate::error::Result;
use crate::table::ExportDocument;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table, Tabled};
use tracing::info;

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

/// Markdown table of the first `max_rows` rows, or `(no rows)`.
pub fn markdown_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    println!("{}\n", markdown_table(rows, max_rows));
}

/// Markdown table over dynamic columns.
pub fn markdown_grid(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());
    for row in rows {
        builder.push_record(row.iter().cloned());
    }
    builder.build().with(Style::markdown()).to_string()
}

/// Text rendering of the export: a header, then each page's table followed by
/// its `Page N` footer.
pub fn render_export(doc: &ExportDocument) -> String {
    let mut out = format!("{}\nGenerated: {}\n", doc.title, doc.generated_at);
    for page in &doc.pages {
        out.push('\n');
        out.push_str(&markdown_grid(&doc.columns, &page.rows));
        out.push_str("\n\n");
        out.push_str(&page.footer());
        out.push('\n');
    }
    out
}

/// Write the export as `<stem>.txt` (paginated) and `<stem>.csv` (flat).
pub fn write_export(doc: &ExportDocument, dir: &Path, stem: &str) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let text_path = dir.join(format!("{}.txt", stem));
    fs::write(&text_path, render_export(doc))?;

    let csv_path = dir.join(format!("{}.csv", stem));
    let mut wtr = csv::Writer::from_path(&csv_path)?;
    wtr.write_record(&doc.columns)?;
    for row in doc.pages.iter().flat_map(|p| &p.rows) {
        wtr.write_record(row)?;
    }
    wtr.flush()?;

    info!(
        pages = doc.pages.len(),
        text = %text_path.display(),
        csv = %csv_path.display(),
        "report exported"
    );
    Ok((text_path, csv_path))
}
