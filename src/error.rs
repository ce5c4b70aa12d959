//! Error types for the inspection dashboard.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Excel error: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("Unsupported spreadsheet format: .{0} (expected .xlsx or .csv)")]
    UnsupportedFormat(String),

    #[error("Workbook has no worksheet")]
    NoWorksheet,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Settings file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No data to export")]
    NothingToExport,

    /// The data service answered with a non-success status.
    #[error("Service error: {status} on {endpoint}")]
    Service { endpoint: String, status: u16 },
}

/// Reasons an inspection draft is refused before submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please fill the field: {0}")]
    MissingField(String),

    #[error("Offered QTY CTN cannot be greater than Offered QTY Packs")]
    CtnExceedsPacks,

    #[error("Disposition value must be 0 or 1, got '{0}'")]
    InvalidDisposition(String),
}
