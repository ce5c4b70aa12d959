//! Runtime settings.
//!
//! Sources, highest priority first:
//! 1. Command-line arguments and their environment variables
//! 2. TOML settings file (optional)
//! 3. Built-in defaults

use crate::error::{Error, Result};
use crate::filters::FilterSpec;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the data service. Without it the tool works offline on
    /// the loaded spreadsheet.
    pub api_url: Option<String>,
    pub input: PathBuf,
    pub output_dir: PathBuf,
    /// Table page size.
    pub rows_per_page: usize,
    pub export_rows_per_page: usize,
    /// Rows shown in console previews.
    pub preview_rows: usize,
    pub request_timeout_secs: Option<u64>,
    /// Seconds between polls of the data service for changes made
    /// elsewhere; 0 turns live updates off.
    pub watch_interval_secs: u64,
    /// Filters applied when the dashboard is first shown.
    pub filters: FilterSpec,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: None,
            input: PathBuf::from("inspections.csv"),
            output_dir: PathBuf::from("output"),
            rows_per_page: 10,
            export_rows_per_page: 25,
            preview_rows: 5,
            request_timeout_secs: None,
            watch_interval_secs: 15,
            filters: FilterSpec::default(),
        }
    }
}

/// Values given on the command line; `None` leaves the file/default value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

impl Settings {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&text)?;
        info!(path = %path.display(), "settings file loaded");
        Ok(settings)
    }

    /// File settings when `path` is given, defaults otherwise, then the
    /// command-line overrides on top.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let settings = base.merge(overrides);
        settings.validate()?;
        Ok(settings)
    }

    pub fn merge(mut self, overrides: Overrides) -> Self {
        if let Some(url) = overrides.api_url {
            self.api_url = Some(url);
        }
        if let Some(input) = overrides.input {
            self.input = input;
        }
        if let Some(dir) = overrides.output_dir {
            self.output_dir = dir;
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.rows_per_page == 0 {
            return Err(Error::Config("rows_per_page must be at least 1".into()));
        }
        if self.export_rows_per_page == 0 {
            return Err(Error::Config("export_rows_per_page must be at least 1".into()));
        }
        if let Some(url) = &self.api_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("api_url must be an http(s) URL, got '{}'", url)));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn watch_interval(&self) -> Option<Duration> {
        Some(self.watch_interval_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.output_dir.join(file_name)
    }
}
