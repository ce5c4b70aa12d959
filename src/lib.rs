//! Quality-inspection dashboard: spreadsheet import, dashboard aggregation,
//! tabular export and a client for the inspection data service.

pub mod config;
pub mod error;
pub mod fields;
pub mod filters;
pub mod form;
pub mod loader;
pub mod normalize;
pub mod output;
pub mod reports;
pub mod service;
pub mod store;
pub mod table;
pub mod types;
pub mod util;

pub use error::{Error, Result, ValidationError};
