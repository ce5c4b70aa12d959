//! Client for the remote inspection data service.
//!
//! The service is the source of truth. Nothing here caches; see
//! [`crate::store`] for the read cache that sits in front of it.

use crate::error::{Error, Result};
use crate::types::InspectionRecord;
use reqwest::blocking::{Client, Response};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("inspection-dashboard/", env!("CARGO_PKG_VERSION"));

/// Operations the dashboard needs from the data service.
pub trait DataService {
    fn list(&self) -> Result<Vec<InspectionRecord>>;
    fn create(&self, record: &InspectionRecord) -> Result<()>;
    /// Full-record replace of `id`.
    fn update(&self, id: &str, record: &InspectionRecord) -> Result<()>;
    fn delete(&self, id: &str) -> Result<()>;
    fn delete_all(&self) -> Result<()>;
    fn import_bulk(&self, records: &[InspectionRecord]) -> Result<()>;
}

/// JSON over HTTP, one blocking round trip per call, no retries.
pub struct HttpDataService {
    client: Client,
    base_url: String,
}

impl HttpDataService {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Service {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl DataService for HttpDataService {
    fn list(&self) -> Result<Vec<InspectionRecord>> {
        let path = "/inspections";
        debug!(url = %self.url(path), "fetching inspections");
        let response = Self::check(path, self.client.get(self.url(path)).send()?)?;
        let records: Vec<InspectionRecord> = response.json()?;
        debug!(count = records.len(), "inspections fetched");
        Ok(records)
    }

    fn create(&self, record: &InspectionRecord) -> Result<()> {
        let path = "/inspections";
        Self::check(path, self.client.post(self.url(path)).json(record).send()?)?;
        info!("inspection created");
        Ok(())
    }

    fn update(&self, id: &str, record: &InspectionRecord) -> Result<()> {
        let path = format!("/inspections/{}", id);
        let body = record.to_payload();
        Self::check(&path, self.client.put(self.url(&path)).json(&body).send()?)?;
        info!(id = %id, "inspection updated");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = format!("/inspections/{}", id);
        Self::check(&path, self.client.delete(self.url(&path)).send()?)?;
        info!(id = %id, "inspection deleted");
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        let path = "/inspections/deleteAll";
        Self::check(path, self.client.delete(self.url(path)).send()?)?;
        info!("all inspections deleted");
        Ok(())
    }

    fn import_bulk(&self, records: &[InspectionRecord]) -> Result<()> {
        let path = "/inspections/import";
        Self::check(path, self.client.post(self.url(path)).json(records).send()?)?;
        info!(count = records.len(), "inspections imported");
        Ok(())
    }
}
