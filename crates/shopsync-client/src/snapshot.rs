//! Bulk snapshot fetches
//!
//! Initial contents of a view, plus single-entity fetches used to follow up on
//! events that carry too little to reconcile by themselves.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use shopsync_core::{InspectionRecord, JobRecord, RepairOrderCard};

use crate::error::{Error, Result};

/// Source of authoritative entity snapshots
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Every card on a board
    async fn fetch_board(&self, board_id: &str) -> Result<Vec<RepairOrderCard>>;

    /// Inspections of one repair order
    async fn fetch_inspections(&self, repair_order_id: &str) -> Result<Vec<InspectionRecord>>;

    /// Jobs assigned to one technician
    async fn fetch_jobs(&self, technician_id: &str) -> Result<Vec<JobRecord>>;

    /// A single job
    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord>;
}

/// [`SnapshotSource`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSnapshotSource {
    /// Create a source rooted at `base_url`
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Fetching snapshot");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("{path}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("{path}: HTTP {}", status.as_u16())));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("{path}: {e}")))
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch_board(&self, board_id: &str) -> Result<Vec<RepairOrderCard>> {
        self.get_json(&format!("/api/boards/{board_id}/cards")).await
    }

    async fn fetch_inspections(&self, repair_order_id: &str) -> Result<Vec<InspectionRecord>> {
        self.get_json(&format!("/api/repair-orders/{repair_order_id}/inspections"))
            .await
    }

    async fn fetch_jobs(&self, technician_id: &str) -> Result<Vec<JobRecord>> {
        self.get_json(&format!("/api/technicians/{technician_id}/jobs"))
            .await
    }

    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord> {
        self.get_json(&format!("/api/jobs/{job_id}")).await
    }
}
