//! Mutation Coordinator
//!
//! Sends change requests to the remote service and reports only whether they
//! were accepted. A successful response is an acknowledgement, never new
//! state: the authoritative change arrives later as a channel event and is
//! folded in by the view that owns the collection.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shopsync_core::{JobStatus, ViewScope};

use crate::error::{Error, Result};
use crate::settings::MutationSettings;

/// Header carrying the per-submission idempotency key
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Longest rejection body kept in an error
const MAX_REJECTION_BODY: usize = 200;

/// A change requested by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MutationRequest {
    /// Move a repair-order card to another board column
    MoveCard {
        /// Card identifier
        card_id: String,
        /// Target status column
        status_id: String,
    },

    /// Assign a technician to an inspection
    AssignInspection {
        /// Inspection identifier
        inspection_id: String,
        /// Technician identifier
        technician_id: String,
    },

    /// Change a job's status
    UpdateJobStatus {
        /// Job identifier
        job_id: String,
        /// Requested status
        status: JobStatus,
    },

    /// Assign a technician to a job
    AssignJob {
        /// Job identifier
        job_id: String,
        /// Technician identifier
        technician_id: String,
    },

    /// Replace a card's notes
    UpdateCardNotes {
        /// Card identifier
        card_id: String,
        /// New notes
        notes: String,
    },
}

impl MutationRequest {
    /// Short name for logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveCard { .. } => "move_card",
            Self::AssignInspection { .. } => "assign_inspection",
            Self::UpdateJobStatus { .. } => "update_job_status",
            Self::AssignJob { .. } => "assign_job",
            Self::UpdateCardNotes { .. } => "update_card_notes",
        }
    }

    /// Identifier of the entity the request targets
    #[must_use]
    pub fn target_id(&self) -> &str {
        match self {
            Self::MoveCard { card_id, .. } | Self::UpdateCardNotes { card_id, .. } => card_id,
            Self::AssignInspection { inspection_id, .. } => inspection_id,
            Self::UpdateJobStatus { job_id, .. } | Self::AssignJob { job_id, .. } => job_id,
        }
    }

    /// HTTP method, path and body for this request
    #[must_use]
    pub fn route(&self) -> (Method, String, serde_json::Value) {
        match self {
            Self::MoveCard { card_id, status_id } => (
                Method::PUT,
                format!("/api/repair-orders/{card_id}/status"),
                json!({ "statusId": status_id }),
            ),
            Self::AssignInspection {
                inspection_id,
                technician_id,
            } => (
                Method::PUT,
                format!("/api/inspections/{inspection_id}/technician"),
                json!({ "technicianId": technician_id }),
            ),
            Self::UpdateJobStatus { job_id, status } => (
                Method::PUT,
                format!("/api/jobs/{job_id}/status"),
                json!({ "status": status }),
            ),
            Self::AssignJob {
                job_id,
                technician_id,
            } => (
                Method::PUT,
                format!("/api/jobs/{job_id}/technician"),
                json!({ "technicianId": technician_id }),
            ),
            Self::UpdateCardNotes { card_id, notes } => (
                Method::PATCH,
                format!("/api/repair-orders/{card_id}/notes"),
                json!({ "notes": notes }),
            ),
        }
    }
}

/// Acceptance of a mutation by the remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationAck {
    /// Idempotency key the request was sent with
    pub idempotency_key: String,
    /// HTTP status of the accepting response
    pub status: u16,
}

/// Remote mutation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MutationService: Send + Sync {
    /// Send `request`; resolve to the accepting status code
    ///
    /// Retries must reuse `idempotency_key`.
    async fn send(&self, request: &MutationRequest, idempotency_key: &str) -> Result<u16>;
}

/// [`MutationService`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpMutationService {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl HttpMutationService {
    /// Create a service rooted at `base_url`
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>, settings: &MutationSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries: settings.max_retries,
        })
    }
}

#[async_trait]
impl MutationService for HttpMutationService {
    async fn send(&self, request: &MutationRequest, idempotency_key: &str) -> Result<u16> {
        let (method, path, body) = request.route();
        let url = format!("{}{}", self.base_url, path);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .request(method.clone(), &url)
                .header(IDEMPOTENCY_KEY_HEADER, idempotency_key)
                .json(&body)
                .send()
                .await;

            match response {
                // The body is never read as state.
                Ok(resp) if resp.status().is_success() => return Ok(resp.status().as_u16()),
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let mut message = resp.text().await.unwrap_or_default();
                    if message.len() > MAX_REJECTION_BODY {
                        let cut = (0..=MAX_REJECTION_BODY)
                            .rev()
                            .find(|i| message.is_char_boundary(*i))
                            .unwrap_or(0);
                        message.truncate(cut);
                    }
                    return Err(Error::MutationRejected {
                        status: Some(status),
                        message,
                    });
                }
                Err(e) if e.is_timeout() && attempt <= self.max_retries => {
                    warn!(
                        mutation = request.name(),
                        attempt,
                        idempotency_key,
                        "Mutation timed out; retrying"
                    );
                }
                Err(e) => return Err(Error::rejected(e.to_string())),
            }
        }
    }
}

/// Issues mutations on behalf of one view
#[derive(Clone)]
pub struct MutationCoordinator {
    service: Arc<dyn MutationService>,
    scope: ViewScope,
}

impl MutationCoordinator {
    /// Create a coordinator bound to `scope`
    #[must_use]
    pub fn new(service: Arc<dyn MutationService>, scope: ViewScope) -> Self {
        Self { service, scope }
    }

    /// Submit `request` and wait for acceptance
    ///
    /// No collection is modified here, whatever the outcome.
    ///
    /// # Errors
    /// Returns [`Error::MutationRejected`] when the service refuses or fails,
    /// and [`Error::Cancelled`] when the view is torn down before the response
    /// can be reported.
    pub async fn submit(&self, request: MutationRequest) -> Result<MutationAck> {
        self.scope.ensure_live()?;
        let idempotency_key = Uuid::new_v4().to_string();
        info!(
            scope = self.scope.name(),
            mutation = request.name(),
            target = request.target_id(),
            idempotency_key = %idempotency_key,
            "Submitting mutation"
        );

        let outcome = self
            .scope
            .run(self.service.send(&request, &idempotency_key))
            .await;
        match outcome {
            Ok(Ok(status)) => {
                debug!(mutation = request.name(), status, "Mutation accepted");
                Ok(MutationAck {
                    idempotency_key,
                    status,
                })
            }
            Ok(Err(e)) => {
                warn!(
                    mutation = request.name(),
                    target = request.target_id(),
                    error = %e,
                    "Mutation rejected"
                );
                Err(e)
            }
            Err(_) => {
                debug!(mutation = request.name(), "Discarding mutation response after teardown");
                Err(Error::Cancelled)
            }
        }
    }
}

impl std::fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("scope", &self.scope.name())
            .finish_non_exhaustive()
    }
}
