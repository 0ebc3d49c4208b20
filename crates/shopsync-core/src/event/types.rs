//! Event payloads
//!
//! Field names follow the server's camelCase JSON. Only identifiers and scope
//! ids are mandatory; everything else is optional and merged when present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, InspectionStatus, JobStatus, RepairOrderCard};

/// Partial card snapshot; absent fields keep their previous value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    /// Card identifier
    #[serde(alias = "entityId")]
    pub id: EntityId,
    /// Board this card belongs to
    #[serde(default)]
    pub board_id: Option<String>,
    /// New column
    #[serde(default)]
    pub status_id: Option<String>,
    /// Repair-order number
    #[serde(default)]
    pub ro_number: Option<String>,
    /// Customer display name
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Vehicle description
    #[serde(default)]
    pub vehicle: Option<String>,
    /// Technician id
    #[serde(default)]
    pub technician_id: Option<String>,
    /// Technician display name
    #[serde(default)]
    pub technician_name: Option<String>,
    /// Server-computed progress
    #[serde(default)]
    pub progress_percent: Option<u8>,
    /// Full replacement label set
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// Notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Server timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Per-entity version
    #[serde(default)]
    pub version: Option<u64>,
    /// Uninterpreted descriptive fields, merged key by key
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CardPatch {
    /// Shallow-merge this patch over `card`
    #[must_use]
    pub fn apply_to(&self, card: &RepairOrderCard) -> RepairOrderCard {
        let mut next = card.clone();
        merge(&mut next.board_id, &self.board_id);
        if let Some(status_id) = &self.status_id {
            next.status_id.clone_from(status_id);
        }
        merge(&mut next.ro_number, &self.ro_number);
        merge(&mut next.customer_name, &self.customer_name);
        merge(&mut next.vehicle, &self.vehicle);
        merge(&mut next.technician_id, &self.technician_id);
        merge(&mut next.technician_name, &self.technician_name);
        merge(&mut next.progress_percent, &self.progress_percent);
        if let Some(labels) = &self.labels {
            next.labels.clone_from(labels);
        }
        merge(&mut next.notes, &self.notes);
        merge(&mut next.updated_at, &self.updated_at);
        merge(&mut next.version, &self.version);
        for (key, value) in &self.extra {
            next.extra.insert(key.clone(), value.clone());
        }
        next
    }
}

pub(crate) fn merge<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) {
    if incoming.is_some() {
        slot.clone_from(incoming);
    }
}

/// `CardMoved`: a card changed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMoved {
    /// Card identifier
    pub entity_id: EntityId,
    /// Column the card now sits in
    pub new_status_id: String,
    /// Server snapshot of the card after the move
    #[serde(default)]
    pub updated_card_snapshot: Option<CardPatch>,
    /// Board scope
    #[serde(default)]
    pub board_id: Option<String>,
    /// Per-entity version
    #[serde(default)]
    pub version: Option<u64>,
}

/// `CardDeleted`: a card left the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDeleted {
    /// Card identifier
    #[serde(alias = "id")]
    pub entity_id: EntityId,
    /// Board scope
    #[serde(default)]
    pub board_id: Option<String>,
}

/// `InspectionStarted`: technician retrieved the vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionStarted {
    /// Inspection identifier
    pub inspection_id: EntityId,
    /// Owning repair order
    pub repair_order_id: String,
    /// Technician id
    #[serde(default)]
    pub technician_id: Option<String>,
    /// Technician display name
    #[serde(default)]
    pub technician_name: Option<String>,
    /// Start time
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Per-entity version
    #[serde(default)]
    pub version: Option<u64>,
}

/// `InspectionStatusUpdated`: assignment or other status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionStatusUpdated {
    /// Inspection identifier
    pub inspection_id: EntityId,
    /// Owning repair order
    pub repair_order_id: String,
    /// Status the inspection is now in
    pub new_status: InspectionStatus,
    /// Technician id
    #[serde(default)]
    pub technician_id: Option<String>,
    /// Technician display name
    #[serde(default)]
    pub technician_name: Option<String>,
    /// Server timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Per-entity version
    #[serde(default)]
    pub version: Option<u64>,
}

/// `InspectionCompleted`: technician finished, findings attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionCompleted {
    /// Inspection identifier
    pub inspection_id: EntityId,
    /// Owning repair order
    pub repair_order_id: String,
    /// Finding text
    #[serde(default)]
    pub finding: Option<String>,
    /// Recommended services
    #[serde(default)]
    pub service_count: Option<u32>,
    /// Recommended parts
    #[serde(default)]
    pub part_count: Option<u32>,
    /// Completion time
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Per-entity version
    #[serde(default)]
    pub version: Option<u64>,
}

/// `JobStatusUpdated`: technician changed a job's status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusUpdated {
    /// Job identifier
    pub job_id: EntityId,
    /// Status the job is now in
    pub new_status: JobStatus,
    /// Owning repair order
    #[serde(default)]
    pub repair_order_id: Option<String>,
    /// Server timestamp
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Per-entity version
    #[serde(default)]
    pub version: Option<u64>,
}

/// `JobAssigned`: a job was handed to a technician; detail must be fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAssigned {
    /// Job identifier
    pub job_id: EntityId,
    /// Technician the job was assigned to
    #[serde(default)]
    pub technician_id: Option<String>,
    /// Owning repair order
    #[serde(default)]
    pub repair_order_id: Option<String>,
}
