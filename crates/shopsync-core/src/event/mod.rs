//! Wire events
//!
//! Every named event the hubs emit maps to one [`SyncEvent`] variant. Frames
//! arrive as `(name, payload)` pairs and are decoded here; anything that does
//! not decode is reported as an error so the router can drop it.

/// Event payload definitions.
pub mod types;

pub use types::{
    CardDeleted, CardMoved, CardPatch, InspectionCompleted, InspectionStarted,
    InspectionStatusUpdated, JobAssigned, JobStatusUpdated,
};

use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;

use crate::entity::{EntityId, RepairOrderCard};
use crate::error::{Error, Result};

/// Tag of a [`SyncEvent`]; the router's dispatch key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Card changed column
    CardMoved,
    /// Card added to the board
    CardCreated,
    /// Card fields changed
    CardUpdated,
    /// Card removed from the board
    CardDeleted,
    /// Inspection started by a technician
    InspectionStarted,
    /// Inspection status changed
    InspectionStatusUpdated,
    /// Inspection completed with findings
    InspectionCompleted,
    /// Job status changed
    JobStatusUpdated,
    /// Job assigned to a technician
    JobAssigned,
}

impl EventKind {
    /// Every kind, in declaration order
    pub const ALL: [EventKind; 9] = [
        Self::CardMoved,
        Self::CardCreated,
        Self::CardUpdated,
        Self::CardDeleted,
        Self::InspectionStarted,
        Self::InspectionStatusUpdated,
        Self::InspectionCompleted,
        Self::JobStatusUpdated,
        Self::JobAssigned,
    ];

    /// Wire name of the event
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CardMoved => "CardMoved",
            Self::CardCreated => "CardCreated",
            Self::CardUpdated => "CardUpdated",
            Self::CardDeleted => "CardDeleted",
            Self::InspectionStarted => "InspectionStarted",
            Self::InspectionStatusUpdated => "InspectionStatusUpdated",
            Self::InspectionCompleted => "InspectionCompleted",
            Self::JobStatusUpdated => "JobStatusUpdated",
            Self::JobAssigned => "JobAssigned",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::UnknownEvent(name.to_string()))
    }
}

/// An authoritative event received from a channel
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Card changed column
    CardMoved(CardMoved),
    /// Card added; full snapshot
    CardCreated(RepairOrderCard),
    /// Card fields changed; partial snapshot
    CardUpdated(CardPatch),
    /// Card removed
    CardDeleted(CardDeleted),
    /// Inspection started
    InspectionStarted(InspectionStarted),
    /// Inspection status changed
    InspectionStatusUpdated(InspectionStatusUpdated),
    /// Inspection completed
    InspectionCompleted(InspectionCompleted),
    /// Job status changed
    JobStatusUpdated(JobStatusUpdated),
    /// Job assigned
    JobAssigned(JobAssigned),
}

impl SyncEvent {
    /// Decode a raw frame into a typed event
    ///
    /// # Errors
    /// `UnknownEvent` for names outside the dispatch table, `MalformedEvent`
    /// when the payload lacks its id/scope fields or has the wrong shape.
    pub fn decode(name: &str, payload: serde_json::Value) -> Result<Self> {
        let kind: EventKind = name.parse()?;
        let event = match kind {
            EventKind::CardMoved => Self::CardMoved(payload_as(kind, payload)?),
            EventKind::CardCreated => Self::CardCreated(payload_as(kind, payload)?),
            EventKind::CardUpdated => Self::CardUpdated(payload_as(kind, payload)?),
            EventKind::CardDeleted => Self::CardDeleted(payload_as(kind, payload)?),
            EventKind::InspectionStarted => Self::InspectionStarted(payload_as(kind, payload)?),
            EventKind::InspectionStatusUpdated => {
                Self::InspectionStatusUpdated(payload_as(kind, payload)?)
            }
            EventKind::InspectionCompleted => {
                Self::InspectionCompleted(payload_as(kind, payload)?)
            }
            EventKind::JobStatusUpdated => Self::JobStatusUpdated(payload_as(kind, payload)?),
            EventKind::JobAssigned => Self::JobAssigned(payload_as(kind, payload)?),
        };
        event.validate()?;
        Ok(event)
    }

    /// Tag of this event
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CardMoved(_) => EventKind::CardMoved,
            Self::CardCreated(_) => EventKind::CardCreated,
            Self::CardUpdated(_) => EventKind::CardUpdated,
            Self::CardDeleted(_) => EventKind::CardDeleted,
            Self::InspectionStarted(_) => EventKind::InspectionStarted,
            Self::InspectionStatusUpdated(_) => EventKind::InspectionStatusUpdated,
            Self::InspectionCompleted(_) => EventKind::InspectionCompleted,
            Self::JobStatusUpdated(_) => EventKind::JobStatusUpdated,
            Self::JobAssigned(_) => EventKind::JobAssigned,
        }
    }

    /// Identifier of the entity this event targets
    #[must_use]
    pub fn target_id(&self) -> &EntityId {
        match self {
            Self::CardMoved(e) => &e.entity_id,
            Self::CardCreated(card) => &card.id,
            Self::CardUpdated(patch) => &patch.id,
            Self::CardDeleted(e) => &e.entity_id,
            Self::InspectionStarted(e) => &e.inspection_id,
            Self::InspectionStatusUpdated(e) => &e.inspection_id,
            Self::InspectionCompleted(e) => &e.inspection_id,
            Self::JobStatusUpdated(e) => &e.job_id,
            Self::JobAssigned(e) => &e.job_id,
        }
    }

    /// Parent/scope identifier used to filter events for the open view
    #[must_use]
    pub fn scope_id(&self) -> Option<&str> {
        match self {
            Self::CardMoved(e) => e.board_id.as_deref().or_else(|| {
                e.updated_card_snapshot
                    .as_ref()
                    .and_then(|s| s.board_id.as_deref())
            }),
            Self::CardCreated(card) => card.board_id.as_deref(),
            Self::CardUpdated(patch) => patch.board_id.as_deref(),
            Self::CardDeleted(e) => e.board_id.as_deref(),
            Self::InspectionStarted(e) => Some(&e.repair_order_id),
            Self::InspectionStatusUpdated(e) => Some(&e.repair_order_id),
            Self::InspectionCompleted(e) => Some(&e.repair_order_id),
            Self::JobStatusUpdated(_) | Self::JobAssigned(_) => None,
        }
    }

    /// Per-entity version carried by the event, if any
    #[must_use]
    pub fn version(&self) -> Option<u64> {
        match self {
            Self::CardMoved(e) => e
                .version
                .or_else(|| e.updated_card_snapshot.as_ref().and_then(|s| s.version)),
            Self::CardCreated(card) => card.version,
            Self::CardUpdated(patch) => patch.version,
            Self::InspectionStarted(e) => e.version,
            Self::InspectionStatusUpdated(e) => e.version,
            Self::InspectionCompleted(e) => e.version,
            Self::JobStatusUpdated(e) => e.version,
            Self::CardDeleted(_) | Self::JobAssigned(_) => None,
        }
    }

    /// Whether this event may insert an entity that is not yet present
    #[must_use]
    pub fn is_creation(&self) -> bool {
        matches!(self, Self::CardCreated(_))
    }

    fn validate(&self) -> Result<()> {
        let kind = self.kind();
        if self.target_id().as_str().trim().is_empty() {
            return Err(Error::malformed(kind.as_str(), "empty entity id"));
        }
        if let Some(scope) = self.scope_id() {
            if scope.trim().is_empty() {
                return Err(Error::malformed(kind.as_str(), "empty scope id"));
            }
        }
        if let Self::CardMoved(moved) = self {
            if let Some(snapshot) = &moved.updated_card_snapshot {
                if snapshot.id != moved.entity_id {
                    return Err(Error::malformed(
                        kind.as_str(),
                        format!(
                            "snapshot id {} does not match entity id {}",
                            snapshot.id, moved.entity_id
                        ),
                    ));
                }
                if let (Some(board), Some(snapshot_board)) =
                    (&moved.board_id, &snapshot.board_id)
                {
                    if board != snapshot_board {
                        return Err(Error::malformed(
                            kind.as_str(),
                            format!(
                                "snapshot board {snapshot_board} does not match board {board}"
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

fn payload_as<T: DeserializeOwned>(kind: EventKind, payload: serde_json::Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| Error::malformed(kind.as_str(), e.to_string()))
}
