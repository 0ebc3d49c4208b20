//! Entity model
//!
//! The three entity variants kept in sync with the server, and the keyed,
//! scope-tagged collection a view holds them in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable, immutable entity identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    /// Create an identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Inspection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InspectionStatus {
    /// Created, nobody assigned
    New,
    /// Technician assigned, not started
    Pending,
    /// Technician retrieved the vehicle and started
    InProgress,
    /// Finished; terminal
    Completed,
}

impl InspectionStatus {
    /// Whether no further transition is allowed
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Not started
    New,
    /// Being worked on
    InProgress,
    /// Finished; terminal
    Completed,
    /// Paused by the technician
    OnHold,
}

impl JobStatus {
    /// Whether no further transition is allowed
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "new" => Ok(Self::New),
            "inprogress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "onhold" => Ok(Self::OnHold),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A card on the repair-order board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairOrderCard {
    /// Card identifier
    #[serde(alias = "entityId")]
    pub id: EntityId,
    /// Board the card is shown on
    #[serde(default)]
    pub board_id: Option<String>,
    /// Board column; an open, server-defined set
    pub status_id: String,
    /// Human facing repair-order number
    #[serde(default)]
    pub ro_number: Option<String>,
    /// Customer display name
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Vehicle description
    #[serde(default)]
    pub vehicle: Option<String>,
    /// Assigned technician id
    #[serde(default)]
    pub technician_id: Option<String>,
    /// Assigned technician display name
    #[serde(default)]
    pub technician_name: Option<String>,
    /// Server-computed completion percentage
    #[serde(default)]
    pub progress_percent: Option<u8>,
    /// Server-assigned labels
    #[serde(default)]
    pub labels: Vec<String>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Last server-side update
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Monotonic per-entity version, when the server provides one
    #[serde(default)]
    pub version: Option<u64>,
    /// Descriptive fields the engine does not interpret
    #[serde(default, flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RepairOrderCard {
    /// Create a card in the given column
    #[must_use]
    pub fn new(id: impl Into<EntityId>, status_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            board_id: None,
            status_id: status_id.into(),
            ro_number: None,
            customer_name: None,
            vehicle: None,
            technician_id: None,
            technician_name: None,
            progress_percent: None,
            labels: Vec::new(),
            notes: None,
            updated_at: None,
            version: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// An inspection belonging to a repair order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionRecord {
    /// Inspection identifier
    pub id: EntityId,
    /// Owning repair order; the scope of inspection views
    pub repair_order_id: String,
    /// Inspection name
    #[serde(default)]
    pub name: Option<String>,
    /// Current status
    pub status: InspectionStatus,
    /// Assigned technician id
    #[serde(default)]
    pub technician_id: Option<String>,
    /// Assigned technician display name
    #[serde(default)]
    pub technician_name: Option<String>,
    /// When the technician started
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the technician completed
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Last server-side update
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Finding text, set on completion
    #[serde(default)]
    pub finding: Option<String>,
    /// Number of recommended services, set on completion
    #[serde(default)]
    pub service_count: Option<u32>,
    /// Number of recommended parts, set on completion
    #[serde(default)]
    pub part_count: Option<u32>,
    /// Monotonic per-entity version, when the server provides one
    #[serde(default)]
    pub version: Option<u64>,
}

impl InspectionRecord {
    /// Create a new, unassigned inspection
    #[must_use]
    pub fn new(id: impl Into<EntityId>, repair_order_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repair_order_id: repair_order_id.into(),
            name: None,
            status: InspectionStatus::New,
            technician_id: None,
            technician_name: None,
            started_at: None,
            completed_at: None,
            updated_at: None,
            finding: None,
            service_count: None,
            part_count: None,
            version: None,
        }
    }
}

/// A technician job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Job identifier
    pub id: EntityId,
    /// Owning repair order, if any
    #[serde(default)]
    pub repair_order_id: Option<String>,
    /// Job title
    #[serde(default)]
    pub title: Option<String>,
    /// Current status
    pub status: JobStatus,
    /// Assigned technician id
    #[serde(default)]
    pub technician_id: Option<String>,
    /// Assigned technician display name
    #[serde(default)]
    pub technician_name: Option<String>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Last server-side update
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Monotonic per-entity version, when the server provides one
    #[serde(default)]
    pub version: Option<u64>,
}

impl JobRecord {
    /// Create a new job
    #[must_use]
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            repair_order_id: None,
            title: None,
            status: JobStatus::New,
            technician_id: None,
            technician_name: None,
            notes: None,
            updated_at: None,
            version: None,
        }
    }
}

/// Common view over entity variants
pub trait Entity: Clone + PartialEq + Send + Sync + 'static {
    /// Entity identifier
    fn id(&self) -> &EntityId;

    /// Per-entity version, if the server sent one
    fn version(&self) -> Option<u64>;

    /// Scope (parent id) this entity belongs to, if any
    fn scope_id(&self) -> Option<&str>;
}

impl Entity for RepairOrderCard {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn scope_id(&self) -> Option<&str> {
        self.board_id.as_deref()
    }
}

impl Entity for InspectionRecord {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    fn scope_id(&self) -> Option<&str> {
        Some(&self.repair_order_id)
    }
}

impl Entity for JobRecord {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn version(&self) -> Option<u64> {
        self.version
    }

    // Job lists are scoped by group membership (the technician), not by a
    // parent id carried on the record.
    fn scope_id(&self) -> Option<&str> {
        None
    }
}

/// Keyed entity collection owned by one view
///
/// The collection is a value: reconciliation never mutates it in place but
/// produces a new collection, so equality before and after an event is
/// directly observable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityCollection<T> {
    scope: Option<String>,
    entities: BTreeMap<EntityId, T>,
}

impl<T: Entity> EntityCollection<T> {
    /// Create an empty collection for the given scope
    #[must_use]
    pub fn new(scope: Option<String>) -> Self {
        Self {
            scope,
            entities: BTreeMap::new(),
        }
    }

    /// Create an empty collection with no declared scope
    #[must_use]
    pub fn unscoped() -> Self {
        Self::new(None)
    }

    /// Create an empty collection scoped to `scope`
    #[must_use]
    pub fn scoped(scope: impl Into<String>) -> Self {
        Self::new(Some(scope.into()))
    }

    /// Build from the result of a bulk fetch
    #[must_use]
    pub fn with_entities(mut self, entities: impl IntoIterator<Item = T>) -> Self {
        for entity in entities {
            self.entities.insert(entity.id().clone(), entity);
        }
        self
    }

    /// Declared scope of this collection
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Look up an entity
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.entities.get(id)
    }

    /// Whether an entity with this id is present
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Number of entities
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the collection holds no entities
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate entities in id order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entities.values()
    }

    pub(crate) fn insert(&mut self, entity: T) {
        self.entities.insert(entity.id().clone(), entity);
    }

    pub(crate) fn remove(&mut self, id: &EntityId) -> Option<T> {
        self.entities.remove(id)
    }
}
