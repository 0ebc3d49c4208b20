//! Shopsync Core - Real-time State Synchronization
//!
//! This crate provides the transport-independent half of the sync engine:
//! - Entity: Repair-order cards, inspections, jobs and the keyed collection a view holds
//! - Event: Tagged wire events and their decoding
//! - Router: Per-connection dispatch table from event kind to handlers
//! - Reconcile: Pure folds of one event into an entity collection
//! - Scope: Cancellation scope tying async work to a view's lifetime
//! - Error: Error types for decoding and scoped work
//!
//! ## Usage
//!
//! ```ignore
//! use shopsync_core::{reconcile, EntityCollection, InspectionRecord, SyncEvent};
//!
//! let view = EntityCollection::scoped("R1").with_entities(fetched);
//! let event = SyncEvent::decode("InspectionStarted", payload)?;
//! let view = reconcile(&view, &event);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod entity;
pub mod error;
pub mod event;
pub mod reconcile;
pub mod router;
pub mod scope;

// Re-export main types
pub use entity::{
    Entity, EntityCollection, EntityId, InspectionRecord, InspectionStatus, JobRecord, JobStatus,
    RepairOrderCard,
};
pub use error::{Error, Result};
pub use event::{EventKind, SyncEvent};
pub use reconcile::{apply_fetched, fold, reconcile, Merge, Outcome, Reconcile};
pub use router::{EventRouter, Handler, HandlerId};
pub use scope::ViewScope;
