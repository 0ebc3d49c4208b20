//! State Reconciler
//!
//! Pure functions folding one authoritative event into an entity collection.
//! This is the only code allowed to change a view's collection in response to
//! wire events.
//!
//! Every fold runs the same pipeline:
//!
//! 1. events for another entity variant leave the collection unchanged
//! 2. an event scoped to a different parent than the collection is dropped
//! 3. the target entity is looked up:
//!    - missing + creation event: insert the snapshot
//!    - missing + anything else: unchanged, never synthesize a partial entity
//!    - present: stale versions are dropped, otherwise the variant merges the
//!      event's fields over the entity (or removes it for deletions)
//!
//! Merges only ever *set* fields, so folding the same event twice yields the
//! same collection as folding it once.

mod board;
mod inspection;
mod job;

use crate::entity::{Entity, EntityCollection};
use crate::event::{EventKind, SyncEvent};

/// Result of merging an event into a present entity
#[derive(Debug, Clone, PartialEq)]
pub enum Merge<T> {
    /// Replace the entity with this value
    Replace(T),
    /// Remove the entity from the collection
    Remove,
    /// Leave the entity untouched
    Reject(&'static str),
}

/// What a fold did to the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Present entity updated
    Applied,
    /// New entity inserted
    Inserted,
    /// Entity removed
    Removed,
    /// Event targets another entity variant
    NotApplicable,
    /// Event scope differs from the collection scope
    OutOfScope,
    /// Non-creation event for an entity not in the collection
    UnknownEntity,
    /// Event version older than the stored entity
    Stale,
    /// Variant refused the transition
    Rejected(&'static str),
}

impl Outcome {
    /// Whether the collection changed
    #[must_use]
    pub fn changed(self) -> bool {
        matches!(self, Self::Applied | Self::Inserted | Self::Removed)
    }
}

/// Per-variant reconciliation rules
pub trait Reconcile: Entity {
    /// Event kinds this variant reacts to
    const KINDS: &'static [EventKind];

    /// Build a new entity from a creation event
    fn create(event: &SyncEvent) -> Option<Self>;

    /// Merge an event into a present entity
    fn merge(current: &Self, event: &SyncEvent) -> Merge<Self>;
}

/// Fold `event` into `prior`, producing the next collection
#[must_use]
pub fn reconcile<T: Reconcile>(
    prior: &EntityCollection<T>,
    event: &SyncEvent,
) -> EntityCollection<T> {
    fold(prior, event).0
}

/// Like [`reconcile`], also reporting what happened
#[must_use]
pub fn fold<T: Reconcile>(
    prior: &EntityCollection<T>,
    event: &SyncEvent,
) -> (EntityCollection<T>, Outcome) {
    if !T::KINDS.contains(&event.kind()) {
        return (prior.clone(), Outcome::NotApplicable);
    }
    if !in_scope(prior.scope(), event.scope_id()) {
        return (prior.clone(), Outcome::OutOfScope);
    }

    let id = event.target_id();
    let Some(current) = prior.get(id) else {
        if !event.is_creation() {
            return (prior.clone(), Outcome::UnknownEntity);
        }
        return match T::create(event) {
            Some(entity) => {
                let mut next = prior.clone();
                next.insert(entity);
                (next, Outcome::Inserted)
            }
            None => (prior.clone(), Outcome::Rejected("creation event without snapshot")),
        };
    };

    if is_stale(current.version(), event.version()) {
        return (prior.clone(), Outcome::Stale);
    }

    match T::merge(current, event) {
        Merge::Replace(entity) => {
            debug_assert_eq!(entity.id(), current.id());
            let mut next = prior.clone();
            next.insert(entity);
            (next, Outcome::Applied)
        }
        Merge::Remove => {
            let mut next = prior.clone();
            next.remove(id);
            (next, Outcome::Removed)
        }
        Merge::Reject(reason) => (prior.clone(), Outcome::Rejected(reason)),
    }
}

/// Fold an entity obtained by a follow-up fetch into `prior`
///
/// Same scope and version rules as events; a fetched entity is authoritative,
/// so it is inserted or replaces the present one wholesale.
#[must_use]
pub fn apply_fetched<T: Entity>(prior: &EntityCollection<T>, entity: T) -> EntityCollection<T> {
    if !in_scope(prior.scope(), entity.scope_id()) {
        return prior.clone();
    }
    if let Some(current) = prior.get(entity.id()) {
        if is_stale(current.version(), entity.version()) {
            return prior.clone();
        }
    }
    let mut next = prior.clone();
    next.insert(entity);
    next
}

// An unscoped collection accepts any event; unscoped events match any collection.
fn in_scope(collection: Option<&str>, event: Option<&str>) -> bool {
    match (collection, event) {
        (Some(expected), Some(actual)) => expected == actual,
        _ => true,
    }
}

// Equal versions re-apply so duplicate delivery stays idempotent.
fn is_stale(current: Option<u64>, incoming: Option<u64>) -> bool {
    matches!((current, incoming), (Some(current), Some(incoming)) if incoming < current)
}
