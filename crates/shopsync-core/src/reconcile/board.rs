use super::{Merge, Reconcile};
use crate::entity::RepairOrderCard;
use crate::event::types::merge;
use crate::event::{EventKind, SyncEvent};

// Board columns are server defined; any move the server reports is trusted.
impl Reconcile for RepairOrderCard {
    const KINDS: &'static [EventKind] = &[
        EventKind::CardMoved,
        EventKind::CardCreated,
        EventKind::CardUpdated,
        EventKind::CardDeleted,
    ];

    fn create(event: &SyncEvent) -> Option<Self> {
        match event {
            SyncEvent::CardCreated(card) => Some(card.clone()),
            _ => None,
        }
    }

    fn merge(current: &Self, event: &SyncEvent) -> Merge<Self> {
        match event {
            SyncEvent::CardMoved(moved) => {
                let mut next = match &moved.updated_card_snapshot {
                    Some(snapshot) => snapshot.apply_to(current),
                    None => current.clone(),
                };
                next.status_id.clone_from(&moved.new_status_id);
                merge(&mut next.board_id, &moved.board_id);
                merge(&mut next.version, &moved.version);
                Merge::Replace(next)
            }
            // A creation snapshot for a card we already hold is a full refresh.
            SyncEvent::CardCreated(card) => Merge::Replace(card.clone()),
            SyncEvent::CardUpdated(patch) => Merge::Replace(patch.apply_to(current)),
            SyncEvent::CardDeleted(_) => Merge::Remove,
            _ => Merge::Reject("not a board event"),
        }
    }
}
