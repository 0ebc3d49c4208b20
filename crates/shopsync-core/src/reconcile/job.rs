use super::{Merge, Reconcile};
use crate::entity::JobRecord;
use crate::event::types::merge;
use crate::event::{EventKind, SyncEvent};

impl Reconcile for JobRecord {
    const KINDS: &'static [EventKind] = &[EventKind::JobStatusUpdated, EventKind::JobAssigned];

    // A newly assigned job arrives through a follow-up fetch, see `apply_fetched`.
    fn create(_event: &SyncEvent) -> Option<Self> {
        None
    }

    fn merge(current: &Self, event: &SyncEvent) -> Merge<Self> {
        let mut next = current.clone();
        match event {
            SyncEvent::JobStatusUpdated(updated) => {
                if current.status.is_terminal() && updated.new_status != current.status {
                    return Merge::Reject("job already completed");
                }
                next.status = updated.new_status;
                merge(&mut next.repair_order_id, &updated.repair_order_id);
                merge(&mut next.updated_at, &updated.updated_at);
                merge(&mut next.version, &updated.version);
            }
            SyncEvent::JobAssigned(assigned) => {
                merge(&mut next.technician_id, &assigned.technician_id);
                merge(&mut next.repair_order_id, &assigned.repair_order_id);
            }
            _ => return Merge::Reject("not a job event"),
        }
        Merge::Replace(next)
    }
}
