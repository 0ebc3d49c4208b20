use super::{Merge, Reconcile};
use crate::entity::{InspectionRecord, InspectionStatus};
use crate::event::types::merge;
use crate::event::{EventKind, SyncEvent};

/// Inspection lifecycle: New/Pending -> (assigned) Pending -> InProgress -> Completed.
/// Completed is terminal; only a repeat of the completion is accepted.
impl Reconcile for InspectionRecord {
    const KINDS: &'static [EventKind] = &[
        EventKind::InspectionStarted,
        EventKind::InspectionStatusUpdated,
        EventKind::InspectionCompleted,
    ];

    // Inspections are only created by the bulk fetch.
    fn create(_event: &SyncEvent) -> Option<Self> {
        None
    }

    fn merge(current: &Self, event: &SyncEvent) -> Merge<Self> {
        let mut next = current.clone();
        match event {
            SyncEvent::InspectionStarted(started) => {
                if current.status.is_terminal() {
                    return Merge::Reject("inspection already completed");
                }
                next.status = InspectionStatus::InProgress;
                merge(&mut next.technician_id, &started.technician_id);
                merge(&mut next.technician_name, &started.technician_name);
                merge(&mut next.started_at, &started.started_at);
                merge(&mut next.version, &started.version);
            }
            SyncEvent::InspectionStatusUpdated(updated) => {
                if current.status.is_terminal() && !updated.new_status.is_terminal() {
                    return Merge::Reject("inspection already completed");
                }
                next.status = updated.new_status;
                merge(&mut next.technician_id, &updated.technician_id);
                merge(&mut next.technician_name, &updated.technician_name);
                merge(&mut next.updated_at, &updated.updated_at);
                merge(&mut next.version, &updated.version);
            }
            SyncEvent::InspectionCompleted(completed) => {
                next.status = InspectionStatus::Completed;
                merge(&mut next.finding, &completed.finding);
                merge(&mut next.service_count, &completed.service_count);
                merge(&mut next.part_count, &completed.part_count);
                merge(&mut next.completed_at, &completed.completed_at);
                merge(&mut next.version, &completed.version);
            }
            _ => return Merge::Reject("not an inspection event"),
        }
        Merge::Replace(next)
    }
}
