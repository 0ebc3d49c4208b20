//! Tests for synchronized views

use super::*;
use crate::error::Error;
use crate::mutation::{MockMutationService, MutationRequest};
use crate::snapshot::MockSnapshotSource;
use async_trait::async_trait;
use serde_json::json;
use shopsync_channels::{ClientFrame, MemoryTransport, ReconnectPolicy, Topic};
use shopsync_channels::settings::Heartbeat;
use shopsync_core::{EntityId, InspectionStatus, JobStatus};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_test::assert_ok;

fn channel(topic: Topic, hub: &MemoryTransport) -> ChannelManager {
    ChannelManager::new(
        topic,
        Arc::new(hub.clone()),
        ReconnectPolicy::new(vec![Duration::from_millis(10)], Duration::from_millis(20)),
        Heartbeat::default(),
    )
}

fn card(id: &str, status: &str) -> RepairOrderCard {
    let mut card = RepairOrderCard::new(id, status);
    card.board_id = Some("B1".into());
    card
}

fn board_source() -> MockSnapshotSource {
    let mut source = MockSnapshotSource::new();
    source
        .expect_fetch_board()
        .withf(|board| board.to_string() == "B1")
        .returning(|_| Ok(vec![card("c1", "1"), card("c2", "1")]));
    source
}

async fn next_change<T: Reconcile>(rx: &mut watch::Receiver<EntityCollection<T>>) -> EntityCollection<T> {
    tokio::time::timeout(Duration::from_secs(5), rx.changed())
        .await
        .expect("no change in time")
        .expect("view dropped");
    rx.borrow_and_update().clone()
}

#[tokio::test]
async fn test_board_view_folds_channel_events() {
    let hub = MemoryTransport::new();
    let view = SyncedView::open_board(channel(Topic::Board, &hub), &board_source(), "B1")
        .await
        .unwrap();
    assert_eq!(view.collection().len(), 2);
    assert_eq!(hub.sent_frames(Topic::Board), vec![ClientFrame::JoinGroup { group: "B1".into() }]);

    let mut rx = view.subscribe();
    hub.emit(
        Topic::Board,
        "CardMoved",
        json!({"entityId": "c1", "newStatusId": "4", "boardId": "B1"}),
    );

    let collection = next_change(&mut rx).await;
    assert_eq!(collection.get(&EntityId::from("c1")).unwrap().status_id, "4");
    assert_eq!(collection.get(&EntityId::from("c2")).unwrap().status_id, "1");
}

#[tokio::test]
async fn test_rejected_move_leaves_collection_untouched() {
    let hub = MemoryTransport::new();
    let view = SyncedView::open_board(channel(Topic::Board, &hub), &board_source(), "B1")
        .await
        .unwrap();
    let before = view.collection();

    let mut service = MockMutationService::new();
    service.expect_send().times(1).returning(|_, _| {
        Err(Error::MutationRejected {
            status: Some(409),
            message: "card is locked".into(),
        })
    });
    let coordinator = view.coordinator(Arc::new(service));

    let result = coordinator
        .submit(MutationRequest::MoveCard {
            card_id: "c1".into(),
            status_id: "4".into(),
        })
        .await;

    assert!(matches!(result, Err(Error::MutationRejected { .. })));
    assert_eq!(view.collection(), before);
    assert_eq!(
        serde_json::to_string(&view.collection()).unwrap(),
        serde_json::to_string(&before).unwrap()
    );
}

#[tokio::test]
async fn test_accepted_mutation_waits_for_event() {
    let hub = MemoryTransport::new();
    let view = SyncedView::open_board(channel(Topic::Board, &hub), &board_source(), "B1")
        .await
        .unwrap();
    let before = view.collection();

    let mut service = MockMutationService::new();
    service.expect_send().returning(|_, _| Ok(200));
    let ack = view
        .coordinator(Arc::new(service))
        .submit(MutationRequest::MoveCard {
            card_id: "c1".into(),
            status_id: "4".into(),
        })
        .await;
    assert_ok!(ack);
    assert_eq!(view.collection(), before);

    let mut rx = view.subscribe();
    hub.emit(
        Topic::Board,
        "CardMoved",
        json!({"entityId": "c1", "newStatusId": "4", "boardId": "B1"}),
    );
    let after = next_change(&mut rx).await;
    assert_eq!(after.get(&EntityId::from("c1")).unwrap().status_id, "4");
}

#[tokio::test]
async fn test_reopening_view_does_not_register_twice() {
    let hub = MemoryTransport::new();
    let board = channel(Topic::Board, &hub);
    let view = SyncedView::open_board(board.clone(), &board_source(), "B1")
        .await
        .unwrap();

    assert_ok!(view.open().await);
    for kind in RepairOrderCard::KINDS {
        assert_eq!(board.router().handler_count(*kind), 1);
    }
    assert_eq!(hub.join_count(Topic::Board, "B1"), 1);

    let mut rx = view.subscribe();
    hub.emit(Topic::Board, "CardDeleted", json!({"id": "c2", "boardId": "B1"}));
    let collection = next_change(&mut rx).await;
    assert_eq!(collection.len(), 1);
}

#[tokio::test]
async fn test_teardown_stops_updates_and_leaves_group() {
    let hub = MemoryTransport::new();
    let board = channel(Topic::Board, &hub);
    let view = SyncedView::open_board(board.clone(), &board_source(), "B1")
        .await
        .unwrap();
    let before = view.collection();

    view.teardown();
    assert!(!view.is_live());
    for kind in RepairOrderCard::KINDS {
        assert_eq!(board.router().handler_count(*kind), 0);
    }
    assert!(board.groups().is_empty());

    hub.emit(Topic::Board, "CardDeleted", json!({"id": "c1", "boardId": "B1"}));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(view.collection(), before);
    assert!(hub
        .sent_frames(Topic::Board)
        .contains(&ClientFrame::LeaveGroup { group: "B1".into() }));

    // Mutations from a torn-down view are refused.
    let service = MockMutationService::new();
    let err = view
        .coordinator(Arc::new(service))
        .submit(MutationRequest::UpdateCardNotes {
            card_id: "c1".into(),
            notes: "late".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_teardown_keeps_other_views_on_channel() {
    let hub = MemoryTransport::new();
    let inspections = channel(Topic::Inspection, &hub);
    let mut source = MockSnapshotSource::new();
    source
        .expect_fetch_inspections()
        .returning(|ro| Ok(vec![InspectionRecord::new("X", ro.to_string())]));

    let r1 = SyncedView::open_inspections(inspections.clone(), &source, "R1").await.unwrap();
    let r2 = SyncedView::open_inspections(inspections.clone(), &source, "R2").await.unwrap();
    r1.teardown();

    let mut rx = r2.subscribe();
    hub.emit(
        Topic::Inspection,
        "InspectionStarted",
        json!({"inspectionId": "X", "repairOrderId": "R2", "technicianId": "T1"}),
    );
    let collection = next_change(&mut rx).await;
    let record = collection.get(&EntityId::from("X")).unwrap();
    assert_eq!(record.status, InspectionStatus::InProgress);
    assert_eq!(inspections.groups(), vec!["R2".to_string()]);
}

#[tokio::test]
async fn test_out_of_scope_events_are_ignored() {
    let hub = MemoryTransport::new();
    let mut source = MockSnapshotSource::new();
    source
        .expect_fetch_inspections()
        .returning(|ro| Ok(vec![InspectionRecord::new("X", ro.to_string())]));
    let view = SyncedView::open_inspections(channel(Topic::Inspection, &hub), &source, "R1")
        .await
        .unwrap();
    let before = view.collection();

    hub.emit(
        Topic::Inspection,
        "InspectionCompleted",
        json!({"inspectionId": "X", "repairOrderId": "R9"}),
    );
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(view.collection(), before);
}

#[tokio::test]
async fn test_job_assigned_fetches_job() {
    let hub = MemoryTransport::new();
    let mut source = MockSnapshotSource::new();
    source.expect_fetch_jobs().returning(|_| Ok(Vec::new()));
    source
        .expect_fetch_job()
        .withf(|id| id.to_string() == "J9")
        .times(1)
        .returning(|id| {
            let mut job = JobRecord::new(id.to_string());
            job.technician_id = Some("T1".into());
            job.status = JobStatus::InProgress;
            Ok(job)
        });

    let view = SyncedView::open_jobs(channel(Topic::Job, &hub), Arc::new(source), "T1")
        .await
        .unwrap();
    assert!(view.collection().is_empty());

    let mut rx = view.subscribe();
    hub.emit(Topic::Job, "JobAssigned", json!({"jobId": "J9", "technicianId": "T1"}));
    // Assigned to someone else: no fetch.
    hub.emit(Topic::Job, "JobAssigned", json!({"jobId": "J8", "technicianId": "T2"}));

    let collection = next_change(&mut rx).await;
    let job = collection.get(&EntityId::from("J9")).unwrap();
    assert_eq!(job.status, JobStatus::InProgress);
    assert_eq!(collection.len(), 1);
}

struct GatedSource {
    gate: Arc<Notify>,
}

#[async_trait]
impl SnapshotSource for GatedSource {
    async fn fetch_board(&self, _board_id: &str) -> Result<Vec<RepairOrderCard>> {
        Ok(Vec::new())
    }

    async fn fetch_inspections(&self, _repair_order_id: &str) -> Result<Vec<InspectionRecord>> {
        Ok(Vec::new())
    }

    async fn fetch_jobs(&self, _technician_id: &str) -> Result<Vec<JobRecord>> {
        Ok(Vec::new())
    }

    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord> {
        self.gate.notified().await;
        Ok(JobRecord::new(job_id))
    }
}

#[tokio::test]
async fn test_fetch_finishing_after_teardown_is_discarded() {
    let hub = MemoryTransport::new();
    let gate = Arc::new(Notify::new());
    let source = Arc::new(GatedSource {
        gate: Arc::clone(&gate),
    });
    let jobs = channel(Topic::Job, &hub);
    let view = SyncedView::open_jobs(jobs.clone(), source, "T1").await.unwrap();

    hub.emit(Topic::Job, "JobAssigned", json!({"jobId": "J9"}));
    tokio::time::timeout(Duration::from_secs(5), async {
        while jobs.router().dispatched() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    view.teardown();
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(view.collection().is_empty());
}
