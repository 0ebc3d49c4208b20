//! End-to-end sync flow over the in-memory hub
//!
//! mutation -> (server) event -> channel -> router -> reconciler -> view

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shopsync_channels::{ChannelRegistry, ChannelSettings, ConnectionState, MemoryTransport, Topic};
use shopsync_client::{
    Error, MutationRequest, MutationService, Result, SnapshotSource, SyncedView,
};
use shopsync_core::{
    EntityCollection, EntityId, InspectionRecord, InspectionStatus, JobRecord, JobStatus, Reconcile,
    RepairOrderCard,
};

/// Server stand-in: accepts mutations and publishes the resulting event
struct FakeShop {
    hub: MemoryTransport,
    reject: bool,
    keys: Mutex<Vec<String>>,
}

#[async_trait]
impl MutationService for FakeShop {
    async fn send(&self, request: &MutationRequest, idempotency_key: &str) -> Result<u16> {
        self.keys.lock().unwrap().push(idempotency_key.to_string());
        if self.reject {
            return Err(Error::MutationRejected {
                status: Some(409),
                message: "conflict".into(),
            });
        }
        match request {
            MutationRequest::MoveCard { card_id, status_id } => {
                self.hub.emit(
                    Topic::Board,
                    "CardMoved",
                    json!({
                        "entityId": card_id,
                        "newStatusId": status_id,
                        "boardId": "B1",
                        "updatedCardSnapshot": {"id": card_id, "progressPercent": 50}
                    }),
                );
            }
            MutationRequest::AssignInspection {
                inspection_id,
                technician_id,
            } => {
                self.hub.emit(
                    Topic::Inspection,
                    "InspectionStatusUpdated",
                    json!({
                        "inspectionId": inspection_id,
                        "repairOrderId": "R1",
                        "newStatus": "Pending",
                        "technicianId": technician_id
                    }),
                );
            }
            _ => {}
        }
        Ok(202)
    }
}

struct Snapshot;

#[async_trait]
impl SnapshotSource for Snapshot {
    async fn fetch_board(&self, board_id: &str) -> Result<Vec<RepairOrderCard>> {
        let mut card = RepairOrderCard::new("c1", "1");
        card.board_id = Some(board_id.to_string());
        Ok(vec![card])
    }

    async fn fetch_inspections(&self, repair_order_id: &str) -> Result<Vec<InspectionRecord>> {
        Ok(vec![InspectionRecord::new("X", repair_order_id)])
    }

    async fn fetch_jobs(&self, _technician_id: &str) -> Result<Vec<JobRecord>> {
        Ok(vec![JobRecord::new("J1")])
    }

    async fn fetch_job(&self, job_id: &str) -> Result<JobRecord> {
        Ok(JobRecord::new(job_id))
    }
}

fn registry(hub: &MemoryTransport) -> ChannelRegistry {
    let settings = ChannelSettings {
        reconnect_delays_secs: vec![1],
        ..ChannelSettings::default()
    };
    ChannelRegistry::init(&settings, Arc::new(hub.clone()))
}

async fn wait_for<T: Reconcile>(
    view: &SyncedView<T>,
    mut done: impl FnMut(&EntityCollection<T>) -> bool,
) -> EntityCollection<T> {
    let mut rx = view.subscribe();
    let collection = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|c| done(c)))
        .await
        .expect("view did not converge")
        .expect("view dropped")
        .clone();
    collection
}

#[tokio::test]
async fn test_card_move_round_trip() {
    let hub = MemoryTransport::new();
    let registry = registry(&hub);
    let board = registry.get(Topic::Board).unwrap().clone();
    let view = SyncedView::open_board(board, &Snapshot, "B1").await.unwrap();

    let shop = Arc::new(FakeShop {
        hub: hub.clone(),
        reject: false,
        keys: Mutex::new(Vec::new()),
    });
    let ack = view
        .coordinator(shop.clone())
        .submit(MutationRequest::MoveCard {
            card_id: "c1".into(),
            status_id: "3".into(),
        })
        .await
        .unwrap();
    assert_eq!(ack.status, 202);
    assert_eq!(shop.keys.lock().unwrap().as_slice(), [ack.idempotency_key.clone()]);

    let collection = wait_for(&view, |c| {
        c.get(&EntityId::from("c1")).is_some_and(|card| card.status_id == "3")
    })
    .await;
    let card = collection.get(&EntityId::from("c1")).unwrap();
    assert_eq!(card.progress_percent, Some(50));

    registry.teardown().await;
    assert_eq!(
        registry.get(Topic::Board).unwrap().state(),
        ConnectionState::Disconnected
    );
}

#[tokio::test]
async fn test_rejected_mutation_changes_nothing() {
    let hub = MemoryTransport::new();
    let registry = registry(&hub);
    let board = registry.get(Topic::Board).unwrap().clone();
    let view = SyncedView::open_board(board, &Snapshot, "B1").await.unwrap();
    let before = view.collection();

    let shop = Arc::new(FakeShop {
        hub: hub.clone(),
        reject: true,
        keys: Mutex::new(Vec::new()),
    });
    let err = view
        .coordinator(shop)
        .submit(MutationRequest::MoveCard {
            card_id: "c1".into(),
            status_id: "3".into(),
        })
        .await
        .unwrap_err();

    assert_eq!(err.code(), "mutation_rejected");
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(view.collection(), before);
}

#[tokio::test]
async fn test_inspection_lifecycle_across_reconnect() {
    let hub = MemoryTransport::new();
    let registry = registry(&hub);
    let channel = registry.get(Topic::Inspection).unwrap().clone();
    let view = SyncedView::open_inspections(channel.clone(), &Snapshot, "R1")
        .await
        .unwrap();

    let shop = Arc::new(FakeShop {
        hub: hub.clone(),
        reject: false,
        keys: Mutex::new(Vec::new()),
    });
    view.coordinator(shop)
        .submit(MutationRequest::AssignInspection {
            inspection_id: "X".into(),
            technician_id: "T1".into(),
        })
        .await
        .unwrap();
    wait_for(&view, |c| {
        c.get(&EntityId::from("X"))
            .is_some_and(|i| i.technician_id.as_deref() == Some("T1"))
    })
    .await;

    // The session drops; the completion is published on the next one.
    hub.preload_next_session(
        Topic::Inspection,
        vec![shopsync_channels::ServerFrame::event(
            "InspectionCompleted",
            json!({"inspectionId": "X", "repairOrderId": "R1", "serviceCount": 2, "partCount": 5}),
        )],
    );
    hub.sever(Topic::Inspection);

    let collection = wait_for(&view, |c| {
        c.get(&EntityId::from("X"))
            .is_some_and(|i| i.status == InspectionStatus::Completed)
    })
    .await;
    let inspection = collection.get(&EntityId::from("X")).unwrap();
    assert_eq!(inspection.service_count, Some(2));
    assert_eq!(inspection.technician_id.as_deref(), Some("T1"));
    assert_eq!(hub.join_count(Topic::Inspection, "R1"), 2);

    // Completed is terminal.
    hub.emit(
        Topic::Inspection,
        "InspectionStarted",
        json!({"inspectionId": "X", "repairOrderId": "R1"}),
    );
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(
        view.collection().get(&EntityId::from("X")).unwrap().status,
        InspectionStatus::Completed
    );
}

#[tokio::test]
async fn test_job_status_updates_flow_into_job_view() {
    let hub = MemoryTransport::new();
    let registry = registry(&hub);
    let channel = registry.get(Topic::Job).unwrap().clone();
    let view = SyncedView::open_jobs(channel, Arc::new(Snapshot), "T1").await.unwrap();

    hub.emit(
        Topic::Job,
        "JobStatusUpdated",
        json!({"jobId": "J1", "newStatus": "OnHold"}),
    );
    // Duplicate delivery is harmless.
    hub.emit(
        Topic::Job,
        "JobStatusUpdated",
        json!({"jobId": "J1", "newStatus": "OnHold"}),
    );

    let collection = wait_for(&view, |c| {
        c.get(&EntityId::from("J1"))
            .is_some_and(|j| j.status == JobStatus::OnHold)
    })
    .await;
    assert_eq!(collection.len(), 1);
}
