//! Live view commands

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use shopsync_channels::{ChannelRegistry, Topic, WebSocketTransport};
use shopsync_client::{HttpSnapshotSource, SnapshotSource, SyncedView};
use shopsync_core::{EntityCollection, InspectionRecord, JobRecord, Reconcile, RepairOrderCard};

use super::WatchTarget;
use crate::settings::AppConfig;

/// Follow a view until Ctrl-C
pub async fn run(config: &AppConfig, target: WatchTarget) -> Result<()> {
    let transport = WebSocketTransport::new(&config.server.hub_url(), config.channels.connect_timeout())
        .context("Invalid hub URL")?;
    let registry = ChannelRegistry::init(&config.channels, Arc::new(transport));
    let source: Arc<dyn SnapshotSource> = Arc::new(
        HttpSnapshotSource::new(&config.server.base_url, Duration::from_secs(config.mutations.timeout_secs.max(1)))
            .context("Failed to create snapshot client")?,
    );

    let result = match target {
        WatchTarget::Board { board_id } => {
            let channel = registry.get(Topic::Board)?.clone();
            let view = SyncedView::open_board(channel, source.as_ref(), &board_id)
                .await
                .context("Failed to open board view")?;
            follow(&view, render_card).await
        }
        WatchTarget::Inspections { repair_order_id } => {
            let channel = registry.get(Topic::Inspection)?.clone();
            let view = SyncedView::open_inspections(channel, source.as_ref(), &repair_order_id)
                .await
                .context("Failed to open inspection view")?;
            follow(&view, render_inspection).await
        }
        WatchTarget::Jobs { technician_id } => {
            let channel = registry.get(Topic::Job)?.clone();
            let view = SyncedView::open_jobs(channel, Arc::clone(&source), &technician_id)
                .await
                .context("Failed to open job view")?;
            follow(&view, render_job).await
        }
    };

    registry.teardown().await;
    result
}

async fn follow<T: Reconcile>(view: &SyncedView<T>, render: fn(&T) -> String) -> Result<()> {
    let mut changes = view.subscribe();
    let mut state = view.channel().subscribe_state();
    print_collection(&changes.borrow_and_update(), render);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                print_collection(&changes.borrow_and_update(), render);
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                println!("-- channel {current}");
            }
        }
    }

    view.teardown();
    Ok(())
}

fn print_collection<T: Reconcile>(collection: &EntityCollection<T>, render: fn(&T) -> String) {
    println!();
    match collection.scope() {
        Some(scope) => println!("== {scope} ({} entries)", collection.len()),
        None => println!("== {} entries", collection.len()),
    }
    for entity in collection.iter() {
        println!("  {}", render(entity));
    }
}

fn render_card(card: &RepairOrderCard) -> String {
    format!(
        "{:<10} status={:<6} {:>3}%  {}  {}",
        card.id.as_str(),
        card.status_id,
        card.progress_percent.unwrap_or(0),
        card.ro_number.as_deref().unwrap_or("-"),
        card.technician_name.as_deref().unwrap_or("unassigned"),
    )
}

fn render_inspection(inspection: &InspectionRecord) -> String {
    format!(
        "{:<10} {:<12} {}  services={} parts={}",
        inspection.id.as_str(),
        format!("{:?}", inspection.status),
        inspection.technician_name.as_deref().unwrap_or("unassigned"),
        inspection.service_count.unwrap_or(0),
        inspection.part_count.unwrap_or(0),
    )
}

fn render_job(job: &JobRecord) -> String {
    format!(
        "{:<10} {:<10} {}",
        job.id.as_str(),
        format!("{:?}", job.status),
        job.title.as_deref().unwrap_or("-"),
    )
}
