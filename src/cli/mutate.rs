//! Mutation commands

use anyhow::{Context, Result};
use std::sync::Arc;

use shopsync_client::{HttpMutationService, MutationCoordinator, MutationRequest};
use shopsync_core::ViewScope;

use super::Commands;
use crate::settings::AppConfig;

/// Map a mutation command to its request
pub fn request_for(command: Commands) -> Option<MutationRequest> {
    let request = match command {
        Commands::MoveCard { card_id, status_id } => MutationRequest::MoveCard { card_id, status_id },
        Commands::AssignInspection {
            inspection_id,
            technician_id,
        } => MutationRequest::AssignInspection {
            inspection_id,
            technician_id,
        },
        Commands::JobStatus { job_id, status } => MutationRequest::UpdateJobStatus { job_id, status },
        Commands::AssignJob {
            job_id,
            technician_id,
        } => MutationRequest::AssignJob {
            job_id,
            technician_id,
        },
        Commands::CardNotes { card_id, notes } => MutationRequest::UpdateCardNotes { card_id, notes },
        Commands::Watch { .. } | Commands::Doctor => return None,
    };
    Some(request)
}

/// Submit one mutation and report acceptance
pub async fn run(config: &AppConfig, request: MutationRequest) -> Result<()> {
    let service = HttpMutationService::new(&config.server.base_url, &config.mutations)
        .context("Failed to create mutation client")?;
    let coordinator = MutationCoordinator::new(Arc::new(service), ViewScope::new("cli"));

    let target = request.target_id().to_string();
    let name = request.name();
    let ack = coordinator
        .submit(request)
        .await
        .with_context(|| format!("{name} on {target} was rejected"))?;

    println!(
        "✅ {name} on {target} accepted (HTTP {}, key {})",
        ack.status, ack.idempotency_key
    );
    println!("   The change will appear once the server publishes it.");
    Ok(())
}
