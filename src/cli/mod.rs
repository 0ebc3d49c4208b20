//! CLI module for Shopsync
//!
//! Provides commands:
//! - `watch`: Follow a board, inspection list or job list live
//! - `move-card`, `assign-inspection`, `job-status`, `assign-job`, `card-notes`: Submit mutations
//! - `doctor`: Check configuration and hub connectivity

use clap::{Parser, Subcommand};
use shopsync_core::JobStatus;

pub mod doctor;
pub mod mutate;
pub mod watch;

/// Shopsync shop-floor sync CLI
#[derive(Parser, Debug)]
#[command(name = "shopsync")]
#[command(about = "Live shop-floor dashboard state sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow a view and print it on every change
    Watch {
        #[command(subcommand)]
        target: WatchTarget,
    },
    /// Move a repair-order card to another status column
    MoveCard { card_id: String, status_id: String },
    /// Assign a technician to an inspection
    AssignInspection {
        inspection_id: String,
        technician_id: String,
    },
    /// Change a job's status (new, in-progress, completed, on-hold)
    JobStatus { job_id: String, status: JobStatus },
    /// Assign a technician to a job
    AssignJob { job_id: String, technician_id: String },
    /// Replace a card's notes
    CardNotes { card_id: String, notes: String },
    /// Check configuration and hub connectivity
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum WatchTarget {
    /// Repair-order board
    Board { board_id: String },
    /// Inspections of one repair order
    Inspections { repair_order_id: String },
    /// Jobs of one technician
    Jobs { technician_id: String },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = crate::settings::load_config()?;
    match cli.command {
        Some(Commands::Watch { target }) => watch::run(&config, target).await,
        Some(Commands::Doctor) => doctor::run(&config).await,
        Some(command) => match mutate::request_for(command) {
            Some(request) => mutate::run(&config, request).await,
            None => Ok(()),
        },
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
