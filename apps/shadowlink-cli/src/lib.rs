//! shadowlink CLI library
//!
//! The `shadowlink` binary is a thin wrapper over [`run`]; integration tests
//! drive the same entry points against temporary snapshot files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod store;

use config::Settings;
use error::CliResult;

/// shadowlink - keep source records and their mirrors in sync
#[derive(Parser, Debug)]
#[command(name = "shadowlink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log debug detail to stderr
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Snapshot file (overrides SHADOWLINK_DATA)
    #[arg(long, global = true, value_name = "PATH")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile a source kind with its mirror kind
    Sync(commands::sync::SyncArgs),

    /// Report whether one record's link is intact
    Check(commands::check::CheckArgs),
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli, mut settings: Settings) -> CliResult<()> {
    if let Some(path) = cli.data {
        settings.data_path = path;
    }

    match cli.command {
        Commands::Sync(args) => commands::sync::execute(args, &settings).await,
        Commands::Check(args) => commands::check::execute(args, &settings).await,
    }
}
