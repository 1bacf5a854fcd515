//! CLI type definitions and error reporting.

pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kaizen")]
#[command(about = "Kaizen - maker/checker convergence loop for code changes", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the convergence loop for one change
    Run(commands::run::RunArgs),

    /// Show the persisted loop state for a change
    Status(commands::status::StatusArgs),

    /// Reset persisted state so the next run starts from scratch
    Retry(commands::retry::RetryArgs),

    /// Dump the raw persisted state as JSON
    Debug(commands::debug::DebugArgs),
}

/// Report a fatal error and exit non-zero.
///
/// Startup and configuration failures land here; a loop that reaches a
/// terminal phase cleanly exits zero through the normal path instead.
pub fn handle_error(err: anyhow::Error, json: bool) {
    if json {
        let payload = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{payload}");
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
