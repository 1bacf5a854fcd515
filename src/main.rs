//! Kaizen CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kaizen::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => kaizen::cli::commands::run::execute(args, cli.json).await,
        Commands::Status(args) => kaizen::cli::commands::status::execute(args, cli.json).await,
        Commands::Retry(args) => kaizen::cli::commands::retry::execute(args, cli.json).await,
        Commands::Debug(args) => kaizen::cli::commands::debug::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        kaizen::cli::handle_error(err, cli.json);
    }
}
