//! arflow CLI entry point.
//!
//! Binary name: `arflow`
//!
//! Parses arguments, wires the SQLite checkpoint store and HTTP advisors into
//! the engine, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let state = AppState::init().await?;

    match cli.command {
        Commands::Start(args) => cli::instance::start(&state, args, cli.json).await?,
        Commands::Resume(args) => cli::instance::resume(&state, args, cli.json).await?,
        Commands::Status { instance_id } => {
            cli::instance::status(&state, &instance_id, cli.json).await?
        }
        Commands::List { status } => cli::instance::list(&state, &status, cli.json).await?,
        Commands::Cancel {
            instance_id,
            reason,
        } => cli::instance::cancel(&state, &instance_id, &reason, cli.json).await?,
        Commands::Recover => cli::instance::recover(&state, cli.json).await?,
        Commands::Batch { file, concurrency } => {
            cli::batch::run(&state, &file, concurrency, cli.json).await?
        }
    }

    Ok(())
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(cli: &Cli) {
    let default_filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,arflow_core=debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
