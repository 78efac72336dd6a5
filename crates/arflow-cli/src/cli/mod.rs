//! CLI command definitions for the `arflow` binary.
//!
//! Uses clap derive macros. Every command talks to the engine through
//! [`crate::state::AppState`].

pub mod batch;
pub mod instance;

use std::path::PathBuf;

use arflow_types::state::{ReviewAction, WorkflowStatus};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Run receivables through the checkpointed arflow pipeline.
#[derive(Parser)]
#[command(name = "arflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Detailed output (-v for verbose, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new instance and run it until it parks or finishes.
    Start(StartArgs),

    /// Resume a parked instance with a reviewer decision.
    Resume(ResumeArgs),

    /// Show the latest checkpoint of an instance.
    Status {
        /// Instance to inspect.
        instance_id: String,
    },

    /// List instances by status.
    #[command(alias = "ls")]
    List {
        /// Only show these statuses (repeatable). Defaults to all.
        #[arg(long, short, value_parser = parse_status)]
        status: Vec<WorkflowStatus>,
    },

    /// Cancel an instance.
    Cancel {
        instance_id: String,

        #[arg(long, default_value = "cancelled from cli")]
        reason: String,
    },

    /// Continue every instance a crashed process left in flight.
    Recover,

    /// Run a JSON file of inputs with bounded concurrency.
    Batch {
        /// Path to a JSON array of batch entries.
        file: PathBuf,

        /// Maximum instances running at once (defaults to `batch_concurrency`).
        #[arg(long, short)]
        concurrency: Option<usize>,
    },
}

#[derive(Args)]
pub struct StartArgs {
    /// Business subject (customer account, ledger, ...) the receivable belongs to.
    #[arg(long)]
    pub subject: String,

    /// Document URI handed to the extractor.
    #[arg(long)]
    pub document: String,

    /// Reuse this instance id instead of generating one.
    #[arg(long)]
    pub id: Option<String>,

    /// Known payer reference; overrides the extracted one.
    #[arg(long)]
    pub payer: Option<String>,

    /// Date payment terms are resolved against (YYYY-MM-DD).
    #[arg(long)]
    pub reference_date: Option<NaiveDate>,

    #[arg(long)]
    pub content_type: Option<String>,

    /// Origin label such as "email" or "upload".
    #[arg(long)]
    pub source: Option<String>,
}

#[derive(Args)]
pub struct ResumeArgs {
    pub instance_id: String,

    #[arg(long, value_enum)]
    pub action: DecisionArg,

    #[arg(long)]
    pub reviewer: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    /// Override a field, `key=value`. Values are parsed as JSON, falling back
    /// to a plain string. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DecisionArg {
    Approve,
    Reject,
    Escalate,
    Rerun,
}

impl From<DecisionArg> for ReviewAction {
    fn from(arg: DecisionArg) -> Self {
        match arg {
            DecisionArg::Approve => ReviewAction::Approve,
            DecisionArg::Reject => ReviewAction::Reject,
            DecisionArg::Escalate => ReviewAction::Escalate,
            DecisionArg::Rerun => ReviewAction::Rerun,
        }
    }
}

fn parse_status(s: &str) -> Result<WorkflowStatus, String> {
    s.replace('-', "_").parse()
}
