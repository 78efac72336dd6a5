//! `arflow batch`: run a file of inputs through the batch coordinator.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde::Deserialize;
use uuid::Uuid;

use arflow_core::pipeline::{BatchItem, BatchResult};
use arflow_types::state::IntakeInput;

use super::instance::{status_color, truncate};
use crate::state::AppState;

/// One element of the batch file.
#[derive(Debug, Deserialize)]
struct BatchEntry {
    /// Generated when absent.
    #[serde(default)]
    instance_id: Option<String>,
    subject_id: String,
    input: IntakeInput,
}

impl From<BatchEntry> for BatchItem {
    fn from(entry: BatchEntry) -> Self {
        BatchItem {
            instance_id: entry
                .instance_id
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            subject_id: entry.subject_id,
            input: entry.input,
        }
    }
}

fn parse_batch(content: &str) -> Result<Vec<BatchItem>> {
    let entries: Vec<BatchEntry> =
        serde_json::from_str(content).context("batch file must be a JSON array of entries")?;
    Ok(entries.into_iter().map(BatchItem::from).collect())
}

pub async fn run(
    state: &AppState,
    file: &Path,
    concurrency: Option<usize>,
    json: bool,
) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let items = parse_batch(&content)?;
    let concurrency = concurrency.unwrap_or(state.engine.config().batch_concurrency);

    tracing::info!(items = items.len(), concurrency, "running batch");
    let result = state.batch_coordinator().run_batch(items, concurrency).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn print_summary(result: &BatchResult) {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Instance").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("OK").fg(Color::White),
        Cell::new("Error").fg(Color::White),
    ]);

    for item in &result.results {
        let status = match item.status {
            Some(status) => Cell::new(status).fg(status_color(status)),
            None => Cell::new("-").fg(Color::DarkGrey),
        };
        let ok = if item.success {
            Cell::new("✓").fg(Color::Green)
        } else {
            Cell::new("✗").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&item.instance_id).fg(Color::Cyan),
            status,
            ok,
            Cell::new(truncate(item.error.as_deref().unwrap_or(""), 48)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!(
        "  {} total, {} succeeded, {} failed",
        style(result.total).bold(),
        style(result.succeeded).green(),
        style(result.failed).red()
    );
    println!();
}
