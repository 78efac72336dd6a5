//! Single-instance commands: start, resume, status, list, cancel, recover.

use anyhow::{Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::{Map, Value};

use arflow_types::state::{
    Checkpoint, DocumentRef, IntakeInput, InvoiceState, ReviewDecision, WorkflowStatus,
};

use super::{ResumeArgs, StartArgs};
use crate::state::AppState;

const ALL_STATUSES: [WorkflowStatus; 8] = [
    WorkflowStatus::Processing,
    WorkflowStatus::Ready,
    WorkflowStatus::Exception,
    WorkflowStatus::HumanReview,
    WorkflowStatus::Escalated,
    WorkflowStatus::Completed,
    WorkflowStatus::Failed,
    WorkflowStatus::Cancelled,
];

pub async fn start(state: &AppState, args: StartArgs, json: bool) -> Result<()> {
    let input = IntakeInput {
        document: DocumentRef {
            uri: args.document,
            content_type: args.content_type,
            checksum: None,
        },
        payer_ref: args.payer,
        reference_date: args.reference_date,
        source: args.source,
        metadata: Map::new(),
    };

    let result = match &args.id {
        Some(id) => state.engine.start_with_id(id, &args.subject, input).await?,
        None => state.engine.start(&args.subject, input).await?,
    };
    print_state(&result, json)
}

pub async fn resume(state: &AppState, args: ResumeArgs, json: bool) -> Result<()> {
    let mut decision = ReviewDecision::new(args.action.into());
    decision.reviewer = args.reviewer;
    decision.notes = args.notes;
    decision.overrides = parse_overrides(&args.overrides)?;

    let result = state.engine.resume(&args.instance_id, decision).await?;
    print_state(&result, json)
}

pub async fn status(state: &AppState, instance_id: &str, json: bool) -> Result<()> {
    match state.engine.get_status(instance_id).await? {
        Some(result) => print_state(&result, json),
        None => bail!("instance '{instance_id}' not found"),
    }
}

pub async fn list(state: &AppState, statuses: &[WorkflowStatus], json: bool) -> Result<()> {
    let statuses = if statuses.is_empty() {
        &ALL_STATUSES[..]
    } else {
        statuses
    };
    let checkpoints = state.engine.list(statuses).await?;

    if json {
        let rows: Vec<Value> = checkpoints.iter().map(checkpoint_summary).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if checkpoints.is_empty() {
        println!();
        println!("  {}", style("No instances found.").dim());
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Instance").fg(Color::White),
        Cell::new("Subject").fg(Color::White),
        Cell::new("Step").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Errors").fg(Color::White),
        Cell::new("Last error").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for cp in &checkpoints {
        table.add_row(vec![
            Cell::new(&cp.instance_id).fg(Color::Cyan),
            Cell::new(&cp.subject_id),
            Cell::new(cp.current_step),
            Cell::new(cp.status).fg(status_color(cp.status)),
            Cell::new(cp.error_count),
            Cell::new(truncate(cp.last_error.as_deref().unwrap_or("-"), 48)).fg(Color::DarkGrey),
            Cell::new(cp.updated_at.format("%Y-%m-%d %H:%M:%S")).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

pub async fn cancel(state: &AppState, instance_id: &str, reason: &str, json: bool) -> Result<()> {
    let cancelled = state.engine.cancel(instance_id, reason).await?;

    if json {
        let out = serde_json::json!({ "instance_id": instance_id, "cancelled": cancelled });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if cancelled {
        println!();
        println!("  {} Cancelled {}", style("✓").green(), style(instance_id).cyan());
        println!();
    } else {
        println!();
        println!(
            "  {} {} is missing or already finished",
            style("✗").yellow(),
            style(instance_id).cyan()
        );
        println!();
    }
    Ok(())
}

pub async fn recover(state: &AppState, json: bool) -> Result<()> {
    let recovered = state.engine.recover().await?;

    if json {
        let rows: Vec<Value> = recovered
            .iter()
            .map(|s| {
                serde_json::json!({
                    "instance_id": s.instance_id,
                    "status": s.status,
                    "current_step": s.current_step,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!();
    println!("  Recovered {} instance(s)", style(recovered.len()).bold());
    for s in &recovered {
        println!(
            "    {}  {}  {}",
            style(&s.instance_id).cyan(),
            styled_status(s.status),
            style(s.current_step).dim()
        );
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

pub(crate) fn print_state(state: &InvoiceState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style("Instance").bold(),
        style(&state.instance_id).cyan()
    );
    println!("  Subject:  {}", state.subject_id);
    println!("  Status:   {}", styled_status(state.status));
    println!("  Step:     {}", state.current_step);
    if let Some(previous) = state.previous_step {
        println!("  Previous: {}", style(previous).dim());
    }
    println!(
        "  Retries:  {}/{}",
        state.retry_count, state.max_retries
    );
    if let Some(message) = &state.error_message {
        let kind = state
            .error_kind
            .map(|k| k.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("  Error:    {} ({kind})", style(message).red());
    }
    if state.review.requires_review {
        println!(
            "  Review:   {}",
            style(state.review.reason.as_deref().unwrap_or("required")).yellow()
        );
    }
    if let Some(export_ref) = &state.export.export_ref {
        println!("  Export:   {}", style(export_ref).green());
    }
    println!();
    Ok(())
}

fn checkpoint_summary(cp: &Checkpoint) -> Value {
    serde_json::json!({
        "instance_id": cp.instance_id,
        "subject_id": cp.subject_id,
        "current_step": cp.current_step,
        "status": cp.status,
        "revision": cp.revision,
        "error_count": cp.error_count,
        "last_error": cp.last_error,
        "updated_at": cp.updated_at,
    })
}

pub(crate) fn styled_status(status: WorkflowStatus) -> console::StyledObject<&'static str> {
    let s = style(status.as_str());
    match status {
        WorkflowStatus::Completed => s.green(),
        WorkflowStatus::HumanReview | WorkflowStatus::Exception => s.yellow(),
        WorkflowStatus::Failed | WorkflowStatus::Escalated => s.red(),
        WorkflowStatus::Cancelled => s.dim(),
        WorkflowStatus::Processing | WorkflowStatus::Ready => s.cyan(),
    }
}

pub(crate) fn status_color(status: WorkflowStatus) -> Color {
    match status {
        WorkflowStatus::Completed => Color::Green,
        WorkflowStatus::HumanReview | WorkflowStatus::Exception => Color::Yellow,
        WorkflowStatus::Failed | WorkflowStatus::Escalated => Color::Red,
        WorkflowStatus::Cancelled => Color::DarkGrey,
        WorkflowStatus::Processing | WorkflowStatus::Ready => Color::Cyan,
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

/// Parse `key=value` pairs. Values that are valid JSON keep their type.
fn parse_overrides(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut overrides = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("override '{pair}' must look like key=value");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("override '{pair}' has an empty key");
        }
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        overrides.insert(key.to_string(), value);
    }
    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_keep_json_types() {
        let pairs = vec![
            "payer_ref=P-9".to_string(),
            "amount=12.5".to_string(),
            "flags={\"rush\":true}".to_string(),
        ];
        let map = parse_overrides(&pairs).unwrap();
        assert_eq!(map["payer_ref"], Value::String("P-9".to_string()));
        assert_eq!(map["amount"], serde_json::json!(12.5));
        assert_eq!(map["flags"]["rush"], Value::Bool(true));
    }

    #[test]
    fn overrides_reject_missing_separator() {
        assert!(parse_overrides(&["payer_ref".to_string()]).is_err());
        assert!(parse_overrides(&["=x".to_string()]).is_err());
    }

    #[test]
    fn truncate_long_messages() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }
}
