//! Node dispatch table and the copy-on-write step contract.
//!
//! A node handler receives the current state by shared reference and returns
//! either a `NodeOutput` or a `NodeFailure`. `execute_node` turns that into
//! the next `InvoiceState`: the node's result payload and one history entry
//! on success, the error fields and one failed history entry otherwise.
//! Handlers never touch `status`, `current_step` or `revision`.

use std::time::Instant;

use arflow_types::config::TriageConfig;
use arflow_types::error::{AdvisorError, ErrorKind};
use arflow_types::state::{ExportState, HistoryEntry, HistoryOutcome, InvoiceState, NodeId};
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};

use super::nodes;
use crate::advisor::Advisors;

/// What a successful node hands back to the runner.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    pub payload: Value,
    pub metadata: Value,
    pub export: Option<ExportState>,
}

impl NodeOutput {
    pub fn new(payload: impl Serialize) -> Result<Self, NodeFailure> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| NodeFailure::structural(format!("failed to encode result: {e}")))?;
        Ok(Self {
            payload,
            metadata: Value::Null,
            export: None,
        })
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_export(mut self, export: ExportState) -> Self {
        self.export = Some(export);
        self
    }
}

/// A classified node failure.
#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<Value>,
}

impl NodeFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn data_validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataValidation, message)
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structural, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<AdvisorError> for NodeFailure {
    fn from(err: AdvisorError) -> Self {
        Self::new(err.kind, err.message)
    }
}

pub type NodeResult = Result<NodeOutput, NodeFailure>;

/// Read a prior node's typed result, treating absence or a bad shape as a
/// contract violation.
pub(crate) fn require<T: serde::de::DeserializeOwned>(
    state: &InvoiceState,
    node: NodeId,
) -> Result<T, NodeFailure> {
    state
        .result_as::<T>(node)
        .map_err(|e| NodeFailure::structural(format!("{node} result is malformed: {e}")))?
        .ok_or_else(|| NodeFailure::structural(format!("{node} result is missing")))
}

/// Read-only view the handlers get besides the state.
pub struct NodeContext<'a, A> {
    pub advisors: &'a A,
    pub triage: &'a TriageConfig,
}

/// Run `node` against `state` and return the next state.
pub async fn execute_node<A: Advisors>(
    node: NodeId,
    ctx: &NodeContext<'_, A>,
    state: &InvoiceState,
) -> InvoiceState {
    let started = Instant::now();
    let outcome = match node {
        NodeId::Intake => nodes::intake::run(state),
        NodeId::Extract => nodes::extract::run(ctx.advisors, state).await,
        NodeId::Enrich => nodes::enrich::run(state),
        NodeId::Validate => nodes::validate::run(ctx.advisors, state).await,
        NodeId::PayerCheck => nodes::payer_check::run(ctx.advisors, state).await,
        NodeId::Terms => nodes::terms::run(ctx.advisors, state).await,
        NodeId::Collection => nodes::collection::run(ctx.advisors, state).await,
        NodeId::WorkingCapital => nodes::working_capital::run(ctx.advisors, state).await,
        NodeId::Triage => nodes::triage::run(state, ctx.triage),
        NodeId::Export => nodes::export::run(ctx.advisors, state, ctx.triage).await,
    };
    apply_outcome(node, state, outcome, started.elapsed().as_millis() as u64)
}

fn apply_outcome(node: NodeId, state: &InvoiceState, outcome: NodeResult, duration_ms: u64) -> InvoiceState {
    let mut next = state.clone();
    next.updated_at = Utc::now();
    match outcome {
        Ok(output) => {
            next.clear_error();
            next.results.insert(node, output.payload);
            if let Some(export) = output.export {
                next.export = export;
            }
            next.push_history(
                HistoryEntry::new(node.as_str(), HistoryOutcome::Succeeded)
                    .with_duration_ms(duration_ms)
                    .with_metadata(output.metadata),
            );
        }
        Err(failure) => {
            next.push_history(
                HistoryEntry::new(node.as_str(), HistoryOutcome::Failed)
                    .with_duration_ms(duration_ms)
                    .with_metadata(json!({
                        "error": failure.message,
                        "kind": failure.kind,
                    })),
            );
            next.error_message = Some(failure.message);
            next.error_kind = Some(failure.kind);
            next.error_details = failure.details;
            next.failed_step = Some(node);
        }
    }
    next
}
