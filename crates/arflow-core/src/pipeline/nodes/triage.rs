//! Triage: classify the accumulated results into approve, review, escalate
//! or reject.
//!
//! A reviewer decision merged in by `resume` wins, except that an approval
//! cannot stand in for scoring stages that never produced a result. Otherwise
//! high collection risk escalates, any review trigger parks the instance, and
//! a clean record is approved for export.

use arflow_types::advisor::{CollectionAssessment, CollectionPriority, PayerCheck, ValidationReport};
use arflow_types::config::TriageConfig;
use arflow_types::state::{ExportState, InvoiceState, NodeId, ReviewAction};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::enrich::EnrichedInvoice;
use crate::pipeline::node::{NodeOutput, NodeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageOutcome {
    Approve,
    Review,
    Escalate,
    Reject,
}

impl TriageOutcome {
    /// Edge label the router emits for this outcome.
    pub fn label(&self) -> &'static str {
        match self {
            TriageOutcome::Approve => "approve",
            TriageOutcome::Review => "review",
            TriageOutcome::Escalate => "escalate",
            TriageOutcome::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub outcome: TriageOutcome,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
}

/// Stages whose results an export relies on. Approval is refused while any
/// of them is absent.
const REQUIRED_FOR_APPROVAL: [NodeId; 5] = [
    NodeId::Enrich,
    NodeId::PayerCheck,
    NodeId::Terms,
    NodeId::Collection,
    NodeId::WorkingCapital,
];

fn missing_stages(state: &InvoiceState) -> Vec<NodeId> {
    REQUIRED_FOR_APPROVAL
        .into_iter()
        .filter(|node| state.result(*node).is_none())
        .collect()
}

pub fn run(state: &InvoiceState, config: &TriageConfig) -> NodeResult {
    let result = classify(state, config);
    let mut output =
        NodeOutput::new(&result)?.with_metadata(json!({ "outcome": result.outcome.label() }));
    if result.outcome == TriageOutcome::Approve {
        output = output.with_export(ExportState {
            ready: true,
            ..state.export.clone()
        });
    }
    Ok(output)
}

pub fn classify(state: &InvoiceState, config: &TriageConfig) -> TriageResult {
    if let Some(decision) = &state.review.decision {
        let outcome = match decision.action {
            ReviewAction::Approve => Some(TriageOutcome::Approve),
            ReviewAction::Reject => Some(TriageOutcome::Reject),
            ReviewAction::Escalate => Some(TriageOutcome::Escalate),
            ReviewAction::Rerun => None,
        };
        let missing = missing_stages(state);
        if outcome == Some(TriageOutcome::Approve) && !missing.is_empty() {
            return TriageResult {
                outcome: TriageOutcome::Review,
                reasons: missing
                    .iter()
                    .map(|node| format!("approval needs a {node} result"))
                    .collect(),
                reviewer: decision.reviewer.clone(),
            };
        }
        if let Some(outcome) = outcome {
            let mut reasons = vec![format!("reviewer decision: {}", outcome.label())];
            reasons.extend(decision.notes.clone());
            return TriageResult {
                outcome,
                reasons,
                reviewer: decision.reviewer.clone(),
            };
        }
    }

    let collection = state
        .result_as::<CollectionAssessment>(NodeId::Collection)
        .ok()
        .flatten();
    if let Some(assessment) = &collection {
        if assessment.risk_score >= config.escalate_risk_at_least {
            return TriageResult {
                outcome: TriageOutcome::Escalate,
                reasons: vec![format!(
                    "collection risk {:.2} at or above {:.2}",
                    assessment.risk_score, config.escalate_risk_at_least
                )],
                reviewer: None,
            };
        }
    }

    let mut reasons = Vec::new();

    match state.result_as::<ValidationReport>(NodeId::Validate).ok().flatten() {
        None => reasons.push("validation result missing".to_string()),
        Some(report) if report.confidence < config.review_confidence_below => {
            reasons.push(format!(
                "validation confidence {:.2} below {:.2}",
                report.confidence, config.review_confidence_below
            ));
        }
        Some(_) => {}
    }

    match state.result_as::<PayerCheck>(NodeId::PayerCheck).ok().flatten() {
        None => reasons.push("payer check missing".to_string()),
        Some(check) if !check.valid => reasons.push(format!(
            "payer not valid: {}",
            check.reason.as_deref().unwrap_or("no reason given")
        )),
        Some(_) => {}
    }

    match state.result_as::<EnrichedInvoice>(NodeId::Enrich).ok().flatten() {
        None => reasons.push("invoice amount unknown".to_string()),
        Some(enriched) if enriched.header.total_amount >= config.review_amount_at_least => {
            reasons.push(format!(
                "amount {:.2} at or above {:.2}",
                enriched.header.total_amount, config.review_amount_at_least
            ));
        }
        Some(_) => {}
    }

    for node in [NodeId::Terms, NodeId::WorkingCapital] {
        if state.result(node).is_none() {
            reasons.push(format!("{node} result missing"));
        }
    }

    match &collection {
        None => reasons.push("collection assessment missing".to_string()),
        Some(assessment) if assessment.priority == CollectionPriority::Critical => {
            reasons.push("collection priority is critical".to_string());
        }
        Some(_) => {}
    }

    if reasons.is_empty() {
        TriageResult {
            outcome: TriageOutcome::Approve,
            reasons: vec!["all checks passed".to_string()],
            reviewer: None,
        }
    } else {
        TriageResult {
            outcome: TriageOutcome::Review,
            reasons,
            reviewer: None,
        }
    }
}

/// Router for the triage node's conditional edge. Reads only the triage
/// result; an absent or unreadable result routes to review.
pub fn route(state: &InvoiceState) -> &'static str {
    state
        .result_as::<TriageResult>(NodeId::Triage)
        .ok()
        .flatten()
        .map(|result| result.outcome.label())
        .unwrap_or(TriageOutcome::Review.label())
}
