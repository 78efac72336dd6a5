use arflow_types::advisor::{ExtractedDocument, IssueSeverity, ValidationIssue};
use arflow_types::state::{InvoiceState, NodeId};
use serde_json::json;

use super::enrich::EnrichedInvoice;
use crate::advisor::DataValidator;
use crate::pipeline::node::{NodeFailure, NodeOutput, NodeResult, require};

/// Largest header/line-item disagreement accepted without a warning.
const AMOUNT_TOLERANCE: f64 = 0.01;

pub async fn run<A: DataValidator>(advisors: &A, state: &InvoiceState) -> NodeResult {
    let enriched: EnrichedInvoice = require(state, NodeId::Enrich)?;
    let document: ExtractedDocument = require(state, NodeId::Extract)?;

    let mut report = advisors
        .validate_data(&enriched.header, &document.line_items)
        .await?;
    if !(0.0..=1.0).contains(&report.confidence) {
        return Err(NodeFailure::structural(format!(
            "validator confidence {} outside [0, 1]",
            report.confidence
        )));
    }

    if enriched.line_count > 0 && enriched.amount_delta.abs() > AMOUNT_TOLERANCE {
        report.issues.push(ValidationIssue {
            field: "total_amount".to_string(),
            message: format!(
                "total differs from line items by {:.2}",
                enriched.amount_delta
            ),
            severity: IssueSeverity::Warning,
        });
    }

    let blocking: Vec<&str> = report
        .blocking_issues()
        .map(|issue| issue.field.as_str())
        .collect();
    if !report.valid || !blocking.is_empty() {
        let message = if blocking.is_empty() {
            "document failed validation".to_string()
        } else {
            format!("document failed validation: {}", blocking.join(", "))
        };
        let details = serde_json::to_value(&report).unwrap_or_default();
        return Err(NodeFailure::data_validation(message).with_details(details));
    }

    let metadata = json!({
        "confidence": report.confidence,
        "issues": report.issues.len(),
    });
    Ok(NodeOutput::new(&report)?.with_metadata(metadata))
}
