use arflow_types::advisor::PayerCheck;
use arflow_types::state::{InvoiceState, NodeId};
use serde_json::json;

use super::enrich::EnrichedInvoice;
use crate::advisor::PayerValidator;
use crate::pipeline::node::{NodeOutput, NodeResult, require};

/// An invalid payer is a result for triage to weigh, never a failure.
pub async fn run<A: PayerValidator>(advisors: &A, state: &InvoiceState) -> NodeResult {
    let enriched: EnrichedInvoice = require(state, NodeId::Enrich)?;

    let check = match enriched.payer_ref.as_deref() {
        Some(payer_ref) => advisors.validate(payer_ref, &enriched.header).await?,
        None => PayerCheck {
            valid: false,
            reason: Some("no payer reference on document or input".to_string()),
            payer_record: None,
        },
    };

    let metadata = json!({ "valid": check.valid });
    Ok(NodeOutput::new(&check)?.with_metadata(metadata))
}
