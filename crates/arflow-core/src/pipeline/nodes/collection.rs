use arflow_types::advisor::PayerCheck;
use arflow_types::state::{InvoiceState, NodeId};
use serde_json::json;

use super::enrich::EnrichedInvoice;
use crate::advisor::CollectionScorer;
use crate::pipeline::node::{NodeFailure, NodeOutput, NodeResult, require};

pub async fn run<A: CollectionScorer>(advisors: &A, state: &InvoiceState) -> NodeResult {
    let enriched: EnrichedInvoice = require(state, NodeId::Enrich)?;
    let payer: PayerCheck = require(state, NodeId::PayerCheck)?;

    let record = payer.payer_record.as_ref();
    let history = record
        .map(|r| r.payment_history.as_slice())
        .unwrap_or_default();
    let assessment = advisors
        .score_collection(&enriched.header, record, history)
        .await?;

    if !(0.0..=1.0).contains(&assessment.risk_score) {
        return Err(NodeFailure::structural(format!(
            "risk score {} outside [0, 1]",
            assessment.risk_score
        )));
    }

    let metadata = json!({
        "priority": assessment.priority,
        "risk_score": assessment.risk_score,
    });
    Ok(NodeOutput::new(&assessment)?.with_metadata(metadata))
}
