use arflow_types::advisor::TermsResolution;
use arflow_types::state::{InvoiceState, NodeId};
use chrono::Utc;
use serde_json::json;

use super::enrich::EnrichedInvoice;
use crate::advisor::TermsResolver;
use crate::pipeline::node::{NodeFailure, NodeOutput, NodeResult, require};

pub async fn run<A: TermsResolver>(advisors: &A, state: &InvoiceState) -> NodeResult {
    let enriched: EnrichedInvoice = require(state, NodeId::Enrich)?;
    let reference_date = enriched
        .reference_date
        .unwrap_or_else(|| Utc::now().date_naive());

    let resolution = match (enriched.header.terms_text.as_deref(), enriched.header.due_date) {
        (Some(text), _) => advisors.resolve(text, reference_date).await?,
        (None, Some(due_date)) => TermsResolution {
            due_date,
            discount_percent: None,
            discount_deadline: None,
        },
        (None, None) => {
            return Err(NodeFailure::data_validation(
                "document has neither payment terms nor a due date",
            ));
        }
    };

    if let Some(percent) = resolution.discount_percent {
        if !(0.0..100.0).contains(&percent) {
            return Err(NodeFailure::structural(format!(
                "discount percent {percent} outside [0, 100)"
            )));
        }
    }

    let metadata = json!({ "due_date": resolution.due_date });
    Ok(NodeOutput::new(&resolution)?.with_metadata(metadata))
}
