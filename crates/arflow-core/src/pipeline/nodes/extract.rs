use arflow_types::state::InvoiceState;
use serde_json::json;

use crate::advisor::DocumentExtractor;
use crate::pipeline::node::{NodeFailure, NodeOutput, NodeResult};

pub async fn run<A: DocumentExtractor>(advisors: &A, state: &InvoiceState) -> NodeResult {
    let document = advisors.extract(&state.input.document).await?;
    if !(0.0..=1.0).contains(&document.confidence) {
        return Err(NodeFailure::structural(format!(
            "extractor confidence {} outside [0, 1]",
            document.confidence
        )));
    }

    let metadata = json!({
        "line_items": document.line_items.len(),
        "confidence": document.confidence,
    });
    Ok(NodeOutput::new(&document)?.with_metadata(metadata))
}
