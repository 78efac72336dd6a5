use arflow_types::state::InvoiceState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::node::{NodeFailure, NodeOutput, NodeResult};

/// Normalized record of what was submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeRecord {
    pub document_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_ref: Option<String>,
    pub received_at: DateTime<Utc>,
}

pub fn run(state: &InvoiceState) -> NodeResult {
    let uri = state.input.document.uri.trim();
    if uri.is_empty() {
        return Err(NodeFailure::data_validation("document reference is empty"));
    }
    if state.subject_id.trim().is_empty() {
        return Err(NodeFailure::data_validation("subject id is empty"));
    }

    NodeOutput::new(IntakeRecord {
        document_uri: uri.to_string(),
        content_type: state.input.document.content_type.clone(),
        source: state.input.source.clone(),
        payer_ref: state
            .input
            .payer_ref
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        received_at: state.created_at,
    })
}
