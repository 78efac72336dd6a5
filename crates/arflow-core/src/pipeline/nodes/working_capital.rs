use arflow_types::advisor::{CollectionAssessment, TermsResolution};
use arflow_types::state::{InvoiceState, NodeId};
use serde_json::json;

use super::enrich::EnrichedInvoice;
use crate::advisor::WorkingCapitalScorer;
use crate::pipeline::node::{NodeOutput, NodeResult, require};

pub async fn run<A: WorkingCapitalScorer>(advisors: &A, state: &InvoiceState) -> NodeResult {
    let enriched: EnrichedInvoice = require(state, NodeId::Enrich)?;
    let terms: TermsResolution = require(state, NodeId::Terms)?;
    let collection: CollectionAssessment = require(state, NodeId::Collection)?;

    let score = advisors
        .score_working_capital(&enriched.header, &terms, &collection)
        .await?;

    let metadata = json!({ "overall_score": score.overall_score });
    Ok(NodeOutput::new(&score)?.with_metadata(metadata))
}
