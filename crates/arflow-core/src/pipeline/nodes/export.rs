use arflow_types::advisor::{
    CollectionAssessment, CollectionPriority, ExportReceipt, ExportRequest, NotificationKind,
    PayerCheck, TermsResolution,
};
use arflow_types::config::TriageConfig;
use arflow_types::state::{ExportState, InvoiceState, NodeId};
use chrono::Utc;
use serde_json::{Value, json};

use super::enrich::EnrichedInvoice;
use crate::advisor::{Communicator, ExportRenderer};
use crate::pipeline::node::{NodeFailure, NodeOutput, NodeResult};

pub async fn run<A: ExportRenderer + Communicator>(
    advisors: &A,
    state: &InvoiceState,
    config: &TriageConfig,
) -> NodeResult {
    if !state.export.ready {
        return Err(NodeFailure::structural("export reached without triage approval"));
    }

    let enriched = state
        .result_as::<EnrichedInvoice>(NodeId::Enrich)
        .map_err(|e| NodeFailure::structural(format!("enrich result is malformed: {e}")))?;
    let request = ExportRequest {
        instance_id: state.instance_id.clone(),
        subject_id: state.subject_id.clone(),
        header: enriched.as_ref().map(|e| e.header.clone()),
        results: state.results.clone(),
    };
    let receipt = advisors.render(&request).await?;

    let notification = if config.notify_on_export {
        notify_payer(advisors, state, enriched.as_ref(), &receipt).await
    } else {
        Value::Null
    };

    let export = ExportState {
        ready: true,
        export_ref: Some(receipt.export_ref.clone()),
        format: Some(receipt.format.clone()),
        exported_at: Some(Utc::now()),
    };
    let metadata = json!({ "export_ref": receipt.export_ref });
    Ok(NodeOutput::new(json!({
        "receipt": receipt,
        "notification": notification,
    }))?
    .with_metadata(metadata)
    .with_export(export))
}

/// Best effort: a failed notification is recorded in the export result and
/// does not fail the export.
async fn notify_payer<A: Communicator>(
    advisors: &A,
    state: &InvoiceState,
    enriched: Option<&EnrichedInvoice>,
    receipt: &ExportReceipt,
) -> Value {
    let record = state
        .result_as::<PayerCheck>(NodeId::PayerCheck)
        .ok()
        .flatten()
        .and_then(|check| check.payer_record);
    let Some(record) = record else {
        return json!({ "sent": false, "skipped": "no payer record" });
    };

    let priority = state
        .result_as::<CollectionAssessment>(NodeId::Collection)
        .ok()
        .flatten()
        .map(|c| c.priority);
    let kind = if matches!(priority, Some(p) if p >= CollectionPriority::High) {
        NotificationKind::PaymentReminder
    } else {
        NotificationKind::InvoiceIssued
    };
    let due_date = state
        .result_as::<TermsResolution>(NodeId::Terms)
        .ok()
        .flatten()
        .map(|t| t.due_date);

    let payload = json!({
        "export_ref": receipt.export_ref,
        "invoice_number": enriched.map(|e| e.header.invoice_number.clone()),
        "amount": enriched.map(|e| e.header.total_amount),
        "currency": enriched.map(|e| e.header.currency.clone()),
        "due_date": due_date,
    });

    match advisors.notify(&record, &payload, kind).await {
        Ok(sent) => json!({ "sent": sent.sent, "channel": sent.channel, "kind": kind }),
        Err(e) => {
            tracing::warn!(
                instance_id = %state.instance_id,
                error = %e,
                "payer notification failed"
            );
            json!({ "sent": false, "error": e.to_string(), "kind": kind })
        }
    }
}
