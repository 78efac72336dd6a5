//! Normalization of the extracted header and derived amounts.

use arflow_types::advisor::{ExtractedDocument, InvoiceHeader};
use arflow_types::state::{InvoiceState, NodeId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::pipeline::node::{NodeOutput, NodeResult, require};

/// Header plus the derived figures later nodes rely on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedInvoice {
    pub header: InvoiceHeader,
    /// Input payer reference if given, otherwise the extracted one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_ref: Option<String>,
    /// Date payment terms resolve against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
    pub line_count: usize,
    pub line_total: f64,
    /// `total_amount - line_total`; zero when there are no line items.
    pub amount_delta: f64,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn run(state: &InvoiceState) -> NodeResult {
    let document: ExtractedDocument = require(state, NodeId::Extract)?;
    let mut header = document.header;

    header.invoice_number = header.invoice_number.trim().to_string();
    header.currency = header.currency.trim().to_uppercase();
    header.terms_text = non_empty(header.terms_text.as_deref());

    let payer_ref = non_empty(state.input.payer_ref.as_deref())
        .or_else(|| non_empty(header.payer_ref.as_deref()));
    header.payer_ref = payer_ref.clone();

    let line_total = round_cents(document.line_items.iter().map(|item| item.amount).sum());
    let amount_delta = if document.line_items.is_empty() {
        0.0
    } else {
        round_cents(header.total_amount - line_total)
    };

    let enriched = EnrichedInvoice {
        reference_date: state.input.reference_date.or(header.issue_date),
        header,
        payer_ref,
        line_count: document.line_items.len(),
        line_total,
        amount_delta,
    };
    let metadata = json!({ "amount_delta": enriched.amount_delta });
    Ok(NodeOutput::new(&enriched)?.with_metadata(metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::scripted::sample_document;
    use arflow_types::advisor::LineItem;
    use arflow_types::error::ErrorKind;
    use arflow_types::state::IntakeInput;

    fn state_with(document: &ExtractedDocument, input: IntakeInput) -> InvoiceState {
        let mut state = InvoiceState::new("i", "s", input, NodeId::Enrich, 3);
        state
            .results
            .insert(NodeId::Extract, serde_json::to_value(document).unwrap());
        state
    }

    #[test]
    fn normalizes_currency_and_prefers_input_payer() {
        let document = sample_document(100.0);
        let mut input = IntakeInput::from_uri("file:///a.pdf");
        input.payer_ref = Some("payer-override".to_string());
        let output = run(&state_with(&document, input)).unwrap();
        let enriched: EnrichedInvoice = serde_json::from_value(output.payload).unwrap();

        assert_eq!(enriched.header.currency, "USD");
        assert_eq!(enriched.payer_ref.as_deref(), Some("payer-override"));
        assert_eq!(enriched.reference_date, document.header.issue_date);
        assert_eq!(enriched.amount_delta, 0.0);
    }

    #[test]
    fn computes_delta_against_line_items() {
        let mut document = sample_document(100.0);
        document.line_items.push(LineItem {
            description: "Shipping".to_string(),
            quantity: 1.0,
            unit_price: 12.5,
            amount: 12.5,
        });
        let output = run(&state_with(&document, IntakeInput::from_uri("f"))).unwrap();
        let enriched: EnrichedInvoice = serde_json::from_value(output.payload).unwrap();
        assert_eq!(enriched.line_total, 112.5);
        assert_eq!(enriched.amount_delta, -12.5);
    }

    #[test]
    fn missing_extract_result_is_structural() {
        let state = InvoiceState::new("i", "s", IntakeInput::from_uri("f"), NodeId::Enrich, 3);
        assert_eq!(run(&state).unwrap_err().kind, ErrorKind::Structural);
    }
}
