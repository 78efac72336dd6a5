//! Advisor traits (ports) for the external services the nodes call.
//!
//! Each advisor answers one narrow question about a receivable. The engine
//! only ever sees these traits; arflow-infra provides an HTTP client and the
//! `scripted` module provides in-memory stand-ins.
//!
//! Failures are reported as `AdvisorError`, whose `kind` feeds straight into
//! the retry policy. Timeouts must be reported as `ErrorKind::Transient`.

#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

use std::future::Future;

use arflow_types::advisor::{
    CollectionAssessment, ExportReceipt, ExportRequest, ExtractedDocument, InvoiceHeader,
    LineItem, NotificationKind, NotificationReceipt, PayerCheck, PayerRecord, PaymentEvent,
    TermsResolution, ValidationReport, WorkingCapitalScore,
};
use arflow_types::error::AdvisorError;
use arflow_types::state::DocumentRef;
use chrono::NaiveDate;
use serde_json::Value;

/// Turns a document reference into structured header and line items.
pub trait DocumentExtractor: Send + Sync {
    fn extract(
        &self,
        document: &DocumentRef,
    ) -> impl Future<Output = Result<ExtractedDocument, AdvisorError>> + Send;
}

/// Checks extracted data for consistency and completeness.
pub trait DataValidator: Send + Sync {
    fn validate_data(
        &self,
        header: &InvoiceHeader,
        line_items: &[LineItem],
    ) -> impl Future<Output = Result<ValidationReport, AdvisorError>> + Send;
}

/// Looks up a payer and reports whether it is in good standing.
///
/// An unknown or blocked payer is a successful `PayerCheck` with
/// `valid == false`, not an error.
pub trait PayerValidator: Send + Sync {
    fn validate(
        &self,
        payer_ref: &str,
        header: &InvoiceHeader,
    ) -> impl Future<Output = Result<PayerCheck, AdvisorError>> + Send;
}

/// Resolves free-text payment terms against a reference date.
pub trait TermsResolver: Send + Sync {
    fn resolve(
        &self,
        terms_text: &str,
        reference_date: NaiveDate,
    ) -> impl Future<Output = Result<TermsResolution, AdvisorError>> + Send;
}

pub trait CollectionScorer: Send + Sync {
    fn score_collection(
        &self,
        header: &InvoiceHeader,
        payer: Option<&PayerRecord>,
        payment_history: &[PaymentEvent],
    ) -> impl Future<Output = Result<CollectionAssessment, AdvisorError>> + Send;
}

pub trait WorkingCapitalScorer: Send + Sync {
    fn score_working_capital(
        &self,
        header: &InvoiceHeader,
        terms: &TermsResolution,
        collection: &CollectionAssessment,
    ) -> impl Future<Output = Result<WorkingCapitalScore, AdvisorError>> + Send;
}

/// Sends payer-facing notifications.
pub trait Communicator: Send + Sync {
    fn notify(
        &self,
        payer: &PayerRecord,
        payload: &Value,
        kind: NotificationKind,
    ) -> impl Future<Output = Result<NotificationReceipt, AdvisorError>> + Send;
}

/// Renders the final export artifact for an approved instance.
pub trait ExportRenderer: Send + Sync {
    fn render(
        &self,
        request: &ExportRequest,
    ) -> impl Future<Output = Result<ExportReceipt, AdvisorError>> + Send;
}

/// Everything the default node set calls. Blanket-implemented for any type
/// that implements all eight advisor traits.
pub trait Advisors:
    DocumentExtractor
    + DataValidator
    + PayerValidator
    + TermsResolver
    + CollectionScorer
    + WorkingCapitalScorer
    + Communicator
    + ExportRenderer
    + 'static
{
}

impl<T> Advisors for T where
    T: DocumentExtractor
        + DataValidator
        + PayerValidator
        + TermsResolver
        + CollectionScorer
        + WorkingCapitalScorer
        + Communicator
        + ExportRenderer
        + 'static
{
}
