//! HTTP advisor client.
//!
//! Every advisor is a `POST` of a JSON body to `{base_url}/{endpoint}` that
//! answers with the matching response payload. Status codes and transport
//! failures are folded into an [`ErrorKind`] so the engine's policy table can
//! act on them.

use std::time::Duration;

use arflow_core::advisor::{
    CollectionScorer, Communicator, DataValidator, DocumentExtractor, ExportRenderer,
    PayerValidator, TermsResolver, WorkingCapitalScorer,
};
use arflow_types::advisor::{
    CollectionAssessment, ExportReceipt, ExportRequest, ExtractedDocument, InvoiceHeader,
    LineItem, NotificationKind, NotificationReceipt, PayerCheck, PayerRecord, PaymentEvent,
    TermsResolution, ValidationReport, WorkingCapitalScore,
};
use arflow_types::config::AdvisorConfig;
use arflow_types::error::{AdvisorError, ErrorKind};
use arflow_types::state::DocumentRef;
use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Map an HTTP status from the advisor gateway to an error kind.
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        408 | 429 | 500..=599 => ErrorKind::Transient,
        400 | 422 => ErrorKind::DataValidation,
        _ => ErrorKind::Structural,
    }
}

fn classify_transport(advisor: &str, err: &reqwest::Error) -> AdvisorError {
    if err.is_timeout() {
        AdvisorError::timeout(advisor)
    } else if err.is_connect() {
        AdvisorError::transient(format!("{advisor} unreachable: {err}"))
    } else if err.is_decode() {
        AdvisorError::structural(format!("{advisor} returned an unreadable body: {err}"))
    } else {
        AdvisorError::new(ErrorKind::Unknown, format!("{advisor} request failed: {err}"))
    }
}

/// Client for the advisor gateway.
#[derive(Debug, Clone)]
pub struct HttpAdvisorClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAdvisorClient {
    pub fn new(config: &AdvisorConfig) -> Result<Self, AdvisorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AdvisorError::structural(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    async fn call<Req, Resp>(
        &self,
        advisor: &'static str,
        endpoint: &str,
        body: &Req,
    ) -> Result<Resp, AdvisorError>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let started = std::time::Instant::now();
        let response = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport(advisor, &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let kind = classify_status(status.as_u16());
            tracing::debug!(advisor, status = status.as_u16(), %kind, "advisor call rejected");
            return Err(AdvisorError::new(
                kind,
                format!("{advisor} HTTP {status}: {error_body}"),
            ));
        }

        let parsed = response
            .json::<Resp>()
            .await
            .map_err(|e| classify_transport(advisor, &e))?;

        tracing::trace!(
            advisor,
            duration_ms = started.elapsed().as_millis() as u64,
            "advisor call completed"
        );
        Ok(parsed)
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ValidateBody<'a> {
    header: &'a InvoiceHeader,
    line_items: &'a [LineItem],
}

#[derive(Serialize)]
struct PayerBody<'a> {
    payer_ref: &'a str,
    header: &'a InvoiceHeader,
}

#[derive(Serialize)]
struct TermsBody<'a> {
    terms_text: &'a str,
    reference_date: NaiveDate,
}

#[derive(Serialize)]
struct CollectionBody<'a> {
    header: &'a InvoiceHeader,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<&'a PayerRecord>,
    payment_history: &'a [PaymentEvent],
}

#[derive(Serialize)]
struct WorkingCapitalBody<'a> {
    header: &'a InvoiceHeader,
    terms: &'a TermsResolution,
    collection: &'a CollectionAssessment,
}

#[derive(Serialize)]
struct NotifyBody<'a> {
    payer: &'a PayerRecord,
    payload: &'a Value,
    kind: NotificationKind,
}

// ---------------------------------------------------------------------------
// Advisor impls
// ---------------------------------------------------------------------------

impl DocumentExtractor for HttpAdvisorClient {
    async fn extract(&self, document: &DocumentRef) -> Result<ExtractedDocument, AdvisorError> {
        self.call("extractor", "/extract", document).await
    }
}

impl DataValidator for HttpAdvisorClient {
    async fn validate_data(
        &self,
        header: &InvoiceHeader,
        line_items: &[LineItem],
    ) -> Result<ValidationReport, AdvisorError> {
        let body = ValidateBody { header, line_items };
        self.call("validator", "/validate", &body).await
    }
}

impl PayerValidator for HttpAdvisorClient {
    async fn validate(
        &self,
        payer_ref: &str,
        header: &InvoiceHeader,
    ) -> Result<PayerCheck, AdvisorError> {
        let body = PayerBody { payer_ref, header };
        self.call("payer validator", "/payers/validate", &body).await
    }
}

impl TermsResolver for HttpAdvisorClient {
    async fn resolve(
        &self,
        terms_text: &str,
        reference_date: NaiveDate,
    ) -> Result<TermsResolution, AdvisorError> {
        let body = TermsBody {
            terms_text,
            reference_date,
        };
        self.call("terms resolver", "/terms/resolve", &body).await
    }
}

impl CollectionScorer for HttpAdvisorClient {
    async fn score_collection(
        &self,
        header: &InvoiceHeader,
        payer: Option<&PayerRecord>,
        payment_history: &[PaymentEvent],
    ) -> Result<CollectionAssessment, AdvisorError> {
        let body = CollectionBody {
            header,
            payer,
            payment_history,
        };
        self.call("collection scorer", "/collection/score", &body).await
    }
}

impl WorkingCapitalScorer for HttpAdvisorClient {
    async fn score_working_capital(
        &self,
        header: &InvoiceHeader,
        terms: &TermsResolution,
        collection: &CollectionAssessment,
    ) -> Result<WorkingCapitalScore, AdvisorError> {
        let body = WorkingCapitalBody {
            header,
            terms,
            collection,
        };
        self.call("working-capital scorer", "/working-capital/score", &body)
            .await
    }
}

impl Communicator for HttpAdvisorClient {
    async fn notify(
        &self,
        payer: &PayerRecord,
        payload: &Value,
        kind: NotificationKind,
    ) -> Result<NotificationReceipt, AdvisorError> {
        let body = NotifyBody {
            payer,
            payload,
            kind,
        };
        self.call("communicator", "/notify", &body).await
    }
}

impl ExportRenderer for HttpAdvisorClient {
    async fn render(&self, request: &ExportRequest) -> Result<ExportReceipt, AdvisorError> {
        self.call("export renderer", "/export", request).await
    }
}
