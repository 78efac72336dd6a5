//! Scripted advisors for engine tests.
//!
//! Every advisor answers from a queue of canned results and falls back to a
//! default once the queue is drained. The defaults describe a clean,
//! low-risk invoice that triage approves.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use arflow_types::advisor::{
    CollectionAssessment, CollectionPriority, ExportReceipt, ExportRequest, ExtractedDocument,
    InvoiceHeader, LineItem, NotificationKind, NotificationReceipt, PayerCheck, PayerRecord,
    PaymentEvent, TermsResolution, ValidationReport, WorkingCapitalScore,
};
use arflow_types::error::AdvisorError;
use arflow_types::state::DocumentRef;
use chrono::{Days, NaiveDate};
use serde_json::Value;

use super::{
    CollectionScorer, Communicator, DataValidator, DocumentExtractor, ExportRenderer,
    PayerValidator, TermsResolver, WorkingCapitalScorer,
};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Script<T> {
    queued: Mutex<VecDeque<Result<T, AdvisorError>>>,
    fallback: Mutex<Result<T, AdvisorError>>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: T) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(fallback)),
        }
    }

    fn next(&self) -> Result<T, AdvisorError> {
        if let Some(result) = lock(&self.queued).pop_front() {
            return result;
        }
        lock(&self.fallback).clone()
    }

    fn push(&self, result: Result<T, AdvisorError>) {
        lock(&self.queued).push_back(result);
    }

    fn set_fallback(&self, result: Result<T, AdvisorError>) {
        *lock(&self.fallback) = result;
    }
}

pub fn sample_header(total_amount: f64) -> InvoiceHeader {
    InvoiceHeader {
        invoice_number: "INV-1001".to_string(),
        payer_ref: Some("payer-42".to_string()),
        payer_name: Some("Acme Industrial".to_string()),
        issue_date: NaiveDate::from_ymd_opt(2026, 3, 1),
        due_date: None,
        currency: "usd".to_string(),
        total_amount,
        terms_text: Some("NET 30".to_string()),
    }
}

pub fn sample_document(total_amount: f64) -> ExtractedDocument {
    ExtractedDocument {
        header: sample_header(total_amount),
        line_items: vec![LineItem {
            description: "Consulting".to_string(),
            quantity: 1.0,
            unit_price: total_amount,
            amount: total_amount,
        }],
        confidence: 0.97,
    }
}

pub fn sample_payer_record() -> PayerRecord {
    PayerRecord {
        payer_id: "payer-42".to_string(),
        name: "Acme Industrial".to_string(),
        contact_email: Some("ap@acme.example".to_string()),
        credit_limit: Some(250_000.0),
        payment_history: vec![PaymentEvent {
            invoice_number: "INV-0900".to_string(),
            amount: 900.0,
            days_late: 2,
        }],
    }
}

pub fn clean_validation() -> ValidationReport {
    ValidationReport {
        valid: true,
        confidence: 0.95,
        issues: Vec::new(),
    }
}

/// Scripted implementation of every advisor trait.
pub struct ScriptedAdvisors {
    extract: Script<ExtractedDocument>,
    validate: Script<ValidationReport>,
    payer: Script<PayerCheck>,
    terms: Script<TermsResolution>,
    collection: Script<CollectionAssessment>,
    working_capital: Script<WorkingCapitalScore>,
    notify: Script<NotificationReceipt>,
    export: Script<ExportReceipt>,
    extract_failures: Mutex<HashMap<String, AdvisorError>>,
    extract_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<&'static str>>,
}

impl Default for ScriptedAdvisors {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAdvisors {
    pub fn new() -> Self {
        Self {
            extract: Script::new(sample_document(1_200.0)),
            validate: Script::new(clean_validation()),
            payer: Script::new(PayerCheck {
                valid: true,
                reason: None,
                payer_record: Some(sample_payer_record()),
            }),
            terms: Script::new(TermsResolution {
                due_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap_or_default(),
                discount_percent: None,
                discount_deadline: None,
            }),
            collection: Script::new(CollectionAssessment {
                priority: CollectionPriority::Low,
                risk_score: 0.2,
            }),
            working_capital: Script::new(WorkingCapitalScore {
                overall_score: 0.8,
                component_scores: Default::default(),
                recommendations: vec!["offer early payment discount".to_string()],
            }),
            notify: Script::new(NotificationReceipt {
                sent: true,
                channel: "email".to_string(),
            }),
            export: Script::new(ExportReceipt {
                export_ref: "export-1".to_string(),
                format: "json".to_string(),
            }),
            extract_failures: Mutex::new(HashMap::new()),
            extract_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_document(self, document: ExtractedDocument) -> Self {
        self.extract.set_fallback(Ok(document));
        self
    }

    /// Fail the next `times` extraction calls with `error`.
    pub fn fail_extract_times(self, error: AdvisorError, times: usize) -> Self {
        for _ in 0..times {
            self.extract.push(Err(error.clone()));
        }
        self
    }

    /// Fail every extraction call with `error`.
    pub fn fail_extract(self, error: AdvisorError) -> Self {
        self.extract.set_fallback(Err(error));
        self
    }

    /// Fail every extraction of the document at `uri`.
    pub fn fail_extract_for(self, uri: &str, error: AdvisorError) -> Self {
        lock(&self.extract_failures).insert(uri.to_string(), error);
        self
    }

    pub fn with_extract_delay(self, delay: Duration) -> Self {
        *lock(&self.extract_delay) = Some(delay);
        self
    }

    pub fn with_validation(self, report: ValidationReport) -> Self {
        self.validate.set_fallback(Ok(report));
        self
    }

    /// Answer the next validation call with `report`.
    pub fn queue_validation(self, report: ValidationReport) -> Self {
        self.validate.push(Ok(report));
        self
    }

    pub fn with_payer(self, check: PayerCheck) -> Self {
        self.payer.set_fallback(Ok(check));
        self
    }

    pub fn fail_terms(self, error: AdvisorError) -> Self {
        self.terms.set_fallback(Err(error));
        self
    }

    pub fn with_collection(self, assessment: CollectionAssessment) -> Self {
        self.collection.set_fallback(Ok(assessment));
        self
    }

    pub fn fail_notify(self, error: AdvisorError) -> Self {
        self.notify.set_fallback(Err(error));
        self
    }

    pub fn fail_export(self, error: AdvisorError) -> Self {
        self.export.set_fallback(Err(error));
        self
    }

    /// Number of calls made to the named advisor method.
    pub fn calls(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|name| **name == method).count()
    }

    fn record(&self, method: &'static str) {
        lock(&self.calls).push(method);
    }
}

impl DocumentExtractor for ScriptedAdvisors {
    async fn extract(&self, document: &DocumentRef) -> Result<ExtractedDocument, AdvisorError> {
        self.record("extract");
        let delay = *lock(&self.extract_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let forced = lock(&self.extract_failures).get(&document.uri).cloned();
        if let Some(error) = forced {
            return Err(error);
        }
        self.extract.next()
    }
}

impl DataValidator for ScriptedAdvisors {
    async fn validate_data(
        &self,
        _header: &InvoiceHeader,
        _line_items: &[LineItem],
    ) -> Result<ValidationReport, AdvisorError> {
        self.record("validate_data");
        self.validate.next()
    }
}

impl PayerValidator for ScriptedAdvisors {
    async fn validate(
        &self,
        _payer_ref: &str,
        _header: &InvoiceHeader,
    ) -> Result<PayerCheck, AdvisorError> {
        self.record("validate");
        self.payer.next()
    }
}

impl TermsResolver for ScriptedAdvisors {
    async fn resolve(
        &self,
        _terms_text: &str,
        reference_date: NaiveDate,
    ) -> Result<TermsResolution, AdvisorError> {
        self.record("resolve");
        let mut resolution = self.terms.next()?;
        resolution.due_date = reference_date
            .checked_add_days(Days::new(30))
            .unwrap_or(resolution.due_date);
        Ok(resolution)
    }
}

impl CollectionScorer for ScriptedAdvisors {
    async fn score_collection(
        &self,
        _header: &InvoiceHeader,
        _payer: Option<&PayerRecord>,
        _payment_history: &[PaymentEvent],
    ) -> Result<CollectionAssessment, AdvisorError> {
        self.record("score_collection");
        self.collection.next()
    }
}

impl WorkingCapitalScorer for ScriptedAdvisors {
    async fn score_working_capital(
        &self,
        _header: &InvoiceHeader,
        _terms: &TermsResolution,
        _collection: &CollectionAssessment,
    ) -> Result<WorkingCapitalScore, AdvisorError> {
        self.record("score_working_capital");
        self.working_capital.next()
    }
}

impl Communicator for ScriptedAdvisors {
    async fn notify(
        &self,
        _payer: &PayerRecord,
        _payload: &Value,
        _kind: NotificationKind,
    ) -> Result<NotificationReceipt, AdvisorError> {
        self.record("notify");
        self.notify.next()
    }
}

impl ExportRenderer for ScriptedAdvisors {
    async fn render(&self, _request: &ExportRequest) -> Result<ExportReceipt, AdvisorError> {
        self.record("render");
        self.export.next()
    }
}
