//! Request and response payloads exchanged with external advisors.
//!
//! The advisors themselves (extraction, validation, payer standing, terms,
//! collection scoring, working-capital scoring, notification, export) live
//! outside the engine. These types are the narrow contract nodes consume and
//! the payloads they store under their stage result.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::NodeId;

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Header fields extracted from a receivable document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    pub invoice_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terms_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub header: InvoiceHeader,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    /// Extractor confidence in `[0, 1]`.
    pub confidence: f64,
}

// ---------------------------------------------------------------------------
// Data validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
    pub severity: IssueSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    /// Confidence in the extracted data in `[0, 1]`.
    pub confidence: f64,
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Issues that make the document unusable without a human.
    pub fn blocking_issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
    }
}

// ---------------------------------------------------------------------------
// Payer validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub invoice_number: String,
    pub amount: f64,
    /// Days paid after the due date; negative when paid early.
    pub days_late: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerRecord {
    pub payer_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_limit: Option<f64>,
    #[serde(default)]
    pub payment_history: Vec<PaymentEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayerCheck {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_record: Option<PayerRecord>,
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermsResolution {
    pub due_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_deadline: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionAssessment {
    pub priority: CollectionPriority,
    /// Probability-like risk in `[0, 1]`.
    pub risk_score: f64,
}

// ---------------------------------------------------------------------------
// Working capital
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingCapitalScore {
    pub overall_score: f64,
    #[serde(default)]
    pub component_scores: BTreeMap<String, f64>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    InvoiceIssued,
    PaymentReminder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub sent: bool,
    pub channel: String,
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Everything the export renderer needs about one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub instance_id: String,
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<InvoiceHeader>,
    pub results: BTreeMap<NodeId, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReceipt {
    pub export_ref: String,
    pub format: String,
}
