//! Pipeline instance state for arflow.
//!
//! `InvoiceState` is the versioned snapshot of one pipeline instance. Nodes
//! never mutate it in place: each node receives a shared reference and returns
//! a new value with its own history entry and result payload. The runner is
//! the only component that writes `status`, `current_step` and `revision`.
//! `Checkpoint` is the record a `StateStore` keeps per instance.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorKind;

// ---------------------------------------------------------------------------
// Node identifiers
// ---------------------------------------------------------------------------

/// Closed set of pipeline nodes.
///
/// Every name the engine routes on is one of these variants; the graph maps
/// each to its declaration and the node table maps each to its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeId {
    Intake,
    Extract,
    Enrich,
    Validate,
    PayerCheck,
    Terms,
    Collection,
    WorkingCapital,
    Triage,
    Export,
}

impl NodeId {
    /// All nodes in default pipeline order.
    pub const ALL: [NodeId; 10] = [
        NodeId::Intake,
        NodeId::Extract,
        NodeId::Enrich,
        NodeId::Validate,
        NodeId::PayerCheck,
        NodeId::Terms,
        NodeId::Collection,
        NodeId::WorkingCapital,
        NodeId::Triage,
        NodeId::Export,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeId::Intake => "intake",
            NodeId::Extract => "extract",
            NodeId::Enrich => "enrich",
            NodeId::Validate => "validate",
            NodeId::PayerCheck => "payer_check",
            NodeId::Terms => "terms",
            NodeId::Collection => "collection",
            NodeId::WorkingCapital => "working_capital",
            NodeId::Triage => "triage",
            NodeId::Export => "export",
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeId::ALL
            .iter()
            .copied()
            .find(|node| node.as_str() == s)
            .ok_or_else(|| format!("unknown node: '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a pipeline instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Processing,
    /// Triage approved; export pending.
    Ready,
    /// A failure was recorded and a retry is pending.
    Exception,
    /// Parked, waiting for an external decision.
    HumanReview,
    Escalated,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Processing => "processing",
            WorkflowStatus::Ready => "ready",
            WorkflowStatus::Exception => "exception",
            WorkflowStatus::HumanReview => "human_review",
            WorkflowStatus::Escalated => "escalated",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Escalated
                | WorkflowStatus::Completed
                | WorkflowStatus::Failed
                | WorkflowStatus::Cancelled
        )
    }

    /// Statuses a crashed runner can leave behind mid-run.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Processing | WorkflowStatus::Ready | WorkflowStatus::Exception
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(WorkflowStatus::Processing),
            "ready" => Ok(WorkflowStatus::Ready),
            "exception" => Ok(WorkflowStatus::Exception),
            "human_review" => Ok(WorkflowStatus::HumanReview),
            "escalated" => Ok(WorkflowStatus::Escalated),
            "completed" => Ok(WorkflowStatus::Completed),
            "failed" => Ok(WorkflowStatus::Failed),
            "cancelled" => Ok(WorkflowStatus::Cancelled),
            other => Err(format!("invalid workflow status: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Reference to the source document of a receivable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Location of the document (path, object-store URI, ...).
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Input supplied when an instance is started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeInput {
    pub document: DocumentRef,
    /// Payer reference known up front (overrides the extracted one).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_ref: Option<String>,
    /// Date payment terms are resolved against (defaults to the issue date).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_date: Option<NaiveDate>,
    /// Free-form origin label ("email", "upload", "edi", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl IntakeInput {
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            document: DocumentRef {
                uri: uri.into(),
                content_type: None,
                checksum: None,
            },
            payer_ref: None,
            reference_date: None,
            source: None,
            metadata: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOutcome {
    Succeeded,
    Failed,
    Retried,
    Parked,
    Resumed,
    Escalated,
    Completed,
    Cancelled,
    /// Terminated by a `fail` policy decision.
    Aborted,
}

/// One append-only entry of an instance's history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Node name, or a runner action label ("resume", "cancel", ...).
    pub step: String,
    pub outcome: HistoryOutcome,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl HistoryEntry {
    pub fn new(step: impl Into<String>, outcome: HistoryOutcome) -> Self {
        Self {
            step: step.into(),
            outcome,
            timestamp: Utc::now(),
            duration_ms: 0,
            metadata: Value::Null,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

// ---------------------------------------------------------------------------
// Human review
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
    Escalate,
    /// Re-run the node whose failure caused the review.
    Rerun,
}

/// Externally supplied decision for a parked instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub action: ReviewAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub overrides: Map<String, Value>,
}

impl ReviewDecision {
    pub fn new(action: ReviewAction) -> Self {
        Self {
            action,
            reviewer: None,
            notes: None,
            overrides: Map::new(),
        }
    }

    pub fn approve() -> Self {
        Self::new(ReviewAction::Approve)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    pub requires_review: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Material a reviewer needs: failure details, triage reasons, prior decisions.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Most recent decision merged in by `resume`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ReviewDecision>,
}

/// Why and where an instance is parked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParkKind {
    /// Halted before running `node` (interrupt_before).
    Before,
    /// Halted after running `node` (interrupt_after).
    After,
    /// `node`'s router selected the park label.
    Route,
    /// The retry policy chose human review for a failure.
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkPoint {
    pub node: NodeId,
    pub kind: ParkKind,
}

// ---------------------------------------------------------------------------
// Export readiness
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportState {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// InvoiceState
// ---------------------------------------------------------------------------

/// Snapshot of one pipeline instance's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceState {
    pub instance_id: String,
    pub subject_id: String,
    pub input: IntakeInput,
    pub current_step: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_step: Option<NodeId>,
    pub status: WorkflowStatus,
    /// Bumped by the runner on every persisted transition.
    pub revision: u64,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Stage payloads keyed by the node that produced them.
    #[serde(default)]
    pub results: BTreeMap<NodeId, Value>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<NodeId>,
    #[serde(default)]
    pub review: ReviewState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parked: Option<ParkPoint>,
    #[serde(default)]
    pub export: ExportState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceState {
    /// Fresh instance positioned at `entry`.
    pub fn new(
        instance_id: impl Into<String>,
        subject_id: impl Into<String>,
        input: IntakeInput,
        entry: NodeId,
        max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            instance_id: instance_id.into(),
            subject_id: subject_id.into(),
            input,
            current_step: entry,
            previous_step: None,
            status: WorkflowStatus::Processing,
            revision: 0,
            retry_count: 0,
            max_retries,
            results: BTreeMap::new(),
            history: Vec::new(),
            error_message: None,
            error_details: None,
            error_kind: None,
            failed_step: None,
            review: ReviewState::default(),
            parked: None,
            export: ExportState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Raw payload written by `node`, if it has run.
    pub fn result(&self, node: NodeId) -> Option<&Value> {
        self.results.get(&node)
    }

    /// Typed view of the payload written by `node`.
    pub fn result_as<T: DeserializeOwned>(&self, node: NodeId) -> Result<Option<T>, serde_json::Error> {
        self.results
            .get(&node)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
    }

    /// True when the last node execution recorded a failure.
    pub fn has_error(&self) -> bool {
        self.error_kind.is_some()
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
        self.error_details = None;
        self.error_kind = None;
        self.failed_step = None;
    }

    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Number of failed node executions recorded so far.
    pub fn error_count(&self) -> u32 {
        self.history
            .iter()
            .filter(|entry| entry.outcome == HistoryOutcome::Failed)
            .count() as u32
    }

    /// Message of the most recent failure, even after it was cleared for a retry.
    pub fn last_error(&self) -> Option<String> {
        if let Some(message) = &self.error_message {
            return Some(message.clone());
        }
        self.history
            .iter()
            .rev()
            .find(|entry| entry.outcome == HistoryOutcome::Failed)
            .and_then(|entry| entry.metadata.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

// ---------------------------------------------------------------------------
// Checkpoint
// ---------------------------------------------------------------------------

/// Durable record of an instance's most recently persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub instance_id: String,
    pub subject_id: String,
    pub current_step: NodeId,
    pub status: WorkflowStatus,
    pub state: InvoiceState,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub error_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Checkpoint {
    pub fn from_state(state: &InvoiceState) -> Self {
        Self {
            instance_id: state.instance_id.clone(),
            subject_id: state.subject_id.clone(),
            current_step: state.current_step,
            status: state.status,
            state: state.clone(),
            revision: state.revision,
            updated_at: state.updated_at,
            error_count: state.error_count(),
            last_error: state.last_error(),
        }
    }
}
