//! Bounded-concurrency batch runs.
//!
//! Every item becomes its own task; a shared semaphore caps how many are
//! inside the engine at once. Results come back in input order and one
//! item's failure never affects another.

use std::sync::Arc;

use arflow_types::state::{IntakeInput, InvoiceState, WorkflowStatus};
use serde::Serialize;
use tokio::sync::Semaphore;

use super::error::EngineError;
use super::runner::Engine;
use crate::advisor::Advisors;
use crate::repository::StateStore;

#[derive(Debug, Clone)]
pub struct BatchItem {
    pub instance_id: String,
    pub subject_id: String,
    pub input: IntakeInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub instance_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub state: Option<InvoiceState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
}

/// An item succeeded when its run returned and did not end in a failure
/// status. Parked items count as successes.
fn is_success(state: &InvoiceState) -> bool {
    !matches!(
        state.status,
        WorkflowStatus::Failed | WorkflowStatus::Escalated | WorkflowStatus::Cancelled
    )
}

impl BatchItemResult {
    fn from_outcome(instance_id: String, outcome: Result<InvoiceState, EngineError>) -> Self {
        match outcome {
            Ok(state) => Self {
                instance_id,
                success: is_success(&state),
                status: Some(state.status),
                error: state.error_message.clone(),
                state: Some(state),
            },
            Err(e) => Self {
                instance_id,
                success: false,
                status: None,
                error: Some(e.to_string()),
                state: None,
            },
        }
    }
}

pub struct BatchCoordinator<S: StateStore + 'static, A: Advisors> {
    engine: Arc<Engine<S, A>>,
}

impl<S: StateStore + 'static, A: Advisors> BatchCoordinator<S, A> {
    pub fn new(engine: Arc<Engine<S, A>>) -> Self {
        Self { engine }
    }

    /// Run every item with at most `concurrency` in flight (0 is treated
    /// as 1).
    pub async fn run_batch(&self, items: Vec<BatchItem>, concurrency: usize) -> BatchResult {
        let concurrency = concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let total = items.len();
        tracing::info!(total, concurrency, "batch started");

        let mut handles = Vec::with_capacity(total);
        for item in items {
            let engine = Arc::clone(&self.engine);
            let semaphore = Arc::clone(&semaphore);
            let instance_id = item.instance_id.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| EngineError::Task(e.to_string()))?;
                engine
                    .start_with_id(&item.instance_id, &item.subject_id, item.input)
                    .await
            });
            handles.push((instance_id, handle));
        }

        let mut results = Vec::with_capacity(total);
        for (instance_id, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(EngineError::Task(e.to_string())),
            };
            if let Err(e) = &outcome {
                tracing::warn!(%instance_id, error = %e, "batch item failed");
            }
            results.push(BatchItemResult::from_outcome(instance_id, outcome));
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        let result = BatchResult {
            total,
            succeeded,
            failed: total - succeeded,
            results,
        };
        tracing::info!(
            total = result.total,
            succeeded = result.succeeded,
            failed = result.failed,
            "batch finished"
        );
        result
    }
}
