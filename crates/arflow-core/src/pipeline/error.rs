use arflow_types::error::RepositoryError;
use arflow_types::state::WorkflowStatus;
use thiserror::Error;

use super::graph::GraphError;

/// Errors surfaced by the engine's public operations.
///
/// Node failures are not errors at this level: they are recorded in the
/// instance state and handled by the failure policy.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("state store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("instance not found: {0}")]
    NotFound(String),

    #[error("instance {instance_id} is not parked (status: {status})")]
    NotParked {
        instance_id: String,
        status: WorkflowStatus,
    },

    #[error("instance {0} is already being processed")]
    InstanceBusy(String),

    #[error("invalid review decision: {0}")]
    InvalidDecision(String),

    #[error("invalid graph: {0}")]
    InvalidGraph(#[from] GraphError),

    #[error("batch task failed: {0}")]
    Task(String),
}
