//! Event types for the arflow engine event bus.
//!
//! `EngineEvent` is broadcast at every instance transition. All variants are
//! Clone + Send + Sync for use with tokio broadcast channels.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::state::{NodeId, ParkKind, WorkflowStatus};

/// Events emitted while pipeline instances execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A fresh instance was created (or a crashed one picked up again).
    InstanceStarted {
        instance_id: String,
        subject_id: String,
        entry: NodeId,
    },

    /// A node returned without a recorded failure.
    NodeCompleted {
        instance_id: String,
        node: NodeId,
        duration_ms: u64,
    },

    /// A node recorded a failure.
    NodeFailed {
        instance_id: String,
        node: NodeId,
        kind: ErrorKind,
        error: String,
        will_retry: bool,
    },

    /// The instance halted at an interrupt point.
    InstanceParked {
        instance_id: String,
        node: NodeId,
        kind: ParkKind,
    },

    /// A parked instance received a decision and continues.
    InstanceResumed { instance_id: String, node: NodeId },

    /// The instance reached a terminal status.
    InstanceFinished {
        instance_id: String,
        status: WorkflowStatus,
        retry_count: u32,
    },

    /// The instance was cancelled by a caller.
    InstanceCancelled { instance_id: String, reason: String },
}

impl EngineEvent {
    pub fn instance_id(&self) -> &str {
        match self {
            EngineEvent::InstanceStarted { instance_id, .. }
            | EngineEvent::NodeCompleted { instance_id, .. }
            | EngineEvent::NodeFailed { instance_id, .. }
            | EngineEvent::InstanceParked { instance_id, .. }
            | EngineEvent::InstanceResumed { instance_id, .. }
            | EngineEvent::InstanceFinished { instance_id, .. }
            | EngineEvent::InstanceCancelled { instance_id, .. } => instance_id,
        }
    }
}
