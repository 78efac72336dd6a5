//! Checkpoint store trait definition.
//!
//! The engine persists one checkpoint per instance after every node
//! execution. The infrastructure layer (arflow-infra) implements this trait
//! with SQLite; tests use the in-memory store in `repository::memory`.

use arflow_types::error::RepositoryError;
use arflow_types::state::{Checkpoint, InvoiceState, WorkflowStatus};

/// Durable, revision-checked storage for instance checkpoints.
///
/// `put` is an upsert keyed by `instance_id`. A write whose `revision` is not
/// strictly greater than the stored one must fail with
/// `RepositoryError::Conflict` and leave the stored checkpoint untouched, so a
/// reader never observes a torn or regressed state.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait StateStore: Send + Sync {
    /// Load the latest checkpoint for an instance.
    fn get(
        &self,
        instance_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Checkpoint>, RepositoryError>> + Send;

    /// Persist `state` as the instance's latest checkpoint.
    fn put(
        &self,
        state: &InvoiceState,
    ) -> impl std::future::Future<Output = Result<Checkpoint, RepositoryError>> + Send;

    /// List checkpoints currently in any of `statuses`, oldest update first.
    fn list_by_status(
        &self,
        statuses: &[WorkflowStatus],
    ) -> impl std::future::Future<Output = Result<Vec<Checkpoint>, RepositoryError>> + Send;
}

impl<T: StateStore> StateStore for std::sync::Arc<T> {
    fn get(
        &self,
        instance_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Checkpoint>, RepositoryError>> + Send {
        (**self).get(instance_id)
    }

    fn put(
        &self,
        state: &InvoiceState,
    ) -> impl std::future::Future<Output = Result<Checkpoint, RepositoryError>> + Send {
        (**self).put(state)
    }

    fn list_by_status(
        &self,
        statuses: &[WorkflowStatus],
    ) -> impl std::future::Future<Output = Result<Vec<Checkpoint>, RepositoryError>> + Send {
        (**self).list_by_status(statuses)
    }
}
