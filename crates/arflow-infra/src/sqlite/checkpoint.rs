//! SQLite checkpoint store.
//!
//! Implements `StateStore` from `arflow-core`. The full `InvoiceState` is
//! stored as a JSON blob next to a few denormalized columns (status, step,
//! error summary) so listing and recovery never have to decode the blob.

use arflow_core::repository::StateStore;
use arflow_types::error::RepositoryError;
use arflow_types::state::{Checkpoint, InvoiceState, NodeId, WorkflowStatus};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `StateStore`.
pub struct SqliteStateStore {
    pool: DatabasePool,
}

impl SqliteStateStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct CheckpointRow {
    instance_id: String,
    subject_id: String,
    current_step: String,
    status: String,
    state: String,
    revision: i64,
    error_count: i64,
    last_error: Option<String>,
    updated_at: String,
}

impl CheckpointRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            instance_id: row.try_get("instance_id")?,
            subject_id: row.try_get("subject_id")?,
            current_step: row.try_get("current_step")?,
            status: row.try_get("status")?,
            state: row.try_get("state")?,
            revision: row.try_get("revision")?,
            error_count: row.try_get("error_count")?,
            last_error: row.try_get("last_error")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_checkpoint(self) -> Result<Checkpoint, RepositoryError> {
        let state: InvoiceState = serde_json::from_str(&self.state)
            .map_err(|e| RepositoryError::Query(format!("invalid state JSON: {e}")))?;
        let current_step: NodeId = self
            .current_step
            .parse()
            .map_err(RepositoryError::Query)?;
        let status: WorkflowStatus = self.status.parse().map_err(RepositoryError::Query)?;

        Ok(Checkpoint {
            instance_id: self.instance_id,
            subject_id: self.subject_id,
            current_step,
            status,
            state,
            revision: self.revision as u64,
            updated_at: parse_datetime(&self.updated_at)?,
            error_count: self.error_count as u32,
            last_error: self.last_error,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl StateStore for SqliteStateStore {
    async fn get(&self, instance_id: &str) -> Result<Option<Checkpoint>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM checkpoints WHERE instance_id = ?")
            .bind(instance_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = CheckpointRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_checkpoint()?))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, state: &InvoiceState) -> Result<Checkpoint, RepositoryError> {
        let checkpoint = Checkpoint::from_state(state);
        let state_json = serde_json::to_string(state)
            .map_err(|e| RepositoryError::Query(format!("serialize state: {e}")))?;

        // The WHERE clause on the upsert makes a stale write a no-op, which
        // is reported as a conflict below.
        let result = sqlx::query(
            r#"INSERT INTO checkpoints (instance_id, subject_id, current_step, status, state, revision, error_count, last_error, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(instance_id) DO UPDATE SET
                 subject_id = excluded.subject_id,
                 current_step = excluded.current_step,
                 status = excluded.status,
                 state = excluded.state,
                 revision = excluded.revision,
                 error_count = excluded.error_count,
                 last_error = excluded.last_error,
                 updated_at = excluded.updated_at
               WHERE excluded.revision > checkpoints.revision"#,
        )
        .bind(&checkpoint.instance_id)
        .bind(&checkpoint.subject_id)
        .bind(checkpoint.current_step.as_str())
        .bind(checkpoint.status.as_str())
        .bind(&state_json)
        .bind(checkpoint.revision as i64)
        .bind(checkpoint.error_count as i64)
        .bind(&checkpoint.last_error)
        .bind(format_datetime(&state.created_at))
        .bind(format_datetime(&checkpoint.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "instance {} already has a checkpoint at or after revision {}",
                checkpoint.instance_id, checkpoint.revision
            )));
        }

        tracing::trace!(
            instance_id = %checkpoint.instance_id,
            revision = checkpoint.revision,
            status = %checkpoint.status,
            "checkpoint written"
        );
        Ok(checkpoint)
    }

    async fn list_by_status(
        &self,
        statuses: &[WorkflowStatus],
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT * FROM checkpoints WHERE status IN ({placeholders}) ORDER BY updated_at ASC"
        );
        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }

        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut checkpoints = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = CheckpointRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            checkpoints.push(r.into_checkpoint()?);
        }
        Ok(checkpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arflow_core::advisor::scripted::ScriptedAdvisors;
    use arflow_core::pipeline::Engine;
    use arflow_types::config::{EngineConfig, RetryBackoffConfig};
    use arflow_types::state::{HistoryEntry, HistoryOutcome, IntakeInput};
    use serde_json::json;
    use std::sync::Arc;

    async fn test_store() -> (SqliteStateStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (SqliteStateStore::new(pool), dir)
    }

    fn sample_state(id: &str, revision: u64) -> InvoiceState {
        let mut state = InvoiceState::new(
            id,
            "subject-1",
            IntakeInput::from_uri("s3://inbox/inv-1.pdf"),
            NodeId::Intake,
            3,
        );
        state.revision = revision;
        state
    }

    #[tokio::test]
    async fn test_put_and_get_roundtrip() {
        let (store, _dir) = test_store().await;
        let mut state = sample_state("inst-1", 1);
        state.results.insert(NodeId::Intake, json!({"document_uri": "s3://inbox/inv-1.pdf"}));
        state.push_history(
            HistoryEntry::new("extract", HistoryOutcome::Failed)
                .with_metadata(json!({"error": "timeout"})),
        );

        store.put(&state).await.unwrap();
        let loaded = store.get("inst-1").await.unwrap().unwrap();

        assert_eq!(loaded.state, state);
        assert_eq!(loaded.revision, 1);
        assert_eq!(loaded.status, WorkflowStatus::Processing);
        assert_eq!(loaded.error_count, 1);
        assert_eq!(loaded.last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let (store, _dir) = test_store().await;
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_with_newer_revision() {
        let (store, _dir) = test_store().await;
        store.put(&sample_state("inst-1", 1)).await.unwrap();

        let mut next = sample_state("inst-1", 2);
        next.current_step = NodeId::Extract;
        next.status = WorkflowStatus::Exception;
        store.put(&next).await.unwrap();

        let loaded = store.get("inst-1").await.unwrap().unwrap();
        assert_eq!(loaded.revision, 2);
        assert_eq!(loaded.current_step, NodeId::Extract);
        assert_eq!(loaded.status, WorkflowStatus::Exception);
    }

    #[tokio::test]
    async fn test_stale_put_is_conflict_and_keeps_stored() {
        let (store, _dir) = test_store().await;
        let mut newer = sample_state("inst-1", 5);
        newer.current_step = NodeId::Terms;
        store.put(&newer).await.unwrap();

        let err = store.put(&sample_state("inst-1", 4)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        let err = store.put(&sample_state("inst-1", 5)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let loaded = store.get("inst-1").await.unwrap().unwrap();
        assert_eq!(loaded.revision, 5);
        assert_eq!(loaded.current_step, NodeId::Terms);
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let (store, _dir) = test_store().await;
        store.put(&sample_state("a", 1)).await.unwrap();
        let mut parked = sample_state("b", 1);
        parked.status = WorkflowStatus::HumanReview;
        store.put(&parked).await.unwrap();
        let mut done = sample_state("c", 1);
        done.status = WorkflowStatus::Completed;
        store.put(&done).await.unwrap();

        let in_flight = store
            .list_by_status(&[WorkflowStatus::Processing, WorkflowStatus::Exception])
            .await
            .unwrap();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].instance_id, "a");

        let parked = store
            .list_by_status(&[WorkflowStatus::HumanReview])
            .await
            .unwrap();
        assert_eq!(parked[0].instance_id, "b");

        assert!(store.list_by_status(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_engine_run_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("engine.db").display());
        let config = EngineConfig {
            retry_backoff: RetryBackoffConfig::immediate(),
            ..EngineConfig::default()
        };

        let instance_id = {
            let store = SqliteStateStore::new(DatabasePool::new(&url).await.unwrap());
            let engine =
                Engine::with_default_graph(store, ScriptedAdvisors::new(), config.clone()).unwrap();
            let state = engine
                .start("subject-1", IntakeInput::from_uri("s3://inbox/inv-1.pdf"))
                .await
                .unwrap();
            assert_eq!(state.status, WorkflowStatus::Completed);
            state.instance_id
        };

        let store = Arc::new(SqliteStateStore::new(DatabasePool::new(&url).await.unwrap()));
        let engine =
            Engine::with_default_graph(Arc::clone(&store), ScriptedAdvisors::new(), config).unwrap();
        let first = engine.get_status(&instance_id).await.unwrap().unwrap();
        let second = engine.get_status(&instance_id).await.unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.status, WorkflowStatus::Completed);
        assert!(first.export.export_ref.is_some());
    }
}
