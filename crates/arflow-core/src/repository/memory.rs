//! In-memory `StateStore` for tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use arflow_types::error::RepositoryError;
use arflow_types::state::{Checkpoint, InvoiceState, WorkflowStatus};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::state_store::StateStore;

/// Revision-checked map of checkpoints plus a log of every accepted write.
#[derive(Default)]
pub struct MemoryStateStore {
    checkpoints: DashMap<String, Checkpoint>,
    writes: Mutex<Vec<Checkpoint>>,
    /// When set, every put after this many accepted writes fails.
    fail_after: Mutex<Option<usize>>,
    accepted: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make all writes after the first `writes` fail with a query error.
    pub fn fail_puts_after(&self, writes: usize) {
        if let Ok(mut guard) = self.fail_after.lock() {
            *guard = Some(writes);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut guard) = self.fail_after.lock() {
            *guard = None;
        }
    }

    /// Every accepted write, in order.
    pub fn writes(&self) -> Vec<Checkpoint> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Accepted writes for one instance, in order.
    pub fn writes_for(&self, instance_id: &str) -> Vec<Checkpoint> {
        self.writes()
            .into_iter()
            .filter(|cp| cp.instance_id == instance_id)
            .collect()
    }

    /// Store a checkpoint without the revision check (fixture setup).
    pub fn insert_raw(&self, state: &InvoiceState) {
        self.checkpoints
            .insert(state.instance_id.clone(), Checkpoint::from_state(state));
    }
}

impl StateStore for MemoryStateStore {
    async fn get(&self, instance_id: &str) -> Result<Option<Checkpoint>, RepositoryError> {
        Ok(self.checkpoints.get(instance_id).map(|cp| cp.clone()))
    }

    async fn put(&self, state: &InvoiceState) -> Result<Checkpoint, RepositoryError> {
        let limit = self.fail_after.lock().ok().and_then(|guard| *guard);
        if let Some(limit) = limit {
            if self.accepted.load(Ordering::SeqCst) >= limit {
                return Err(RepositoryError::Query("injected write failure".to_string()));
            }
        }

        let checkpoint = Checkpoint::from_state(state);
        match self.checkpoints.entry(state.instance_id.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().revision >= state.revision {
                    return Err(RepositoryError::Conflict(format!(
                        "revision {} is not newer than stored {}",
                        state.revision,
                        entry.get().revision
                    )));
                }
                entry.insert(checkpoint.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(checkpoint.clone());
            }
        }

        self.accepted.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(checkpoint.clone());
        }
        Ok(checkpoint)
    }

    async fn list_by_status(
        &self,
        statuses: &[WorkflowStatus],
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        let mut matching: Vec<Checkpoint> = self
            .checkpoints
            .iter()
            .filter(|cp| statuses.contains(&cp.status))
            .map(|cp| cp.clone())
            .collect();
        matching.sort_by_key(|cp| cp.updated_at);
        Ok(matching)
    }
}
