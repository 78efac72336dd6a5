//! The engine: drives instances through the graph with a checkpoint after
//! every node.
//!
//! One loop handles fresh starts, crash continuation and resumption. Each
//! iteration runs the current node, applies the failure policy if the node
//! recorded an error, persists the new state with a bumped revision and then
//! follows the outgoing edge. Parking and termination both persist before
//! returning, so the store always holds the state a caller was handed.
//!
//! At most one runner drives an instance at a time. `cancel` flips the
//! instance's cancellation token while holding its persist lock; the runner
//! checks the token under the same lock before every write, so a cancelled
//! instance is never overwritten by an in-flight node result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arflow_types::config::{EngineConfig, PolicyAction};
use arflow_types::error::ErrorKind;
use arflow_types::event::EngineEvent;
use arflow_types::state::{
    Checkpoint, HistoryEntry, HistoryOutcome, IntakeInput, InvoiceState, NodeId, ParkKind,
    ParkPoint, ReviewAction, ReviewDecision, WorkflowStatus,
};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::EngineError;
use super::graph::{Graph, GraphError, Target};
use super::node::{NodeContext, execute_node};
use super::policy::RetryPolicy;
use crate::advisor::Advisors;
use crate::event::EventBus;
use crate::repository::StateStore;

/// Statuses `recover` picks up.
const IN_FLIGHT: [WorkflowStatus; 3] = [
    WorkflowStatus::Processing,
    WorkflowStatus::Ready,
    WorkflowStatus::Exception,
];

#[derive(Clone)]
struct ActiveRun {
    token: CancellationToken,
    persist_lock: Arc<Mutex<()>>,
}

/// Exclusive claim on an instance; released on drop.
struct RunGuard<'a> {
    active: &'a DashMap<String, ActiveRun>,
    instance_id: String,
    run: ActiveRun,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.active.remove(&self.instance_id);
    }
}

enum Saved {
    Stored(InvoiceState),
    Cancelled,
}

enum Flow {
    Continue(InvoiceState),
    Stop(InvoiceState),
}

/// Checkpointed pipeline engine.
///
/// Generic over the checkpoint store and the advisor set so production wires
/// SQLite and HTTP advisors while tests use in-memory fakes.
pub struct Engine<S: StateStore, A: Advisors> {
    store: S,
    advisors: A,
    graph: Graph,
    policy: RetryPolicy,
    config: EngineConfig,
    event_bus: EventBus,
    active: DashMap<String, ActiveRun>,
}

impl<S: StateStore, A: Advisors> Engine<S, A> {
    pub fn new(store: S, advisors: A, graph: Graph, config: EngineConfig) -> Self {
        Self {
            store,
            advisors,
            graph,
            policy: RetryPolicy::new(config.policy.clone()),
            config,
            event_bus: EventBus::default(),
            active: DashMap::new(),
        }
    }

    /// Engine over the default receivables pipeline.
    pub fn with_default_graph(
        store: S,
        advisors: A,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let graph = Graph::invoice_pipeline(&config.graph)?;
        Ok(Self::new(store, advisors, graph, config))
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn advisors(&self) -> &A {
        &self.advisors
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// True while some runner holds the instance.
    pub fn is_active(&self, instance_id: &str) -> bool {
        self.active.contains_key(instance_id)
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Start a fresh instance under a new v7 UUID and run it until it parks
    /// or terminates.
    pub async fn start(
        &self,
        subject_id: &str,
        input: IntakeInput,
    ) -> Result<InvoiceState, EngineError> {
        let instance_id = Uuid::now_v7().to_string();
        self.start_with_id(&instance_id, subject_id, input).await
    }

    /// Start the instance `instance_id`.
    ///
    /// If a checkpoint already exists the call is idempotent: an in-flight
    /// instance is continued from its `current_step`, a parked or terminal
    /// one is returned as stored.
    pub async fn start_with_id(
        &self,
        instance_id: &str,
        subject_id: &str,
        input: IntakeInput,
    ) -> Result<InvoiceState, EngineError> {
        let run = self.claim(instance_id)?;

        if let Some(existing) = self.store.get(instance_id).await? {
            let mut state = existing.state;
            if !state.status.is_in_flight() {
                tracing::debug!(
                    instance_id,
                    status = %state.status,
                    "instance already settled"
                );
                return Ok(state);
            }
            tracing::info!(
                instance_id,
                step = %state.current_step,
                status = %state.status,
                revision = state.revision,
                "continuing in-flight instance"
            );
            if state.status == WorkflowStatus::Exception {
                state.clear_error();
                state.status = WorkflowStatus::Processing;
            }
            self.publish_started(&state);
            return self.drive(state, &run, None).await;
        }

        let state = InvoiceState::new(
            instance_id,
            subject_id,
            input,
            self.graph.entry(),
            self.config.max_retries,
        );
        let state = match self.save(state, &run).await? {
            Saved::Stored(state) => state,
            Saved::Cancelled => return self.load_cancelled(instance_id, &run).await,
        };
        tracing::info!(
            instance_id,
            subject_id,
            graph = self.graph.name(),
            "instance started"
        );
        self.publish_started(&state);
        self.drive(state, &run, None).await
    }

    /// Merge a reviewer decision into a parked instance and continue it.
    pub async fn resume(
        &self,
        instance_id: &str,
        decision: ReviewDecision,
    ) -> Result<InvoiceState, EngineError> {
        let run = self.claim(instance_id)?;
        let checkpoint = self
            .store
            .get(instance_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(instance_id.to_string()))?;

        let (state, park) = prepare_resume(checkpoint.state, &decision)?;
        let state = match self.save(state, &run).await? {
            Saved::Stored(state) => state,
            Saved::Cancelled => return self.load_cancelled(instance_id, &run).await,
        };

        tracing::info!(
            instance_id,
            action = ?decision.action,
            reviewer = decision.reviewer.as_deref().unwrap_or("unknown"),
            node = %park.node,
            kind = ?park.kind,
            "instance resumed"
        );
        self.event_bus.publish(EngineEvent::InstanceResumed {
            instance_id: instance_id.to_string(),
            node: state.current_step,
        });

        let interrupt = matches!(park.kind, ParkKind::Before | ParkKind::After);
        match decision.action {
            ReviewAction::Reject if interrupt => {
                let entry = HistoryEntry::new("review", HistoryOutcome::Cancelled)
                    .with_metadata(json!({ "node": park.node }));
                self.finish(state, WorkflowStatus::Cancelled, entry, &run).await
            }
            ReviewAction::Escalate if interrupt => {
                let entry = HistoryEntry::new("review", HistoryOutcome::Escalated)
                    .with_metadata(json!({ "node": park.node }));
                self.finish(state, WorkflowStatus::Escalated, entry, &run).await
            }
            ReviewAction::Approve if park.kind == ParkKind::Failure => {
                self.continue_past_failure(state, park.node, &run).await
            }
            _ if park.kind == ParkKind::After => {
                match self.advance(state, park.node, &run).await? {
                    Flow::Continue(state) => self.drive(state, &run, None).await,
                    Flow::Stop(state) => Ok(state),
                }
            }
            _ => {
                let skip = Some(state.current_step);
                self.drive(state, &run, skip).await
            }
        }
    }

    /// Latest persisted state of an instance.
    pub async fn get_status(&self, instance_id: &str) -> Result<Option<InvoiceState>, EngineError> {
        Ok(self.store.get(instance_id).await?.map(|cp| cp.state))
    }

    /// Checkpoints in any of `statuses`.
    pub async fn list(&self, statuses: &[WorkflowStatus]) -> Result<Vec<Checkpoint>, EngineError> {
        Ok(self.store.list_by_status(statuses).await?)
    }

    /// Cancel an instance. Returns `false` if it does not exist or is
    /// already terminal.
    pub async fn cancel(&self, instance_id: &str, reason: &str) -> Result<bool, EngineError> {
        match self.claim(instance_id) {
            Ok(run) => {
                let _guard = run.run.persist_lock.lock().await;
                self.mark_cancelled(instance_id, reason).await
            }
            Err(EngineError::InstanceBusy(_)) => {
                let active = self
                    .active
                    .get(instance_id)
                    .map(|entry| entry.value().clone());
                match active {
                    Some(active) => {
                        let _guard = active.persist_lock.lock().await;
                        // No checkpoint yet means nothing was cancelled; the
                        // runner keeps going.
                        let cancelled = self.mark_cancelled(instance_id, reason).await?;
                        if cancelled {
                            active.token.cancel();
                        }
                        Ok(cancelled)
                    }
                    None => self.mark_cancelled(instance_id, reason).await,
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Continue every in-flight instance left behind by a crashed process.
    ///
    /// Instances another runner currently holds are skipped; failures are
    /// logged per instance and do not stop the sweep.
    pub async fn recover(&self) -> Result<Vec<InvoiceState>, EngineError> {
        let pending = self.store.list_by_status(&IN_FLIGHT).await?;
        tracing::info!(count = pending.len(), "recovering in-flight instances");

        let mut recovered = Vec::with_capacity(pending.len());
        for checkpoint in pending {
            let result = self
                .start_with_id(
                    &checkpoint.instance_id,
                    &checkpoint.subject_id,
                    checkpoint.state.input.clone(),
                )
                .await;
            match result {
                Ok(state) => recovered.push(state),
                Err(EngineError::InstanceBusy(_)) => {
                    tracing::debug!(instance_id = %checkpoint.instance_id, "instance busy; skipping");
                }
                Err(e) => {
                    tracing::warn!(
                        instance_id = %checkpoint.instance_id,
                        error = %e,
                        "failed to recover instance"
                    );
                }
            }
        }
        Ok(recovered)
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    fn claim(&self, instance_id: &str) -> Result<RunGuard<'_>, EngineError> {
        match self.active.entry(instance_id.to_string()) {
            Entry::Occupied(_) => Err(EngineError::InstanceBusy(instance_id.to_string())),
            Entry::Vacant(slot) => {
                let run = ActiveRun {
                    token: CancellationToken::new(),
                    persist_lock: Arc::new(Mutex::new(())),
                };
                slot.insert(run.clone());
                Ok(RunGuard {
                    active: &self.active,
                    instance_id: instance_id.to_string(),
                    run,
                })
            }
        }
    }

    async fn drive(
        &self,
        mut state: InvoiceState,
        run: &RunGuard<'_>,
        mut skip_interrupt: Option<NodeId>,
    ) -> Result<InvoiceState, EngineError> {
        let ctx = NodeContext {
            advisors: &self.advisors,
            triage: &self.config.triage,
        };

        loop {
            if run.run.token.is_cancelled() {
                return self.load_cancelled(&state.instance_id, run).await;
            }

            let node = state.current_step;
            let spec = *self
                .graph
                .node(node)
                .ok_or(GraphError::UnknownNode(node))?;

            if spec.interrupt_before && skip_interrupt != Some(node) {
                let reason = format!("interrupt before {node}");
                return self.park(state, node, ParkKind::Before, reason, run).await;
            }
            skip_interrupt = None;

            tracing::debug!(instance_id = %state.instance_id, %node, "executing node");
            let entry_status = state.status;
            let started = Instant::now();
            let mut next = execute_node(node, &ctx, &state).await;
            next.previous_step = Some(node);

            if next.has_error() {
                match self.handle_failure(next, node, entry_status, run).await? {
                    Flow::Continue(retry) => {
                        state = retry;
                        skip_interrupt = Some(node);
                        continue;
                    }
                    Flow::Stop(settled) => return Ok(settled),
                }
            }

            self.event_bus.publish(EngineEvent::NodeCompleted {
                instance_id: next.instance_id.clone(),
                node,
                duration_ms: started.elapsed().as_millis() as u64,
            });

            if spec.interrupt_after {
                let reason = format!("interrupt after {node}");
                return self.park(next, node, ParkKind::After, reason, run).await;
            }

            match self.advance(next, node, run).await? {
                Flow::Continue(moved) => state = moved,
                Flow::Stop(settled) => return Ok(settled),
            }
        }
    }

    /// An approved failure stands in for the failed node's output: the run
    /// picks up at that node's successor so the later stages still execute.
    /// A node with no successor to move to is executed again instead.
    async fn continue_past_failure(
        &self,
        mut state: InvoiceState,
        node: NodeId,
        run: &RunGuard<'_>,
    ) -> Result<InvoiceState, EngineError> {
        state.clear_error();
        let transition = self.graph.next(node, &state)?;
        if !matches!(transition.branch.target, Target::Node(_)) {
            state.current_step = node;
            return self.drive(state, run, Some(node)).await;
        }
        match self.advance(state, node, run).await? {
            Flow::Continue(state) => self.drive(state, run, None).await,
            Flow::Stop(state) => Ok(state),
        }
    }

    /// Follow the outgoing edge of `node`, which has already run.
    async fn advance(
        &self,
        mut state: InvoiceState,
        node: NodeId,
        run: &RunGuard<'_>,
    ) -> Result<Flow, EngineError> {
        let transition = self.graph.next(node, &state)?;
        match transition.branch.target {
            Target::Park => {
                let reasons = result_reasons(&state, node);
                let reason = if reasons.is_empty() {
                    format!("{node} routed to review")
                } else {
                    reasons.join("; ")
                };
                state.review.context.insert(
                    "route".to_string(),
                    json!({ "node": node, "label": transition.label, "reasons": reasons }),
                );
                let parked = self.park(state, node, ParkKind::Route, reason, run).await?;
                Ok(Flow::Stop(parked))
            }
            Target::End(status) => {
                let entry = HistoryEntry::new("finish", finish_outcome(status)).with_metadata(
                    json!({ "from": node, "label": transition.label, "retry_count": state.retry_count }),
                );
                let finished = self.finish(state, status, entry, run).await?;
                Ok(Flow::Stop(finished))
            }
            Target::Node(successor) => {
                let instance_id = state.instance_id.clone();
                state.current_step = successor;
                state.status = transition
                    .branch
                    .status
                    .unwrap_or(WorkflowStatus::Processing);
                match self.save(state, run).await? {
                    Saved::Stored(state) => Ok(Flow::Continue(state)),
                    Saved::Cancelled => Ok(Flow::Stop(self.load_cancelled(&instance_id, run).await?)),
                }
            }
        }
    }

    /// A retried node re-runs with the status it was entered with, so a retry
    /// on the ready edge stays `Ready`.
    async fn handle_failure(
        &self,
        mut state: InvoiceState,
        node: NodeId,
        entry_status: WorkflowStatus,
        run: &RunGuard<'_>,
    ) -> Result<Flow, EngineError> {
        let instance_id = state.instance_id.clone();
        let kind = state.error_kind.unwrap_or(ErrorKind::Unknown);
        let error = state.error_message.clone().unwrap_or_default();
        let action = self
            .policy
            .decide(kind, state.retry_count, state.max_retries);

        self.event_bus.publish(EngineEvent::NodeFailed {
            instance_id: instance_id.clone(),
            node,
            kind,
            error: error.clone(),
            will_retry: action == PolicyAction::Retry,
        });

        match action {
            PolicyAction::Retry => {
                state.retry_count += 1;
                let attempt = state.retry_count;
                state.status = WorkflowStatus::Exception;
                state.current_step = node;
                state.push_history(
                    HistoryEntry::new(node.as_str(), HistoryOutcome::Retried)
                        .with_metadata(json!({ "attempt": attempt, "kind": kind, "error": error })),
                );
                let saved = match self.save(state, run).await? {
                    Saved::Stored(state) => state,
                    Saved::Cancelled => {
                        return Ok(Flow::Stop(self.load_cancelled(&instance_id, run).await?));
                    }
                };

                let delay_ms = self.config.retry_backoff.delay_ms(attempt);
                tracing::warn!(
                    %instance_id,
                    %node,
                    %kind,
                    attempt,
                    max_retries = saved.max_retries,
                    delay_ms,
                    error = %error,
                    "node failed; retrying"
                );
                tokio::select! {
                    _ = run.run.token.cancelled() => {
                        return Ok(Flow::Stop(self.load_cancelled(&instance_id, run).await?));
                    }
                    _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {}
                }

                let mut retry = saved;
                retry.clear_error();
                retry.status = entry_status;
                Ok(Flow::Continue(retry))
            }
            PolicyAction::Escalate => {
                tracing::error!(
                    %instance_id,
                    %node,
                    %kind,
                    retry_count = state.retry_count,
                    error = %error,
                    "node failed; escalating"
                );
                let entry = HistoryEntry::new(node.as_str(), HistoryOutcome::Escalated)
                    .with_metadata(json!({
                        "kind": kind,
                        "error": error,
                        "retry_count": state.retry_count,
                    }));
                let finished = self
                    .finish(state, WorkflowStatus::Escalated, entry, run)
                    .await?;
                Ok(Flow::Stop(finished))
            }
            PolicyAction::HumanReview => {
                tracing::warn!(%instance_id, %node, %kind, error = %error, "node failed; parking for review");
                state.review.context.insert(
                    "failure".to_string(),
                    json!({
                        "node": node,
                        "kind": kind,
                        "error": error,
                        "details": state.error_details,
                        "retry_count": state.retry_count,
                    }),
                );
                state.current_step = self.graph.review_node();
                let parked = self
                    .park(state, node, ParkKind::Failure, error, run)
                    .await?;
                Ok(Flow::Stop(parked))
            }
            PolicyAction::Fail => {
                tracing::error!(%instance_id, %node, %kind, error = %error, "node failed; failing instance");
                let entry = HistoryEntry::new(node.as_str(), HistoryOutcome::Aborted)
                    .with_metadata(json!({ "kind": kind, "error": error }));
                let finished = self.finish(state, WorkflowStatus::Failed, entry, run).await?;
                Ok(Flow::Stop(finished))
            }
        }
    }

    /// Persist `state` as parked at `node`. `current_step` is left to the
    /// caller.
    async fn park(
        &self,
        mut state: InvoiceState,
        node: NodeId,
        kind: ParkKind,
        reason: String,
        run: &RunGuard<'_>,
    ) -> Result<InvoiceState, EngineError> {
        let instance_id = state.instance_id.clone();
        state.status = WorkflowStatus::HumanReview;
        state.review.requires_review = true;
        state.review.reason = Some(reason.clone());
        state.review.decision = None;
        state.parked = Some(ParkPoint { node, kind });
        state.push_history(
            HistoryEntry::new(node.as_str(), HistoryOutcome::Parked)
                .with_metadata(json!({ "kind": kind, "reason": reason })),
        );

        match self.save(state, run).await? {
            Saved::Stored(state) => {
                tracing::info!(%instance_id, %node, ?kind, %reason, "instance parked for review");
                self.event_bus.publish(EngineEvent::InstanceParked {
                    instance_id,
                    node,
                    kind,
                });
                Ok(state)
            }
            Saved::Cancelled => self.load_cancelled(&instance_id, run).await,
        }
    }

    async fn finish(
        &self,
        mut state: InvoiceState,
        status: WorkflowStatus,
        entry: HistoryEntry,
        run: &RunGuard<'_>,
    ) -> Result<InvoiceState, EngineError> {
        let instance_id = state.instance_id.clone();
        state.status = status;
        state.review.requires_review = false;
        state.parked = None;
        state.push_history(entry);

        match self.save(state, run).await? {
            Saved::Stored(state) => {
                tracing::info!(
                    %instance_id,
                    %status,
                    retry_count = state.retry_count,
                    "instance finished"
                );
                self.event_bus.publish(EngineEvent::InstanceFinished {
                    instance_id,
                    status,
                    retry_count: state.retry_count,
                });
                Ok(state)
            }
            Saved::Cancelled => self.load_cancelled(&instance_id, run).await,
        }
    }

    /// Write a checkpoint unless the instance was cancelled meanwhile.
    async fn save(&self, mut state: InvoiceState, run: &RunGuard<'_>) -> Result<Saved, EngineError> {
        let _guard = run.run.persist_lock.lock().await;
        if run.run.token.is_cancelled() {
            return Ok(Saved::Cancelled);
        }
        state.revision += 1;
        state.updated_at = Utc::now();
        self.store.put(&state).await?;
        Ok(Saved::Stored(state))
    }

    /// The state `cancel` wrote, once its write has landed.
    async fn load_cancelled(
        &self,
        instance_id: &str,
        run: &RunGuard<'_>,
    ) -> Result<InvoiceState, EngineError> {
        let _guard = run.run.persist_lock.lock().await;
        tracing::debug!(instance_id, "run stopped by cancellation");
        self.store
            .get(instance_id)
            .await?
            .map(|cp| cp.state)
            .ok_or_else(|| EngineError::NotFound(instance_id.to_string()))
    }

    /// Caller must hold the instance's persist lock.
    async fn mark_cancelled(&self, instance_id: &str, reason: &str) -> Result<bool, EngineError> {
        let Some(checkpoint) = self.store.get(instance_id).await? else {
            return Ok(false);
        };
        let mut state = checkpoint.state;
        if state.status.is_terminal() {
            return Ok(false);
        }

        state.status = WorkflowStatus::Cancelled;
        state.parked = None;
        state.review.requires_review = false;
        state.push_history(
            HistoryEntry::new("cancel", HistoryOutcome::Cancelled)
                .with_metadata(json!({ "reason": reason })),
        );
        state.revision += 1;
        state.updated_at = Utc::now();
        self.store.put(&state).await?;

        tracing::info!(instance_id, reason, "instance cancelled");
        self.event_bus.publish(EngineEvent::InstanceCancelled {
            instance_id: instance_id.to_string(),
            reason: reason.to_string(),
        });
        Ok(true)
    }

    fn publish_started(&self, state: &InvoiceState) {
        self.event_bus.publish(EngineEvent::InstanceStarted {
            instance_id: state.instance_id.clone(),
            subject_id: state.subject_id.clone(),
            entry: state.current_step,
        });
    }
}

/// Apply a reviewer decision to a parked state.
///
/// Returns the state ready to continue together with where it was parked.
/// `previous_step` is left as it was at parking time.
pub fn prepare_resume(
    mut state: InvoiceState,
    decision: &ReviewDecision,
) -> Result<(InvoiceState, ParkPoint), EngineError> {
    let not_parked = |state: &InvoiceState| EngineError::NotParked {
        instance_id: state.instance_id.clone(),
        status: state.status,
    };
    if state.status != WorkflowStatus::HumanReview {
        return Err(not_parked(&state));
    }
    let park = state.parked.ok_or_else(|| not_parked(&state))?;

    if decision.action == ReviewAction::Rerun {
        if park.kind != ParkKind::Failure {
            return Err(EngineError::InvalidDecision(format!(
                "rerun needs a failed node; instance is parked {:?} {}",
                park.kind, park.node
            )));
        }
        state.current_step = park.node;
        state.clear_error();
    }

    let mut decisions = match state.review.context.remove("decisions") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    decisions.push(json!({
        "decision": decision,
        "parked_at": park,
        "decided_at": Utc::now(),
    }));
    state
        .review
        .context
        .insert("decisions".to_string(), Value::Array(decisions));
    for (key, value) in &decision.overrides {
        state.review.context.insert(key.clone(), value.clone());
    }

    state.review.decision = Some(decision.clone());
    state.review.requires_review = false;
    state.parked = None;
    state.status = WorkflowStatus::Processing;
    state.push_history(
        HistoryEntry::new("resume", HistoryOutcome::Resumed).with_metadata(json!({
            "action": decision.action,
            "reviewer": decision.reviewer,
            "node": park.node,
            "kind": park.kind,
        })),
    );
    Ok((state, park))
}

fn result_reasons(state: &InvoiceState, node: NodeId) -> Vec<String> {
    state
        .result(node)
        .and_then(|result| result.get("reasons"))
        .and_then(Value::as_array)
        .map(|reasons| {
            reasons
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn finish_outcome(status: WorkflowStatus) -> HistoryOutcome {
    match status {
        WorkflowStatus::Escalated => HistoryOutcome::Escalated,
        WorkflowStatus::Cancelled => HistoryOutcome::Cancelled,
        WorkflowStatus::Failed => HistoryOutcome::Aborted,
        _ => HistoryOutcome::Completed,
    }
}
