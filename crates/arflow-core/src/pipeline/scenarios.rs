//! End-to-end runs of the default pipeline against the in-memory store and
//! scripted advisors.

use std::sync::Arc;
use std::time::Duration;

use arflow_types::advisor::{
    CollectionAssessment, CollectionPriority, IssueSeverity, PayerCheck, ValidationIssue,
    ValidationReport,
};
use arflow_types::config::{
    EngineConfig, GraphConfig, PolicyAction, PolicyConfig, PolicyRule, RetryBackoffConfig,
};
use arflow_types::error::{AdvisorError, ErrorKind};
use arflow_types::event::EngineEvent;
use arflow_types::state::{
    HistoryOutcome, IntakeInput, InvoiceState, NodeId, ParkKind, ReviewAction, ReviewDecision,
    WorkflowStatus,
};

use super::batch::{BatchCoordinator, BatchItem};
use super::error::EngineError;
use super::graph::{Branch, GraphBuilder, NodeSpec};
use super::runner::Engine;
use crate::advisor::scripted::ScriptedAdvisors;
use crate::repository::StateStore;
use crate::repository::memory::MemoryStateStore;

type TestEngine = Engine<Arc<MemoryStateStore>, ScriptedAdvisors>;

fn config() -> EngineConfig {
    EngineConfig {
        retry_backoff: RetryBackoffConfig::immediate(),
        ..EngineConfig::default()
    }
}

fn build_engine(advisors: ScriptedAdvisors, config: EngineConfig) -> (TestEngine, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::new());
    let engine = Engine::with_default_graph(Arc::clone(&store), advisors, config).unwrap();
    (engine, store)
}

fn input(uri: &str) -> IntakeInput {
    IntakeInput::from_uri(uri)
}

fn invalid_payer() -> PayerCheck {
    PayerCheck {
        valid: false,
        reason: Some("payer on credit hold".to_string()),
        payer_record: None,
    }
}

fn failed_validation() -> ValidationReport {
    ValidationReport {
        valid: false,
        confidence: 0.4,
        issues: vec![ValidationIssue {
            field: "invoice_number".to_string(),
            message: "unreadable".to_string(),
            severity: IssueSeverity::Error,
        }],
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---------------------------------------------------------------------------
// Straight-through runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clean_invoice_completes_with_export() {
    let (engine, store) = build_engine(ScriptedAdvisors::new(), config());
    let state = engine.start("subject-1", input("file:///inbox/1.pdf")).await.unwrap();

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(state.retry_count, 0);
    assert!(state.export.ready);
    assert_eq!(state.export.export_ref.as_deref(), Some("export-1"));
    for node in NodeId::ALL {
        assert!(state.results.contains_key(&node), "missing result for {node}");
    }
    assert_eq!(state.current_step, NodeId::Export);
    assert_eq!(state.previous_step, Some(NodeId::Export));
    assert_eq!(engine.advisors().calls("notify"), 1);

    let writes = store.writes_for(&state.instance_id);
    assert!(writes.windows(2).all(|w| w[1].revision == w[0].revision + 1));
    assert_eq!(writes.last().unwrap().state, state);
    assert_eq!(writes[0].state.retry_count, 0);
    assert!(!engine.is_active(&state.instance_id));
}

#[tokio::test]
async fn every_node_execution_is_checkpointed() {
    let (engine, store) = build_engine(ScriptedAdvisors::new(), config());
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();

    let succeeded = state
        .history
        .iter()
        .filter(|e| e.outcome == HistoryOutcome::Succeeded)
        .count();
    // Initial write, one per node, and the terminal write.
    assert_eq!(store.writes_for(&state.instance_id).len(), succeeded + 1);
}

#[tokio::test]
async fn persisted_state_routes_like_in_memory_state() {
    let (engine, store) = build_engine(ScriptedAdvisors::new().with_payer(invalid_payer()), config());
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();
    assert_eq!(state.status, WorkflowStatus::HumanReview);
    engine
        .resume(&state.instance_id, ReviewDecision::approve())
        .await
        .unwrap();

    for checkpoint in store.writes_for(&state.instance_id) {
        let Some(previous) = checkpoint.state.previous_step else {
            continue;
        };
        let json = serde_json::to_string(&checkpoint.state).unwrap();
        let reloaded: InvoiceState = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, checkpoint.state);
        assert_eq!(
            engine.graph().next(previous, &reloaded).unwrap(),
            engine.graph().next(previous, &checkpoint.state).unwrap()
        );
    }
}

#[tokio::test]
async fn events_cover_lifecycle() {
    let (engine, _store) = build_engine(ScriptedAdvisors::new(), config());
    let mut rx = engine.event_bus().subscribe();
    engine.start("s", input("file:///a.pdf")).await.unwrap();

    let events = drain(&mut rx);
    assert!(matches!(events.first(), Some(EngineEvent::InstanceStarted { entry: NodeId::Intake, .. })));
    assert!(matches!(
        events.last(),
        Some(EngineEvent::InstanceFinished {
            status: WorkflowStatus::Completed,
            ..
        })
    ));
    let completed = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::NodeCompleted { .. }))
        .count();
    assert_eq!(completed, NodeId::ALL.len());
}

#[tokio::test]
async fn get_status_is_idempotent() {
    let (engine, _store) = build_engine(ScriptedAdvisors::new(), config());
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();

    let first = engine.get_status(&state.instance_id).await.unwrap();
    let second = engine.get_status(&state.instance_id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, Some(state));
    assert!(engine.get_status("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn start_with_existing_settled_id_returns_stored_state() {
    let (engine, _store) = build_engine(ScriptedAdvisors::new(), config());
    let first = engine
        .start_with_id("inv-1", "s", input("file:///a.pdf"))
        .await
        .unwrap();
    let again = engine
        .start_with_id("inv-1", "s", input("file:///a.pdf"))
        .await
        .unwrap();

    assert_eq!(first, again);
    assert_eq!(engine.advisors().calls("extract"), 1);
}

// ---------------------------------------------------------------------------
// Failure policy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transient_extract_failures_retry_then_succeed() {
    let advisors = ScriptedAdvisors::new()
        .fail_extract_times(AdvisorError::transient("extractor returned 503"), 2);
    let (engine, store) = build_engine(advisors, config());
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();

    assert_ne!(state.status, WorkflowStatus::Escalated);
    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(state.retry_count, 2);
    assert_eq!(engine.advisors().calls("extract"), 3);

    // The checkpoint written right after extract succeeded carries retry_count 2.
    let after_extract = store
        .writes_for(&state.instance_id)
        .into_iter()
        .find(|cp| cp.state.previous_step == Some(NodeId::Extract) && cp.current_step == NodeId::Enrich)
        .unwrap();
    assert_eq!(after_extract.state.retry_count, 2);

    // Retries went up one at a time.
    let retried: Vec<u64> = state
        .history
        .iter()
        .filter(|e| e.outcome == HistoryOutcome::Retried)
        .map(|e| e.metadata["attempt"].as_u64().unwrap())
        .collect();
    assert_eq!(retried, vec![1, 2]);
    assert_eq!(store.get(&state.instance_id).await.unwrap().unwrap().error_count, 2);
}

#[tokio::test]
async fn transient_failures_escalate_at_retry_limit() {
    let advisors = ScriptedAdvisors::new().fail_extract(AdvisorError::timeout("extractor"));
    let (engine, _store) = build_engine(
        advisors,
        EngineConfig {
            max_retries: 2,
            ..config()
        },
    );
    let mut rx = engine.event_bus().subscribe();
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();

    assert_eq!(state.status, WorkflowStatus::Escalated);
    assert_eq!(state.retry_count, 2);
    assert_eq!(engine.advisors().calls("extract"), 3);
    assert_eq!(state.error_kind, Some(ErrorKind::Transient));
    assert!(state.error_message.as_deref().unwrap().contains("timed out"));

    let escalation = state.history.last().unwrap();
    assert_eq!(escalation.outcome, HistoryOutcome::Escalated);
    assert_eq!(escalation.metadata["retry_count"], 2);

    let retries: Vec<bool> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::NodeFailed { will_retry, .. } => Some(will_retry),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![true, true, false]);
}

#[tokio::test]
async fn structural_failure_escalates_without_retry() {
    let advisors =
        ScriptedAdvisors::new().fail_extract(AdvisorError::structural("response missing header"));
    let (engine, _store) = build_engine(advisors, config());
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();

    assert_eq!(state.status, WorkflowStatus::Escalated);
    assert_eq!(state.retry_count, 0);
    assert_eq!(engine.advisors().calls("extract"), 1);
}

#[tokio::test]
async fn data_validation_failure_parks_for_review() {
    let advisors = ScriptedAdvisors::new().with_validation(failed_validation());
    let (engine, _store) = build_engine(advisors, config());
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();

    assert_eq!(state.status, WorkflowStatus::HumanReview);
    assert!(state.review.requires_review);
    assert_eq!(state.current_step, NodeId::Triage);
    assert_eq!(state.previous_step, Some(NodeId::Validate));
    let parked = state.parked.unwrap();
    assert_eq!(parked.node, NodeId::Validate);
    assert_eq!(parked.kind, ParkKind::Failure);
    assert_eq!(state.error_kind, Some(ErrorKind::DataValidation));
    assert_eq!(state.review.context["failure"]["node"], "validate");
    assert!(state.error_details.is_some());
}

#[tokio::test]
async fn rerun_decision_reexecutes_failed_node() {
    let advisors = ScriptedAdvisors::new().queue_validation(failed_validation());
    let (engine, _store) = build_engine(advisors, config());
    let parked = engine.start("s", input("file:///a.pdf")).await.unwrap();
    assert_eq!(parked.status, WorkflowStatus::HumanReview);

    let state = engine
        .resume(&parked.instance_id, ReviewDecision::new(ReviewAction::Rerun))
        .await
        .unwrap();
    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(engine.advisors().calls("validate_data"), 2);
    assert!(!state.has_error());
}

#[tokio::test]
async fn approving_failed_validation_runs_remaining_stages() {
    let advisors = ScriptedAdvisors::new().queue_validation(failed_validation());
    let (engine, _store) = build_engine(advisors, config());
    let parked = engine.start("s", input("file:///a.pdf")).await.unwrap();
    assert_eq!(parked.parked.unwrap().kind, ParkKind::Failure);

    let state = engine
        .resume(&parked.instance_id, ReviewDecision::approve())
        .await
        .unwrap();

    assert_eq!(state.status, WorkflowStatus::Completed);
    assert_eq!(engine.advisors().calls("validate_data"), 1);
    for method in ["validate", "resolve", "score_collection", "score_working_capital", "render"] {
        assert_eq!(engine.advisors().calls(method), 1, "{method}");
    }
    for node in [
        NodeId::PayerCheck,
        NodeId::Terms,
        NodeId::Collection,
        NodeId::WorkingCapital,
        NodeId::Triage,
    ] {
        assert!(state.result(node).is_some(), "{node}");
    }
    assert!(state.result(NodeId::Validate).is_none());
    assert!(!state.has_error());

    let steps: Vec<&str> = state.history.iter().map(|e| e.step.as_str()).collect();
    let resumed_at = steps.iter().position(|s| *s == "resume").unwrap();
    assert_eq!(steps[resumed_at + 1], "payer_check");
}

#[tokio::test]
async fn approving_failed_terms_cannot_complete_without_terms() {
    let advisors = ScriptedAdvisors::new()
        .fail_terms(AdvisorError::data_validation("terms text unreadable"));
    let (engine, _store) = build_engine(advisors, config());
    let parked = engine.start("s", input("file:///a.pdf")).await.unwrap();
    assert_eq!(parked.parked.unwrap().node, NodeId::Terms);

    let state = engine
        .resume(&parked.instance_id, ReviewDecision::approve())
        .await
        .unwrap();

    assert_eq!(state.status, WorkflowStatus::Escalated);
    assert_eq!(state.error_kind, Some(ErrorKind::Structural));
    assert_eq!(state.current_step, NodeId::WorkingCapital);
    assert_eq!(engine.advisors().calls("render"), 0);
}

#[tokio::test]
async fn approving_failed_export_renders_again() {
    let advisors =
        ScriptedAdvisors::new().fail_export(AdvisorError::data_validation("template rejected"));
    let (engine, _store) = build_engine(advisors, config());
    let parked = engine.start("s", input("file:///a.pdf")).await.unwrap();
    assert_eq!(parked.parked.unwrap().node, NodeId::Export);

    let state = engine
        .resume(&parked.instance_id, ReviewDecision::approve())
        .await
        .unwrap();

    assert_eq!(state.status, WorkflowStatus::HumanReview);
    assert_eq!(state.parked.unwrap().node, NodeId::Export);
    assert!(state.export.export_ref.is_none());
    assert_eq!(engine.advisors().calls("render"), 2);
}

#[tokio::test]
async fn fail_policy_terminates_instance() {
    let advisors = ScriptedAdvisors::new().with_validation(failed_validation());
    let policy = PolicyConfig {
        data_validation: PolicyRule::new(PolicyAction::Fail, PolicyAction::Fail),
        ..PolicyConfig::default()
    };
    let (engine, _store) = build_engine(advisors, EngineConfig { policy, ..config() });
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();

    assert_eq!(state.status, WorkflowStatus::Failed);
    assert_eq!(state.history.last().unwrap().outcome, HistoryOutcome::Aborted);
    assert!(state.error_message.is_some());
}

#[tokio::test]
async fn store_failure_surfaces_and_keeps_last_checkpoint() {
    let (engine, store) = build_engine(ScriptedAdvisors::new(), config());
    store.fail_puts_after(3);
    let err = engine
        .start_with_id("inv-1", "s", input("file:///a.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));

    let kept = store.get("inv-1").await.unwrap().unwrap();
    assert_eq!(kept.revision, 3);
    assert!(kept.status.is_in_flight());
    assert!(!engine.is_active("inv-1"));
}

// ---------------------------------------------------------------------------
// Review and interrupts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalid_payer_parks_then_approval_completes() {
    let (engine, _store) = build_engine(ScriptedAdvisors::new().with_payer(invalid_payer()), config());
    let parked = engine
        .start_with_id("S1", "subject-1", input("file:///a.pdf"))
        .await
        .unwrap();

    assert!(parked.review.requires_review);
    assert_eq!(parked.status, WorkflowStatus::HumanReview);
    assert_eq!(parked.parked.unwrap().kind, ParkKind::Route);
    assert!(parked.review.reason.as_deref().unwrap().contains("credit hold"));
    assert_eq!(parked.previous_step, Some(NodeId::Triage));

    let done = engine.resume("S1", ReviewDecision::approve()).await.unwrap();
    assert_eq!(done.status, WorkflowStatus::Completed);
    assert!(done.export.export_ref.is_some());
    assert!(!done.review.requires_review);
    // Without a payer record there is nobody to notify.
    assert_eq!(engine.advisors().calls("notify"), 0);
}

#[tokio::test]
async fn reject_decision_cancels() {
    let (engine, _store) = build_engine(ScriptedAdvisors::new().with_payer(invalid_payer()), config());
    engine.start_with_id("S1", "s", input("file:///a.pdf")).await.unwrap();

    let mut decision = ReviewDecision::new(ReviewAction::Reject);
    decision.notes = Some("duplicate submission".to_string());
    let state = engine.resume("S1", decision).await.unwrap();
    assert_eq!(state.status, WorkflowStatus::Cancelled);
    assert_eq!(engine.advisors().calls("render"), 0);
}

#[tokio::test]
async fn high_risk_escalates_from_triage() {
    let advisors = ScriptedAdvisors::new().with_collection(CollectionAssessment {
        priority: CollectionPriority::Critical,
        risk_score: 0.97,
    });
    let (engine, _store) = build_engine(advisors, config());
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();
    assert_eq!(state.status, WorkflowStatus::Escalated);
    assert_eq!(state.current_step, NodeId::Triage);
}

#[tokio::test]
async fn resume_requires_parked_instance() {
    let (engine, _store) = build_engine(ScriptedAdvisors::new(), config());
    let state = engine.start("s", input("file:///a.pdf")).await.unwrap();

    let err = engine
        .resume(&state.instance_id, ReviewDecision::approve())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotParked { .. }));

    let err = engine
        .resume("missing", ReviewDecision::approve())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn interrupt_before_export_parks_until_approved() {
    let config = EngineConfig {
        graph: GraphConfig {
            interrupt_before_export: true,
        },
        ..config()
    };
    let (engine, _store) = build_engine(ScriptedAdvisors::new(), config);
    let parked = engine.start("s", input("file:///a.pdf")).await.unwrap();

    assert_eq!(parked.status, WorkflowStatus::HumanReview);
    assert_eq!(parked.current_step, NodeId::Export);
    assert_eq!(parked.previous_step, Some(NodeId::Triage));
    assert_eq!(parked.parked.unwrap().kind, ParkKind::Before);
    assert!(parked.export.ready);
    assert_eq!(engine.advisors().calls("render"), 0);

    let done = engine
        .resume(&parked.instance_id, ReviewDecision::approve())
        .await
        .unwrap();
    assert_eq!(done.status, WorkflowStatus::Completed);
    assert_eq!(engine.advisors().calls("render"), 1);
}

#[tokio::test]
async fn interrupt_after_resumes_at_next_edge() {
    let graph = GraphBuilder::new("two_step")
        .entry(NodeId::Intake)
        .review_node(NodeId::Extract)
        .node(NodeSpec::new(NodeId::Intake))
        .node(NodeSpec::new(NodeId::Extract).interrupt_after())
        .edge(NodeId::Intake, Branch::to(NodeId::Extract))
        .edge(NodeId::Extract, Branch::end(WorkflowStatus::Completed))
        .build()
        .unwrap();
    let store = Arc::new(MemoryStateStore::new());
    let engine = Engine::new(Arc::clone(&store), ScriptedAdvisors::new(), graph, config());

    let parked = engine.start("s", input("file:///a.pdf")).await.unwrap();
    assert_eq!(parked.status, WorkflowStatus::HumanReview);
    assert_eq!(parked.current_step, NodeId::Extract);
    assert_eq!(parked.parked.unwrap().kind, ParkKind::After);

    let done = engine
        .resume(&parked.instance_id, ReviewDecision::approve())
        .await
        .unwrap();
    assert_eq!(done.status, WorkflowStatus::Completed);
    assert_eq!(engine.advisors().calls("extract"), 1);
}

// ---------------------------------------------------------------------------
// Cancellation, exclusivity, recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_parked_instance() {
    let (engine, _store) = build_engine(ScriptedAdvisors::new().with_payer(invalid_payer()), config());
    engine.start_with_id("S1", "s", input("file:///a.pdf")).await.unwrap();

    assert!(engine.cancel("S1", "withdrawn by customer").await.unwrap());
    let state = engine.get_status("S1").await.unwrap().unwrap();
    assert_eq!(state.status, WorkflowStatus::Cancelled);
    assert!(state.parked.is_none());

    assert!(!engine.cancel("S1", "again").await.unwrap());
    assert!(!engine.cancel("missing", "n/a").await.unwrap());
}

#[tokio::test]
async fn cancel_running_instance_discards_in_flight_result() {
    let advisors = ScriptedAdvisors::new().with_extract_delay(Duration::from_millis(300));
    let (engine, store) = build_engine(advisors, config());
    let engine = Arc::new(engine);

    let runner = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .start_with_id("inv-1", "s", input("file:///a.pdf"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(engine.is_active("inv-1"));

    assert!(engine.cancel("inv-1", "operator stop").await.unwrap());
    let state = runner.await.unwrap().unwrap();
    assert_eq!(state.status, WorkflowStatus::Cancelled);
    assert!(!state.results.contains_key(&NodeId::Extract));

    let last = store.writes_for("inv-1").pop().unwrap();
    assert_eq!(last.status, WorkflowStatus::Cancelled);
}

#[tokio::test]
async fn second_runner_for_same_instance_is_busy() {
    let advisors = ScriptedAdvisors::new().with_extract_delay(Duration::from_millis(200));
    let (engine, _store) = build_engine(advisors, config());
    let engine = Arc::new(engine);

    let first = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            engine
                .start_with_id("inv-1", "s", input("file:///a.pdf"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = engine
        .start_with_id("inv-1", "s", input("file:///a.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InstanceBusy(_)));

    let state = first.await.unwrap().unwrap();
    assert_eq!(state.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn recover_continues_crashed_instance() {
    let store = Arc::new(MemoryStateStore::new());
    let crashed =
        Engine::with_default_graph(Arc::clone(&store), ScriptedAdvisors::new(), config()).unwrap();
    store.fail_puts_after(4);
    assert!(crashed
        .start_with_id("inv-1", "s", input("file:///a.pdf"))
        .await
        .is_err());
    let stranded = store.get("inv-1").await.unwrap().unwrap();
    assert_eq!(stranded.status, WorkflowStatus::Processing);
    store.clear_failures();

    let engine =
        Engine::with_default_graph(Arc::clone(&store), ScriptedAdvisors::new(), config()).unwrap();
    let recovered = engine.recover().await.unwrap();
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].status, WorkflowStatus::Completed);
    assert!(recovered[0].revision > stranded.revision);

    // Nothing left to pick up.
    assert!(engine.recover().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

fn batch_items(count: usize) -> Vec<BatchItem> {
    (0..count)
        .map(|i| BatchItem {
            instance_id: format!("inv-{i}"),
            subject_id: format!("subject-{i}"),
            input: input(&format!("file:///inbox/{i}.pdf")),
        })
        .collect()
}

#[tokio::test]
async fn batch_isolates_structural_failure() {
    let advisors = ScriptedAdvisors::new().fail_extract_for(
        "file:///inbox/2.pdf",
        AdvisorError::structural("unsupported document layout"),
    );
    let (engine, _store) = build_engine(advisors, config());
    let coordinator = BatchCoordinator::new(Arc::new(engine));

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        coordinator.run_batch(batch_items(5), 2),
    )
    .await
    .unwrap();

    assert_eq!(result.total, 5);
    assert_eq!(result.succeeded, 4);
    assert_eq!(result.failed, 1);
    let ids: Vec<&str> = result.results.iter().map(|r| r.instance_id.as_str()).collect();
    assert_eq!(ids, vec!["inv-0", "inv-1", "inv-2", "inv-3", "inv-4"]);
    assert!(!result.results[2].success);
    assert_eq!(result.results[2].status, Some(WorkflowStatus::Escalated));
}

#[tokio::test]
async fn batch_with_zero_concurrency_runs_serially() {
    let (engine, _store) = build_engine(ScriptedAdvisors::new(), config());
    let coordinator = BatchCoordinator::new(Arc::new(engine));
    let result = coordinator.run_batch(batch_items(3), 0).await;
    assert_eq!(result.succeeded, 3);
    assert_eq!(result.failed, 0);
}

#[tokio::test]
async fn batch_counts_parked_items_as_succeeded() {
    let (engine, _store) = build_engine(ScriptedAdvisors::new().with_payer(invalid_payer()), config());
    let coordinator = BatchCoordinator::new(Arc::new(engine));
    let result = coordinator.run_batch(batch_items(2), 4).await;
    assert_eq!(result.succeeded, 2);
    assert!(result
        .results
        .iter()
        .all(|r| r.status == Some(WorkflowStatus::HumanReview)));
}
