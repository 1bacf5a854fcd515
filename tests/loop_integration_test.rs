//! End-to-end tests for the convergence loop driver.
//!
//! Each test wires scripted collaborator doubles plus real filesystem
//! stores into the driver and runs one change to a terminal phase,
//! asserting on the persisted state, the merge decision, and the side
//! effects recorded by the doubles.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use kaizen::adapters::fs::FsCostStore;
use kaizen::adapters::mock::{
    scripted_review, FailingChecker, ScriptedChecker, ScriptedMaker, ScriptedSourceControl,
};
use kaizen::application::{LoopDriver, Operator};
use kaizen::domain::errors::DomainResult;
use kaizen::domain::models::{
    ApprovalTrigger, ChangeContext, CiStatus, CostEvent, ExhaustionReason, FixResult, Issue,
    IssueCategory, IssueSeverity, IterationPhase, ReviewResult, SecuritySeverity,
};
use kaizen::domain::ports::{CheckerAgent, CostStore, MakerAgent, NotifierEvent, StateRepository};

use common::{green_ci, temp_dir, test_config, test_deps};

fn warning(message: &str) -> Issue {
    Issue::new(
        IssueCategory::CodeQuality,
        IssueSeverity::Warning,
        "src/lib.rs:10",
        message,
    )
}

/// Maker double that counts invocations.
struct CountingMaker {
    calls: Mutex<u32>,
    inner: ScriptedMaker,
}

impl CountingMaker {
    fn new() -> Self {
        Self {
            calls: Mutex::new(0),
            inner: ScriptedMaker::new(),
        }
    }
}

#[async_trait]
impl MakerAgent for CountingMaker {
    async fn fix(
        &self,
        context: &ChangeContext,
        issues: &[Issue],
        attempt: u32,
    ) -> DomainResult<FixResult> {
        *self.calls.lock().await += 1;
        self.inner.fix(context, issues, attempt).await
    }
}

#[tokio::test]
async fn clean_first_review_converges_and_auto_merges() {
    let dir = temp_dir();
    let mut config = test_config(&dir);
    config.thresholds.auto_merge_enabled = true;

    let checker = Arc::new(ScriptedChecker::new(vec![scripted_review(0.90, vec![])]));
    let (deps, source_control, notifier) =
        test_deps(&dir, checker, Arc::new(ScriptedMaker::new()), green_ci());

    let outcome = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();

    assert_eq!(
        outcome.state.phase,
        IterationPhase::Converged { final_score: 0.90 }
    );
    assert_eq!(outcome.state.current_iteration, 1);

    let decision = outcome.decision.expect("decision after convergence");
    assert!(decision.should_merge);
    assert!(decision.auto_merge_eligible);
    assert!(!decision.requires_human_approval);
    assert!(source_control.was_merged().await);

    let events = notifier.events.lock().await;
    assert!(events
        .iter()
        .any(|e| matches!(e, NotifierEvent::Converged { .. })));
}

#[tokio::test]
async fn flat_scores_exhaust_with_stagnation() {
    let dir = temp_dir();
    let mut config = test_config(&dir);
    config.limits.max_iterations = 6;

    // Six identical warnings hold the penalty score at 0.65 every round.
    let stuck = || scripted_review(0.95, (0..6).map(|i| warning(&format!("w{i}"))).collect());
    let checker = Arc::new(ScriptedChecker::new(vec![
        stuck(),
        stuck(),
        stuck(),
        stuck(),
        stuck(),
        stuck(),
    ]));
    let (deps, _, _) = test_deps(&dir, checker, Arc::new(ScriptedMaker::new()), green_ci());

    let outcome = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();

    assert_eq!(
        outcome.state.phase,
        IterationPhase::Exhausted {
            reason: ExhaustionReason::Stagnation
        }
    );
    // Stopped by the stagnation rule before the iteration cap.
    assert!(outcome.state.current_iteration < 6);

    let decision = outcome.decision.expect("decision after exhaustion");
    assert!(!decision.should_merge);
}

#[tokio::test]
async fn critical_security_issue_blocks_merge_despite_high_score() {
    let dir = temp_dir();
    let mut config = test_config(&dir);
    config.limits.max_iterations = 1;

    let mut issue = Issue::new(
        IssueCategory::Security,
        IssueSeverity::Warning,
        "src/auth.rs:42",
        "SQL injection in query builder",
    );
    issue.security_severity = Some(SecuritySeverity::Critical);
    let checker = Arc::new(ScriptedChecker::new(vec![scripted_review(
        0.95,
        vec![issue],
    )]));
    let (deps, source_control, _) =
        test_deps(&dir, checker, Arc::new(ScriptedMaker::new()), green_ci());

    let outcome = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();

    assert!(matches!(
        outcome.state.phase,
        IterationPhase::Exhausted { .. }
    ));
    let decision = outcome.decision.expect("decision");
    assert!(!decision.should_merge);
    assert!(!decision.blocking_issues.is_empty());
    assert!(decision
        .approval_triggers
        .contains(&ApprovalTrigger::SecurityIssuesPresent));
    assert!(!source_control.was_merged().await);
}

#[tokio::test]
async fn cost_cap_exhausts_mid_loop() {
    let dir = temp_dir();
    let mut config = test_config(&dir);
    // One iteration (0.05 checker + 0.08 maker) blows the cap.
    config.cost.change_cap = 0.10;
    config.limits.max_iterations = 5;

    let low = || scripted_review(0.80, vec![warning("needs work")]);
    let checker = Arc::new(ScriptedChecker::new(vec![low(), low(), low()]));
    let (deps, _, notifier) = test_deps(&dir, checker, Arc::new(ScriptedMaker::new()), green_ci());

    let outcome = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();

    assert_eq!(
        outcome.state.phase,
        IterationPhase::Exhausted {
            reason: ExhaustionReason::CostCapReached
        }
    );
    let decision = outcome.decision.expect("decision");
    assert!(decision.requires_human_approval);
    assert!(decision
        .approval_triggers
        .contains(&ApprovalTrigger::CostCapReached));

    let events = notifier.events.lock().await;
    assert!(events.iter().any(|e| matches!(
        e,
        NotifierEvent::Exhausted {
            reason: ExhaustionReason::CostCapReached,
            ..
        }
    )));
}

#[tokio::test]
async fn checker_call_failure_fails_fast_without_invoking_maker() {
    let dir = temp_dir();
    let config = test_config(&dir);

    let maker = Arc::new(CountingMaker::new());
    let (deps, source_control, notifier) = test_deps(
        &dir,
        Arc::new(FailingChecker),
        Arc::clone(&maker) as _,
        green_ci(),
    );

    let outcome = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();

    assert!(matches!(outcome.state.phase, IterationPhase::Failed { .. }));
    assert_eq!(*maker.calls.lock().await, 0);
    assert!(outcome.decision.is_none());

    // Remediation hint is surfaced on the change.
    let comments = source_control.comments.lock().await;
    assert!(comments.iter().any(|c| c.contains("retry")));

    let events = notifier.events.lock().await;
    assert!(events
        .iter()
        .any(|e| matches!(e, NotifierEvent::Failed { .. })));
}

#[tokio::test]
async fn iteration_cap_exhausts_below_threshold() {
    let dir = temp_dir();
    let mut config = test_config(&dir);
    config.limits.max_iterations = 2;

    // 0.80 agent score with two warnings lands at 0.70, below 0.85.
    let low = || scripted_review(0.80, vec![warning("a"), warning("b")]);
    let checker = Arc::new(ScriptedChecker::new(vec![low(), low()]));
    let (deps, _, _) = test_deps(&dir, checker, Arc::new(ScriptedMaker::new()), green_ci());

    let outcome = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();

    assert_eq!(
        outcome.state.phase,
        IterationPhase::Exhausted {
            reason: ExhaustionReason::MaxIterations
        }
    );
    assert_eq!(outcome.state.current_iteration, 2);
    assert!((outcome.state.latest_score - 0.70).abs() < 1e-9);

    let decision = outcome.decision.expect("decision");
    assert!(decision.requires_human_approval);
    assert!(decision
        .approval_triggers
        .contains(&ApprovalTrigger::IterationCapReached));
    assert_eq!(
        ExhaustionReason::MaxIterations.to_string(),
        "max iterations reached without meeting threshold"
    );
}

#[tokio::test]
async fn improving_script_converges_and_persists_state() {
    let dir = temp_dir();
    let config = test_config(&dir);
    let state_dir = config.storage.state_dir.clone();

    let (deps, _, _) = test_deps(
        &dir,
        Arc::new(ScriptedChecker::improving()),
        Arc::new(ScriptedMaker::new()),
        green_ci(),
    );
    let state_repo = Arc::clone(&deps.state_repo);

    let outcome = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();

    assert!(matches!(
        outcome.state.phase,
        IterationPhase::Converged { .. }
    ));
    assert_eq!(outcome.state.current_iteration, 3);
    assert_eq!(outcome.state.history.len(), 3);

    // Terminal state survives on disk.
    let persisted = state_repo
        .load("octo/widgets", "42")
        .await
        .unwrap()
        .expect("state persisted");
    assert!(persisted.is_terminal());
    assert_eq!(persisted.run_id, outcome.state.run_id);
    assert!(std::path::Path::new(&state_dir).exists());
}

#[tokio::test]
async fn terminal_state_is_not_rerun() {
    let dir = temp_dir();
    let config = test_config(&dir);

    let (deps, _, _) = test_deps(
        &dir,
        Arc::new(ScriptedChecker::improving()),
        Arc::new(ScriptedMaker::new()),
        green_ci(),
    );

    let driver = LoopDriver::new(deps.clone(), config.clone());
    let first = driver.run("octo", "widgets", "42").await.unwrap();
    assert!(first.state.is_terminal());

    // Second run sees the terminal record and refuses to iterate.
    let second = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();
    assert_eq!(second.state.run_id, first.state.run_id);
    assert_eq!(
        second.state.current_iteration,
        first.state.current_iteration
    );
    assert!(second.decision.is_none());
}

/// Checker double that files an operator stop request after its first
/// review, from inside the running loop.
struct StoppingChecker {
    operator: OnceLock<Operator>,
    inner: ScriptedChecker,
    stop_sent: AtomicBool,
}

impl StoppingChecker {
    fn new() -> Self {
        Self {
            operator: OnceLock::new(),
            inner: ScriptedChecker::improving(),
            stop_sent: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl CheckerAgent for StoppingChecker {
    async fn review(&self, context: &ChangeContext) -> DomainResult<ReviewResult> {
        let review = self.inner.review(context).await?;
        if !self.stop_sent.swap(true, Ordering::SeqCst) {
            let operator = self.operator.get().expect("operator wired before run");
            operator.stop().expect("stop with a live shutdown handle");
        }
        Ok(review)
    }
}

#[tokio::test]
async fn operator_stop_exhausts_at_the_next_iteration_boundary() {
    let dir = temp_dir();
    let config = test_config(&dir);

    let checker = Arc::new(StoppingChecker::new());
    let (deps, _, notifier) = test_deps(
        &dir,
        Arc::clone(&checker) as _,
        Arc::new(ScriptedMaker::new()),
        green_ci(),
    );
    let state_repo = Arc::clone(&deps.state_repo);

    let driver = LoopDriver::new(deps, config);
    let operator = Operator::new(state_repo).with_shutdown(driver.shutdown_handle());
    assert!(checker.operator.set(operator).is_ok());

    let outcome = driver.run("octo", "widgets", "42").await.unwrap();

    // The improving script would converge at round three; the stop filed
    // after round one wins at the next boundary instead.
    assert_eq!(
        outcome.state.phase,
        IterationPhase::Exhausted {
            reason: ExhaustionReason::Stopped
        }
    );
    assert_eq!(outcome.state.current_iteration, 1);

    let events = notifier.events.lock().await;
    assert!(events.iter().any(|e| matches!(
        e,
        NotifierEvent::Exhausted {
            reason: ExhaustionReason::Stopped,
            ..
        }
    )));
}

#[tokio::test]
async fn spend_from_earlier_runs_counts_against_the_change_cap() {
    let dir = temp_dir();
    let config = test_config(&dir);

    // A previous run of the same change already burned past the cap.
    let seed = FsCostStore::new(dir.path().join("costs"));
    seed.append(&CostEvent {
        event_id: Uuid::new_v4(),
        repository: "octo/widgets".to_string(),
        change_id: "42".to_string(),
        iteration: 1,
        checker_cost: 3.0,
        maker_cost: 2.5,
        recorded_at: Utc::now(),
    })
    .await
    .unwrap();

    let (deps, _, notifier) = test_deps(
        &dir,
        Arc::new(ScriptedChecker::improving()),
        Arc::new(ScriptedMaker::new()),
        green_ci(),
    );

    let outcome = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();

    assert_eq!(
        outcome.state.phase,
        IterationPhase::Exhausted {
            reason: ExhaustionReason::CostCapReached
        }
    );
    // Exhausted before any collaborator was invoked.
    assert_eq!(outcome.state.current_iteration, 0);
    assert!(outcome.decision.is_none());

    let events = notifier.events.lock().await;
    assert!(events.iter().any(|e| matches!(
        e,
        NotifierEvent::Exhausted {
            reason: ExhaustionReason::CostCapReached,
            ..
        }
    )));
}

#[tokio::test]
async fn ci_failure_prevents_convergence() {
    let dir = temp_dir();
    let mut config = test_config(&dir);
    config.limits.max_iterations = 1;

    let checker = Arc::new(ScriptedChecker::new(vec![scripted_review(0.95, vec![])]));
    let (deps, _, _) = test_deps(
        &dir,
        checker,
        Arc::new(ScriptedMaker::new()),
        ScriptedSourceControl::new(CiStatus::Failure),
    );

    let outcome = LoopDriver::new(deps, config)
        .run("octo", "widgets", "42")
        .await
        .unwrap();

    // A perfect score cannot converge over red CI.
    assert!(!matches!(
        outcome.state.phase,
        IterationPhase::Converged { .. }
    ));
    let decision = outcome.decision.expect("decision");
    assert!(!decision.should_merge);
    assert!(decision
        .approval_triggers
        .contains(&ApprovalTrigger::CiNotSuccessful));
}
