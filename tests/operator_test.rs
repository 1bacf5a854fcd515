//! Tests for operator command execution against real filesystem state and
//! a recording source-control double.

use std::sync::Arc;

use kaizen::adapters::fs::FsStateRepository;
use kaizen::adapters::mock::ScriptedSourceControl;
use kaizen::application::Operator;
use kaizen::domain::models::{CiStatus, IterationState};
use kaizen::domain::ports::StateRepository;

fn state_repo(dir: &tempfile::TempDir) -> Arc<FsStateRepository> {
    Arc::new(FsStateRepository::new(dir.path().join("state")))
}

#[tokio::test]
async fn force_merge_bypasses_gates_and_leaves_an_audit_trail() {
    let dir = tempfile::tempdir().unwrap();
    // Red CI: force-merge must not care.
    let source_control = Arc::new(ScriptedSourceControl::new(CiStatus::Failure));
    let operator =
        Operator::new(state_repo(&dir)).with_source_control(Arc::clone(&source_control) as _);

    operator.force_merge("octo", "widgets", "42").await.unwrap();

    assert!(source_control.was_merged().await);
    let labels = source_control.labels.lock().await;
    assert!(labels.iter().any(|l| l == "kaizen:force-merged"));
    let comments = source_control.comments.lock().await;
    assert!(comments.iter().any(|c| c.contains("operator override")));
}

#[tokio::test]
async fn force_merge_without_a_source_control_client_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let operator = Operator::new(state_repo(&dir));

    assert!(operator.force_merge("octo", "widgets", "42").await.is_err());
}

#[tokio::test]
async fn retry_clears_persisted_state() {
    let dir = tempfile::tempdir().unwrap();
    let repo = state_repo(&dir);
    let state = IterationState::new("octo/widgets", "42", 5);
    repo.save(&state).await.unwrap();

    let operator = Operator::new(Arc::clone(&repo) as _);
    operator.retry("octo/widgets", "42").await.unwrap();

    assert!(repo.load("octo/widgets", "42").await.unwrap().is_none());
}

#[tokio::test]
async fn status_reports_persisted_state() {
    let dir = tempfile::tempdir().unwrap();
    let repo = state_repo(&dir);
    let state = IterationState::new("octo/widgets", "42", 5);
    repo.save(&state).await.unwrap();

    let operator = Operator::new(Arc::clone(&repo) as _);
    let loaded = operator
        .status("octo/widgets", "42")
        .await
        .unwrap()
        .expect("persisted state");
    assert_eq!(loaded.run_id, state.run_id);

    assert!(operator
        .status("octo/widgets", "99")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn stop_without_a_shutdown_handle_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    assert!(Operator::new(state_repo(&dir)).stop().is_err());
}

#[tokio::test]
async fn debug_dump_renders_the_raw_state() {
    let dir = tempfile::tempdir().unwrap();
    let repo = state_repo(&dir);
    let state = IterationState::new("octo/widgets", "42", 5);
    repo.save(&state).await.unwrap();

    let operator = Operator::new(Arc::clone(&repo) as _);
    let dump = operator.debug_dump("octo/widgets", "42").await.unwrap();

    assert!(dump.contains("octo/widgets"));
    assert!(dump.contains(&state.run_id.to_string()));
}

#[tokio::test]
async fn debug_dump_errors_when_nothing_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let operator = Operator::new(state_repo(&dir));

    assert!(operator.debug_dump("octo/widgets", "42").await.is_err());
}
