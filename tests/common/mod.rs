//! Common test utilities for integration tests
//!
//! Provides shared fixtures and wiring helpers used across multiple
//! integration test files.

use std::sync::Arc;

use tempfile::TempDir;

use kaizen::adapters::fs::{FsCostStore, FsStateRepository};
use kaizen::adapters::mock::{RecordingNotifier, ScriptedSourceControl};
use kaizen::application::LoopDeps;
use kaizen::domain::models::{CiStatus, Config};
use kaizen::domain::ports::{CheckerAgent, MakerAgent};

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Default test config with filesystem stores rooted in `dir`.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.state_dir = dir.path().join("state").display().to_string();
    config.storage.cost_dir = dir.path().join("costs").display().to_string();
    // Keep collaborator timeouts short; the doubles respond instantly.
    config.limits.collaborator_timeout_secs = 5;
    config
}

/// Wire scripted collaborators plus real filesystem stores into LoopDeps.
///
/// Returns the shared source-control and notifier doubles so tests can
/// assert on recorded side effects.
pub fn test_deps(
    dir: &TempDir,
    checker: Arc<dyn CheckerAgent>,
    maker: Arc<dyn MakerAgent>,
    source_control: ScriptedSourceControl,
) -> (LoopDeps, Arc<ScriptedSourceControl>, Arc<RecordingNotifier>) {
    let source_control = Arc::new(source_control);
    let notifier = Arc::new(RecordingNotifier::new());
    let deps = LoopDeps {
        checker,
        maker,
        source_control: Arc::clone(&source_control) as _,
        state_repo: Arc::new(FsStateRepository::new(dir.path().join("state"))),
        cost_store: Arc::new(FsCostStore::new(dir.path().join("costs"))),
        notifier: Some(Arc::clone(&notifier) as _),
    };
    (deps, source_control, notifier)
}

/// Source-control double with CI always green.
pub fn green_ci() -> ScriptedSourceControl {
    ScriptedSourceControl::new(CiStatus::Success)
}
