//! Scripted collaborator doubles.
//!
//! Used by `--dry-run` and by the integration tests: each double replays a
//! prepared script of results instead of talking to a real agent or source
//! control system, so a whole loop run is reproducible offline. When a
//! script runs dry the double keeps returning its last entry.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentStatus, ChangeContext, CiStatus, FixResult, Issue, IssueCategory, ReviewResult,
};
use crate::domain::ports::{CheckerAgent, MakerAgent, Notifier, NotifierEvent, SourceControl};
use crate::services::ResponseParser;

/// Checker double replaying a prepared list of reviews.
pub struct ScriptedChecker {
    script: Mutex<VecDeque<ReviewResult>>,
    last: Mutex<Option<ReviewResult>>,
}

impl ScriptedChecker {
    pub fn new(script: Vec<ReviewResult>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
        }
    }

    /// Canned three-round improving run used by `--dry-run`: two review
    /// rounds with shrinking issue lists, then a clean pass. The rounds
    /// are stored as checker transcripts and go through the same parser
    /// as real responses, so the dry run exercises that boundary too.
    pub fn improving() -> Self {
        let transcripts = [
            "Overall score: 0.72\n\n## Issues\n\
             - [error][code-quality] src/lib.rs:10 missing error propagation\n\
             - [warning][code-quality] src/lib.rs:10 duplicated branch\n",
            "Overall score: 0.84\n\n## Issues\n\
             - [warning][code-quality] src/lib.rs:10 duplicated branch\n",
            "Overall score: 0.95\n\nNo issues found.\n",
        ];
        let parser = ResponseParser::new();
        Self::new(
            transcripts
                .iter()
                .map(|text| parser.parse(text, 0.05))
                .collect(),
        )
    }
}

fn review(score: f64, issues: Vec<Issue>) -> ReviewResult {
    let security_issues = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Security)
        .cloned()
        .collect();
    let performance_issues = issues
        .iter()
        .filter(|i| i.category == IssueCategory::Performance)
        .cloned()
        .collect();
    ReviewResult {
        status: AgentStatus::Success,
        issues,
        overall_score: score,
        security_issues,
        performance_issues,
        cost: 0.05,
        low_confidence: false,
    }
}

#[async_trait]
impl CheckerAgent for ScriptedChecker {
    async fn review(&self, _context: &ChangeContext) -> DomainResult<ReviewResult> {
        let mut script = self.script.lock().await;
        let mut last = self.last.lock().await;
        if let Some(next) = script.pop_front() {
            *last = Some(next.clone());
            return Ok(next);
        }
        last.clone().ok_or_else(|| DomainError::Collaborator {
            agent: "checker".to_string(),
            iteration: 0,
            message: "scripted checker has no results".to_string(),
        })
    }
}

/// Maker double that claims to fix everything it is handed.
pub struct ScriptedMaker {
    failures: Mutex<VecDeque<bool>>,
}

impl ScriptedMaker {
    pub fn new() -> Self {
        Self {
            failures: Mutex::new(VecDeque::new()),
        }
    }

    /// Per-call failure script: `true` entries report an error status.
    pub fn with_failures(failures: Vec<bool>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
        }
    }
}

impl Default for ScriptedMaker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MakerAgent for ScriptedMaker {
    async fn fix(
        &self,
        _context: &ChangeContext,
        issues: &[Issue],
        _attempt: u32,
    ) -> DomainResult<FixResult> {
        let fail = self.failures.lock().await.pop_front().unwrap_or(false);
        if fail {
            return Ok(FixResult {
                status: AgentStatus::Error,
                files_modified: Vec::new(),
                issues_addressed: 0,
                cost: 0.02,
            });
        }
        Ok(FixResult {
            status: AgentStatus::Success,
            files_modified: vec!["src/lib.rs".to_string()],
            issues_addressed: u32::try_from(issues.len()).unwrap_or(u32::MAX),
            cost: 0.08,
        })
    }
}

/// Source control double recording every side effect for later assertions.
pub struct ScriptedSourceControl {
    ci: Mutex<VecDeque<CiStatus>>,
    default_ci: CiStatus,
    pub comments: Mutex<Vec<String>>,
    pub labels: Mutex<Vec<String>>,
    pub merged: Mutex<bool>,
}

impl ScriptedSourceControl {
    pub fn new(default_ci: CiStatus) -> Self {
        Self {
            ci: Mutex::new(VecDeque::new()),
            default_ci,
            comments: Mutex::new(Vec::new()),
            labels: Mutex::new(Vec::new()),
            merged: Mutex::new(false),
        }
    }

    /// Per-call CI script; falls back to the default when exhausted.
    pub fn with_ci_script(default_ci: CiStatus, script: Vec<CiStatus>) -> Self {
        Self {
            ci: Mutex::new(script.into()),
            default_ci,
            comments: Mutex::new(Vec::new()),
            labels: Mutex::new(Vec::new()),
            merged: Mutex::new(false),
        }
    }

    pub async fn was_merged(&self) -> bool {
        *self.merged.lock().await
    }
}

#[async_trait]
impl SourceControl for ScriptedSourceControl {
    async fn get_context(
        &self,
        owner: &str,
        repository: &str,
        change_id: &str,
    ) -> DomainResult<ChangeContext> {
        Ok(ChangeContext {
            owner: owner.to_string(),
            repository: repository.to_string(),
            change_id: change_id.to_string(),
            title: format!("Change {change_id}"),
            head_ref: format!("refs/changes/{change_id}"),
            fetched_at: Utc::now(),
        })
    }

    async fn get_ci_status(&self, _head_ref: &str) -> DomainResult<CiStatus> {
        Ok(self
            .ci
            .lock()
            .await
            .pop_front()
            .unwrap_or(self.default_ci))
    }

    async fn merge(&self, _context: &ChangeContext) -> DomainResult<()> {
        *self.merged.lock().await = true;
        Ok(())
    }

    async fn comment(&self, _context: &ChangeContext, text: &str) -> DomainResult<()> {
        self.comments.lock().await.push(text.to_string());
        Ok(())
    }

    async fn label(&self, _context: &ChangeContext, name: &str) -> DomainResult<()> {
        self.labels.lock().await.push(name.to_string());
        Ok(())
    }
}

/// Notifier double that just collects events.
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotifierEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, event: NotifierEvent) -> DomainResult<()> {
        self.events.lock().await.push(event);
        Ok(())
    }
}

/// Checker double whose call itself fails, for exercising the fail-fast
/// path.
pub struct FailingChecker;

#[async_trait]
impl CheckerAgent for FailingChecker {
    async fn review(&self, _context: &ChangeContext) -> DomainResult<ReviewResult> {
        Err(DomainError::Collaborator {
            agent: "checker".to_string(),
            iteration: 1,
            message: "connection refused".to_string(),
        })
    }
}

/// Convenience constructor for scripted review results in tests.
pub fn scripted_review(score: f64, issues: Vec<Issue>) -> ReviewResult {
    review(score, issues)
}

/// Shareable handles for a full dry-run wiring.
pub fn dry_run_collaborators() -> (
    Arc<ScriptedChecker>,
    Arc<ScriptedMaker>,
    Arc<ScriptedSourceControl>,
) {
    (
        Arc::new(ScriptedChecker::improving()),
        Arc::new(ScriptedMaker::new()),
        Arc::new(ScriptedSourceControl::new(CiStatus::Success)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::IssueSeverity;

    #[tokio::test]
    async fn improving_script_round_trips_through_the_response_parser() {
        let checker = ScriptedChecker::improving();
        let context = ScriptedSourceControl::new(CiStatus::Success)
            .get_context("octo", "widgets", "42")
            .await
            .unwrap();

        let first = checker.review(&context).await.unwrap();
        assert!(!first.low_confidence);
        assert!((first.overall_score - 0.72).abs() < 1e-9);
        assert_eq!(first.issues.len(), 2);
        assert_eq!(first.issues[0].severity, IssueSeverity::Error);
        assert_eq!(first.issues[0].category, IssueCategory::CodeQuality);
        assert_eq!(first.issues[0].location, "src/lib.rs:10");
        assert_eq!(first.issues[0].message, "missing error propagation");

        let second = checker.review(&context).await.unwrap();
        assert_eq!(second.issues.len(), 1);
        assert!((second.overall_score - 0.84).abs() < 1e-9);

        let third = checker.review(&context).await.unwrap();
        assert!(!third.low_confidence);
        assert!(third.issues.is_empty());
        assert!((third.overall_score - 0.95).abs() < 1e-9);
    }
}
