//! Merge decision model.

use serde::{Deserialize, Serialize};

use super::issue::Issue;

/// Why human approval is required, one entry per fired rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalTrigger {
    ScoreBelowReviewFloor,
    SecurityIssuesPresent,
    IterationCapReached,
    CostCapReached,
    CiNotSuccessful,
}

impl std::fmt::Display for ApprovalTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ApprovalTrigger::ScoreBelowReviewFloor => "score below human-review floor",
            ApprovalTrigger::SecurityIssuesPresent => "security issues present",
            ApprovalTrigger::IterationCapReached => "iteration cap reached",
            ApprovalTrigger::CostCapReached => "cost cap reached",
            ApprovalTrigger::CiNotSuccessful => "CI not successful",
        };
        write!(f, "{text}")
    }
}

/// Structured verdict from the quality gates.
///
/// Ephemeral: computed on demand from the current state and the latest
/// review, never persisted as part of
/// [`IterationState`](super::iteration::IterationState).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeDecision {
    /// All blocking gates passed.
    pub should_merge: bool,
    /// Stricter sub-case: eligible for merge without human sign-off.
    pub auto_merge_eligible: bool,
    pub requires_human_approval: bool,
    /// Rules that fired to require approval.
    pub approval_triggers: Vec<ApprovalTrigger>,
    /// Issues that failed a blocking gate, surfaced even when the overall
    /// score is high.
    pub blocking_issues: Vec<Issue>,
    /// Advisory findings that do not block merge.
    pub warnings: Vec<String>,
    pub reason: String,
    /// Snapshot of the inputs the verdict was derived from.
    pub quality_score: f64,
    pub iteration: u32,
    pub total_cost: f64,
}
