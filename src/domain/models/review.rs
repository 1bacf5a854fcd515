//! Collaborator result shapes.
//!
//! These mirror the contracts of the Checker and Maker agents and the source
//! control system. The decision engine treats them as opaque structured data:
//! it never inspects agent reasoning, only these fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::issue::Issue;

/// Outcome status of a collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Success,
    Error,
}

/// Result of one Checker review pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub status: AgentStatus,
    /// All findings, including the security and performance issues that also
    /// appear in the dedicated lists below.
    pub issues: Vec<Issue>,
    /// The Checker's own overall quality estimate in `[0.0, 1.0]`.
    pub overall_score: f64,
    /// Security findings, pre-filtered by the Checker.
    pub security_issues: Vec<Issue>,
    /// Performance findings, pre-filtered by the Checker.
    pub performance_issues: Vec<Issue>,
    /// Cost of this review call in USD.
    pub cost: f64,
    /// Set when the structured result was recovered from malformed agent
    /// output. Low-confidence results still drive decisions, but the
    /// convergence detector treats them as unreliable data.
    #[serde(default)]
    pub low_confidence: bool,
}

impl ReviewResult {
    /// An error result carrying only the failure cost.
    pub fn error(cost: f64) -> Self {
        Self {
            status: AgentStatus::Error,
            issues: Vec::new(),
            overall_score: 0.0,
            security_issues: Vec::new(),
            performance_issues: Vec::new(),
            cost,
            low_confidence: false,
        }
    }

    /// Issues that fail a blocking gate regardless of the overall score.
    pub fn blocking_issues(&self) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.is_blocking()).collect()
    }
}

/// Result of one Maker fix pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResult {
    pub status: AgentStatus,
    pub files_modified: Vec<String>,
    /// Number of reported issues the Maker claims to have addressed.
    pub issues_addressed: u32,
    /// Cost of this fix call in USD.
    pub cost: f64,
}

/// CI state of the change's head revision, as reported by source control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiStatus {
    Success,
    Pending,
    Failure,
    Error,
}

impl CiStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CiStatus::Success => "success",
            CiStatus::Pending => "pending",
            CiStatus::Failure => "failure",
            CiStatus::Error => "error",
        }
    }
}

/// Everything the loop needs to know about the change under review.
///
/// Fetched once from source control at startup and threaded through the loop
/// as read-only context (no process-wide singletons).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeContext {
    pub owner: String,
    pub repository: String,
    pub change_id: String,
    pub title: String,
    /// Head revision used for CI status lookups.
    pub head_ref: String,
    pub fetched_at: DateTime<Utc>,
}
