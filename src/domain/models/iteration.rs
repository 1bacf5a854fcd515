//! Iteration state machine model.
//!
//! One [`IterationState`] exists per (repository, change-id). It is owned
//! exclusively by the loop driver, mutated only through the explicit
//! transition methods here, and frozen permanently once it reaches a
//! terminal phase. Each variant of [`IterationPhase`] carries only the
//! fields valid in that phase, so invalid state/field combinations are
//! unrepresentable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Why a run stopped without converging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionReason {
    /// Iteration cap reached with the score still below threshold.
    MaxIterations,
    /// Per-change cost cap reached.
    CostCapReached,
    /// Billing-period cost cap reached.
    PeriodCapReached,
    /// Stagnant for three or more consecutive iterations below threshold.
    Stagnation,
    /// Operator requested a cooperative stop.
    Stopped,
}

impl std::fmt::Display for ExhaustionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ExhaustionReason::MaxIterations => "max iterations reached without meeting threshold",
            ExhaustionReason::CostCapReached => "per-change cost cap reached",
            ExhaustionReason::PeriodCapReached => "billing-period cost cap reached",
            ExhaustionReason::Stagnation => "quality stagnant across consecutive iterations",
            ExhaustionReason::Stopped => "stopped by operator",
        };
        write!(f, "{text}")
    }
}

/// State-machine phase for one change's convergence loop.
///
/// ```text
/// Idle -> CheckerRunning -> {Converged | FixerRunning | Failed}
/// FixerRunning -> {CheckerRunning | Failed}
/// any non-terminal -> Exhausted
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum IterationPhase {
    Idle,
    CheckerRunning,
    FixerRunning,
    Converged { final_score: f64 },
    Exhausted { reason: ExhaustionReason },
    Failed { error: String },
}

impl IterationPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IterationPhase::Converged { .. }
                | IterationPhase::Exhausted { .. }
                | IterationPhase::Failed { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            IterationPhase::Idle => "idle",
            IterationPhase::CheckerRunning => "checker_running",
            IterationPhase::FixerRunning => "fixer_running",
            IterationPhase::Converged { .. } => "converged",
            IterationPhase::Exhausted { .. } => "exhausted",
            IterationPhase::Failed { .. } => "failed",
        }
    }

    /// Whether `next` is a legal successor of `self`.
    fn allows(&self, next: &IterationPhase) -> bool {
        use IterationPhase::{CheckerRunning, Converged, Exhausted, Failed, FixerRunning, Idle};
        match (self, next) {
            (Idle, CheckerRunning) => true,
            (CheckerRunning, Converged { .. } | FixerRunning | Failed { .. }) => true,
            (FixerRunning, CheckerRunning | Failed { .. }) => true,
            // Any non-terminal phase may exhaust when a limiter fires.
            (Idle | CheckerRunning | FixerRunning, Exhausted { .. }) => true,
            _ => false,
        }
    }
}

/// Trailing-window convergence classification, recomputed each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvergenceStatus {
    Improving,
    Stagnant,
    Regressing,
}

impl ConvergenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConvergenceStatus::Improving => "improving",
            ConvergenceStatus::Stagnant => "stagnant",
            ConvergenceStatus::Regressing => "regressing",
        }
    }
}

/// Immutable snapshot of one completed checker(-then-maker) cycle.
///
/// Append-only: once pushed onto the history it is never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration index.
    pub iteration: u32,
    pub checker_summary: String,
    /// Absent when the cycle terminated before the Maker ran (convergence,
    /// checker failure, or exhaustion).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maker_summary: Option<String>,
    pub issues_found: u32,
    pub issues_fixed: u32,
    pub quality_score: f64,
    /// Score change relative to the previous iteration; zero for the first.
    pub quality_delta: f64,
    /// Combined Checker + Maker cost for this cycle, USD.
    pub cost: f64,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Persisted per-change loop state. One record per (repository, change-id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationState {
    /// Unique id for this run, regenerated on `retry`.
    pub run_id: Uuid,
    pub repository: String,
    pub change_id: String,
    /// Number of completed iterations. Equals `history.len()` at every
    /// observable point.
    pub current_iteration: u32,
    pub max_iterations: u32,
    /// Ordered, append-only record of completed iterations.
    pub history: Vec<IterationRecord>,
    pub phase: IterationPhase,
    /// Overall quality score from the most recent completed iteration.
    pub latest_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub convergence_status: Option<ConvergenceStatus>,
    /// Cumulative cost; always equals the sum of `history[i].cost`.
    pub total_cost: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IterationState {
    pub fn new(
        repository: impl Into<String>,
        change_id: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            repository: repository.into(),
            change_id: change_id.into(),
            current_iteration: 0,
            max_iterations,
            history: Vec::new(),
            phase: IterationPhase::Idle,
            latest_score: 0.0,
            convergence_status: None,
            total_cost: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Guard shared by every mutator: terminal states are frozen.
    fn ensure_mutable(&self) -> DomainResult<()> {
        if self.is_terminal() {
            return Err(DomainError::StateFrozen {
                repository: self.repository.clone(),
                change_id: self.change_id.clone(),
                phase: self.phase.name().to_string(),
            });
        }
        Ok(())
    }

    /// Move to `next`, validating the transition against the phase graph.
    pub fn transition(&mut self, next: IterationPhase) -> DomainResult<()> {
        self.ensure_mutable()?;
        if !self.phase.allows(&next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.phase.name().to_string(),
                to: next.name().to_string(),
                reason: "not a legal successor".to_string(),
            });
        }
        self.phase = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append one completed iteration and fold its outcome into the
    /// aggregate fields. Rejects out-of-order indices and iteration-cap
    /// overruns, preserving `history.len() == current_iteration` and
    /// `total_cost == sum of history costs`.
    pub fn record_iteration(&mut self, record: IterationRecord) -> DomainResult<()> {
        self.ensure_mutable()?;
        let expected = self.current_iteration + 1;
        if record.iteration != expected {
            return Err(DomainError::ValidationFailed(format!(
                "iteration record out of order: got {} expected {expected}",
                record.iteration
            )));
        }
        if expected > self.max_iterations {
            return Err(DomainError::ValidationFailed(format!(
                "iteration {expected} exceeds max_iterations {}",
                self.max_iterations
            )));
        }
        self.latest_score = record.quality_score;
        self.total_cost += record.cost;
        self.current_iteration = expected;
        self.history.push(record);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the detector's latest classification.
    pub fn set_convergence_status(&mut self, status: ConvergenceStatus) -> DomainResult<()> {
        self.ensure_mutable()?;
        self.convergence_status = Some(status);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Quality delta for the next record, relative to the latest completed
    /// iteration (zero when the history is empty).
    pub fn delta_from_latest(&self, score: f64) -> f64 {
        if self.history.is_empty() {
            0.0
        } else {
            score - self.latest_score
        }
    }

    /// Trailing quality scores, oldest first.
    pub fn score_history(&self) -> Vec<f64> {
        self.history.iter().map(|r| r.quality_score).collect()
    }

    /// Trailing issue counts, oldest first.
    pub fn issue_count_history(&self) -> Vec<u32> {
        self.history.iter().map(|r| r.issues_found).collect()
    }

    /// Storage key for this state: unique per (repository, change-id).
    pub fn key(&self) -> String {
        format!("{}__{}", self.repository, self.change_id)
    }
}
