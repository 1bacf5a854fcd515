//! Iteration ceilings and suspicious-pattern detection.
//!
//! [`IterationLimiter::can_start_iteration`] is the hard guard evaluated
//! before every `Idle -> CheckerRunning` transition. The suspicious-pattern
//! scan is advisory: findings are surfaced to the operator but never stop
//! the loop on their own.

use serde::{Deserialize, Serialize};

use crate::domain::models::{CostConfig, IterationState, LimitsConfig};

/// Why an iteration may not start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "denial", rename_all = "snake_case")]
pub enum StartDenial {
    IterationCapReached { current: u32, max: u32 },
    TerminalPhase { phase: String },
    CostCapReached { total_cost: f64, cap: f64 },
}

impl std::fmt::Display for StartDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StartDenial::IterationCapReached { current, max } => {
                write!(f, "iteration cap reached ({current}/{max})")
            }
            StartDenial::TerminalPhase { phase } => {
                write!(f, "run already terminal ({phase})")
            }
            StartDenial::CostCapReached { total_cost, cap } => {
                write!(f, "per-change cost cap reached (${total_cost:.2} of ${cap:.2})")
            }
        }
    }
}

/// Advisory loop-health finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum SuspiciousPattern {
    /// Same non-zero issue count for three or more trailing iterations.
    StagnantIssueCount { issue_count: u32, iterations: u32 },
    /// Two or more local peaks/valleys in the recent score sequence; fixes
    /// may be introducing regressions.
    Oscillation { extrema: u32 },
    /// Iterations completing faster than a real review/fix cycle plausibly
    /// can.
    AbnormalSpeed { avg_interval_secs: f64 },
}

impl std::fmt::Display for SuspiciousPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuspiciousPattern::StagnantIssueCount { issue_count, iterations } => write!(
                f,
                "same issue count ({issue_count}) for {iterations} consecutive iterations"
            ),
            SuspiciousPattern::Oscillation { extrema } => write!(
                f,
                "quality score oscillating ({extrema} local peaks/valleys in recent iterations)"
            ),
            SuspiciousPattern::AbnormalSpeed { avg_interval_secs } => write!(
                f,
                "abnormal automation speed (average {avg_interval_secs:.1}s between iterations)"
            ),
        }
    }
}

/// Iterations the stagnant-issue-count rule looks back over.
const STAGNANT_COUNT_WINDOW: usize = 3;
/// Iterations the oscillation rule looks back over.
const OSCILLATION_WINDOW: usize = 4;
/// Local extrema needed to flag oscillation.
const OSCILLATION_THRESHOLD: u32 = 2;
/// Iterations the speed rule averages over.
const SPEED_WINDOW: usize = 5;

/// Hard ceilings plus the advisory pattern scan.
///
/// The iteration cap is read from the state itself (it was fixed there at
/// creation time), so a config change mid-run cannot silently extend a
/// change's budget.
#[derive(Debug, Clone)]
pub struct IterationLimiter {
    change_cost_cap: f64,
    min_iteration_interval_secs: u64,
}

impl IterationLimiter {
    pub fn new(limits: &LimitsConfig, cost: &CostConfig) -> Self {
        Self {
            change_cost_cap: cost.change_cap,
            min_iteration_interval_secs: limits.min_iteration_interval_secs,
        }
    }

    /// Hard guard: `Err` exactly when the iteration cap is reached, the
    /// phase is terminal, or the per-change cost cap is reached.
    pub fn can_start_iteration(&self, state: &IterationState) -> Result<(), StartDenial> {
        if state.is_terminal() {
            return Err(StartDenial::TerminalPhase {
                phase: state.phase.name().to_string(),
            });
        }
        if state.current_iteration >= state.max_iterations {
            return Err(StartDenial::IterationCapReached {
                current: state.current_iteration,
                max: state.max_iterations,
            });
        }
        if state.total_cost >= self.change_cost_cap {
            return Err(StartDenial::CostCapReached {
                total_cost: state.total_cost,
                cap: self.change_cost_cap,
            });
        }
        Ok(())
    }

    /// Advisory scan over the iteration history. Never stops the loop.
    pub fn scan_for_suspicious_patterns(&self, state: &IterationState) -> Vec<SuspiciousPattern> {
        let mut findings = Vec::new();

        if let Some(pattern) = stagnant_issue_count(state) {
            findings.push(pattern);
        }
        if let Some(pattern) = oscillation(state) {
            findings.push(pattern);
        }
        if let Some(pattern) = self.abnormal_speed(state) {
            findings.push(pattern);
        }

        findings
    }

    fn abnormal_speed(&self, state: &IterationState) -> Option<SuspiciousPattern> {
        if state.history.len() < SPEED_WINDOW {
            return None;
        }
        let recent = &state.history[state.history.len() - SPEED_WINDOW..];
        let intervals: Vec<f64> = recent
            .windows(2)
            .map(|pair| {
                (pair[1].timestamp - pair[0].timestamp)
                    .num_milliseconds()
                    .max(0) as f64
                    / 1000.0
            })
            .collect();
        let avg = intervals.iter().sum::<f64>() / intervals.len() as f64;
        if avg < self.min_iteration_interval_secs as f64 {
            Some(SuspiciousPattern::AbnormalSpeed {
                avg_interval_secs: avg,
            })
        } else {
            None
        }
    }
}

/// Same non-zero issue count across the trailing window.
fn stagnant_issue_count(state: &IterationState) -> Option<SuspiciousPattern> {
    if state.history.len() < STAGNANT_COUNT_WINDOW {
        return None;
    }
    let counts = state.issue_count_history();
    let last = *counts.last()?;
    if last == 0 {
        return None;
    }
    let streak = counts.iter().rev().take_while(|c| **c == last).count();
    if streak >= STAGNANT_COUNT_WINDOW {
        Some(SuspiciousPattern::StagnantIssueCount {
            issue_count: last,
            iterations: streak as u32,
        })
    } else {
        None
    }
}

/// Two or more strict local extrema in the last few scores.
fn oscillation(state: &IterationState) -> Option<SuspiciousPattern> {
    let scores = state.score_history();
    if scores.len() < OSCILLATION_WINDOW {
        return None;
    }
    let recent = &scores[scores.len() - OSCILLATION_WINDOW..];
    let mut extrema = 0u32;
    for i in 1..recent.len() - 1 {
        let before = recent[i] - recent[i - 1];
        let after = recent[i + 1] - recent[i];
        if before * after < 0.0 {
            extrema += 1;
        }
    }
    if extrema >= OSCILLATION_THRESHOLD {
        Some(SuspiciousPattern::Oscillation { extrema })
    } else {
        None
    }
}
