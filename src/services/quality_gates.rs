//! Quality gates and merge decision.
//!
//! Four independent blocking gates must all pass for `should_merge`; failing
//! any one of them surfaces its reason in the decision. Auto-merge is a
//! strictly harder sub-case evaluated only after the blocking gates pass,
//! and the human-approval rules run regardless of either outcome. Blocking
//! findings are always surfaced, even when the overall score is high.

use crate::domain::models::{
    AdvisoryConfig, ApprovalConfig, ApprovalTrigger, CiStatus, CostConfig, IterationState,
    IssueSeverity, MergeDecision, QualityMetrics, ReviewResult, ThresholdsConfig,
};

/// Gate evaluator; construct once from config and reuse per decision.
#[derive(Debug, Clone)]
pub struct QualityGates {
    thresholds: ThresholdsConfig,
    approval: ApprovalConfig,
    advisory: AdvisoryConfig,
    change_cost_cap: f64,
}

impl QualityGates {
    pub fn new(
        thresholds: ThresholdsConfig,
        approval: ApprovalConfig,
        advisory: AdvisoryConfig,
        cost: &CostConfig,
    ) -> Self {
        Self {
            thresholds,
            approval,
            advisory,
            change_cost_cap: cost.change_cap,
        }
    }

    /// The quality threshold the loop converges against.
    pub fn quality_threshold(&self) -> f64 {
        self.thresholds.quality_threshold
    }

    /// Derive the merge verdict from the current state, the latest review,
    /// its metrics, and the external CI status.
    pub fn evaluate(
        &self,
        state: &IterationState,
        review: &ReviewResult,
        metrics: &QualityMetrics,
        ci: CiStatus,
    ) -> MergeDecision {
        let blocking_issues: Vec<_> = review
            .blocking_issues()
            .into_iter()
            .cloned()
            .collect();

        let mut gate_failures = Vec::new();
        if metrics.weighted < self.thresholds.quality_threshold {
            gate_failures.push(format!(
                "quality score {:.2} below threshold {:.2}",
                metrics.weighted, self.thresholds.quality_threshold
            ));
        }
        if !blocking_issues.is_empty() {
            gate_failures.push(format!(
                "{} blocking issue(s) outstanding",
                blocking_issues.len()
            ));
        }
        if ci != CiStatus::Success {
            gate_failures.push(format!("CI status is {}", ci.as_str()));
        }
        if state.total_cost >= self.change_cost_cap {
            gate_failures.push(format!(
                "cost ${:.2} at or over the ${:.2} cap",
                state.total_cost, self.change_cost_cap
            ));
        }

        let should_merge = gate_failures.is_empty();
        let approval_triggers = self.approval_triggers(state, review, metrics, ci);
        let requires_human_approval = !approval_triggers.is_empty();

        // Stricter sub-case; blocking gate failures always win.
        let auto_merge_eligible = should_merge
            && self.thresholds.auto_merge_enabled
            && metrics.weighted >= self.thresholds.auto_merge_threshold
            && review.security_issues.is_empty()
            && !review
                .issues
                .iter()
                .any(|i| i.severity == IssueSeverity::Error);

        let reason = if should_merge {
            format!(
                "all gates passed at score {:.2} after {} iteration(s)",
                metrics.weighted, state.current_iteration
            )
        } else {
            gate_failures.join("; ")
        };

        MergeDecision {
            should_merge,
            auto_merge_eligible,
            requires_human_approval,
            approval_triggers,
            blocking_issues,
            warnings: self.advisory_warnings(review, metrics),
            reason,
            quality_score: metrics.weighted,
            iteration: state.current_iteration,
            total_cost: state.total_cost,
        }
    }

    /// Each configured rule fires independently.
    fn approval_triggers(
        &self,
        state: &IterationState,
        review: &ReviewResult,
        metrics: &QualityMetrics,
        ci: CiStatus,
    ) -> Vec<ApprovalTrigger> {
        let mut triggers = Vec::new();
        if self.approval.on_score_below_floor
            && metrics.weighted < self.thresholds.human_review_floor
        {
            triggers.push(ApprovalTrigger::ScoreBelowReviewFloor);
        }
        if self.approval.on_security_issues && !review.security_issues.is_empty() {
            triggers.push(ApprovalTrigger::SecurityIssuesPresent);
        }
        if self.approval.on_iteration_cap && state.current_iteration >= state.max_iterations {
            triggers.push(ApprovalTrigger::IterationCapReached);
        }
        if self.approval.on_cost_cap && state.total_cost >= self.change_cost_cap {
            triggers.push(ApprovalTrigger::CostCapReached);
        }
        if self.approval.on_ci_not_successful && ci != CiStatus::Success {
            triggers.push(ApprovalTrigger::CiNotSuccessful);
        }
        triggers
    }

    fn advisory_warnings(&self, review: &ReviewResult, metrics: &QualityMetrics) -> Vec<String> {
        let mut warnings = Vec::new();
        if metrics.performance < self.advisory.performance_floor {
            warnings.push(format!(
                "performance score {:.2} below soft minimum {:.2}",
                metrics.performance, self.advisory.performance_floor
            ));
        }
        let warning_count = review
            .issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .count() as u32;
        if warning_count > self.advisory.max_outstanding_warnings {
            warnings.push(format!(
                "{warning_count} warning-severity issues outstanding (soft limit {})",
                self.advisory.max_outstanding_warnings
            ));
        }
        warnings
    }
}
