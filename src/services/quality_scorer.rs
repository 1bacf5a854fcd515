//! Quality scoring over one Checker result.
//!
//! Two scores come out of every review:
//!
//! - **overall** — the Checker's own estimate minus a severity-weighted
//!   penalty. This is the score the loop iterates on.
//! - **weighted** — a category-weighted composite built from per-category
//!   scores. This is the score the quality gates compare against thresholds.
//!
//! Both are clamped to `[0.0, 1.0]`, and an error-status review scores zero
//! with no partial credit.

use crate::domain::models::{
    AgentStatus, Issue, IssueCategory, IssueSeverity, PerformanceImpact, QualityMetrics,
    ReviewResult, SecuritySeverity,
};

// Penalties subtracted from the agent-reported overall score.
const PENALTY_ERROR: f64 = 0.10;
const PENALTY_WARNING: f64 = 0.05;
const PENALTY_INFO: f64 = 0.02;
const PENALTY_CRITICAL_SECURITY: f64 = 0.20;
const PENALTY_HIGH_SECURITY: f64 = 0.15;
const PENALTY_HIGH_PERFORMANCE: f64 = 0.10;

// Per-category deductions from a perfect 1.0.
const CATEGORY_PENALTY_ERROR: f64 = 0.15;
const CATEGORY_PENALTY_WARNING: f64 = 0.08;
const CATEGORY_PENALTY_INFO: f64 = 0.03;

// Category weights for the gate score.
const WEIGHT_SECURITY: f64 = 0.25;
const WEIGHT_PERFORMANCE: f64 = 0.20;
const WEIGHT_TYPE_SAFETY: f64 = 0.20;
const WEIGHT_CODE_QUALITY: f64 = 0.20;
const WEIGHT_BEST_PRACTICES: f64 = 0.15;

/// Stateless scorer; a struct only so callers can hold it alongside the
/// other services.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityScorer;

impl QualityScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score one review. Total: never fails, output always in `[0.0, 1.0]`.
    pub fn score(&self, review: &ReviewResult) -> QualityMetrics {
        if review.status == AgentStatus::Error {
            return QualityMetrics::zero();
        }

        let security = category_score(&review.issues, IssueCategory::Security);
        let performance = category_score(&review.issues, IssueCategory::Performance);
        let type_safety = category_score(&review.issues, IssueCategory::TypeSafety);
        let code_quality = category_score(&review.issues, IssueCategory::CodeQuality);
        let best_practices = category_score(&review.issues, IssueCategory::BestPractice);

        let weighted = (WEIGHT_SECURITY * security
            + WEIGHT_PERFORMANCE * performance
            + WEIGHT_TYPE_SAFETY * type_safety
            + WEIGHT_CODE_QUALITY * code_quality
            + WEIGHT_BEST_PRACTICES * best_practices)
            .clamp(0.0, 1.0);

        QualityMetrics {
            overall: overall_score(review),
            weighted,
            security,
            performance,
            type_safety,
            code_quality,
            best_practices,
            low_confidence: review.low_confidence,
        }
    }
}

/// Agent-reported score minus severity penalties, clamped to `[0.0, 1.0]`.
fn overall_score(review: &ReviewResult) -> f64 {
    let mut penalty = 0.0;
    for issue in &review.issues {
        penalty += match issue.severity {
            IssueSeverity::Error => PENALTY_ERROR,
            IssueSeverity::Warning => PENALTY_WARNING,
            IssueSeverity::Info => PENALTY_INFO,
        };
    }
    for issue in &review.security_issues {
        penalty += match issue.security_severity {
            Some(SecuritySeverity::Critical) => PENALTY_CRITICAL_SECURITY,
            Some(SecuritySeverity::High) => PENALTY_HIGH_SECURITY,
            _ => 0.0,
        };
    }
    for issue in &review.performance_issues {
        if issue.performance_impact == Some(PerformanceImpact::High) {
            penalty += PENALTY_HIGH_PERFORMANCE;
        }
    }
    (review.overall_score - penalty).clamp(0.0, 1.0)
}

/// Per-category score: perfect with no issues, reduced per finding, floored
/// at zero.
fn category_score(issues: &[Issue], category: IssueCategory) -> f64 {
    let penalty: f64 = issues
        .iter()
        .filter(|i| i.category == category)
        .map(|i| match i.severity {
            IssueSeverity::Error => CATEGORY_PENALTY_ERROR,
            IssueSeverity::Warning => CATEGORY_PENALTY_WARNING,
            IssueSeverity::Info => CATEGORY_PENALTY_INFO,
        })
        .sum();
    (1.0 - penalty).clamp(0.0, 1.0)
}
