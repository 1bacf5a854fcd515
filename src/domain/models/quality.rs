//! Quality metrics computed per iteration.

use serde::{Deserialize, Serialize};

use super::issue::IssueCategory;

/// Per-category and overall quality scores for one Checker result.
///
/// Ephemeral: recomputed from the latest review each iteration and persisted
/// only through the [`IterationRecord`](super::iteration::IterationRecord)
/// that consumed it. All values are clamped to `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// Penalty-model score: agent-reported score minus severity penalties.
    pub overall: f64,
    /// Category-weighted score consumed by the quality gates.
    pub weighted: f64,
    pub security: f64,
    pub performance: f64,
    pub type_safety: f64,
    pub code_quality: f64,
    pub best_practices: f64,
    /// Carried through from a low-confidence (parse-fallback) review.
    pub low_confidence: bool,
}

impl QualityMetrics {
    /// The zero score produced for an error-status review.
    pub fn zero() -> Self {
        Self {
            overall: 0.0,
            weighted: 0.0,
            security: 0.0,
            performance: 0.0,
            type_safety: 0.0,
            code_quality: 0.0,
            best_practices: 0.0,
            low_confidence: false,
        }
    }

    pub fn category(&self, category: IssueCategory) -> f64 {
        match category {
            IssueCategory::Security => self.security,
            IssueCategory::Performance => self.performance,
            IssueCategory::TypeSafety => self.type_safety,
            IssueCategory::CodeQuality => self.code_quality,
            IssueCategory::BestPractice => self.best_practices,
        }
    }
}
