//! Review issue model.
//!
//! Issues are produced by the Checker collaborator and consumed read-only by
//! the decision engine: the scorer, the quality gates, and the Maker prompt
//! all work from the same structured issue list.

use serde::{Deserialize, Serialize};

/// Category a review issue belongs to. Drives per-category scoring and the
/// category weights in the overall gate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCategory {
    Security,
    Performance,
    TypeSafety,
    CodeQuality,
    BestPractice,
}

impl IssueCategory {
    /// All categories, in gate-weight order.
    pub const ALL: [IssueCategory; 5] = [
        IssueCategory::Security,
        IssueCategory::Performance,
        IssueCategory::TypeSafety,
        IssueCategory::CodeQuality,
        IssueCategory::BestPractice,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IssueCategory::Security => "security",
            IssueCategory::Performance => "performance",
            IssueCategory::TypeSafety => "type-safety",
            IssueCategory::CodeQuality => "code-quality",
            IssueCategory::BestPractice => "best-practice",
        }
    }
}

/// General severity of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
}

impl IssueSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueSeverity::Info => "info",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Error => "error",
        }
    }
}

/// Additional severity grading applied only to security issues.
///
/// Ordering matters: `Critical` and `High` are blocking for merge regardless
/// of the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecuritySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SecuritySeverity {
    /// Whether this security grading blocks merge on its own.
    pub fn is_blocking(self) -> bool {
        matches!(self, SecuritySeverity::Critical | SecuritySeverity::High)
    }
}

/// Impact grading for performance issues. High-impact findings carry an
/// extra penalty in the overall quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceImpact {
    Low,
    Moderate,
    High,
}

/// A single finding reported by the Checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub category: IssueCategory,
    pub severity: IssueSeverity,
    /// Set only for `Security` category issues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_severity: Option<SecuritySeverity>,
    /// Set only for `Performance` category issues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_impact: Option<PerformanceImpact>,
    /// Location in the change, e.g. `src/auth.rs:42`.
    pub location: String,
    pub message: String,
}

impl Issue {
    pub fn new(
        category: IssueCategory,
        severity: IssueSeverity,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity,
            security_severity: None,
            performance_impact: None,
            location: location.into(),
            message: message.into(),
        }
    }

    /// A security issue with its additional severity grading.
    pub fn security(
        severity: IssueSeverity,
        security_severity: SecuritySeverity,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            security_severity: Some(security_severity),
            ..Self::new(IssueCategory::Security, severity, location, message)
        }
    }

    /// A performance issue with its impact grading.
    pub fn performance(
        severity: IssueSeverity,
        impact: PerformanceImpact,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            performance_impact: Some(impact),
            ..Self::new(IssueCategory::Performance, severity, location, message)
        }
    }

    /// Whether this issue fails a blocking quality gate regardless of the
    /// overall score: any error-severity issue, or any critical/high
    /// security finding.
    pub fn is_blocking(&self) -> bool {
        self.severity == IssueSeverity::Error
            || self
                .security_severity
                .is_some_and(SecuritySeverity::is_blocking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_severity_is_blocking() {
        let issue = Issue::new(
            IssueCategory::CodeQuality,
            IssueSeverity::Error,
            "src/lib.rs:1",
            "broken",
        );
        assert!(issue.is_blocking());
    }

    #[test]
    fn high_security_warning_is_blocking() {
        let issue = Issue::security(
            IssueSeverity::Warning,
            SecuritySeverity::High,
            "src/auth.rs:42",
            "token logged",
        );
        assert!(issue.is_blocking());
    }

    #[test]
    fn low_security_info_is_not_blocking() {
        let issue = Issue::security(
            IssueSeverity::Info,
            SecuritySeverity::Low,
            "src/auth.rs:42",
            "consider constant-time compare",
        );
        assert!(!issue.is_blocking());
    }
}
