//! Checker response parser boundary.
//!
//! The Checker agent ultimately produces free text. All regex recovery of
//! structured scores and issues is confined to this module, behind a total
//! function: parsing never fails, it degrades. A response that yields no
//! usable structure becomes a zero-issue, mid-score result flagged
//! `low_confidence`, which the convergence detector then treats as
//! unreliable data.
//!
//! Expected section grammar:
//!
//! ```text
//! Overall score: 0.85
//!
//! ## Issues
//! - [error][security/critical] src/auth.rs:42 SQL injection in query builder
//! - [warning][performance/high] src/db.rs:107 N+1 query on hot path
//! - [info][code-quality] src/lib.rs:3 missing module docs
//! ```
//!
//! The sub-severity after the slash is the security grading for security
//! issues and the impact grading for performance issues; other categories
//! omit it.

use regex::Regex;

use crate::domain::models::{
    AgentStatus, Issue, IssueCategory, IssueSeverity, PerformanceImpact, ReviewResult,
    SecuritySeverity,
};

/// Score assumed when no score line parses. Mid-scale: pessimistic enough
/// to keep iterating, never good enough to pass a gate.
const FALLBACK_SCORE: f64 = 0.5;

/// Total parser for Checker free-text output.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    score_re: Regex,
    issue_re: Regex,
    bullet_re: Regex,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            // `Overall score: 0.85` (case-insensitive, anywhere in the text)
            score_re: Regex::new(r"(?im)^\s*overall score:\s*([01](?:\.\d+)?)\s*$")
                .expect("score regex is valid"),
            // `- [severity][category(/subseverity)?] location message`
            issue_re: Regex::new(
                r"(?m)^\s*-\s*\[(error|warning|info)\]\[([a-z-]+)(?:/([a-z]+))?\]\s+(\S+)\s+(.+)$",
            )
            .expect("issue regex is valid"),
            // Any bullet that looks like it tried to be an issue line.
            bullet_re: Regex::new(r"(?m)^\s*-\s*\[").expect("bullet regex is valid"),
        }
    }

    /// Parse one response. Total: always returns a structured result, with
    /// `low_confidence` set whenever recovery was partial.
    pub fn parse(&self, text: &str, cost: f64) -> ReviewResult {
        let score = self
            .score_re
            .captures(text)
            .and_then(|c| c[1].parse::<f64>().ok())
            .map(|s| s.clamp(0.0, 1.0));

        let mut issues = Vec::new();
        let mut matched_bullets = 0usize;
        for caps in self.issue_re.captures_iter(text) {
            matched_bullets += 1;
            if let Some(issue) = build_issue(&caps) {
                issues.push(issue);
            }
        }

        let total_bullets = self.bullet_re.find_iter(text).count();
        // Low confidence when the score was missing, when bullet lines
        // existed that the grammar could not read, or when a matched line
        // named an unknown category/severity.
        let low_confidence =
            score.is_none() || total_bullets != matched_bullets || issues.len() != matched_bullets;

        if low_confidence {
            tracing::warn!(
                parsed_issues = issues.len(),
                total_bullets,
                score_found = score.is_some(),
                "checker response only partially parseable; marking low-confidence"
            );
        }

        let security_issues: Vec<Issue> = issues
            .iter()
            .filter(|i| i.category == IssueCategory::Security)
            .cloned()
            .collect();
        let performance_issues: Vec<Issue> = issues
            .iter()
            .filter(|i| i.category == IssueCategory::Performance)
            .cloned()
            .collect();

        ReviewResult {
            status: AgentStatus::Success,
            issues: if low_confidence && matched_bullets == 0 {
                Vec::new()
            } else {
                issues
            },
            overall_score: score.unwrap_or(FALLBACK_SCORE),
            security_issues,
            performance_issues,
            cost,
            low_confidence,
        }
    }
}

fn build_issue(caps: &regex::Captures<'_>) -> Option<Issue> {
    let severity = match &caps[1] {
        "error" => IssueSeverity::Error,
        "warning" => IssueSeverity::Warning,
        "info" => IssueSeverity::Info,
        _ => return None,
    };
    let category = match &caps[2] {
        "security" => IssueCategory::Security,
        "performance" => IssueCategory::Performance,
        "type-safety" => IssueCategory::TypeSafety,
        "code-quality" => IssueCategory::CodeQuality,
        "best-practice" => IssueCategory::BestPractice,
        _ => return None,
    };
    let location = caps[4].to_string();
    let message = caps[5].trim().to_string();

    let mut issue = Issue::new(category, severity, location, message);
    match category {
        IssueCategory::Security => {
            issue.security_severity = Some(match caps.get(3).map(|m| m.as_str()) {
                Some("critical") => SecuritySeverity::Critical,
                Some("high") => SecuritySeverity::High,
                Some("medium") => SecuritySeverity::Medium,
                // Unlabelled security findings read as low rather than lost.
                _ => SecuritySeverity::Low,
            });
        }
        IssueCategory::Performance => {
            issue.performance_impact = Some(match caps.get(3).map(|m| m.as_str()) {
                Some("high") => PerformanceImpact::High,
                Some("moderate") => PerformanceImpact::Moderate,
                _ => PerformanceImpact::Low,
            });
        }
        _ => {}
    }
    Some(issue)
}
