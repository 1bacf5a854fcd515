//! Convergence trend analysis over iteration history.
//!
//! Classifies a trailing window of quality scores and issue counts as
//! improving, stagnant, or regressing, and separately projects whether the
//! remaining iteration budget can still reach the target score.
//!
//! The classifier never throws and always produces a status: with fewer
//! than two history entries it reports improving at low confidence, the
//! optimistic default for insufficient data.

use serde::{Deserialize, Serialize};

use crate::domain::models::{ConvergenceConfig, ConvergenceStatus};

/// Score movement below this magnitude counts as a flat step.
const DELTA_EPSILON: f64 = 0.02;
/// Mixed-signal fallback band on the mean per-iteration delta.
const MEAN_DELTA_EPSILON: f64 = 0.05;

const HIGH_CONFIDENCE: f64 = 0.9;
const MEDIUM_CONFIDENCE: f64 = 0.75;
const LOW_CONFIDENCE: f64 = 0.5;
/// Confidence multiplier applied when the window contains parse-fallback
/// (low-confidence) review data.
const UNRELIABLE_DATA_FACTOR: f64 = 0.5;

/// Classification of a trailing window plus how sure we are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceAssessment {
    pub status: ConvergenceStatus,
    /// In `[0.0, 1.0]`.
    pub confidence: f64,
    pub reason: String,
}

/// Projection of iterations still needed to reach the target score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceProjection {
    /// Whether the history shows any positive movement at all.
    pub achievable: bool,
    /// Estimated iterations to target; `None` when unachievable.
    pub iterations_needed: Option<u32>,
    /// Whether the estimate fits the remaining budget.
    pub within_budget: bool,
    /// In `[0.0, 1.0]`; reduced by the variance of positive deltas.
    pub confidence: f64,
    pub reason: String,
}

/// Direction of one metric over the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trend {
    Improving,
    Flat,
    Regressing,
}

/// Trailing-window convergence detector.
#[derive(Debug, Clone)]
pub struct ConvergenceDetector {
    window: usize,
}

impl ConvergenceDetector {
    pub fn new(config: &ConvergenceConfig) -> Self {
        Self {
            // A window below 2 cannot form a single step.
            window: config.window.max(2),
        }
    }

    /// Classify the trailing window. `data_reliable` is false when the
    /// window contains parse-fallback review results; the status is still
    /// computed but reported at reduced confidence.
    pub fn assess(
        &self,
        scores: &[f64],
        issue_counts: &[u32],
        data_reliable: bool,
    ) -> ConvergenceAssessment {
        let mut assessment = self.assess_window(scores, issue_counts);
        if !data_reliable {
            assessment.confidence *= UNRELIABLE_DATA_FACTOR;
            assessment.reason.push_str(" (low-confidence review data)");
        }
        assessment
    }

    fn assess_window(&self, scores: &[f64], issue_counts: &[u32]) -> ConvergenceAssessment {
        if scores.len() < 2 {
            return ConvergenceAssessment {
                status: ConvergenceStatus::Improving,
                confidence: LOW_CONFIDENCE,
                reason: "insufficient history; defaulting to improving".to_string(),
            };
        }

        let window_scores = tail(scores, self.window);
        let window_issues = tail(issue_counts, self.window);

        let quality = quality_trend(window_scores);
        let issues = issue_trend(window_issues);

        match (quality, issues) {
            (Trend::Improving, Trend::Improving) => ConvergenceAssessment {
                status: ConvergenceStatus::Improving,
                confidence: HIGH_CONFIDENCE,
                reason: "quality rising and issue count falling".to_string(),
            },
            // A flat companion trend is neutral, not an opposing signal.
            (Trend::Improving, Trend::Flat) => ConvergenceAssessment {
                status: ConvergenceStatus::Improving,
                confidence: MEDIUM_CONFIDENCE,
                reason: "quality rising at a steady issue count".to_string(),
            },
            (Trend::Flat, Trend::Improving) => ConvergenceAssessment {
                status: ConvergenceStatus::Improving,
                confidence: MEDIUM_CONFIDENCE,
                reason: "issue count falling at steady quality".to_string(),
            },
            (Trend::Flat, Trend::Flat) => ConvergenceAssessment {
                status: ConvergenceStatus::Stagnant,
                confidence: HIGH_CONFIDENCE,
                reason: "quality and issue count both flat".to_string(),
            },
            (Trend::Regressing, Trend::Flat | Trend::Regressing) => ConvergenceAssessment {
                status: ConvergenceStatus::Regressing,
                confidence: MEDIUM_CONFIDENCE,
                reason: "quality falling without offsetting issue reduction".to_string(),
            },
            (Trend::Flat, Trend::Regressing) => ConvergenceAssessment {
                status: ConvergenceStatus::Regressing,
                confidence: MEDIUM_CONFIDENCE,
                reason: "issue count rising without offsetting quality gain".to_string(),
            },
            // Genuinely opposed trends: fall back to the mean
            // per-iteration delta over the whole history.
            _ => self.mixed_signal_fallback(scores),
        }
    }

    fn mixed_signal_fallback(&self, scores: &[f64]) -> ConvergenceAssessment {
        let deltas = adjacent_deltas(scores);
        let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
        let (status, label) = if mean > MEAN_DELTA_EPSILON {
            (ConvergenceStatus::Improving, "positive")
        } else if mean.abs() <= MEAN_DELTA_EPSILON {
            (ConvergenceStatus::Stagnant, "negligible")
        } else {
            (ConvergenceStatus::Regressing, "negative")
        };
        ConvergenceAssessment {
            status,
            confidence: LOW_CONFIDENCE,
            reason: format!("mixed signals; mean score delta {mean:+.3} is {label}"),
        }
    }

    /// Number of trailing iterations whose window assessment was stagnant.
    ///
    /// Used by the loop's exhaustion rule: stagnant for N consecutive
    /// iterations below threshold stops the run.
    pub fn consecutive_stagnant(&self, scores: &[f64], issue_counts: &[u32]) -> u32 {
        let mut streak = 0;
        for end in (2..=scores.len()).rev() {
            let assessment = self.assess_window(&scores[..end], &issue_counts[..end.min(issue_counts.len())]);
            if assessment.status == ConvergenceStatus::Stagnant {
                streak += 1;
            } else {
                break;
            }
        }
        streak
    }

    /// Project whether `target` is reachable from `current` within
    /// `remaining_budget` iterations, from the mean of strictly-positive
    /// historical deltas.
    pub fn project(
        &self,
        scores: &[f64],
        current: f64,
        target: f64,
        remaining_budget: u32,
    ) -> ConvergenceProjection {
        if current >= target {
            return ConvergenceProjection {
                achievable: true,
                iterations_needed: Some(0),
                within_budget: true,
                confidence: 1.0,
                reason: "target already met".to_string(),
            };
        }

        let positive: Vec<f64> = adjacent_deltas(scores)
            .into_iter()
            .filter(|d| *d > 0.0)
            .collect();

        if positive.is_empty() {
            return ConvergenceProjection {
                achievable: false,
                iterations_needed: None,
                within_budget: false,
                confidence: MEDIUM_CONFIDENCE,
                reason: "no positive movement in history; will not reach target".to_string(),
            };
        }

        let mean = positive.iter().sum::<f64>() / positive.len() as f64;
        let needed = ((target - current) / mean).ceil() as u32;
        let within_budget = needed <= remaining_budget;

        // Spread of the positive deltas erodes confidence in the mean rate.
        let variance = positive
            .iter()
            .map(|d| (d - mean).powi(2))
            .sum::<f64>()
            / positive.len() as f64;
        let dispersion = (variance.sqrt() / mean).min(1.0);
        let confidence = (HIGH_CONFIDENCE - 0.4 * dispersion).clamp(0.0, 1.0);

        ConvergenceProjection {
            achievable: true,
            iterations_needed: Some(needed),
            within_budget,
            confidence,
            reason: format!(
                "{needed} iteration(s) needed at {mean:+.3}/iteration, {remaining_budget} remaining"
            ),
        }
    }
}

fn tail<T>(values: &[T], window: usize) -> &[T] {
    &values[values.len().saturating_sub(window)..]
}

fn adjacent_deltas(scores: &[f64]) -> Vec<f64> {
    scores.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Majority rule over adjacent score steps; ties read as flat.
fn quality_trend(scores: &[f64]) -> Trend {
    let mut improving = 0usize;
    let mut regressing = 0usize;
    let mut flat = 0usize;
    for delta in adjacent_deltas(scores) {
        if delta > DELTA_EPSILON {
            improving += 1;
        } else if delta < -DELTA_EPSILON {
            regressing += 1;
        } else {
            flat += 1;
        }
    }
    majority(improving, flat, regressing)
}

/// Majority rule over adjacent issue-count steps; falling counts are the
/// improving direction.
fn issue_trend(counts: &[u32]) -> Trend {
    let mut improving = 0usize;
    let mut regressing = 0usize;
    let mut flat = 0usize;
    for pair in counts.windows(2) {
        match pair[1].cmp(&pair[0]) {
            std::cmp::Ordering::Less => improving += 1,
            std::cmp::Ordering::Greater => regressing += 1,
            std::cmp::Ordering::Equal => flat += 1,
        }
    }
    majority(improving, flat, regressing)
}

fn majority(improving: usize, flat: usize, regressing: usize) -> Trend {
    if improving > flat && improving > regressing {
        Trend::Improving
    } else if regressing > flat && regressing > improving {
        Trend::Regressing
    } else {
        Trend::Flat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ConvergenceDetector {
        ConvergenceDetector::new(&ConvergenceConfig::default())
    }

    #[test]
    fn short_history_defaults_to_improving_low_confidence() {
        let assessment = detector().assess(&[0.5], &[4], true);
        assert_eq!(assessment.status, ConvergenceStatus::Improving);
        assert!(assessment.confidence <= LOW_CONFIDENCE);
    }

    #[test]
    fn strictly_increasing_scores_classify_improving() {
        let assessment = detector().assess(&[0.50, 0.60, 0.72], &[8, 5, 2], true);
        assert_eq!(assessment.status, ConvergenceStatus::Improving);
        assert!(assessment.confidence >= HIGH_CONFIDENCE);
    }

    #[test]
    fn rising_scores_with_steady_issue_count_classify_improving() {
        let assessment = detector().assess(&[0.50, 0.53, 0.56], &[5, 5, 5], true);
        assert_eq!(assessment.status, ConvergenceStatus::Improving);
        assert!(assessment.confidence >= MEDIUM_CONFIDENCE);
    }

    #[test]
    fn falling_issue_count_with_steady_scores_classifies_improving() {
        let assessment = detector().assess(&[0.70, 0.71, 0.70], &[9, 6, 3], true);
        assert_eq!(assessment.status, ConvergenceStatus::Improving);
        assert!(assessment.confidence >= MEDIUM_CONFIDENCE);
    }

    #[test]
    fn flat_scores_and_issue_counts_classify_stagnant() {
        let assessment = detector().assess(&[0.60, 0.62, 0.61], &[8, 8, 8], true);
        assert_eq!(assessment.status, ConvergenceStatus::Stagnant);
        assert!(assessment.confidence >= HIGH_CONFIDENCE);
    }

    #[test]
    fn strictly_decreasing_scores_classify_regressing() {
        let assessment = detector().assess(&[0.80, 0.70, 0.55], &[3, 6, 9], true);
        assert_eq!(assessment.status, ConvergenceStatus::Regressing);
    }

    #[test]
    fn mixed_signals_fall_back_to_mean_delta() {
        // Quality rising but issue count rising too: mixed, and the mean
        // delta (+0.10) is clearly positive.
        let assessment = detector().assess(&[0.50, 0.60, 0.70], &[4, 5, 6], true);
        assert_eq!(assessment.status, ConvergenceStatus::Improving);
        assert!(assessment.confidence <= LOW_CONFIDENCE);
        assert!(assessment.reason.contains("mixed signals"));
    }

    #[test]
    fn unreliable_data_halves_confidence() {
        let reliable = detector().assess(&[0.60, 0.61, 0.60], &[8, 8, 8], true);
        let unreliable = detector().assess(&[0.60, 0.61, 0.60], &[8, 8, 8], false);
        assert_eq!(reliable.status, unreliable.status);
        assert!(unreliable.confidence < reliable.confidence);
    }

    #[test]
    fn consecutive_stagnant_counts_trailing_streak() {
        let scores = [0.40, 0.60, 0.61, 0.60, 0.61];
        let issues = [9, 8, 8, 8, 8];
        assert!(detector().consecutive_stagnant(&scores, &issues) >= 3);
    }

    #[test]
    fn projection_with_no_positive_deltas_is_unachievable() {
        let projection = detector().project(&[0.70, 0.65, 0.60], 0.60, 0.85, 5);
        assert!(!projection.achievable);
        assert!(projection.iterations_needed.is_none());
        assert!(projection.reason.contains("will not reach target"));
    }

    #[test]
    fn projection_estimates_iterations_from_mean_positive_delta() {
        // Positive deltas: 0.10, 0.10 -> mean 0.10; gap 0.15 -> 2 iterations.
        let projection = detector().project(&[0.50, 0.60, 0.70], 0.70, 0.85, 5);
        assert!(projection.achievable);
        assert_eq!(projection.iterations_needed, Some(2));
        assert!(projection.within_budget);
    }

    #[test]
    fn projection_detects_budget_shortfall() {
        let projection = detector().project(&[0.50, 0.52, 0.54], 0.54, 0.95, 2);
        assert!(projection.achievable);
        assert!(!projection.within_budget);
    }

    #[test]
    fn projection_at_target_needs_zero_iterations() {
        let projection = detector().project(&[0.80, 0.90], 0.90, 0.85, 1);
        assert_eq!(projection.iterations_needed, Some(0));
        assert!(projection.within_budget);
    }
}
