//! Cost ledger models.
//!
//! Spend is recorded as append-only events and aggregated by replay, never
//! by read-modify-write on a stored total, so concurrent change loops cannot
//! lose updates to the shared billing-period aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One append-only spend record: the Checker plus Maker cost of a single
/// iteration for a single change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEvent {
    pub event_id: Uuid,
    pub repository: String,
    pub change_id: String,
    pub iteration: u32,
    /// USD spent on the Checker call.
    pub checker_cost: f64,
    /// USD spent on the Maker call; zero when the Maker did not run.
    pub maker_cost: f64,
    pub recorded_at: DateTime<Utc>,
}

impl CostEvent {
    pub fn total(&self) -> f64 {
        self.checker_cost + self.maker_cost
    }

    /// Billing period this event falls in, e.g. `2026-08`.
    pub fn period(&self) -> String {
        self.recorded_at.format("%Y-%m").to_string()
    }
}

/// Aggregate spend for a billing period, derived by replaying events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodUsage {
    /// Period label, e.g. `2026-08`.
    pub period: String,
    pub total: f64,
    pub limit: f64,
    /// `total / limit` as a percentage; may exceed 100.
    pub percentage: f64,
    pub exceeded: bool,
    /// Set when usage crosses the 75% warning line but has not exceeded.
    pub warning: bool,
}

impl PeriodUsage {
    /// Warning line as a fraction of the period limit.
    pub const WARNING_FRACTION: f64 = 0.75;

    pub fn from_total(period: impl Into<String>, total: f64, limit: f64) -> Self {
        let exceeded = total >= limit;
        Self {
            period: period.into(),
            total,
            limit,
            percentage: if limit > 0.0 {
                total / limit * 100.0
            } else {
                0.0
            },
            exceeded,
            warning: !exceeded && total >= limit * Self::WARNING_FRACTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_below_warning_line() {
        let usage = PeriodUsage::from_total("2026-08", 10.0, 100.0);
        assert!(!usage.exceeded);
        assert!(!usage.warning);
        assert!((usage.percentage - 10.0).abs() < 1e-9);
    }

    #[test]
    fn usage_at_warning_line() {
        let usage = PeriodUsage::from_total("2026-08", 75.0, 100.0);
        assert!(!usage.exceeded);
        assert!(usage.warning);
    }

    #[test]
    fn usage_exceeded_is_not_also_warning() {
        let usage = PeriodUsage::from_total("2026-08", 120.0, 100.0);
        assert!(usage.exceeded);
        assert!(!usage.warning);
    }
}
