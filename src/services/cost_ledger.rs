//! Cost accounting over the append-only event store.
//!
//! Tracks spend at two scopes: per-change cumulative cost and the rolling
//! billing-period total across all changes. Both are derived by replaying
//! events from the [`CostStore`], never by mutating a stored total, so
//! concurrent change loops cannot lose updates.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CostConfig, CostEvent, PeriodUsage};
use crate::domain::ports::CostStore;

/// Ledger facade over a [`CostStore`].
pub struct CostLedger {
    store: Arc<dyn CostStore>,
    config: CostConfig,
}

impl CostLedger {
    pub fn new(store: Arc<dyn CostStore>, config: CostConfig) -> Self {
        Self { store, config }
    }

    /// Append the spend of one completed iteration.
    pub async fn record_iteration(
        &self,
        repository: &str,
        change_id: &str,
        iteration: u32,
        checker_cost: f64,
        maker_cost: f64,
    ) -> DomainResult<CostEvent> {
        let event = CostEvent {
            event_id: Uuid::new_v4(),
            repository: repository.to_string(),
            change_id: change_id.to_string(),
            iteration,
            checker_cost,
            maker_cost,
            recorded_at: Utc::now(),
        };
        self.store.append(&event).await?;
        tracing::debug!(
            repository,
            change_id,
            iteration,
            cost = event.total(),
            "recorded iteration cost"
        );
        Ok(event)
    }

    /// Cumulative spend for one change, by replay.
    pub async fn change_total(&self, repository: &str, change_id: &str) -> DomainResult<f64> {
        let events = self.store.change_events(repository, change_id).await?;
        Ok(events.iter().map(CostEvent::total).sum())
    }

    /// Whether one change's cumulative spend has reached the per-change cap.
    pub async fn has_exceeded_change_cap(
        &self,
        repository: &str,
        change_id: &str,
    ) -> DomainResult<bool> {
        Ok(self.change_total(repository, change_id).await? >= self.config.change_cap)
    }

    /// Usage for the current billing period across all changes, including
    /// the 75% warning line.
    pub async fn check_period_cap(&self) -> DomainResult<PeriodUsage> {
        let period = Utc::now().format("%Y-%m").to_string();
        let events = self.store.period_events(&period).await?;
        let total: f64 = events.iter().map(CostEvent::total).sum();
        Ok(PeriodUsage::from_total(period, total, self.config.period_cap))
    }

    /// Per-change cap, for surfacing in decisions and messages.
    pub fn change_cap(&self) -> f64 {
        self.config.change_cap
    }
}
