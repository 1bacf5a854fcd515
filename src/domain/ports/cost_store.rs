//! Append-only cost event storage port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::CostEvent;

/// Append-only storage for [`CostEvent`]s.
///
/// Totals are always derived by replaying events, never by mutating a stored
/// aggregate, so concurrent change loops cannot lose updates to the shared
/// billing-period figure.
#[async_trait]
pub trait CostStore: Send + Sync {
    /// Append one event. Must be an append, not a rewrite.
    async fn append(&self, event: &CostEvent) -> DomainResult<()>;

    /// All events recorded for one change, in append order.
    async fn change_events(
        &self,
        repository: &str,
        change_id: &str,
    ) -> DomainResult<Vec<CostEvent>>;

    /// All events recorded in one billing period (`YYYY-MM`), across changes.
    async fn period_events(&self, period: &str) -> DomainResult<Vec<CostEvent>>;
}
