//! Optional notification port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::ExhaustionReason;

/// Events worth telling a human about out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotifierEvent {
    Converged {
        repository: String,
        change_id: String,
        final_score: f64,
        iterations: u32,
        total_cost: f64,
    },
    Exhausted {
        repository: String,
        change_id: String,
        reason: ExhaustionReason,
        iterations: u32,
        total_cost: f64,
    },
    Failed {
        repository: String,
        change_id: String,
        error: String,
        iterations: u32,
        total_cost: f64,
    },
    CostWarning {
        period: String,
        total: f64,
        limit: f64,
    },
}

/// Delivery channel for [`NotifierEvent`]s. Optional: the loop runs without
/// one, and delivery failures are logged, never propagated.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: NotifierEvent) -> DomainResult<()>;
}
