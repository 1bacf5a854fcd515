//! Persisted iteration-state port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::IterationState;

/// Storage for per-change [`IterationState`] records.
///
/// Writes must be atomic (write-to-temp-then-rename or equivalent) so a
/// crash cannot leave a change's state half-written. Unparsable persisted
/// state is treated as absent — a documented data-loss path, not a crash.
#[async_trait]
pub trait StateRepository: Send + Sync {
    /// Load the state for a change, or `None` if absent or corrupt.
    async fn load(&self, repository: &str, change_id: &str)
        -> DomainResult<Option<IterationState>>;

    /// Persist the state atomically.
    async fn save(&self, state: &IterationState) -> DomainResult<()>;

    /// Remove the state record, e.g. on operator `retry`.
    async fn delete(&self, repository: &str, change_id: &str) -> DomainResult<()>;
}
