//! Maker collaborator port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ChangeContext, FixResult, Issue};

/// The Maker agent: edits the change to address the Checker's findings.
#[async_trait]
pub trait MakerAgent: Send + Sync {
    /// Attempt to fix the given issues. `attempt` is the 1-based iteration
    /// index, so the agent can adjust its approach on later rounds.
    async fn fix(
        &self,
        context: &ChangeContext,
        issues: &[Issue],
        attempt: u32,
    ) -> DomainResult<FixResult>;
}
