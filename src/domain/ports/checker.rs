//! Checker collaborator port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ChangeContext, ReviewResult};

/// The Checker agent: reviews the current state of a change and reports a
/// structured issue list plus its own quality estimate.
///
/// Implementations live outside the decision core (network clients, local
/// tools, scripted doubles). The core never retries a failed call; any
/// retry/backoff policy belongs to the implementation.
#[async_trait]
pub trait CheckerAgent: Send + Sync {
    /// Review the change and return a structured result.
    ///
    /// A parse failure on the agent's free-text output must degrade to a
    /// low-confidence [`ReviewResult`], never to an `Err`. `Err` is reserved
    /// for call failures (network, auth, process), which are terminal for
    /// the run.
    async fn review(&self, context: &ChangeContext) -> DomainResult<ReviewResult>;
}
