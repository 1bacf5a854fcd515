//! Source control port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{ChangeContext, CiStatus};

/// The source-control system hosting the change under review.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Fetch the context for a change by id.
    async fn get_context(
        &self,
        owner: &str,
        repository: &str,
        change_id: &str,
    ) -> DomainResult<ChangeContext>;

    /// CI state of the given head revision.
    async fn get_ci_status(&self, head_ref: &str) -> DomainResult<CiStatus>;

    /// Merge the change.
    async fn merge(&self, context: &ChangeContext) -> DomainResult<()>;

    /// Post a comment on the change.
    async fn comment(&self, context: &ChangeContext, text: &str) -> DomainResult<()>;

    /// Apply a label to the change.
    async fn label(&self, context: &ChangeContext, name: &str) -> DomainResult<()>;
}
