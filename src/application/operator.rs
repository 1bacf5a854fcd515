//! Operator commands.
//!
//! Operators steer a run through short text triggers (typically change
//! comments): `retry`, `stop`, `status`, `force-merge`, `debug`. Parsing is
//! deliberately forgiving about case and surrounding whitespace, strict
//! about everything else.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::IterationState;
use crate::domain::ports::{SourceControl, StateRepository};

/// A recognized operator trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Reset persisted state and restart the loop from scratch.
    Retry,
    /// Cooperative abort at the next iteration boundary.
    Stop,
    /// Report the current state.
    Status,
    /// Merge bypassing every gate. Audited.
    ForceMerge,
    /// Dump the raw persisted state.
    Debug,
}

impl OperatorCommand {
    /// Parse a trigger from free text; `None` for anything unrecognized.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "retry" => Some(OperatorCommand::Retry),
            "stop" => Some(OperatorCommand::Stop),
            "status" => Some(OperatorCommand::Status),
            "force-merge" => Some(OperatorCommand::ForceMerge),
            "debug" => Some(OperatorCommand::Debug),
            _ => None,
        }
    }
}

/// Executes operator commands against a change's persisted state.
///
/// Only the state repository is mandatory. `stop` needs a shutdown handle
/// from the running loop and `force-merge` needs a source control client;
/// both are attached with the builder methods when the host has them.
pub struct Operator {
    state_repo: Arc<dyn StateRepository>,
    source_control: Option<Arc<dyn SourceControl>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
}

impl Operator {
    pub fn new(state_repo: Arc<dyn StateRepository>) -> Self {
        Self {
            state_repo,
            source_control: None,
            shutdown_tx: None,
        }
    }

    #[must_use]
    pub fn with_source_control(mut self, source_control: Arc<dyn SourceControl>) -> Self {
        self.source_control = Some(source_control);
        self
    }

    #[must_use]
    pub fn with_shutdown(mut self, shutdown_tx: broadcast::Sender<()>) -> Self {
        self.shutdown_tx = Some(shutdown_tx);
        self
    }

    /// Drop persisted state so the next run starts from Idle.
    pub async fn retry(&self, repository: &str, change_id: &str) -> DomainResult<()> {
        info!(repository, change_id, "retry requested; resetting state");
        self.state_repo.delete(repository, change_id).await
    }

    /// Request a cooperative stop. The running loop observes it at the top
    /// of its next iteration; an in-flight collaborator call is never cut.
    pub fn stop(&self) -> DomainResult<()> {
        let Some(tx) = &self.shutdown_tx else {
            return Err(DomainError::ValidationFailed(
                "stop requires a shutdown handle from a running loop".to_string(),
            ));
        };
        info!("stop requested");
        // A closed channel means the loop already finished; the stop is moot.
        let _ = tx.send(());
        Ok(())
    }

    /// Current persisted state, if any.
    pub async fn status(
        &self,
        repository: &str,
        change_id: &str,
    ) -> DomainResult<Option<IterationState>> {
        self.state_repo.load(repository, change_id).await
    }

    /// Merge bypassing every quality gate.
    ///
    /// The override is written to the log at warn level and announced on
    /// the change itself so it can never happen silently.
    pub async fn force_merge(
        &self,
        owner: &str,
        repository: &str,
        change_id: &str,
    ) -> DomainResult<()> {
        let Some(source_control) = &self.source_control else {
            return Err(DomainError::ValidationFailed(
                "force-merge requires a source control client".to_string(),
            ));
        };
        let context = source_control.get_context(owner, repository, change_id).await?;
        warn!(
            owner,
            repository,
            change_id,
            "FORCE MERGE: operator override, all quality gates bypassed"
        );
        source_control.merge(&context).await?;
        source_control.label(&context, "kaizen:force-merged").await?;
        source_control
            .comment(
                &context,
                "Merged by operator override (`force-merge`); quality gates were bypassed.",
            )
            .await
    }

    /// Pretty-printed JSON dump of the persisted state.
    pub async fn debug_dump(&self, repository: &str, change_id: &str) -> DomainResult<String> {
        match self.state_repo.load(repository, change_id).await? {
            Some(state) => Ok(serde_json::to_string_pretty(&state)?),
            None => Err(DomainError::ValidationFailed(format!(
                "no persisted state for {repository}#{change_id}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognizes_all_triggers() {
        assert_eq!(OperatorCommand::parse("retry"), Some(OperatorCommand::Retry));
        assert_eq!(OperatorCommand::parse(" STOP "), Some(OperatorCommand::Stop));
        assert_eq!(
            OperatorCommand::parse("Force-Merge"),
            Some(OperatorCommand::ForceMerge)
        );
        assert_eq!(OperatorCommand::parse("status"), Some(OperatorCommand::Status));
        assert_eq!(OperatorCommand::parse("debug"), Some(OperatorCommand::Debug));
    }

    #[test]
    fn parse_rejects_everything_else() {
        assert_eq!(OperatorCommand::parse("looks good to me"), None);
        assert_eq!(OperatorCommand::parse("retry please"), None);
        assert_eq!(OperatorCommand::parse(""), None);
    }
}
