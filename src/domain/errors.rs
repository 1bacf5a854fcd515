//! Domain errors for the kaizen convergence loop.

use thiserror::Error;

/// Domain-level errors that can occur in the kaizen system.
///
/// The taxonomy deliberately distinguishes failures that terminate a run
/// (`Collaborator`), failures that degrade to defaults (`Config`,
/// `StateCorruption`), and conditions that are not errors at all: budget
/// exhaustion and blocked quality gates are normal terminal outcomes and are
/// modeled as state, not as error variants.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A Checker or Maker call failed. Terminal for the current run; the
    /// remediation hint is surfaced to the operator verbatim.
    #[error("{agent} call failed at iteration {iteration}: {message} (comment `retry` to restart)")]
    Collaborator {
        agent: String,
        iteration: u32,
        message: String,
    },

    /// A collaborator call exceeded its explicit timeout.
    #[error("{agent} call timed out after {timeout_secs}s at iteration {iteration} (comment `retry` to restart)")]
    CollaboratorTimeout {
        agent: String,
        iteration: u32,
        timeout_secs: u64,
    },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Writes against a frozen (terminal) iteration state.
    #[error("Iteration state for {repository}#{change_id} is terminal ({phase}); no further mutation is valid")]
    StateFrozen {
        repository: String,
        change_id: String,
        phase: String,
    },

    /// Persisted state could not be parsed. Callers re-initialize rather
    /// than crash; the variant exists so the data-loss event gets logged.
    #[error("Persisted state at {path} is corrupt: {message}")]
    StateCorruption { path: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Source control error: {0}")]
    SourceControl(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
