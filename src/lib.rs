//! Kaizen - maker/checker convergence loop for code changes
//!
//! Kaizen drives an autonomous review-and-fix loop: a Checker agent reviews
//! a change and reports issues plus a quality score, a Maker agent edits the
//! change to address them, and the two alternate until quality converges, a
//! safety limit fires, or a collaborator fails. The crate is the decision
//! engine around those agents: quality scoring, convergence and stagnation
//! analysis, iteration and cost ceilings, and the merge verdict.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors, and the collaborator ports
//! - **Service Layer** (`services`): pure decision logic (scoring,
//!   convergence, limits, gates)
//! - **Application Layer** (`application`): the state-machine engine, its
//!   async driver, and operator commands
//! - **Adapters** (`adapters`): filesystem persistence and scripted doubles
//! - **Infrastructure Layer** (`infrastructure`): configuration loading
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use kaizen::application::{LoopDeps, LoopDriver};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire collaborators and stores into LoopDeps, then:
//!     // let outcome = LoopDriver::new(deps, config).run("octo", "widgets", "42").await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{LoopDeps, LoopDriver, LoopOutcome, Operator, OperatorCommand};
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    ChangeContext, CiStatus, Config, ConvergenceStatus, ExhaustionReason, Issue, IssueCategory,
    IssueSeverity, IterationPhase, IterationRecord, IterationState, MergeDecision, QualityMetrics,
    ReviewResult,
};
pub use domain::ports::{
    CheckerAgent, CostStore, MakerAgent, Notifier, SourceControl, StateRepository,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ConvergenceDetector, IterationLimiter, QualityGates, QualityScorer};
