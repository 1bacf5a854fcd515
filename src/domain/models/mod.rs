//! Domain models for the kaizen convergence loop.

pub mod config;
pub mod cost;
pub mod decision;
pub mod issue;
pub mod iteration;
pub mod quality;
pub mod review;

pub use config::{
    AdvisoryConfig, ApprovalConfig, Config, ConvergenceConfig, CostConfig, LimitsConfig,
    LoggingConfig, StorageConfig, ThresholdsConfig,
};
pub use cost::{CostEvent, PeriodUsage};
pub use decision::{ApprovalTrigger, MergeDecision};
pub use issue::{Issue, IssueCategory, IssueSeverity, PerformanceImpact, SecuritySeverity};
pub use iteration::{
    ConvergenceStatus, ExhaustionReason, IterationPhase, IterationRecord, IterationState,
};
pub use quality::QualityMetrics;
pub use review::{AgentStatus, ChangeContext, CiStatus, FixResult, ReviewResult};
