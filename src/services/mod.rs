//! Domain services: pure decision logic over the domain models.
//!
//! Everything in this layer is deterministic and free of IO. The single
//! exception is [`CostLedger`], which replays an append-only event store
//! through a [`crate::domain::ports::CostStore`] port.

pub mod convergence_detector;
pub mod cost_ledger;
pub mod iteration_limiter;
pub mod quality_gates;
pub mod quality_scorer;
pub mod response_parser;

pub use convergence_detector::{ConvergenceAssessment, ConvergenceDetector, ConvergenceProjection};
pub use cost_ledger::CostLedger;
pub use iteration_limiter::{IterationLimiter, StartDenial, SuspiciousPattern};
pub use quality_gates::QualityGates;
pub use quality_scorer::QualityScorer;
pub use response_parser::ResponseParser;
