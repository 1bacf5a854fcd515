//! Application layer: the loop engine, its async driver, and operator
//! commands.

pub mod engine;
pub mod loop_driver;
pub mod operator;

pub use engine::{step, LoopCommand, LoopEvent};
pub use loop_driver::{LoopDeps, LoopDriver, LoopOutcome};
pub use operator::{Operator, OperatorCommand};
