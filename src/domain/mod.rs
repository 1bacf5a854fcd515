//! Domain layer for the kaizen convergence loop.
//!
//! Pure business types and the ports the decision engine depends on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
