//! Collaborator and storage seams.
//!
//! Everything the decision core talks to lives behind one of these traits:
//! agents, source control, notification, and persistence. Concrete network
//! clients are implemented outside this crate; the in-tree implementations
//! are the filesystem stores and the scripted doubles used for dry runs.

pub mod checker;
pub mod cost_store;
pub mod maker;
pub mod notifier;
pub mod source_control;
pub mod state_repository;

pub use checker::CheckerAgent;
pub use cost_store::CostStore;
pub use maker::MakerAgent;
pub use notifier::{Notifier, NotifierEvent};
pub use source_control::SourceControl;
pub use state_repository::StateRepository;
