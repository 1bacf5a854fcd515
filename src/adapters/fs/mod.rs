//! Filesystem persistence adapters.

pub mod cost_log;
pub mod state_store;

pub use cost_log::FsCostStore;
pub use state_store::FsStateRepository;
