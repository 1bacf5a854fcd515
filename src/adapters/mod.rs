//! Concrete implementations of the domain ports that live in-tree: the
//! filesystem stores and the scripted doubles used for dry runs and tests.
//! Network-backed agents and source control clients implement the same
//! ports outside this crate.

pub mod fs;
pub mod mock;

pub use fs::{FsCostStore, FsStateRepository};
pub use mock::{
    dry_run_collaborators, scripted_review, FailingChecker, RecordingNotifier, ScriptedChecker,
    ScriptedMaker, ScriptedSourceControl,
};
