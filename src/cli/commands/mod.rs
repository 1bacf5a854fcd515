//! CLI command implementations.

pub mod debug;
pub mod retry;
pub mod run;
pub mod status;

use clap::Args;

/// Change coordinates shared by every command: positional arguments with
/// environment-variable fallbacks, so CI jobs can omit the positionals.
#[derive(Args, Debug)]
pub struct ChangeArgs {
    /// Owner of the repository
    #[arg(env = "KAIZEN_OWNER")]
    pub owner: String,

    /// Repository name
    #[arg(env = "KAIZEN_REPOSITORY")]
    pub repository: String,

    /// Change identifier (pull/merge request number)
    #[arg(env = "KAIZEN_CHANGE_ID")]
    pub change_id: String,
}

impl ChangeArgs {
    /// Storage key shared with the loop driver.
    pub fn repo_key(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }
}
