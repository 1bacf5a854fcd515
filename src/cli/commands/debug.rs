//! `kaizen debug` - dump the raw persisted state for a change.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::adapters::fs::FsStateRepository;
use crate::application::Operator;
use crate::infrastructure::ConfigLoader;

use super::ChangeArgs;

#[derive(Args, Debug)]
pub struct DebugArgs {
    #[command(flatten)]
    pub change: ChangeArgs,
}

pub async fn execute(args: DebugArgs, _json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    let operator = Operator::new(Arc::new(FsStateRepository::new(config.storage.state_dir)));

    let dump = operator
        .debug_dump(&args.change.repo_key(), &args.change.change_id)
        .await?;
    println!("{dump}");
    Ok(())
}
