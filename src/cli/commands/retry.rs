//! `kaizen retry` - drop persisted state so the next run starts over.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use crate::adapters::fs::FsStateRepository;
use crate::application::Operator;
use crate::infrastructure::ConfigLoader;

use super::ChangeArgs;

#[derive(Args, Debug)]
pub struct RetryArgs {
    #[command(flatten)]
    pub change: ChangeArgs,
}

pub async fn execute(args: RetryArgs, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    let operator = Operator::new(Arc::new(FsStateRepository::new(config.storage.state_dir)));

    operator
        .retry(&args.change.repo_key(), &args.change.change_id)
        .await?;

    if json_mode {
        println!("{}", serde_json::json!({ "reset": true }));
    } else {
        println!(
            "State for {}#{} reset; the next run starts from scratch.",
            args.change.repo_key(),
            args.change.change_id
        );
    }
    Ok(())
}
