//! `kaizen run` - drive the convergence loop for one change.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;

use crate::adapters::fs::{FsCostStore, FsStateRepository};
use crate::adapters::mock::{RecordingNotifier, ScriptedChecker, ScriptedMaker, ScriptedSourceControl};
use crate::application::{LoopDeps, LoopDriver, LoopOutcome};
use crate::domain::models::{CiStatus, IterationPhase};
use crate::infrastructure::ConfigLoader;

use super::ChangeArgs;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub change: ChangeArgs,

    /// Replay scripted collaborators instead of calling real agents
    #[arg(long)]
    pub dry_run: bool,

    /// Load configuration from a specific file instead of .kaizen/
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let state_repo = Arc::new(FsStateRepository::new(config.storage.state_dir.clone()));
    let cost_store = Arc::new(FsCostStore::new(config.storage.cost_dir.clone()));

    // Real Checker/Maker/source-control clients are wired in by the hosting
    // automation; this binary only ships the scripted dry-run collaborators.
    if !args.dry_run {
        bail!(
            "no collaborator endpoints are configured in this build; \
             run with --dry-run to replay scripted collaborators"
        );
    }

    let deps = LoopDeps {
        checker: Arc::new(ScriptedChecker::improving()),
        maker: Arc::new(ScriptedMaker::new()),
        source_control: Arc::new(ScriptedSourceControl::new(CiStatus::Success)),
        state_repo,
        cost_store,
        notifier: Some(Arc::new(RecordingNotifier::new())),
    };

    if !json_mode {
        println!(
            "Running convergence loop for {}/{}#{} (dry run)",
            args.change.owner, args.change.repository, args.change.change_id
        );
        println!(
            "   Quality threshold: {:.2}   Max iterations: {}   Cost cap: ${:.2}",
            config.thresholds.quality_threshold,
            config.limits.max_iterations,
            config.cost.change_cap
        );
        println!();
    }

    let driver = LoopDriver::new(deps, config);
    let outcome = driver
        .run(
            &args.change.owner,
            &args.change.repository,
            &args.change.change_id,
        )
        .await?;

    report(&outcome, json_mode)?;
    Ok(())
}

fn report(outcome: &LoopOutcome, json_mode: bool) -> Result<()> {
    if json_mode {
        let payload = serde_json::json!({
            "phase": outcome.state.phase,
            "iterations": outcome.state.current_iteration,
            "final_score": outcome.state.latest_score,
            "total_cost": outcome.state.total_cost,
            "decision": outcome.decision,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    match &outcome.state.phase {
        IterationPhase::Converged { final_score } => {
            println!(
                "Converged at score {final_score:.2} after {} iteration(s), ${:.2} spent",
                outcome.state.current_iteration, outcome.state.total_cost
            );
        }
        IterationPhase::Exhausted { reason } => {
            println!(
                "Exhausted: {reason} ({} iteration(s), ${:.2} spent)",
                outcome.state.current_iteration, outcome.state.total_cost
            );
        }
        IterationPhase::Failed { error } => {
            println!(
                "Failed after {} iteration(s), ${:.2} spent: {error}",
                outcome.state.current_iteration, outcome.state.total_cost
            );
        }
        other => println!("Loop stopped in phase {}", other.name()),
    }

    if let Some(decision) = &outcome.decision {
        println!("Verdict: {}", decision.reason);
        if decision.should_merge {
            println!(
                "Merge: allowed{}",
                if decision.auto_merge_eligible {
                    " (auto-merge eligible)"
                } else {
                    ""
                }
            );
        }
        if decision.requires_human_approval {
            println!("Human approval required:");
            for trigger in &decision.approval_triggers {
                println!("   - {trigger}");
            }
        }
        for warning in &decision.warnings {
            println!("Advisory: {warning}");
        }
    }
    Ok(())
}
