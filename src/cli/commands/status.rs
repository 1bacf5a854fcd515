//! `kaizen status` - report the persisted loop state for a change.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};

use crate::adapters::fs::FsStateRepository;
use crate::application::Operator;
use crate::domain::models::IterationState;
use crate::infrastructure::ConfigLoader;

use super::ChangeArgs;

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub change: ChangeArgs,
}

pub async fn execute(args: StatusArgs, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    let operator = Operator::new(Arc::new(FsStateRepository::new(config.storage.state_dir)));

    let state = operator
        .status(&args.change.repo_key(), &args.change.change_id)
        .await?;

    match state {
        Some(state) => {
            if json_mode {
                println!("{}", serde_json::to_string_pretty(&state)?);
            } else {
                print_state(&state);
            }
        }
        None => {
            if json_mode {
                println!("null");
            } else {
                println!(
                    "No loop state for {}#{}.",
                    args.change.repo_key(),
                    args.change.change_id
                );
            }
        }
    }
    Ok(())
}

fn print_state(state: &IterationState) {
    println!("{}#{}", state.repository, state.change_id);
    println!("   Phase:       {}", state.phase.name());
    println!(
        "   Iterations:  {}/{}",
        state.current_iteration, state.max_iterations
    );
    println!("   Latest score: {:.2}", state.latest_score);
    if let Some(status) = state.convergence_status {
        println!("   Convergence: {}", status.as_str());
    }
    println!("   Total cost:  ${:.2}", state.total_cost);
    println!("   Updated:     {}", state.updated_at.to_rfc3339());

    if state.history.is_empty() {
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            ["#", "SCORE", "DELTA", "ISSUES", "FIXED", "COST", "CHECKER"]
                .iter()
                .map(|h| Cell::new(h).set_alignment(CellAlignment::Left)),
        );
    for record in &state.history {
        table.add_row(vec![
            Cell::new(record.iteration),
            Cell::new(format!("{:.2}", record.quality_score)),
            Cell::new(format!("{:+.2}", record.quality_delta)),
            Cell::new(record.issues_found),
            Cell::new(record.issues_fixed),
            Cell::new(format!("${:.2}", record.cost)),
            Cell::new(&record.checker_summary),
        ]);
    }
    println!("\n{table}");
}
