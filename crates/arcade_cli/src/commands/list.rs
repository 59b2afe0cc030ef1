//! List command - Show saved and built-in games.

use anyhow::Result;
use arcade_core::Artifact;
use clap::Args;
use serde_json::{json, Value};

use super::AppContext;

#[derive(Args)]
pub struct ListArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ListArgs, ctx: &AppContext) -> Result<()> {
    let engine = ctx.engine()?;
    let games = engine.list_games();
    let active = ctx.active_games().await;

    if args.json {
        let entries: Vec<Value> = games
            .iter()
            .map(|game| artifact_json(game, active.contains(&game.id)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if games.is_empty() {
        println!("No games yet. Try: arcade create \"snake but the food moves\"");
        return Ok(());
    }

    println!("{:<18} {:<30} {:<17} {}", "ID", "TITLE", "CREATED", "STATE");
    for game in &games {
        let state = if active.contains(&game.id) { "running" } else { "" };
        println!(
            "{:<18} {:<30} {:<17} {}",
            game.id,
            game.title,
            created_label(game),
            state
        );
    }
    Ok(())
}

pub(crate) fn artifact_json(game: &Artifact, running: bool) -> Value {
    json!({
        "id": game.id,
        "title": game.title,
        "prompt": game.visible_prompt(),
        "created": game.created,
        "builtin": game.is_builtin,
        "file": game.source_location.display().to_string(),
        "running": running,
    })
}

pub(crate) fn created_label(game: &Artifact) -> String {
    if game.is_builtin {
        return "built-in".to_string();
    }
    chrono::DateTime::from_timestamp(game.created as i64, 0)
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
