//! Show command - Print a game's metadata or source.

use anyhow::Result;
use clap::Args;

use super::list::{artifact_json, created_label};
use super::{AppContext, CliError};

#[derive(Args)]
pub struct ShowArgs {
    /// Id of the game
    pub id: String,

    /// Print the game's source code instead of its metadata
    #[arg(long)]
    pub source: bool,

    /// Print metadata as JSON
    #[arg(long, conflicts_with = "source")]
    pub json: bool,
}

pub async fn execute(args: ShowArgs, ctx: &AppContext) -> Result<()> {
    let engine = ctx.engine()?;
    let game = engine
        .game_metadata(&args.id)
        .ok_or_else(|| CliError::NotFound(format!("Game not found: {}", args.id)))?;

    if args.source {
        print!("{}", engine.game_source(&game.id)?);
        return Ok(());
    }

    let running = ctx.active_games().await.contains(&game.id);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&artifact_json(&game, running))?);
        return Ok(());
    }

    println!("Id:      {}", game.id);
    println!("Title:   {}", game.title);
    if let Some(prompt) = game.visible_prompt() {
        println!("Prompt:  {}", prompt);
    }
    println!("Created: {}", created_label(&game));
    println!("File:    {}", game.source_location.display());
    println!("Running: {}", if running { "yes" } else { "no" });
    Ok(())
}
