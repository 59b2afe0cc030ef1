//! Create command - Generate a new game and launch it.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::{follow_game, join_words, run_session, AppContext, CliError};

#[derive(Args)]
pub struct CreateArgs {
    /// Description of the game to generate
    #[arg(required = true, num_args = 1..)]
    pub prompt: Vec<String>,

    /// Leave the game running and return immediately
    #[arg(long)]
    pub detach: bool,
}

pub async fn execute(args: CreateArgs, ctx: &AppContext) -> Result<()> {
    let prompt = join_words(&args.prompt);
    if prompt.is_empty() {
        return Err(CliError::InvalidInput("Prompt is required".to_string()).into());
    }

    info!("Creating game with model {}", ctx.settings.model);
    let engine = ctx.engine()?;
    let id = run_session(ctx, engine.spawn_create(prompt)).await?;

    follow_game(ctx, &engine, &id, args.detach).await
}
