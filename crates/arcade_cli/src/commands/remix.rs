//! Remix command - Generate a variant of an existing game.

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::{follow_game, join_words, run_session, AppContext, CliError};

#[derive(Args)]
pub struct RemixArgs {
    /// Id of the game to remix
    pub id: String,

    /// What to change
    #[arg(required = true, num_args = 1..)]
    pub instruction: Vec<String>,

    /// Leave the remixed game running and return immediately
    #[arg(long)]
    pub detach: bool,
}

pub async fn execute(args: RemixArgs, ctx: &AppContext) -> Result<()> {
    let instruction = join_words(&args.instruction);
    if instruction.is_empty() {
        return Err(CliError::InvalidInput("Remix instructions are required".to_string()).into());
    }

    info!("Remixing game {}", args.id);
    let engine = ctx.engine()?;
    let id = run_session(ctx, engine.spawn_remix(args.id, instruction)).await?;

    follow_game(ctx, &engine, &id, args.detach).await
}
