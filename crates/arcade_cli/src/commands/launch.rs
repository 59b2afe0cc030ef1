//! Launch command - Run a saved game.

use anyhow::Result;
use clap::Args;

use super::{follow_game, run_session, AppContext};

#[derive(Args)]
pub struct LaunchArgs {
    /// Id of the game to launch
    pub id: String,

    /// Leave the game running and return immediately
    #[arg(long)]
    pub detach: bool,
}

pub async fn execute(args: LaunchArgs, ctx: &AppContext) -> Result<()> {
    ctx.ensure_idle().await?;

    let engine = ctx.engine()?;
    let id = run_session(ctx, engine.spawn_launch(args.id)).await?;

    follow_game(ctx, &engine, &id, args.detach).await
}
