//! Delete command - Remove a generated game.

use anyhow::Result;
use clap::Args;
use tracing::warn;

use super::AppContext;

#[derive(Args)]
pub struct DeleteArgs {
    /// Id of the game to delete
    pub id: String,
}

pub async fn execute(args: DeleteArgs, ctx: &AppContext) -> Result<()> {
    let engine = ctx.engine()?;
    engine.delete_game(&args.id).await?;

    if let Some(game) = ctx.active_games().await.take(&args.id)? {
        if let Err(e) = arcade_runner::terminate_pid(game.pid).await {
            warn!("Could not stop process {}: {}", game.pid, e);
        }
    }

    println!("Deleted game {}", args.id);
    Ok(())
}
