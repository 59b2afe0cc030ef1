//! Stop command - Stop a game started by another invocation.

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use super::AppContext;

#[derive(Args)]
pub struct StopArgs {
    /// Id of the game to stop
    pub id: String,
}

pub async fn execute(args: StopArgs, ctx: &AppContext) -> Result<()> {
    // Entries whose process exited or whose pid was reused are already gone
    let mut active = ctx.active_games().await;

    match active.take(&args.id)? {
        Some(game) => {
            info!("Stopping game {} (process {})", args.id, game.pid);
            if let Err(e) = arcade_runner::terminate_pid(game.pid).await {
                warn!("Could not stop process {}: {}", game.pid, e);
            }
            println!("Stopped game {}", args.id);
        }
        None => println!("Game {} is not running", args.id),
    }

    Ok(())
}
