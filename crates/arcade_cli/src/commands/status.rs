//! Status command - Report model server availability.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use super::AppContext;

#[derive(Args)]
pub struct StatusArgs {
    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StatusArgs, ctx: &AppContext) -> Result<()> {
    let engine = ctx.engine()?;
    let online = engine.server_online().await;
    let models = if online {
        engine.available_models().await
    } else {
        Vec::new()
    };

    if args.json {
        let status = json!({
            "online": online,
            "serverUrl": ctx.settings.server_url,
            "model": engine.model(),
            "models": models,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let marker = if online { "🟢 online" } else { "🔴 offline" };
    println!("Server:  {} ({})", ctx.settings.server_url, marker);
    println!("Model:   {}", engine.model());
    if !models.is_empty() {
        println!("Models:");
        for model in &models {
            let selected = if model == engine.model() { " *" } else { "" };
            println!("  - {}{}", model, selected);
        }
    }
    println!("Games:   {}", ctx.settings.games_dir().display());
    Ok(())
}
