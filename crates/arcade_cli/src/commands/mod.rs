//! CLI command definitions.
//!
//! Each subcommand maps to one engine operation. Session commands (create,
//! remix, launch) print the event stream and then follow the running game.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use arcade_core::settings::ENV_DATA_DIR;
use arcade_core::{ArcadeEngine, ArcadeSettings, CoreError, GameEvent};

use crate::active::ActiveGames;

pub mod create;
pub mod delete;
pub mod launch;
pub mod list;
pub mod remix;
pub mod show;
pub mod status;
pub mod stop;

/// Arcade - generate, launch and repair pygame games with a local model
#[derive(Parser)]
#[command(name = "arcade")]
#[command(version, about = "Arcade - generate and play pygame games with a local model")]
#[command(long_about = r#"
Arcade asks a locally hosted model to write a small pygame game from a
description, saves it, launches it, and asks the model for one fix if the
game crashes on start-up.

COMMANDS:
  create   → Generate a new game and launch it
  remix    → Generate a variant of an existing game and launch it
  launch   → Launch a saved game (one automatic fix on early crash)
  stop     → Stop a running game
  list     → List saved and built-in games
  show     → Show a game's details or source
  delete   → Delete a generated game
  status   → Show model server status

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or unknown game
  3 - Generation or launch failure
  4 - Another game is already running
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Model server base URL
    #[arg(long, global = true)]
    pub server_url: Option<String>,

    /// Model used for generation
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Data directory holding settings and generated games
    #[arg(long, global = true, env = "ARCADE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// How session events are written to stdout
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a new game from a description and launch it
    Create(create::CreateArgs),

    /// Generate a variant of an existing game and launch it
    Remix(remix::RemixArgs),

    /// Launch a saved game
    Launch(launch::LaunchArgs),

    /// Stop a running game
    Stop(stop::StopArgs),

    /// List games
    List(list::ListArgs),

    /// Show a game's metadata or source
    Show(show::ShowArgs),

    /// Delete a generated game
    Delete(delete::DeleteArgs),

    /// Show model server status and available models
    Status(status::StatusArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `data: {json}` frames, one per event
    Sse,
    /// Human-readable progress lines
    Text,
}

/// Failures that map to dedicated exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Another game is already running")]
    AlreadyRunning,

    #[error("{0}")]
    SessionFailed(String),
}

impl CliError {
    /// Classify the message of a session's terminal error event.
    pub fn from_session(message: String) -> Self {
        if message == CoreError::AlreadyRunning.to_string() {
            CliError::AlreadyRunning
        } else if message.starts_with("Game not found") {
            CliError::NotFound(message)
        } else if message.ends_with("required") || message.contains("cannot be remixed") {
            CliError::InvalidInput(message)
        } else {
            CliError::SessionFailed(message)
        }
    }
}

/// Settings and output options shared by every command.
pub struct AppContext {
    pub settings: ArcadeSettings,
    pub format: OutputFormat,
}

impl AppContext {
    /// Environment and settings file first, then command-line flags.
    pub fn from_cli(cli: &Cli) -> Self {
        let data_dir = cli.data_dir.clone();
        let mut settings = ArcadeSettings::load_with(|key| match (&data_dir, key) {
            (Some(dir), ENV_DATA_DIR) => Some(dir.display().to_string()),
            _ => std::env::var(key).ok(),
        });

        if let Some(url) = &cli.server_url {
            settings.server_url = url.clone();
        }
        if let Some(model) = &cli.model {
            settings.model = model.clone();
        }

        Self {
            settings,
            format: cli.format,
        }
    }

    pub fn engine(&self) -> Result<Arc<ArcadeEngine>> {
        let engine = ArcadeEngine::from_settings(&self.settings)
            .context("Failed to initialize the game engine")?;
        Ok(Arc::new(engine))
    }

    /// Games running under any `arcade` invocation.
    pub async fn active_games(&self) -> ActiveGames {
        ActiveGames::open(&self.settings.data_dir).await
    }

    /// Refuse to start a game while another is running.
    pub async fn ensure_idle(&self) -> Result<()> {
        let running = self.active_games().await.running_ids();
        if running.is_empty() {
            return Ok(());
        }
        info!("Refusing launch: {} already running", running.join(", "));
        let refusal = GameEvent::error(CoreError::AlreadyRunning.to_string());
        render_event(&mut io::stdout(), &refusal, self.format)?;
        Err(CliError::AlreadyRunning.into())
    }
}

/// Write one event in the chosen format.
pub fn render_event<W: Write>(out: &mut W, event: &GameEvent, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Sse => out.write_all(event.to_sse_frame().as_bytes())?,
        OutputFormat::Text => match event {
            GameEvent::Status { message } => writeln!(out, "» {}", message)?,
            GameEvent::Content { content } => out.write_all(content.as_bytes())?,
            GameEvent::Complete { message, .. } => writeln!(out, "\n✅ {}", message)?,
            // Reported on stderr with the exit code
            GameEvent::Error { .. } | GameEvent::Unknown => {}
        },
    }
    out.flush()
}

/// Print a session's events until its terminal event.
///
/// When the session reaches its launch step, games started by other
/// invocations are stopped so only the new one runs. Returns the game id on
/// completion.
pub async fn run_session(ctx: &AppContext, mut events: UnboundedReceiver<GameEvent>) -> Result<String> {
    let mut out = io::stdout();
    while let Some(event) = events.recv().await {
        render_event(&mut out, &event, ctx.format)?;
        match event {
            GameEvent::Status { message } if is_launch_step(&message) => {
                let stopped = ctx.active_games().await.stop_all().await?;
                if !stopped.is_empty() {
                    info!("Stopped {} to make room for the new game", stopped.join(", "));
                }
            }
            GameEvent::Complete { game_id, .. } => return Ok(game_id),
            GameEvent::Error { message } => return Err(CliError::from_session(message).into()),
            _ => {}
        }
    }
    Err(CliError::SessionFailed("Session ended without a result".to_string()).into())
}

/// Status messages the engine sends right before starting a game process.
fn is_launch_step(message: &str) -> bool {
    message.starts_with("Launching")
}

/// Record the running game, then keep it in the foreground unless detached.
pub async fn follow_game(ctx: &AppContext, engine: &ArcadeEngine, id: &str, detach: bool) -> Result<()> {
    let pid = engine.game_pid(id);
    let file = engine
        .game_metadata(id)
        .and_then(|game| game.source_location.file_name().map(|f| f.to_string_lossy().into_owned()));

    match (pid, file) {
        (Some(pid), Some(file)) => {
            ctx.active_games().await.record(id, pid, file)?;
            debug!("Game {} recorded as process {}", id, pid);
        }
        _ => warn!("Game {} has no process id; other invocations cannot see it", id),
    }

    if detach {
        info!("Game {} left running; stop it with `arcade stop {}`", id, id);
        return Ok(());
    }

    let result = wait_for_game(engine, id).await;
    ctx.active_games().await.take(id)?;
    result
}

/// Wait while the game runs; stop it on Ctrl+C.
pub async fn wait_for_game(engine: &ArcadeEngine, id: &str) -> Result<()> {
    eprintln!("Game is running. Press Ctrl+C to stop it.");
    let mut tick = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tick.tick() => {
                if !engine.game_status(id) {
                    info!("Game {} has exited", id);
                    return Ok(());
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                engine.stop_all().await;
                eprintln!("Stopped game {}", id);
                return Ok(());
            }
        }
    }
}

/// Join trailing words into one argument.
pub fn join_words(words: &[String]) -> String {
    words.join(" ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(event: GameEvent, format: OutputFormat) -> String {
        let mut out = Vec::new();
        render_event(&mut out, &event, format).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_render_sse() {
        let out = rendered(GameEvent::status("Generating code..."), OutputFormat::Sse);
        assert_eq!(out, "data: {\"type\":\"status\",\"message\":\"Generating code...\"}\n\n");
    }

    #[test]
    fn test_render_text() {
        assert_eq!(
            rendered(GameEvent::status("Launching game..."), OutputFormat::Text),
            "» Launching game...\n"
        );
        assert_eq!(rendered(GameEvent::content("import pyg"), OutputFormat::Text), "import pyg");
        assert_eq!(rendered(GameEvent::error("boom"), OutputFormat::Text), "");
    }

    #[test]
    fn test_session_error_classes() {
        assert!(matches!(
            CliError::from_session("Another game is already running".to_string()),
            CliError::AlreadyRunning
        ));
        assert!(matches!(
            CliError::from_session("Game not found: abc".to_string()),
            CliError::NotFound(_)
        ));
        assert!(matches!(
            CliError::from_session("Prompt is required".to_string()),
            CliError::InvalidInput(_)
        ));
        assert!(matches!(
            CliError::from_session("Could not generate valid game code".to_string()),
            CliError::SessionFailed(_)
        ));
    }

    #[test]
    fn test_launch_step_messages() {
        assert!(is_launch_step("Launching game..."));
        assert!(is_launch_step("Launching remixed game..."));
        assert!(!is_launch_step("Game hit an error, trying to fix it..."));
        assert!(!is_launch_step("Generating code..."));
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "arcade", "create", "pong", "with", "lasers", "--format", "sse", "--model", "m",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Sse);
        assert_eq!(cli.model.as_deref(), Some("m"));
        match cli.command {
            Commands::Create(args) => assert_eq!(join_words(&args.prompt), "pong with lasers"),
            _ => panic!("expected create"),
        }
    }
}
