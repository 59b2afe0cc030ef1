//! Game lifecycle engine.
//!
//! Drives create, remix and launch sessions: generate code through the
//! model, persist it, launch it, and on an early crash ask the model for a
//! fix and try once more. Every session reports through an [`EventSink`]
//! and ends with exactly one terminal event.

use std::sync::Arc;

use arcade_llm::{CodeGenerator, GenerationEvent, GenerationMode, LemonadeClient};
use arcade_runner::{GameRunner, LaunchOutcome, ProcessRunner};
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

use crate::artifact::{remix_title, Artifact};
use crate::catalog::Catalog;
use crate::error::{CoreError, CoreResult};
use crate::events::{EventSink, GameEvent};
use crate::running::{LaunchSlot, RunningGames};
use crate::settings::ArcadeSettings;

/// Bound on automatic repair attempts per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairPolicy {
    pub max_repairs: u32,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self { max_repairs: 1 }
    }
}

/// State of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Generating,
    Extracting,
    Launching,
    Repairing,
    Succeeded,
    Failed,
}

/// What started a session; decides the success message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionKind {
    Create,
    Remix,
    Launch,
}

impl SessionKind {
    fn success_message(self, title: &str) -> String {
        match self {
            SessionKind::Create => format!("Game '{}' created and launched successfully!", title),
            SessionKind::Remix => format!("Game '{}' remixed and launched successfully!", title),
            SessionKind::Launch => format!("Game '{}' launched successfully!", title),
        }
    }
}

/// Per-request state of the launch and repair loop.
#[derive(Debug)]
struct RetrySession {
    kind: SessionKind,
    artifact_id: String,
    title: String,
    attempts: u32,
    current_source: Option<String>,
    first_diagnostic: Option<String>,
    last_diagnostic: Option<String>,
    phase: LifecyclePhase,
}

impl RetrySession {
    fn new(kind: SessionKind, artifact_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind,
            artifact_id: artifact_id.into(),
            title: title.into(),
            attempts: 0,
            current_source: None,
            first_diagnostic: None,
            last_diagnostic: None,
            phase: LifecyclePhase::Generating,
        }
    }

    fn transition(&mut self, phase: LifecyclePhase) {
        debug!(
            "Game {}: {:?} -> {:?} (attempt {})",
            self.artifact_id, self.phase, phase, self.attempts
        );
        self.phase = phase;
    }

    fn record_failure(&mut self, diagnostic: &str) {
        if self.first_diagnostic.is_none() {
            self.first_diagnostic = Some(diagnostic.to_string());
        }
        self.last_diagnostic = Some(diagnostic.to_string());
    }

    fn original_diagnostic(&self) -> &str {
        self.first_diagnostic
            .as_deref()
            .or(self.last_diagnostic.as_deref())
            .unwrap_or_default()
    }
}

/// Outcome of streaming one generation into a session.
enum Generated {
    Code(String),
    Failed(String),
}

fn error_block(heading: &str, message: &str) -> String {
    format!("\n\n---\n\n> ❌ **{}**  \n> {}\n\n---\n\n", heading, message)
}

fn repair_separator(diagnostic: &str) -> String {
    format!(
        "\n\n---\n\n# ⚠️ ERROR ENCOUNTERED\n\n\
         > 🔧 **The generated game encountered an error during launch.**  \n\
         > **Attempting to automatically fix the code...**\n\n\
         **Error Details:**\n```\n{}\n```\n\n---\n\n\
         ## 🛠️ Fix Attempt:\n\n",
        diagnostic
    )
}

/// Orchestrates game sessions over a catalog, a runner and a generator.
pub struct ArcadeEngine {
    catalog: Arc<Catalog>,
    running: Arc<RunningGames>,
    runner: Arc<dyn GameRunner>,
    generator: CodeGenerator,
    policy: RepairPolicy,
}

impl ArcadeEngine {
    pub fn new(catalog: Arc<Catalog>, runner: Arc<dyn GameRunner>, generator: CodeGenerator) -> Self {
        let running = Arc::new(RunningGames::new(runner.stop_timeout()));
        Self {
            catalog,
            running,
            runner,
            generator,
            policy: RepairPolicy::default(),
        }
    }

    /// Engine wired to a local model server and real game processes.
    pub fn from_settings(settings: &ArcadeSettings) -> CoreResult<Self> {
        let client = LemonadeClient::new(settings.client_config())?;
        let generator = CodeGenerator::new(Arc::new(client), settings.model.clone())
            .with_max_tokens(settings.max_tokens);
        let runner = ProcessRunner::new(settings.launch_config());
        let catalog = Catalog::load(settings.games_dir(), settings.resolve_builtin_dir());

        Ok(Self::new(Arc::new(catalog), Arc::new(runner), generator))
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn running(&self) -> &Arc<RunningGames> {
        &self.running
    }

    pub fn model(&self) -> &str {
        self.generator.model()
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Generate a new game from `prompt`, save it and launch it.
    pub async fn create_game(&self, prompt: &str, sink: &EventSink) {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            sink.error("Prompt is required");
            return;
        }

        let id = self.catalog.new_id();
        let mut session = RetrySession::new(SessionKind::Create, &id, "");
        info!("Creating game {} from prompt: {}", id, prompt);

        sink.status("Connecting to LLM...");
        let mode = GenerationMode::Create {
            prompt: prompt.to_string(),
        };
        let code = match self.stream_generation(&mode, sink, &mut session, true).await {
            Generated::Code(code) => code,
            Generated::Failed(_) => {
                session.transition(LifecyclePhase::Failed);
                sink.error("Could not generate valid game code");
                return;
            }
        };

        if let Err(e) = self.catalog.write_source(&id, &code) {
            error!("Failed to save game {}: {}", id, e);
            session.transition(LifecyclePhase::Failed);
            sink.error(format!("Failed to save game: {}", e));
            return;
        }

        sink.status("Creating title...");
        let title = self.generator.generate_title(prompt).await;
        session.title = title.clone();
        session.current_source = Some(code);

        let artifact = Artifact::generated(&id, title, prompt, self.catalog.games_dir());
        if let Err(e) = self.catalog.register(artifact) {
            error!("Failed to register game {}: {}", id, e);
            session.transition(LifecyclePhase::Failed);
            sink.error(format!("Failed to save game: {}", e));
            return;
        }

        sink.status("Launching game...");
        self.launch_loop(&mut session, sink).await;
    }

    /// Generate a variation of an existing user game and launch it.
    pub async fn remix_game(&self, id: &str, instruction: &str, sink: &EventSink) {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            sink.error("Remix instructions are required");
            return;
        }

        let Some(original) = self.catalog.get(id) else {
            sink.error(format!("Game not found: {}", id));
            return;
        };
        if original.is_builtin {
            sink.error("Built-in games cannot be remixed");
            return;
        }
        let source = match self.catalog.read_source(id) {
            Ok(source) => source,
            Err(e) => {
                sink.error(format!("Could not read game source: {}", e));
                return;
            }
        };

        let new_id = self.catalog.new_id();
        let title = remix_title(&original.title);
        let mut session = RetrySession::new(SessionKind::Remix, &new_id, &title);
        info!("Remixing game {} into {} ({})", id, new_id, title);

        sink.status("Connecting to LLM...");
        let mode = GenerationMode::Remix {
            source,
            instruction: instruction.to_string(),
        };
        let code = match self.stream_generation(&mode, sink, &mut session, true).await {
            Generated::Code(code) => code,
            Generated::Failed(_) => {
                session.transition(LifecyclePhase::Failed);
                sink.error("Could not generate valid game code");
                return;
            }
        };

        sink.status("Saving remixed game...");
        let artifact = Artifact::generated(&new_id, &title, instruction, self.catalog.games_dir());
        let saved = self
            .catalog
            .write_source(&new_id, &code)
            .and_then(|_| self.catalog.register(artifact));
        if let Err(e) = saved {
            error!("Failed to save remix {}: {}", new_id, e);
            session.transition(LifecyclePhase::Failed);
            sink.error(format!("Failed to save game: {}", e));
            return;
        }
        session.current_source = Some(code);

        sink.status("Launching remixed game...");
        self.launch_loop(&mut session, sink).await;
    }

    /// Launch an existing game on user request.
    ///
    /// Refused before anything is spawned if another game is running.
    pub async fn launch_game(&self, id: &str, sink: &EventSink) {
        let Some(artifact) = self.catalog.get(id) else {
            sink.error(format!("Game not found: {}", id));
            return;
        };

        let _slot: LaunchSlot = match self.running.try_claim(id) {
            Ok(slot) => slot,
            Err(e) => {
                info!("Launch of {} refused: {}", id, e);
                sink.error(e.to_string());
                return;
            }
        };

        let mut session = RetrySession::new(SessionKind::Launch, id, artifact.title);
        sink.status("Launching game...");
        self.launch_loop(&mut session, sink).await;
    }

    /// Launch, and on an early crash repair and relaunch within the policy.
    async fn launch_loop(&self, session: &mut RetrySession, sink: &EventSink) {
        loop {
            session.transition(LifecyclePhase::Launching);
            let id = session.artifact_id.clone();

            let Some(artifact) = self.catalog.get(&id) else {
                session.transition(LifecyclePhase::Failed);
                sink.error(format!("Game not found: {}", id));
                return;
            };
            let path = artifact.source_location.clone();
            if !path.exists() {
                error!("Game file not found: {}", path.display());
                session.transition(LifecyclePhase::Failed);
                sink.error(format!("Game file not found: {}", path.display()));
                return;
            }

            let failure = match self.runner.launch(&path).await {
                Ok(LaunchOutcome::Running(handle)) => {
                    self.running.track(&id, handle).await;
                    session.transition(LifecyclePhase::Succeeded);
                    sink.complete(&id, session.kind.success_message(&session.title));
                    return;
                }
                Ok(LaunchOutcome::Failed(failure)) => failure,
                Err(e) => {
                    error!("Could not start game {}: {}", id, e);
                    session.transition(LifecyclePhase::Failed);
                    sink.error(format!("Failed to launch game: {}", e));
                    return;
                }
            };

            let exit_code = failure.display_code();
            let diagnostic = failure.diagnostic;
            session.record_failure(&diagnostic);
            warn!(
                "Game {} failed on attempt {} (exit code {})",
                id, session.attempts, exit_code
            );

            if artifact.is_builtin {
                session.transition(LifecyclePhase::Failed);
                let message = format!("Game '{}' failed to launch: {}", session.title, diagnostic);
                sink.content(error_block("LAUNCH FAILED", &message));
                sink.error(message);
                return;
            }

            if session.attempts >= self.policy.max_repairs {
                session.transition(LifecyclePhase::Failed);
                let message = format!(
                    "Game '{}' failed to launch after {} automatic fix attempts: {}",
                    session.title,
                    self.policy.max_repairs,
                    session.original_diagnostic()
                );
                sink.content(error_block("MAX RETRIES EXCEEDED", &message));
                sink.error(message);
                return;
            }

            session.transition(LifecyclePhase::Repairing);
            info!("Attempting automatic fix {} for game {}", session.attempts + 1, id);
            sink.status("Game hit an error, trying to fix it...");
            sink.content(repair_separator(&diagnostic));

            let source = match session.current_source.clone() {
                Some(source) => source,
                None => match self.catalog.read_source(&id) {
                    Ok(source) => source,
                    Err(e) => {
                        self.fail_fix_attempt(session, sink, &e.to_string());
                        return;
                    }
                },
            };

            let mode = GenerationMode::Debug {
                source,
                diagnostic: diagnostic.clone(),
            };
            match self.stream_generation(&mode, sink, session, false).await {
                Generated::Code(fixed) => {
                    if let Err(e) = self.catalog.write_source(&id, &fixed) {
                        self.fail_fix_attempt(session, sink, &e.to_string());
                        return;
                    }
                    info!("Fixed code saved for game {}", id);
                    session.current_source = Some(fixed);
                    session.attempts += 1;
                }
                Generated::Failed(reason) => {
                    warn!("Could not get fixed code for game {}: {}", id, reason);
                    session.transition(LifecyclePhase::Failed);
                    let message = format!(
                        "Game '{}' failed to launch and could not be automatically fixed: {}",
                        session.title,
                        session.original_diagnostic()
                    );
                    sink.content(error_block("FINAL ERROR", &message));
                    sink.error(message);
                    return;
                }
            }
        }
    }

    fn fail_fix_attempt(&self, session: &mut RetrySession, sink: &EventSink, reason: &str) {
        error!("Fix attempt for {} failed: {}", session.artifact_id, reason);
        session.transition(LifecyclePhase::Failed);
        sink.content(error_block(
            "FIX ATTEMPT FAILED",
            &format!("Error during automatic fix: {}", reason),
        ));
        sink.error(format!(
            "Game launch failed during fix attempt: {}",
            session.original_diagnostic()
        ));
    }

    /// Forward a generation to `sink` and return its final result.
    async fn stream_generation(
        &self,
        mode: &GenerationMode,
        sink: &EventSink,
        session: &mut RetrySession,
        announce: bool,
    ) -> Generated {
        if announce {
            session.transition(LifecyclePhase::Generating);
        }

        let mut stream = self.generator.generate(mode);
        let mut started = false;

        while let Some(event) = stream.next().await {
            match event {
                GenerationEvent::Chunk(text) => {
                    if announce && !started {
                        sink.status("Generating code...");
                        started = true;
                    }
                    sink.content(text);
                }
                GenerationEvent::Code(code) => {
                    if announce {
                        session.transition(LifecyclePhase::Extracting);
                        sink.status("Extracting code...");
                    }
                    return Generated::Code(code);
                }
                GenerationEvent::Failed(reason) => {
                    warn!("{} generation failed: {}", mode.name(), reason);
                    return Generated::Failed(reason);
                }
            }
        }

        Generated::Failed("generation ended without a result".to_string())
    }

    // ------------------------------------------------------------------
    // Spawned sessions
    // ------------------------------------------------------------------

    /// Run a create session on its own task.
    pub fn spawn_create(self: &Arc<Self>, prompt: impl Into<String>) -> UnboundedReceiver<GameEvent> {
        let (sink, rx) = EventSink::channel();
        let engine = Arc::clone(self);
        let prompt = prompt.into();
        tokio::spawn(async move { engine.create_game(&prompt, &sink).await });
        rx
    }

    /// Run a remix session on its own task.
    pub fn spawn_remix(
        self: &Arc<Self>,
        id: impl Into<String>,
        instruction: impl Into<String>,
    ) -> UnboundedReceiver<GameEvent> {
        let (sink, rx) = EventSink::channel();
        let engine = Arc::clone(self);
        let (id, instruction) = (id.into(), instruction.into());
        tokio::spawn(async move { engine.remix_game(&id, &instruction, &sink).await });
        rx
    }

    /// Run a launch session on its own task.
    pub fn spawn_launch(self: &Arc<Self>, id: impl Into<String>) -> UnboundedReceiver<GameEvent> {
        let (sink, rx) = EventSink::channel();
        let engine = Arc::clone(self);
        let id = id.into();
        tokio::spawn(async move { engine.launch_game(&id, &sink).await });
        rx
    }

    // ------------------------------------------------------------------
    // Catalog operations
    // ------------------------------------------------------------------

    pub async fn stop_game(&self, id: &str) -> bool {
        self.running.stop(id).await
    }

    pub async fn stop_all(&self) {
        self.running.stop_all().await;
    }

    /// Stop, then remove a user game's source and metadata.
    pub async fn delete_game(&self, id: &str) -> CoreResult<()> {
        let artifact = self
            .catalog
            .get(id)
            .ok_or_else(|| CoreError::GameNotFound(id.to_string()))?;
        if artifact.is_builtin {
            return Err(CoreError::BuiltinGame(id.to_string()));
        }

        self.running.stop(id).await;
        self.catalog.delete_source(id)?;
        self.catalog.remove(id)?;
        info!("Deleted game {}", id);
        Ok(())
    }

    /// Whether `id` is running; exited games are reaped first.
    pub fn game_status(&self, id: &str) -> bool {
        self.running.is_running(id)
    }

    pub fn game_pid(&self, id: &str) -> Option<u32> {
        self.running.pid_of(id)
    }

    pub fn list_games(&self) -> Vec<Artifact> {
        self.catalog.list()
    }

    pub fn game_metadata(&self, id: &str) -> Option<Artifact> {
        self.catalog.get(id)
    }

    pub fn game_source(&self, id: &str) -> CoreResult<String> {
        self.catalog.read_source(id)
    }

    pub async fn server_online(&self) -> bool {
        self.generator.service().is_online().await
    }

    /// Models offered by the server; empty if it cannot be reached.
    pub async fn available_models(&self) -> Vec<String> {
        match self.generator.service().list_models().await {
            Ok(models) => models,
            Err(e) => {
                debug!("Could not list models: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_keeps_first_diagnostic() {
        let mut session = RetrySession::new(SessionKind::Launch, "g", "Game");
        session.record_failure("NameError: a");
        session.record_failure("TypeError: b");
        assert_eq!(session.original_diagnostic(), "NameError: a");
        assert_eq!(session.last_diagnostic.as_deref(), Some("TypeError: b"));
    }

    #[test]
    fn test_repair_separator_contains_diagnostic() {
        let text = repair_separator("SyntaxError: invalid syntax");
        assert!(text.contains("ERROR ENCOUNTERED"));
        assert!(text.contains("```\nSyntaxError: invalid syntax\n```"));
        assert!(text.ends_with("## 🛠️ Fix Attempt:\n\n"));
    }

    #[test]
    fn test_success_message_per_kind() {
        assert_eq!(
            SessionKind::Create.success_message("Pong"),
            "Game 'Pong' created and launched successfully!"
        );
        assert_eq!(
            SessionKind::Remix.success_message("Pong v2"),
            "Game 'Pong v2' remixed and launched successfully!"
        );
        assert_eq!(
            SessionKind::Launch.success_message("Pong"),
            "Game 'Pong' launched successfully!"
        );
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(RepairPolicy::default().max_repairs, 1);
    }
}
