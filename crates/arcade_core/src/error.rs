//! Error types for the core module.

use thiserror::Error;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Game not found: {0}")]
    GameNotFound(String),

    #[error("Built-in game '{0}' cannot be modified")]
    BuiltinGame(String),

    #[error("Another game is already running")]
    AlreadyRunning,

    #[error("Game id already exists: {0}")]
    DuplicateId(String),

    #[error("Invalid settings: {0}")]
    Settings(String),

    #[error("Runner error: {0}")]
    Runner(#[from] arcade_runner::RunnerError),

    #[error("Model server error: {0}")]
    Llm(#[from] arcade_llm::LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
