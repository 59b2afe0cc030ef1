//! Error types for the runner module.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that prevent a game from being started or stopped at all.
///
/// A game that starts and then crashes is not an error; it is reported
/// as [`crate::LaunchOutcome::Failed`].
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Game source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to start '{interpreter}': {source}")]
    SpawnFailed {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for game process: {0}")]
    WaitFailed(String),

    #[error("Failed to stop game process {pid}: {message}")]
    StopFailed { pid: u32, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
