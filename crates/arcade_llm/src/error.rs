//! Error types for model server calls.

use thiserror::Error;

/// Result type alias for model server operations.
pub type LlmResult<T> = Result<T, LlmError>;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    pub fn is_timeout(&self) -> bool {
        match self {
            LlmError::Timeout(_) => true,
            LlmError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
