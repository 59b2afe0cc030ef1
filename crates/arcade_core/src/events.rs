//! Session event stream.
//!
//! Every create, remix or launch session reports progress as an ordered
//! series of events ending in exactly one `Complete` or `Error`.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One event of a session stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GameEvent {
    Status {
        message: String,
    },
    Content {
        content: String,
    },
    Complete {
        game_id: String,
        message: String,
    },
    Error {
        message: String,
    },
    /// Any event type this build does not know.
    #[serde(other)]
    Unknown,
}

impl GameEvent {
    pub fn status(message: impl Into<String>) -> Self {
        GameEvent::Status {
            message: message.into(),
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        GameEvent::Content {
            content: content.into(),
        }
    }

    pub fn complete(game_id: impl Into<String>, message: impl Into<String>) -> Self {
        GameEvent::Complete {
            game_id: game_id.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        GameEvent::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GameEvent::Complete { .. } | GameEvent::Error { .. })
    }

    /// `data: <json>\n\n` framing for text event streams.
    pub fn to_sse_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("data: {}\n\n", json)
    }

    /// Parse a single `data:` line back into an event.
    pub fn from_sse_line(line: &str) -> Option<Self> {
        let payload = line.trim().strip_prefix("data:")?.trim();
        serde_json::from_str(payload).ok()
    }
}

/// Sending half of a session stream.
///
/// Sends never fail from the caller's point of view; a dropped receiver
/// just means nobody is listening anymore.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<GameEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GameEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, event: GameEvent) {
        let _ = self.tx.send(event);
    }

    pub fn status(&self, message: impl Into<String>) {
        self.send(GameEvent::status(message));
    }

    pub fn content(&self, content: impl Into<String>) {
        self.send(GameEvent::content(content));
    }

    pub fn complete(&self, game_id: impl Into<String>, message: impl Into<String>) {
        self.send(GameEvent::complete(game_id, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(GameEvent::error(message));
    }
}
