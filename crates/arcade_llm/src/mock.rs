//! Mock completion service for testing.
//!
//! Plays back scripted replies and records every request so tests can
//! check which mode was used and how often the model was called.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;

use crate::client::{CompletionService, TextStream};
use crate::error::{LlmError, LlmResult};
use crate::types::ChatRequest;

/// Scripted reply to a streamed completion.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Stream these chunks, then end normally.
    Chunks(Vec<String>),
    /// Stream these chunks, then fail mid-stream.
    Interrupted(Vec<String>),
    /// Fail before any chunk, e.g. a non-2xx status.
    Rejected(u16),
}

impl MockReply {
    /// A reply carrying `code` in a python fence, split into a few chunks.
    pub fn code(code: &str) -> Self {
        MockReply::Chunks(vec![
            "Here is your game:\n\n".to_string(),
            "```python\n".to_string(),
            code.to_string(),
            "\n```\n".to_string(),
        ])
    }

    pub fn text(text: &str) -> Self {
        MockReply::Chunks(vec![text.to_string()])
    }
}

#[derive(Clone)]
pub struct MockCompletion {
    replies: Arc<RwLock<VecDeque<MockReply>>>,
    titles: Arc<RwLock<VecDeque<LlmResult<String>>>>,
    requests: Arc<RwLock<Vec<ChatRequest>>>,
    online: Arc<RwLock<bool>>,
    models: Arc<RwLock<Vec<String>>>,
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(RwLock::new(VecDeque::new())),
            titles: Arc::new(RwLock::new(VecDeque::new())),
            requests: Arc::new(RwLock::new(Vec::new())),
            online: Arc::new(RwLock::new(true)),
            models: Arc::new(RwLock::new(vec!["mock-model".to_string()])),
        }
    }

    pub fn add_reply(self, reply: MockReply) -> Self {
        self.replies.write().push_back(reply);
        self
    }

    pub fn add_title(self, title: impl Into<String>) -> Self {
        self.titles.write().push_back(Ok(title.into()));
        self
    }

    pub fn set_online(&self, online: bool) {
        *self.online.write() = online;
    }

    /// All requests seen so far, streamed and non-streamed.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.read().clone()
    }

    /// Streamed requests whose system prompt contains `needle`.
    pub fn streamed_requests_matching(&self, needle: &str) -> usize {
        self.requests
            .read()
            .iter()
            .filter(|r| r.stream)
            .filter(|r| r.messages.first().map_or(false, |m| m.content.contains(needle)))
            .count()
    }

    pub fn stream_count(&self) -> usize {
        self.requests.read().iter().filter(|r| r.stream).count()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn stream_chat(&self, request: &ChatRequest) -> LlmResult<TextStream> {
        self.requests.write().push(request.clone());

        let reply = self
            .replies
            .write()
            .pop_front()
            .unwrap_or(MockReply::Chunks(Vec::new()));

        match reply {
            MockReply::Chunks(chunks) => Ok(stream::iter(chunks.into_iter().map(Ok)).boxed()),
            MockReply::Interrupted(chunks) => {
                let items = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(LlmError::Transport(
                        "connection reset".to_string(),
                    ))));
                Ok(stream::iter(items).boxed())
            }
            MockReply::Rejected(status) => Err(LlmError::Status {
                status,
                body: "mock rejection".to_string(),
            }),
        }
    }

    async fn complete(&self, request: &ChatRequest) -> LlmResult<String> {
        self.requests.write().push(request.clone());
        self.titles
            .write()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("no scripted title".to_string())))
    }

    async fn list_models(&self) -> LlmResult<Vec<String>> {
        Ok(self.models.read().clone())
    }

    async fn is_online(&self) -> bool {
        *self.online.read()
    }
}
