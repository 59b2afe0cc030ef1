//! Streaming code generation.
//!
//! A generation yields every content fragment as it arrives and then
//! exactly one terminal event: the extracted code, or a failure. Request
//! errors, stream interruptions and replies without a usable code block
//! all end the same way; the reason string is only meant for logs.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, info, warn};

use crate::client::{CompletionService, TextStream};
use crate::extract::CodeExtractor;
use crate::prompts::{GenerationMode, DEFAULT_MAX_TOKENS};
use crate::title::{clean_title, fallback_title, title_request};
use crate::types::ChatRequest;

/// Item of a generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// Raw model output, for live display.
    Chunk(String),
    /// Final extracted source code.
    Code(String),
    /// Final failure; the text describes why.
    Failed(String),
}

impl GenerationEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationEvent::Chunk(_))
    }
}

pub type GenerationStream = BoxStream<'static, GenerationEvent>;

struct GenerationState {
    service: Arc<dyn CompletionService>,
    request: ChatRequest,
    extractor: CodeExtractor,
    mode: &'static str,
    text: Option<TextStream>,
    buffer: String,
    done: bool,
}

impl GenerationState {
    fn finish(mut self, event: GenerationEvent) -> Option<(GenerationEvent, Self)> {
        self.done = true;
        self.text = None;
        Some((event, self))
    }
}

/// Produces game code through a [`CompletionService`].
#[derive(Clone)]
pub struct CodeGenerator {
    service: Arc<dyn CompletionService>,
    model: String,
    max_tokens: u32,
    extractor: CodeExtractor,
}

impl CodeGenerator {
    pub fn new(service: Arc<dyn CompletionService>, model: impl Into<String>) -> Self {
        Self {
            service,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            extractor: CodeExtractor::default(),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn service(&self) -> &Arc<dyn CompletionService> {
        &self.service
    }

    /// Run a generation in the given mode.
    pub fn generate(&self, mode: &GenerationMode) -> GenerationStream {
        info!("Starting {} generation with model {}", mode.name(), self.model);

        let state = GenerationState {
            service: self.service.clone(),
            request: mode.request(&self.model, self.max_tokens),
            extractor: self.extractor.clone(),
            mode: mode.name(),
            text: None,
            buffer: String::new(),
            done: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }

            if state.text.is_none() {
                let opened = state.service.stream_chat(&state.request).await;
                match opened {
                    Ok(text) => state.text = Some(text),
                    Err(e) => {
                        warn!("{} request failed: {}", state.mode, e);
                        let reason = format!("request failed: {}", e);
                        return state.finish(GenerationEvent::Failed(reason));
                    }
                }
            }

            let next = match state.text.as_mut() {
                Some(text) => text.next().await,
                None => None,
            };

            match next {
                Some(Ok(chunk)) => {
                    state.buffer.push_str(&chunk);
                    Some((GenerationEvent::Chunk(chunk), state))
                }
                Some(Err(e)) => {
                    warn!("{} stream interrupted: {}", state.mode, e);
                    let reason = format!("stream interrupted: {}", e);
                    state.finish(GenerationEvent::Failed(reason))
                }
                None => {
                    debug!(
                        "{} stream ended after {} bytes",
                        state.mode,
                        state.buffer.len()
                    );
                    let event = match state.extractor.extract(&state.buffer) {
                        Some(code) => GenerationEvent::Code(code),
                        None => {
                            warn!("{} reply contained no usable code block", state.mode);
                            GenerationEvent::Failed("no usable code block in reply".to_string())
                        }
                    };
                    state.finish(event)
                }
            }
        })
        .boxed()
    }

    /// Short title for a game prompt, falling back to the prompt's first words.
    pub async fn generate_title(&self, prompt: &str) -> String {
        let request = title_request(&self.model, prompt);
        match self.service.complete(&request).await {
            Ok(raw) => match clean_title(&raw) {
                Some(title) => {
                    debug!("Generated title: {}", title);
                    return title;
                }
                None => debug!("Model returned an empty title"),
            },
            Err(e) => warn!("Failed to generate title: {}", e),
        }

        let title = fallback_title(prompt);
        debug!("Using fallback title: {}", title);
        title
    }
}
