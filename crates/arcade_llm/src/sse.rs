//! Server-sent event decoding for streamed chat completions.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, warn};

use crate::client::TextStream;
use crate::error::LlmError;
use crate::types::ChatChunk;

/// Classification of a single event-stream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// A `data:` payload.
    Data(&'a str),
    /// The `data: [DONE]` terminator.
    Done,
    /// Blank lines, comments and other fields.
    Ignore,
}

pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Ignore;
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        SseLine::Done
    } else if payload.is_empty() {
        SseLine::Ignore
    } else {
        SseLine::Data(payload)
    }
}

/// Text content carried by one chunk payload, if any.
pub fn chunk_content(payload: &str) -> Result<Option<String>, serde_json::Error> {
    let chunk: ChatChunk = serde_json::from_str(payload)?;
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

struct DecodeState<S> {
    inner: Pin<Box<S>>,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    idle: Duration,
    finished: bool,
}

impl<S> DecodeState<S> {
    /// Returns false once the terminator has been seen.
    fn handle_line(&mut self, raw: &[u8]) -> bool {
        let line = String::from_utf8_lossy(raw);
        match parse_sse_line(&line) {
            SseLine::Done => {
                debug!("Completion stream finished");
                false
            }
            SseLine::Ignore => true,
            SseLine::Data(payload) => {
                match chunk_content(payload) {
                    Ok(Some(text)) => self.pending.push_back(text),
                    Ok(None) => {}
                    Err(e) => warn!("Skipping malformed stream chunk: {}", e),
                }
                true
            }
        }
    }

    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if !self.handle_line(&line) {
                self.finished = true;
                self.buffer.clear();
                return;
            }
        }
    }
}

/// Decode a raw response body into a stream of content fragments.
///
/// Lines are split on raw bytes so multi-byte characters that straddle
/// network chunks survive. Each wait for the next chunk is bounded by
/// `idle`; an expired wait ends the stream with [`LlmError::Timeout`].
pub fn decode_chat_stream<S, B, E>(inner: S, idle: Duration) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeState {
        inner: Box::pin(inner),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        idle,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Some((Ok(text), state));
            }
            if state.finished {
                return None;
            }

            match tokio::time::timeout(state.idle, state.inner.next()).await {
                Err(_) => {
                    state.finished = true;
                    let secs = state.idle.as_secs();
                    return Some((Err(LlmError::Timeout(secs)), state));
                }
                Ok(None) => {
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    if !rest.is_empty() {
                        state.handle_line(&rest);
                    }
                }
                Ok(Some(Err(e))) => {
                    state.finished = true;
                    return Some((Err(LlmError::Transport(e.to_string())), state));
                }
                Ok(Some(Ok(bytes))) => {
                    state.buffer.extend_from_slice(bytes.as_ref());
                    state.drain_lines();
                }
            }
        }
    })
    .boxed()
}
