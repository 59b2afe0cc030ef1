//! # arcade_llm
//!
//! Talks to a local OpenAI-compatible model server and turns its streamed
//! replies into game source code.
//!
//! - [`LemonadeClient`] implements [`CompletionService`] over HTTP.
//! - [`CodeGenerator`] wraps a service call in one of three modes
//!   (create, remix, debug) and yields text chunks followed by a single
//!   final result.
//! - [`CodeExtractor`] pulls the fenced code block out of a reply.

pub mod client;
pub mod error;
pub mod extract;
pub mod generator;
pub mod mock;
pub mod prompts;
pub mod sse;
pub mod title;
pub mod types;

pub use client::{ClientConfig, CompletionService, LemonadeClient, TextStream};
pub use error::{LlmError, LlmResult};
pub use extract::CodeExtractor;
pub use generator::{CodeGenerator, GenerationEvent, GenerationStream};
pub use mock::{MockCompletion, MockReply};
pub use prompts::GenerationMode;
pub use types::{ChatMessage, ChatRequest, MessageRole};
