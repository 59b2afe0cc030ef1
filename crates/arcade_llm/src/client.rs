//! Model server client.
//!
//! Speaks the OpenAI-compatible API exposed by a local Lemonade server:
//! `/api/v1/chat/completions` for generation and `/api/v1/models` for
//! status and model discovery.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tracing::{debug, warn};

use crate::error::{LlmError, LlmResult};
use crate::sse::decode_chat_stream;
use crate::types::{ChatRequest, ChatResponse, ModelList};

/// Stream of content fragments from a streamed completion.
pub type TextStream = BoxStream<'static, LlmResult<String>>;

/// A text-completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Start a streamed completion.
    async fn stream_chat(&self, request: &ChatRequest) -> LlmResult<TextStream>;

    /// Run a non-streamed completion and return the reply text.
    async fn complete(&self, request: &ChatRequest) -> LlmResult<String>;

    /// Ids of the models the server can serve.
    async fn list_models(&self) -> LlmResult<Vec<String>>;

    /// Whether the server is reachable.
    async fn is_online(&self) -> bool;
}

/// Connection settings for [`LemonadeClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Longest gap allowed between streamed chunks.
    pub idle_timeout: Duration,
    /// Overall timeout for non-streamed completions.
    pub request_timeout: Duration,
    /// Timeout for status and model-list calls.
    pub status_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }
}

/// HTTP client for a Lemonade model server.
pub struct LemonadeClient {
    config: ClientConfig,
    client: reqwest::Client,
}

impl LemonadeClient {
    pub fn new(config: ClientConfig) -> LlmResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { config, client })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn timeout_error(err: reqwest::Error, timeout: Duration) -> LlmError {
        if err.is_timeout() {
            LlmError::Timeout(timeout.as_secs())
        } else {
            LlmError::Http(err)
        }
    }

    async fn check_status(response: reqwest::Response) -> LlmResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(LlmError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn check_endpoint(&self, url: &str, timeout: Duration) -> Result<bool, reqwest::Error> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        debug!("{} answered {}", url, response.status());
        Ok(response.status() == reqwest::StatusCode::OK)
    }
}

#[async_trait]
impl CompletionService for LemonadeClient {
    async fn stream_chat(&self, request: &ChatRequest) -> LlmResult<TextStream> {
        let url = self.api_url("chat/completions");
        debug!("Streaming completion from {} with model {}", url, request.model);

        let idle = self.config.idle_timeout;
        let send = self.client.post(&url).json(request).send();
        let response = tokio::time::timeout(idle, send)
            .await
            .map_err(|_| LlmError::Timeout(idle.as_secs()))??;
        let response = Self::check_status(response).await?;

        Ok(decode_chat_stream(response.bytes_stream(), idle))
    }

    async fn complete(&self, request: &ChatRequest) -> LlmResult<String> {
        let timeout = self.config.request_timeout;
        let response = self
            .client
            .post(self.api_url("chat/completions"))
            .timeout(timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::timeout_error(e, timeout))?;
        let response = Self::check_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::timeout_error(e, timeout))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("response has no choices".to_string()))
    }

    async fn list_models(&self) -> LlmResult<Vec<String>> {
        let timeout = self.config.status_timeout;
        let response = self
            .client
            .get(self.api_url("models"))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::timeout_error(e, timeout))?;
        let response = Self::check_status(response).await?;
        let models: ModelList = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    async fn is_online(&self) -> bool {
        let timeout = self.config.status_timeout;
        match self.check_endpoint(&self.api_url("models"), timeout).await {
            Ok(online) => online,
            Err(e) if e.is_timeout() => {
                debug!("Model list timed out, server may be busy; trying health endpoint");
                let health = format!("{}/health", self.config.base_url.trim_end_matches('/'));
                match self.check_endpoint(&health, timeout.mul_f32(1.5)).await {
                    Ok(online) => online,
                    Err(e) => {
                        debug!("Health check also failed: {}", e);
                        false
                    }
                }
            }
            Err(e) => {
                warn!("Model server at {} unreachable: {}", self.config.base_url, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url() {
        let client = LemonadeClient::new(ClientConfig::new("http://localhost:8000/")).unwrap();
        assert_eq!(
            client.api_url("chat/completions"),
            "http://localhost:8000/api/v1/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_offline_server() {
        // Port 9 (discard) is not expected to host a model server
        let config = ClientConfig::new("http://127.0.0.1:9").status_timeout(Duration::from_secs(2));
        let client = LemonadeClient::new(config).unwrap();
        assert!(!client.is_online().await);
        assert!(client.list_models().await.is_err());
    }
}
