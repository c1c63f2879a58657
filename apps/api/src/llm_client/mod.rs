/// LLM Client — the single point of entry for completion API calls.
///
/// Handlers never build HTTP requests to the model provider themselves; they
/// go through the `CompletionClient` held in `AppState`. Production uses
/// `OpenAiClient`; tests inject `stub::EchoClient`.
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod openai;
pub mod sse;

#[cfg(test)]
pub mod stub;

pub use openai::OpenAiClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("upstream stream ended before the end-of-stream marker")]
    StreamTerminated,
}

impl LlmError {
    pub fn is_timeout(&self) -> bool {
        match self {
            LlmError::Timeout => true,
            LlmError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A fully-resolved completion call: every parameter has been defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
}

/// Lazy, finite, non-restartable sequence of reply fragments. Ends after the
/// upstream end-of-stream marker; an `Err` item is always the last one.
/// Dropping it closes the upstream connection.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends the request and waits for the whole assistant reply.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError>;

    /// Sends the request in streaming mode. Errors before the first byte
    /// (auth, bad request) are returned here; later failures arrive in-stream.
    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError>;
}
