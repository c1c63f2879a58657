use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::llm_client::sse::{parse_block, ChunkProcessor, SseFrame};
use crate::llm_client::{
    ChatMessage, Completion, CompletionClient, CompletionRequest, LlmError, TextStream, Usage,
};

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorBody,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    message: String,
}

/// Client for OpenAI-compatible `/chat/completions` endpoints.
/// Performs no retries: a failed call is reported to the caller as-is.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    completions_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            completions_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let body = WireRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            let message = serde_json::from_str::<WireError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let response = self.send(request, false).await?;
        let body = response.bytes().await.map_err(from_reqwest)?;
        let parsed: WireResponse = serde_json::from_slice(&body)?;

        if let Some(usage) = &parsed.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyContent)?;

        Ok(Completion {
            text,
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
        })
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        let response = self.send(request, true).await?;
        Ok(fragments(response.bytes_stream().boxed()))
    }
}

fn from_reqwest(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::Http(err)
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    processor: ChunkProcessor,
    ready: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

impl StreamState {
    /// Queues the outcome of one block. Returns true once the stream is over.
    fn absorb(&mut self, block: &str) -> bool {
        match parse_block(block) {
            Ok(SseFrame::Delta(text)) => {
                self.ready.push_back(Ok(text));
                false
            }
            Ok(SseFrame::Ignore) => false,
            Ok(SseFrame::Done) => true,
            Err(e) => {
                self.ready.push_back(Err(e));
                true
            }
        }
    }
}

/// Turns the raw SSE body into text fragments. Upstream bytes are pulled
/// only when the consumer asks for the next fragment.
fn fragments(body: BoxStream<'static, reqwest::Result<Bytes>>) -> TextStream {
    let state = StreamState {
        body,
        processor: ChunkProcessor::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    state.processor.push_chunk(&chunk);
                    while let Some(block) = state.processor.next_block() {
                        if state.absorb(&block) {
                            state.finished = true;
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    state.ready.push_back(Err(from_reqwest(e)));
                    state.finished = true;
                }
                None => {
                    let clean = match state.processor.take_remaining() {
                        Some(rest) => state.absorb(&rest),
                        None => false,
                    };
                    if !clean {
                        state.ready.push_back(Err(LlmError::StreamTerminated));
                    }
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
