use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};

use crate::llm_client::{
    Completion, CompletionClient, CompletionRequest, LlmError, Role, TextStream,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StubMode {
    Echo,
    /// Fails the call before any output.
    FailUpstream,
    /// Streams the first fragment, then fails.
    FailMidStream,
}

/// Deterministic completion client: the reply is `reply: ` followed by the
/// last user message. Every request is recorded for inspection.
pub struct EchoClient {
    mode: StubMode,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl EchoClient {
    pub fn new() -> Self {
        Self::with_mode(StubMode::Echo)
    }

    pub fn with_mode(mode: StubMode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn reply_for(request: &CompletionRequest) -> String {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        format!("reply: {last_user}")
    }

    fn record(&self, request: &CompletionRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

/// Splits after every space so the fragments concatenate back to `text`.
pub fn split_fragments(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_string).collect()
}

#[async_trait]
impl CompletionClient for EchoClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.record(request);
        if self.mode == StubMode::FailUpstream {
            return Err(LlmError::Api {
                status: 500,
                message: "stub upstream failure".to_string(),
            });
        }
        Ok(Completion {
            text: Self::reply_for(request),
            model: request.model.clone(),
        })
    }

    async fn complete_stream(&self, request: &CompletionRequest) -> Result<TextStream, LlmError> {
        self.record(request);
        let fragments = split_fragments(&Self::reply_for(request));
        match self.mode {
            StubMode::Echo => Ok(stream::iter(fragments.into_iter().map(Ok)).boxed()),
            StubMode::FailUpstream => Err(LlmError::Timeout),
            StubMode::FailMidStream => {
                let first = fragments.into_iter().next().unwrap_or_default();
                Ok(stream::iter(vec![Ok(first), Err(LlmError::StreamTerminated)]).boxed())
            }
        }
    }
}
