//! Chat pass-through to the completion endpoint.
//!
//! Sessions are not stored: the caller resends the full history every time.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::LlmDefaults;
use crate::errors::AppError;
use crate::llm_client::{ChatMessage, CompletionClient, CompletionRequest, Role, TextStream};
use crate::storage::keys::{self, validate_segment};
use crate::storage::ObjectStore;
use crate::upload::{put_files, UploadedFile};

pub mod handlers;

/// Caller-tunable model parameters. Unset fields fall back to configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub options: ChatOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    pub model: String,
}

/// Validates the conversation and fills unset options from `defaults`.
pub fn resolve_request(
    messages: Vec<ChatMessage>,
    options: &ChatOptions,
    defaults: &LlmDefaults,
) -> Result<CompletionRequest, AppError> {
    if messages.is_empty() {
        return Err(AppError::Validation(
            "messages must contain at least one message".to_string(),
        ));
    }

    let temperature = options.temperature.unwrap_or(defaults.chat_temperature);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(AppError::Validation(
            "temperature must be between 0 and 2".to_string(),
        ));
    }

    let max_tokens = options.max_tokens.unwrap_or(defaults.chat_max_tokens);
    if max_tokens == 0 {
        return Err(AppError::Validation(
            "max_tokens must be at least 1".to_string(),
        ));
    }

    let model = match options.model.as_deref().map(str::trim) {
        Some("") => return Err(AppError::Validation("model cannot be empty".to_string())),
        Some(model) => model.to_string(),
        None => defaults.model.clone(),
    };

    Ok(CompletionRequest {
        model,
        messages,
        temperature,
        max_tokens,
    })
}

/// Returns the assistant's complete reply.
pub async fn chat(
    llm: &dyn CompletionClient,
    messages: Vec<ChatMessage>,
    options: &ChatOptions,
    defaults: &LlmDefaults,
) -> Result<ChatReply, AppError> {
    let request = resolve_request(messages, options, defaults)?;
    info!(
        "Chat completion: model={}, messages={}",
        request.model,
        request.messages.len()
    );
    let completion = llm.complete(&request).await?;
    Ok(ChatReply {
        reply: completion.text,
        model: completion.model,
    })
}

/// Opens a streamed reply. Validation and connection errors surface here;
/// failures after the first fragment arrive as the stream's last item.
pub async fn chat_stream(
    llm: &dyn CompletionClient,
    messages: Vec<ChatMessage>,
    options: &ChatOptions,
    defaults: &LlmDefaults,
) -> Result<TextStream, AppError> {
    let request = resolve_request(messages, options, defaults)?;
    info!(
        "Streaming chat completion: model={}, messages={}",
        request.model,
        request.messages.len()
    );
    Ok(llm.complete_stream(&request).await?)
}

/// Stores chat attachments under `{customer_id}/chat_files/`, tells the model
/// which files arrived, then answers like `chat`.
pub async fn chat_with_files(
    store: &dyn ObjectStore,
    llm: &dyn CompletionClient,
    customer_id: &str,
    mut messages: Vec<ChatMessage>,
    options: &ChatOptions,
    files: Vec<UploadedFile>,
    defaults: &LlmDefaults,
) -> Result<(ChatReply, Vec<String>), AppError> {
    // Reject a bad conversation before anything is written.
    resolve_request(messages.clone(), options, defaults)?;

    let filenames: Vec<String> = files.iter().map(|f| f.filename.trim().to_string()).collect();
    let uploaded = put_files(store, customer_id, files, keys::chat_file_key).await?;

    let note = files_note(&filenames);
    let appended = match messages.last_mut() {
        Some(last) if last.role == Role::User => {
            last.content.push_str(&note);
            true
        }
        _ => false,
    };
    if !appended {
        messages.push(ChatMessage::user(note.trim_start()));
    }

    let reply = chat(llm, messages, options, defaults).await?;
    Ok((reply, uploaded))
}

/// Lists chat attachments for a customer; empty when there are none.
pub async fn list_chat_files(
    store: &dyn ObjectStore,
    customer_id: &str,
) -> Result<Vec<String>, AppError> {
    let customer_id = validate_segment("customer_id", customer_id)?;
    let prefix = keys::chat_files_prefix(&customer_id);
    let listed = store.list(&prefix).await?;
    Ok(keys::strip_prefix(listed, &prefix))
}

fn files_note(filenames: &[String]) -> String {
    let lines: Vec<String> = filenames
        .iter()
        .map(|name| format!("File uploaded: {name}"))
        .collect();
    format!("\n\nFiles uploaded:\n{}", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::StreamExt;

    use super::*;
    use crate::llm_client::stub::{EchoClient, StubMode};
    use crate::llm_client::LlmError;
    use crate::storage::memory::MemoryStore;

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage {
                role: Role::System,
                content: "You are terse.".to_string(),
            },
            ChatMessage::user("Which widget sells best?"),
        ]
    }

    #[test]
    fn test_resolve_request_applies_defaults() {
        let defaults = LlmDefaults::default();
        let request = resolve_request(conversation(), &ChatOptions::default(), &defaults).unwrap();
        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 2048);
    }

    #[test]
    fn test_resolve_request_honours_options() {
        let options = ChatOptions {
            model: Some("gpt-4o-mini".to_string()),
            temperature: Some(2.0),
            max_tokens: Some(10),
        };
        let request = resolve_request(conversation(), &options, &LlmDefaults::default()).unwrap();
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.temperature, 2.0);
        assert_eq!(request.max_tokens, 10);
    }

    #[test]
    fn test_resolve_request_rejects_bad_input() {
        let defaults = LlmDefaults::default();
        assert!(resolve_request(vec![], &ChatOptions::default(), &defaults).is_err());

        let hot = ChatOptions {
            temperature: Some(2.5),
            ..ChatOptions::default()
        };
        assert!(resolve_request(conversation(), &hot, &defaults).is_err());

        let empty_cap = ChatOptions {
            max_tokens: Some(0),
            ..ChatOptions::default()
        };
        assert!(resolve_request(conversation(), &empty_cap, &defaults).is_err());

        let blank_model = ChatOptions {
            model: Some("  ".to_string()),
            ..ChatOptions::default()
        };
        assert!(resolve_request(conversation(), &blank_model, &defaults).is_err());
    }

    #[test]
    fn test_chat_request_schema() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"messages":[{"role":"user","content":"hi"}],"options":{"temperature":0.2}}"#,
        )
        .unwrap();
        assert_eq!(request.messages[0].role, Role::User);
        assert_eq!(request.options.temperature, Some(0.2));

        let no_options: ChatRequest =
            serde_json::from_str(r#"{"messages":[{"role":"assistant","content":"ok"}]}"#).unwrap();
        assert!(no_options.options.model.is_none());

        assert!(serde_json::from_str::<ChatRequest>(
            r#"{"messages":[{"role":"wizard","content":"hi"}]}"#
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_stream_concatenation_equals_reply() {
        let llm = EchoClient::new();
        let defaults = LlmDefaults::default();
        let options = ChatOptions::default();

        let reply = chat(&llm, conversation(), &options, &defaults).await.unwrap();
        let fragments: Vec<String> = chat_stream(&llm, conversation(), &options, &defaults)
            .await
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert!(fragments.len() > 1);
        assert_eq!(fragments.concat(), reply.reply);
        assert_eq!(llm.requests()[0], llm.requests()[1]);
    }

    #[tokio::test]
    async fn test_chat_upstream_failure() {
        let llm = EchoClient::with_mode(StubMode::FailUpstream);
        let err = chat(&llm, conversation(), &ChatOptions::default(), &LlmDefaults::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));

        let err = chat_stream(&llm, conversation(), &ChatOptions::default(), &LlmDefaults::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::UpstreamTimeout(_)));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_last_item() {
        let llm = EchoClient::with_mode(StubMode::FailMidStream);
        let items: Vec<Result<String, LlmError>> =
            chat_stream(&llm, conversation(), &ChatOptions::default(), &LlmDefaults::default())
                .await
                .unwrap()
                .collect()
                .await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_chat_with_files_stores_and_mentions_files() {
        let store = MemoryStore::new();
        let llm = EchoClient::new();
        let files = vec![UploadedFile {
            filename: "notes.txt".to_string(),
            content_type: Some("text/plain".to_string()),
            body: Bytes::from_static(b"hello"),
        }];

        let (reply, uploaded) = chat_with_files(
            &store,
            &llm,
            "c1",
            conversation(),
            &ChatOptions::default(),
            files,
            &LlmDefaults::default(),
        )
        .await
        .unwrap();

        assert_eq!(uploaded, vec!["c1/chat_files/notes.txt"]);
        assert!(reply
            .reply
            .ends_with("Which widget sells best?\n\nFiles uploaded:\nFile uploaded: notes.txt"));
        assert_eq!(list_chat_files(&store, "c1").await.unwrap(), vec!["notes.txt"]);
    }

    #[tokio::test]
    async fn test_chat_with_files_validates_before_writing() {
        let store = MemoryStore::new();
        let llm = EchoClient::new();
        let files = vec![UploadedFile {
            filename: "notes.txt".to_string(),
            content_type: None,
            body: Bytes::from_static(b"hello"),
        }];

        let result = chat_with_files(
            &store,
            &llm,
            "c1",
            vec![],
            &ChatOptions::default(),
            files,
            &LlmDefaults::default(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(!store.contains("c1/chat_files/notes.txt"));
    }
}
