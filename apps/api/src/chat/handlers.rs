//! Axum route handlers for the Chat API.

use std::convert::Infallible;

use axum::{
    extract::{
        rejection::JsonRejection, multipart::MultipartRejection,
        Multipart, Path, State,
    },
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use tracing::warn;

use crate::chat::{chat, chat_stream, chat_with_files, list_chat_files, ChatOptions, ChatRequest};
use crate::errors::AppError;
use crate::llm_client::{ChatMessage, TextStream};
use crate::state::AppState;
use crate::upload::handlers::read_form;

/// Final event of a successful stream.
pub const STREAM_TERMINATOR: &str = "[DONE]";

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_files: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct ChatFilesResponse {
    pub customer_id: String,
    pub files: Vec<String>,
}

/// POST /chat/
pub async fn handle_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload?;
    let reply = chat(
        state.llm.as_ref(),
        request.messages,
        &request.options,
        &state.config.llm,
    )
    .await?;

    Ok(Json(ChatResponse {
        reply: reply.reply,
        model: reply.model,
        uploaded_files: None,
    }))
}

/// POST /chat/stream
///
/// Server-sent events: one JSON-encoded string per fragment, then `[DONE]`.
/// An upstream failure sends an `error` event instead of the terminator.
pub async fn handle_chat_stream(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Json(request) = payload?;
    let fragments = chat_stream(
        state.llm.as_ref(),
        request.messages,
        &request.options,
        &state.config.llm,
    )
    .await?;

    Ok(Sse::new(sse_events(fragments)).keep_alive(KeepAlive::default()))
}

/// Maps reply fragments onto SSE events. When the client goes away axum
/// drops this stream, and the upstream response with it.
fn sse_events(fragments: TextStream) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(fragments), |fragments| async move {
        let mut fragments = fragments?;
        let event = match fragments.next().await {
            Some(Ok(text)) => {
                let data = serde_json::Value::String(text).to_string();
                return Some((Ok(Event::default().data(data)), Some(fragments)));
            }
            Some(Err(e)) => {
                warn!("Chat stream failed mid-response: {e}");
                Event::default()
                    .event("error")
                    .data(e.to_string().replace('\r', ""))
            }
            None => Event::default().data(STREAM_TERMINATOR),
        };
        Some((Ok(event), None))
    })
}

/// POST /chat/with-files
///
/// Multipart: `customer_id`, `messages` (JSON array), optional `options`
/// (JSON object), and one or more `files` parts.
pub async fn handle_chat_with_files(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let mut form = read_form(multipart?).await?;
    let customer_id = form.customer_id()?.trim().to_string();

    let messages: Vec<ChatMessage> = match form.fields.get("messages") {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError::Validation(format!("messages is not valid JSON: {e}")))?,
        None => return Err(AppError::Validation("messages field is required".to_string())),
    };
    let options: ChatOptions = match form.fields.get("options") {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
            .map_err(|e| AppError::Validation(format!("options is not valid JSON: {e}")))?,
        _ => ChatOptions::default(),
    };
    let files = form.take_files(&["files", "files[]", "file"]);

    let (reply, uploaded) = chat_with_files(
        state.store.as_ref(),
        state.llm.as_ref(),
        &customer_id,
        messages,
        &options,
        files,
        &state.config.llm,
    )
    .await?;

    Ok(Json(ChatResponse {
        reply: reply.reply,
        model: reply.model,
        uploaded_files: Some(uploaded),
    }))
}

/// GET /chat/files/:customer_id
pub async fn handle_list_chat_files(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
) -> Result<Json<ChatFilesResponse>, AppError> {
    let files = list_chat_files(state.store.as_ref(), &customer_id).await?;
    Ok(Json(ChatFilesResponse { customer_id, files }))
}
