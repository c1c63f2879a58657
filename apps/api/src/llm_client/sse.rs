//! Server-sent-event framing for streamed chat completions.

use serde::Deserialize;

use crate::llm_client::LlmError;

const DONE_MARKER: &str = "[DONE]";

/// Buffers incoming byte chunks and hands out complete SSE blocks.
/// Handles blocks, multi-byte characters and CRLF pairs split across chunks.
#[derive(Debug, Default)]
pub struct ChunkProcessor {
    pending: Vec<u8>,
}

impl ChunkProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw CR bytes only occur in line endings; JSON payloads escape them.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.pending.extend(chunk.iter().copied().filter(|&b| b != b'\r'));
    }

    /// Extracts the next complete block, skipping blank ones. A newline byte
    /// never occurs inside a UTF-8 sequence, so each block decodes whole.
    pub fn next_block(&mut self) -> Option<String> {
        loop {
            let pos = self.pending.windows(2).position(|w| w == b"\n\n")?;
            let block: Vec<u8> = self.pending.drain(..pos + 2).take(pos).collect();
            let block = String::from_utf8_lossy(&block).into_owned();
            if !block.trim().is_empty() {
                return Some(block);
            }
        }
    }

    /// Takes whatever is left once the body has closed.
    pub fn take_remaining(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let rest = String::from_utf8_lossy(&rest).into_owned();
        (!rest.trim().is_empty()).then_some(rest)
    }
}

#[derive(Debug, PartialEq)]
pub enum SseFrame {
    /// Text fragment carried by a chunk. Role-only or empty deltas are skipped.
    Delta(String),
    /// Keep-alive comments and chunks with no text.
    Ignore,
    Done,
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkError {
    message: String,
}

/// Interprets one SSE block from an OpenAI-compatible stream.
pub fn parse_block(block: &str) -> Result<SseFrame, LlmError> {
    let data: Vec<&str> = block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|d| d.strip_prefix(' ').unwrap_or(d))
        .collect();

    if data.is_empty() {
        return Ok(SseFrame::Ignore);
    }

    let data = data.join("\n");
    if data.trim() == DONE_MARKER {
        return Ok(SseFrame::Done);
    }

    let payload: ChunkPayload = serde_json::from_str(&data)?;
    if let Some(err) = payload.error {
        return Err(LlmError::Api {
            status: 200,
            message: err.message,
        });
    }

    Ok(payload
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|t| !t.is_empty())
        .map(SseFrame::Delta)
        .unwrap_or(SseFrame::Ignore))
}
