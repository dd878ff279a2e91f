//! Incremental server-sent-events decoding for OpenAI-style completion streams.

use loadgen_common::{LoadgenError, Result};
use serde::Deserialize;

/// One decoded event from a completion stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A streamed completion chunk; empty when the event carried no content.
    Chunk(String),
    Done,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: Option<Delta>,
}

#[derive(Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Accumulates raw bytes and yields complete events as their terminating
/// blank line arrives. Partial lines, including a multi-byte character split
/// across reads, stay buffered across `push` calls.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<SseEvent>> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(event) = self.line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes an event left unterminated when the connection closed.
    pub fn finish(&mut self) -> Option<Result<SseEvent>> {
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            if let Some(event) = self.line(&rest) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, raw: &[u8]) -> Option<Result<SseEvent>> {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim_end_matches(['\n', '\r']),
            Err(e) => {
                self.data.clear();
                return Some(Err(LoadgenError::MalformedChunk(format!("invalid utf-8 in stream: {e}"))));
            }
        };
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        // comments (":"), "event:", "id:" and "retry:" fields carry nothing we count
        None
    }

    fn dispatch(&mut self) -> Option<Result<SseEvent>> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(decode_payload(&payload))
    }
}

fn decode_payload(payload: &str) -> Result<SseEvent> {
    if payload.trim() == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| LoadgenError::MalformedChunk(format!("{e}: {payload}")))?;
    if let Some(error) = chunk.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(LoadgenError::StreamError(message));
    }
    let text = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta)
        .and_then(|d| d.content)
        .unwrap_or_default();
    Ok(SseEvent::Chunk(text))
}
