//! Server-Sent Events (SSE) streaming for the chat completions API.
//!
//! Provides [`StreamEvent`] and [`GroqClient::chat_stream_live`] for
//! receiving incremental text deltas as they come off the wire, so a UI can
//! render the reply while the model is still generating it.

use crate::error::{ChatError, Result};
use crate::{ChatRequest, GroqClient, UsageInfo};
use serde::Deserialize;
use tracing::{debug, trace, warn};

/// A single event from an SSE stream.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An incremental text content delta.
    TextDelta(String),
    /// Token usage information (sent in the final chunk).
    Usage(UsageInfo),
    /// The server reported an error mid-stream.
    Error(String),
    /// The stream is complete.
    Done,
}

/// Raw SSE data chunk.
#[derive(Deserialize, Debug)]
struct StreamChunk {
    choices: Option<Vec<StreamChoice>>,
    usage: Option<UsageInfo>,
    /// Groq reports usage under `x_groq` on the final chunk.
    x_groq: Option<GroqExtension>,
    error: Option<StreamError>,
}

#[derive(Deserialize, Debug)]
struct StreamError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct GroqExtension {
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    delta: Option<StreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDelta {
    content: Option<String>,
}

impl GroqClient {
    /// Send a streaming chat request, invoking `on_event` for each event as
    /// it arrives.
    ///
    /// The full event list is also returned so callers can assemble the
    /// final text with [`collect_text`]. An in-stream error event, or a
    /// stream that ends before the model finished, is `CompletionFailed`.
    pub async fn chat_stream_live(
        &self,
        api_key: &str,
        body: &ChatRequest,
        mut on_event: impl FnMut(&StreamEvent),
    ) -> Result<Vec<StreamEvent>> {
        let mut stream_body = serde_json::to_value(body)?;
        stream_body["stream"] = serde_json::Value::Bool(true);

        debug!(
            "Sending streaming chat request: model={}, messages={}",
            body.model,
            body.messages.len()
        );

        let mut resp = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&stream_body)
            .send()
            .await
            .map_err(|e| ChatError::completion(format!("streaming request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ChatError::completion(format!("Groq API HTTP {status}: {text}")));
        }

        let mut parser = SseParser::default();

        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| ChatError::completion(format!("failed to read streaming chunk: {e}")))?
        {
            let before = parser.events.len();
            parser.feed(&chunk);
            for ev in &parser.events[before..] {
                on_event(ev);
            }
            if parser.done || parser.error().is_some() {
                break;
            }
        }

        let before = parser.events.len();
        parser.finish();
        for ev in &parser.events[before..] {
            on_event(ev);
        }

        if let Some(message) = parser.error() {
            return Err(ChatError::completion(format!("Groq API error: {message}")));
        }
        if !parser.completed {
            return Err(ChatError::completion(
                "stream ended before the model finished its reply",
            ));
        }

        debug!("Live stream completed with {} events", parser.events.len());
        Ok(parser.events)
    }
}

/// Incremental line-oriented SSE parser.
///
/// Bytes may be split anywhere, including inside a multi-byte character, so
/// partial lines stay buffered as raw bytes until the next newline arrives.
#[derive(Default)]
pub(crate) struct SseParser {
    buffer: Vec<u8>,
    pub(crate) events: Vec<StreamEvent>,
    /// `[DONE]` was seen.
    pub(crate) done: bool,
    /// `[DONE]` or a `finish_reason` was seen.
    pub(crate) completed: bool,
}

impl SseParser {
    /// Feed raw bytes and parse every complete line.
    pub(crate) fn feed(&mut self, bytes: &[u8]) {
        if self.done {
            return;
        }
        self.buffer.extend_from_slice(bytes);
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if self.handle_line(String::from_utf8_lossy(&line).trim()) {
                self.buffer.clear();
                break;
            }
        }
    }

    /// Flush the trailing partial line and guarantee a final `Done`.
    pub(crate) fn finish(&mut self) {
        if !self.done {
            let remaining = std::mem::take(&mut self.buffer);
            self.handle_line(String::from_utf8_lossy(&remaining).trim());
        }
        if !self.done {
            self.events.push(StreamEvent::Done);
            self.done = true;
        }
    }

    /// The first in-stream error message, if any.
    pub(crate) fn error(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match e {
            StreamEvent::Error(message) => Some(message.as_str()),
            _ => None,
        })
    }

    /// Returns `true` once the `[DONE]` sentinel has been seen.
    fn handle_line(&mut self, line: &str) -> bool {
        if line.is_empty() || line.starts_with(':') {
            return false;
        }
        if line == "data: [DONE]" {
            self.events.push(StreamEvent::Done);
            self.done = true;
            self.completed = true;
            return true;
        }
        if let Some(data) = line.strip_prefix("data:")
            && parse_sse_data(data.trim_start(), &mut self.events)
        {
            self.completed = true;
        }
        false
    }
}

/// Parse a single SSE `data:` payload into stream events.
///
/// Returns whether the payload carried a `finish_reason`.
fn parse_sse_data(data: &str, events: &mut Vec<StreamEvent>) -> bool {
    let mut finished = false;
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            if let Some(err) = chunk.error {
                warn!("Stream error event: {}", err.message);
                events.push(StreamEvent::Error(err.message));
            }
            if let Some(usage) = chunk.usage.or(chunk.x_groq.and_then(|x| x.usage)) {
                events.push(StreamEvent::Usage(usage));
            }
            for choice in chunk.choices.unwrap_or_default() {
                if let Some(content) = choice.delta.and_then(|d| d.content)
                    && !content.is_empty()
                {
                    events.push(StreamEvent::TextDelta(content));
                }
                if choice.finish_reason.is_some() {
                    trace!("Stream finish_reason: {:?}", choice.finish_reason);
                    finished = true;
                }
            }
        }
        Err(e) => {
            warn!("Failed to parse SSE chunk: {e} (data: {data})");
        }
    }
    finished
}

/// Assemble the complete text from a sequence of stream events.
pub fn collect_text(events: &[StreamEvent]) -> String {
    let mut text = String::new();
    for event in events {
        if let StreamEvent::TextDelta(delta) = event {
            text.push_str(delta);
        }
    }
    text
}

/// Extract usage info from stream events (if present).
pub fn extract_usage(events: &[StreamEvent]) -> Option<UsageInfo> {
    events.iter().rev().find_map(|e| match e {
        StreamEvent::Usage(usage) => Some(usage.clone()),
        _ => None,
    })
}
