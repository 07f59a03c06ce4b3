//! The remote completion collaborator.
//!
//! [`CompletionClient`] is the seam between the turn protocol and whatever
//! actually generates text. [`GroqClient`] is the production implementation;
//! tests plug in scripted clients.

use crate::error::Result;
use crate::prompt::{Prompt, PromptConfig, PromptMessage};
use crate::streaming::{StreamEvent, collect_text, extract_usage};
use crate::{ChatRequest, GroqClient};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

/// Boxed future returned by [`CompletionClient::complete`].
pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Callback receiving incremental text as it is generated.
pub type DeltaSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Everything the collaborator needs for one completion.
#[derive(Clone)]
pub struct CompletionRequest {
    pub messages: Vec<PromptMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub api_key: String,
    /// Ask for an incremental response. Clients without streaming support
    /// may ignore this and answer atomically.
    pub stream: bool,
}

impl CompletionRequest {
    /// Pair a composed prompt with the generation settings it was built for.
    pub fn new(prompt: Prompt, config: &PromptConfig, api_key: impl Into<String>) -> Self {
        Self {
            messages: prompt.messages,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key: api_key.into(),
            stream: true,
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    fn to_chat_request(&self) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: self.messages.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("messages", &self.messages.len())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_key", &"<redacted>")
            .field("stream", &self.stream)
            .finish()
    }
}

/// A remote model that maps an ordered message list to generated text.
///
/// Implementations call `on_delta` with each piece of text as it arrives
/// (possibly never, for atomic responses) and resolve to the full text.
pub trait CompletionClient: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
        on_delta: DeltaSink<'a>,
    ) -> CompletionFuture<'a>;
}

impl CompletionClient for GroqClient {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
        on_delta: DeltaSink<'a>,
    ) -> CompletionFuture<'a> {
        Box::pin(async move {
            let body = request.to_chat_request();
            if !request.stream {
                let completion = self.chat(&request.api_key, &body).await?;
                return Ok(completion.content);
            }

            let events = self
                .chat_stream_live(&request.api_key, &body, |event| {
                    if let StreamEvent::TextDelta(delta) = event {
                        on_delta(delta.as_str());
                    }
                })
                .await?;

            if let Some(usage) = extract_usage(&events) {
                debug!(
                    "Stream usage: prompt={}, completion={}",
                    usage.prompt_tokens.unwrap_or(0),
                    usage.completion_tokens.unwrap_or(0),
                );
            }
            Ok(collect_text(&events))
        })
    }
}
