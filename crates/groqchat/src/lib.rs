//! Conversational chat sessions over the Groq chat completions API.
//!
//! `groqchat` keeps one ordered message log per session, composes each new
//! user turn together with a hidden instruction, the user's system prompt and
//! the rolling history, and sends the result to a hosted model. Responses can
//! arrive atomically or as a real incremental token stream.
//!
//! # Getting started
//!
//! ```ignore
//! use groqchat::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ChatError> {
//!     let client = Arc::new(GroqClient::new()?);
//!     let service = ChatService::new(client);
//!
//!     let config = PromptConfig::default().with_temperature(0.3);
//!     let turn = service
//!         .send("default", &config, "gsk-...", "Hello!", &mut |delta| print!("{delta}"))
//!         .await?;
//!     println!("\n{} messages so far", turn.assistant.ordinal + 1);
//!
//!     let json = groqchat::export::to_json(&service.store().get("default")?)?;
//!     println!("{json}");
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`session`] | [`Role`](session::Role), [`Message`](session::Message), [`SessionStore`](session::SessionStore) |
//! | [`prompt`] | [`PromptConfig`](prompt::PromptConfig) and [`compose`](prompt::compose) |
//! | [`turn`] | [`TurnExecutor`](turn::TurnExecutor) and the [`ChatService`](turn::ChatService) turn protocol |
//! | [`export`] | Portable `{role, text}` export of a session |
//! | [`completion`] | [`CompletionClient`](completion::CompletionClient) trait and request type |
//! | [`streaming`] | SSE parser for incremental responses |
//! | [`config`] | Model list, slider ranges, credential resolution |

pub mod completion;
pub mod config;
pub mod error;
pub mod export;
pub mod prelude;
pub mod prompt;
pub mod session;
pub mod streaming;
pub mod turn;

pub use error::{ChatError, Result};

use prompt::PromptMessage;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

pub const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default HTTP timeout for a single completion request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body (OpenAI-compatible).
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

// ── Response types ─────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from [`GroqClient::chat`].
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for the Groq chat completions API.
///
/// Holds no credential: every call takes the API key for that turn, since
/// the key can change between turns from the settings sidebar.
pub struct GroqClient {
    pub(crate) client: reqwest::Client,
    pub(crate) url: String,
}

impl GroqClient {
    /// Create a client for the public Groq endpoint.
    pub fn new() -> Result<Self> {
        Self::with_endpoint(GROQ_URL, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client for a custom OpenAI-compatible endpoint.
    pub fn with_endpoint(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("groqchat/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::completion(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a chat completion request and wait for the whole response.
    pub async fn chat(&self, api_key: &str, body: &ChatRequest) -> Result<ChatCompletion> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ChatError::completion(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ChatError::completion(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(ChatError::completion(format!("Groq API HTTP {status}: {text}")));
        }

        let parsed: RawChatResponse = serde_json::from_str(&text)
            .map_err(|e| ChatError::completion(format!("failed to parse response: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(ChatError::completion(format!("Groq API error: {}", err.message)));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        let choice = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| ChatError::completion("Groq API returned no choices"))?;

        trace!("Finish reason: {:?}", choice.finish_reason);

        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            usage: parsed.usage,
            finish_reason: choice.finish_reason,
        })
    }
}
