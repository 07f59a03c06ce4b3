//! The request/response turn protocol.
//!
//! A turn runs as follows:
//!
//! 1. Validate inputs. Nothing is appended if this fails.
//! 2. Take the session's turn guard.
//! 3. Snapshot the session and [`compose`] the prompt.
//! 4. Append the user message.
//! 5. [`TurnExecutor::execute`] the prompt against the collaborator.
//! 6. On success, append the assistant message.
//!
//! On a failed turn the user message stays in the log and no assistant
//! message is added. Callers render an error in place of the reply.

use crate::DEFAULT_REQUEST_TIMEOUT;
use crate::completion::{CompletionClient, CompletionRequest, DeltaSink};
use crate::config::resolve_api_key;
use crate::error::{ChatError, Result};
use crate::export::{ExportRecord, export};
use crate::prompt::{PromptConfig, compose};
use crate::session::{Message, Role, SessionStore, validate_session_id};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Sends composed prompts to the completion collaborator.
pub struct TurnExecutor {
    client: Arc<dyn CompletionClient>,
    timeout: Option<Duration>,
}

impl TurnExecutor {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Bound each collaborator call. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one completion. Any collaborator failure, including a timeout,
    /// surfaces as `CompletionFailed`.
    pub async fn execute(&self, request: &CompletionRequest, on_delta: DeltaSink<'_>) -> Result<String> {
        let call = self.client.complete(request, on_delta);
        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(ChatError::completion(format!(
                        "no response within {:.0}s",
                        limit.as_secs_f64()
                    )));
                }
            },
            None => call.await,
        };
        outcome.map_err(|e| match e {
            ChatError::CompletionFailed(_) => e,
            other => ChatError::CompletionFailed(other.to_string()),
        })
    }
}

/// Progress reported by [`ChatService::send_with_events`].
#[derive(Debug)]
pub enum TurnEvent<'a> {
    /// The user message is in the log; the collaborator is about to be called.
    UserAppended(&'a Message),
    /// Incremental assistant text.
    TextDelta(&'a str),
}

/// A completed turn: the appended user and assistant messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub user: Message,
    pub assistant: Message,
}

/// Session store plus executor: the full chat core behind a UI.
pub struct ChatService {
    store: SessionStore,
    executor: TurnExecutor,
    streaming: bool,
}

impl ChatService {
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            store: SessionStore::new(),
            executor: TurnExecutor::new(client),
            streaming: true,
        }
    }

    pub fn with_store(mut self, store: SessionStore) -> Self {
        self.store = store;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor = self.executor.with_timeout(timeout);
        self
    }

    /// Request incremental responses (default `true`).
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run one turn against `session_id`.
    ///
    /// `on_delta` receives text as it streams in; the returned [`Turn`]
    /// holds the final messages. See the module docs for what is appended
    /// when the collaborator fails.
    pub async fn send(
        &self,
        session_id: &str,
        config: &PromptConfig,
        api_key: &str,
        user_text: &str,
        on_delta: DeltaSink<'_>,
    ) -> Result<Turn> {
        self.send_with_events(session_id, config, api_key, user_text, &mut |event| {
            if let TurnEvent::TextDelta(delta) = event {
                on_delta(delta);
            }
        })
        .await
    }

    /// Like [`send`](Self::send), but also reports when the user message
    /// has been appended, before the collaborator is called.
    pub async fn send_with_events(
        &self,
        session_id: &str,
        config: &PromptConfig,
        api_key: &str,
        user_text: &str,
        on_event: &mut (dyn FnMut(TurnEvent<'_>) + Send),
    ) -> Result<Turn> {
        validate_session_id(session_id)?;
        config.validate()?;
        let api_key = resolve_api_key(Some(api_key), None)?;
        if user_text.trim().is_empty() {
            return Err(ChatError::invalid("message must not be empty"));
        }

        let _turn = self.store.begin_turn(session_id).await?;
        let session = self.store.get(session_id)?;
        let prompt = compose(config, &session, user_text);
        let request = CompletionRequest::new(prompt, config, api_key).with_stream(self.streaming);

        let user = self.store.append(session_id, Role::User, user_text)?;
        on_event(TurnEvent::UserAppended(&user));
        debug!(
            "Turn start: session={session_id}, model={}, history={}",
            config.model,
            session.len()
        );

        let start = Instant::now();
        let outcome = self
            .executor
            .execute(&request, &mut |delta| on_event(TurnEvent::TextDelta(delta)))
            .await;
        match outcome {
            Ok(text) => {
                let assistant = self.store.append(session_id, Role::Assistant, text)?;
                debug!(
                    "Turn done: session={session_id}, {} chars in {:.1}s",
                    assistant.text.len(),
                    start.elapsed().as_secs_f64()
                );
                Ok(Turn { user, assistant })
            }
            Err(e) => {
                warn!("Turn failed for session {session_id}: {e}");
                Err(e)
            }
        }
    }

    pub fn clear(&self, session_id: &str) -> Result<()> {
        self.store.clear(session_id)
    }

    pub fn export(&self, session_id: &str) -> Result<Vec<ExportRecord>> {
        Ok(export(&self.store.get(session_id)?))
    }
}
