//! Server → client messages and their fan-out channel.
//!
//! Every turn event is tagged with its session id and sent once on a
//! `tokio::sync::broadcast` channel. Each WebSocket connection subscribes and
//! forwards only the events for the session it is viewing, so several browser
//! tabs on one session stay in sync.

use groqchat::session::Message;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::snapshot::SessionSnapshot;

/// A message sent from the server to WebSocket clients.
///
/// Discriminated on the `type` field when serialized to JSON.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Full session state (sent on connect and after falling behind).
    Snapshot { session: SessionSnapshot },
    /// The user message of a turn was appended.
    UserMessage { message: Message },
    /// Streaming text delta of the assistant reply.
    TextDelta { delta: String },
    /// The assistant reply was appended; the turn is complete.
    AssistantMessage { message: Message },
    /// The collaborator failed. The user message stays in the log.
    TurnFailed { error: String },
    /// The session was cleared.
    Cleared,
    /// A client request was rejected before anything was appended.
    Error { error: String },
}

/// A [`WsMessage`] addressed to one session.
#[derive(Clone, Debug)]
pub struct SessionEvent {
    pub session_id: String,
    pub message: WsMessage,
}

/// Sending half of the session event channel.
#[derive(Clone)]
pub struct Broadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a message to every client viewing `session_id`.
    ///
    /// Silently ignores send errors (no subscribers is fine).
    pub fn send(&self, session_id: &str, message: WsMessage) {
        let _ = self.sender.send(SessionEvent {
            session_id: session_id.to_string(),
            message,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}
