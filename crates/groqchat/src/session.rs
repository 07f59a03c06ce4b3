//! In-memory conversation logs keyed by session id.
//!
//! Each session is an append-only sequence of [`Message`]s. The
//! [`SessionStore`] creates sessions lazily on first reference and keeps them
//! for the lifetime of the process (or until [`SessionStore::remove`]).
//!
//! ```text
//! SessionStore
//!   "tab-1" ─▶ SessionSlot { log: Mutex<Session>, turn: tokio::Mutex<()> }
//!   "tab-2" ─▶ SessionSlot { ... }
//! ```
//!
//! Appends to a single session are serialized by the slot's `log` mutex, so
//! ordinals are always dense and strictly increasing. Whole turns are
//! serialized separately by the async `turn` lock (see
//! [`SessionStore::begin_turn`]).

use crate::error::{ChatError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message that has been appended to a session.
///
/// Only the store constructs these, so the ordinal always reflects the
/// message's position in its session.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub ordinal: u64,
}

// ── Session ────────────────────────────────────────────────────────

/// One conversation's ordered message log.
#[derive(Serialize, Clone, Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    messages: Vec<Message>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            created_at: Utc::now(),
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Messages in ordinal order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn push(&mut self, role: Role, text: String) -> Message {
        let message = Message {
            role,
            text,
            ordinal: self.messages.len() as u64,
        };
        self.messages.push(message.clone());
        message
    }
}

// ── SessionStore ───────────────────────────────────────────────────

struct SessionSlot {
    log: Mutex<Session>,
    turn: Arc<tokio::sync::Mutex<()>>,
}

impl SessionSlot {
    fn new(id: &str) -> Self {
        Self {
            log: Mutex::new(Session::new(id)),
            turn: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn log(&self) -> MutexGuard<'_, Session> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Guard that holds a session's turn lock until dropped.
///
/// Returned by [`SessionStore::begin_turn`]. While it is alive, no other turn
/// against the same session can start.
pub struct TurnGuard {
    _guard: tokio::sync::OwnedMutexGuard<()>,
}

/// Process-wide map of session id → message log.
///
/// Cloning is cheap and every clone refers to the same sessions.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<String, Arc<SessionSlot>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a session, creating it if absent.
    pub fn get(&self, session_id: &str) -> Result<Session> {
        let slot = self.slot(session_id)?;
        let session = slot.log().clone();
        Ok(session)
    }

    /// Append a message, assigning it the next ordinal.
    pub fn append(&self, session_id: &str, role: Role, text: impl Into<String>) -> Result<Message> {
        let slot = self.slot(session_id)?;
        let message = slot.log().push(role, text.into());
        debug!(
            "Appended {} message #{} to session {session_id}",
            message.role, message.ordinal
        );
        Ok(message)
    }

    /// Drop every message in a session. Ordinals restart at 0.
    pub fn clear(&self, session_id: &str) -> Result<()> {
        let slot = self.slot(session_id)?;
        *slot.log() = Session::new(session_id);
        debug!("Cleared session {session_id}");
        Ok(())
    }

    /// Destroy a session entirely. Returns whether it existed.
    pub fn remove(&self, session_id: &str) -> Result<bool> {
        validate_session_id(session_id)?;
        let removed = self.map().remove(session_id).is_some();
        if removed {
            debug!("Removed session {session_id}");
        }
        Ok(removed)
    }

    /// Wait for exclusive use of a session for one turn.
    pub async fn begin_turn(&self, session_id: &str) -> Result<TurnGuard> {
        let turn = self.slot(session_id)?.turn.clone();
        Ok(TurnGuard {
            _guard: turn.lock_owned().await,
        })
    }

    /// Ids of all live sessions, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.map().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<SessionSlot>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn slot(&self, session_id: &str) -> Result<Arc<SessionSlot>> {
        validate_session_id(session_id)?;
        let mut map = self.map();
        let slot = map
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!("Created session {session_id}");
                Arc::new(SessionSlot::new(session_id))
            })
            .clone();
        Ok(slot)
    }
}

/// Reject empty or whitespace-only session ids.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(ChatError::invalid("session id must not be empty"));
    }
    Ok(())
}
