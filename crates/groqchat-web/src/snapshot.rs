//! Serializable view of a session for WebSocket and REST transport.

use groqchat::session::{Message, Session};
use serde::Serialize;

/// Session state as shown to the browser on load or reconnect.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    /// RFC 3339 timestamp of when the session (or its last clear) started.
    pub created_at: String,
    pub messages: Vec<Message>,
}

impl SessionSnapshot {
    pub fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id().to_string(),
            created_at: session.created_at().to_rfc3339(),
            messages: session.messages().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groqchat::session::{Role, SessionStore};

    #[test]
    fn snapshot_copies_messages_in_order() {
        let store = SessionStore::new();
        store.append("s", Role::User, "q").unwrap();
        store.append("s", Role::Assistant, "a").unwrap();

        let snap = SessionSnapshot::from_session(&store.get("s").unwrap());
        assert_eq!(snap.session_id, "s");
        assert_eq!(snap.messages.len(), 2);
        assert_eq!(snap.messages[1].text, "a");

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json["created_at"].as_str().unwrap().contains('T'));
    }
}
