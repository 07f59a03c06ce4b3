//! Portable export of a session's conversation.
//!
//! The export format is a pretty-printed UTF-8 JSON array of
//! `{"role": "user"|"assistant", "text": ...}` objects. System messages are
//! left out.

use crate::error::Result;
use crate::session::{Role, Session};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name offered for downloads.
pub const EXPORT_FILE_NAME: &str = "chat_history.json";

/// One exported message.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ExportRecord {
    pub role: Role,
    pub text: String,
}

/// User and assistant messages of `session`, in ordinal order.
pub fn export(session: &Session) -> Vec<ExportRecord> {
    session
        .messages()
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .map(|m| ExportRecord {
            role: m.role,
            text: m.text.clone(),
        })
        .collect()
}

/// Render the export as pretty-printed JSON.
pub fn to_json(session: &Session) -> Result<String> {
    Ok(serde_json::to_string_pretty(&export(session))?)
}

/// Write the export to `path`, replacing any existing file.
pub fn write_export(session: &Session, path: impl AsRef<Path>) -> Result<()> {
    std::fs::write(path, to_json(session)?)?;
    Ok(())
}
