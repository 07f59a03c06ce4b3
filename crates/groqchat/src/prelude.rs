//! Convenience re-exports for common `groqchat` types.
//!
//! ```ignore
//! use groqchat::prelude::*;
//! ```

pub use crate::completion::{CompletionClient, CompletionFuture, CompletionRequest, DeltaSink};
pub use crate::config::{API_KEY_ENV, AVAILABLE_MODELS, DEFAULT_MODEL, resolve_api_key};
pub use crate::error::{ChatError, Result};
pub use crate::export::{EXPORT_FILE_NAME, ExportRecord, export};
pub use crate::prompt::{Prompt, PromptConfig, PromptMessage, compose};
pub use crate::session::{Message, Role, Session, SessionStore};
pub use crate::turn::{ChatService, Turn, TurnEvent, TurnExecutor};
pub use crate::GroqClient;
