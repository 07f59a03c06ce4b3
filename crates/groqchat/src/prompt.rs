//! Prompt composition for a single chat turn.
//!
//! [`compose`] turns the current settings, a session snapshot and the new
//! user text into the ordered message list sent to the model:
//!
//! ```text
//! system    hidden instruction + "\n\n" + user system prompt
//! ...       every session message, in ordinal order
//! user      the new user text
//! ```

use crate::config::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE};
use crate::error::{ChatError, Result};
use crate::session::{Role, Session};
use serde::{Deserialize, Serialize};

/// Instruction prepended to every system prompt. Not user-editable.
pub const HIDDEN_INSTRUCTION: &str = "You are the assistant in a live chat window. \
Answer the latest user message directly, stay consistent with the earlier \
conversation, and format code with Markdown fences.";

/// Placed between the hidden instruction and the user system prompt.
pub const PROMPT_SEPARATOR: &str = "\n\n";

/// Per-turn generation settings, owned by the UI layer.
///
/// Deserializes from the settings sidebar's JSON. `hidden_instruction` is
/// never taken from input; it always comes from [`HIDDEN_INSTRUCTION`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PromptConfig {
    #[serde(skip)]
    pub hidden_instruction: String,
    #[serde(rename = "system_prompt")]
    pub user_system_prompt: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            hidden_instruction: HIDDEN_INSTRUCTION.to_string(),
            user_system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl PromptConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_hidden_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.hidden_instruction = instruction.into();
        self
    }

    /// Check the settings a request can't be sent without.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ChatError::invalid("model name must not be empty"));
        }
        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return Err(ChatError::invalid(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ChatError::invalid("max_tokens must be greater than 0"));
        }
        Ok(())
    }

    /// The combined system message text.
    ///
    /// Either half may be blank, in which case the separator is dropped too.
    pub fn system_text(&self) -> String {
        let hidden = self.hidden_instruction.trim();
        let user = self.user_system_prompt.trim();
        match (hidden.is_empty(), user.is_empty()) {
            (true, _) => user.to_string(),
            (false, true) => hidden.to_string(),
            (false, false) => format!("{hidden}{PROMPT_SEPARATOR}{user}"),
        }
    }
}

/// One entry of a composed prompt, in the chat-completions wire shape.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// An ordered request payload ready for the completion collaborator.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    pub messages: Vec<PromptMessage>,
}

impl Prompt {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Build the ordered payload for one turn. Pure: `session` is only read.
pub fn compose(config: &PromptConfig, session: &Session, new_user_text: &str) -> Prompt {
    let mut messages = Vec::with_capacity(session.len() + 2);
    messages.push(PromptMessage::new(Role::System, config.system_text()));
    messages.extend(
        session
            .messages()
            .iter()
            .map(|m| PromptMessage::new(m.role, m.text.clone())),
    );
    messages.push(PromptMessage::new(Role::User, new_user_text));
    Prompt { messages }
}
