//! Chat defaults and credential resolution.
//!
//! The constants here describe the settings surface shown to users: the
//! model list, slider ranges, and the initial system prompt.

use crate::error::{ChatError, Result};
use std::ops::RangeInclusive;

/// Environment variable holding the default API credential.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Models offered in the model selector, default first.
pub const AVAILABLE_MODELS: &[&str] = &[
    "llama-3.1-8b-instant",
    "llama-3.3-70b-versatile",
    "mixtral-8x7b-32768",
];

/// Default model for all chat turns.
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const TEMPERATURE_RANGE: RangeInclusive<f32> = 0.0..=1.0;

pub const DEFAULT_MAX_TOKENS: u32 = 200;
/// Range offered by the max-tokens slider. The core only requires `> 0`.
pub const MAX_TOKENS_RANGE: RangeInclusive<u32> = 50..=500;

/// Initial user-editable system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, friendly assistant.";

/// Pick the credential for a turn: an explicit key wins over the default.
///
/// Blank strings count as absent. Fails with `InvalidArgument` when neither
/// source provides a key.
pub fn resolve_api_key(explicit: Option<&str>, default: Option<&str>) -> Result<String> {
    explicit
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .or_else(|| default.map(str::trim).filter(|k| !k.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| ChatError::invalid("missing API key: enter a key or set GROQ_API_KEY"))
}

/// Read the default credential from [`API_KEY_ENV`], if set.
pub fn default_api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
}
