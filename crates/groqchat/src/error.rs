use thiserror::Error;

/// Errors surfaced by the chat core.
///
/// Collaborator failures are not differentiated: anything that
/// goes wrong between sending a prompt and receiving text is a
/// [`CompletionFailed`](ChatError::CompletionFailed).
#[derive(Error, Debug)]
pub enum ChatError {
    /// Missing credential, empty session id, or out-of-range settings.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The remote completion collaborator failed.
    #[error("completion failed: {0}")]
    CompletionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn completion(reason: impl Into<String>) -> Self {
        Self::CompletionFailed(reason.into())
    }

    /// Whether this error came from input validation (nothing was sent).
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason() {
        let err = ChatError::completion("Groq API HTTP 500: boom");
        assert_eq!(err.to_string(), "completion failed: Groq API HTTP 500: boom");

        let err = ChatError::invalid("session id must not be empty");
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("session id"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ChatError = io.into();
        assert!(matches!(err, ChatError::Io(_)));
        assert!(!err.is_invalid_argument());
    }
}
