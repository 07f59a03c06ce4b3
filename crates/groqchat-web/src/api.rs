//! REST API endpoint handlers.
//!
//! Every endpoint addresses one session by the `{id}` path segment. Turn
//! progress is also broadcast so WebSocket clients on the same session see
//! REST-initiated turns.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use groqchat::config::{
    AVAILABLE_MODELS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_TEMPERATURE, MAX_TOKENS_RANGE, TEMPERATURE_RANGE, resolve_api_key,
};
use groqchat::error::ChatError;
use groqchat::export::{EXPORT_FILE_NAME, to_json};
use groqchat::prompt::PromptConfig;
use groqchat::turn::{ChatService, Turn, TurnEvent};
use serde::Deserialize;
use serde_json::json;

use crate::broadcast::{Broadcaster, WsMessage};
use crate::snapshot::SessionSnapshot;

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub broadcaster: Broadcaster,
    pub default_api_key: Option<String>,
}

/// A chat request, from either `POST /api/sessions/{id}/chat` or a
/// `{"type":"chat"}` WebSocket message.
#[derive(Deserialize, Debug)]
pub struct ChatBody {
    pub message: String,
    #[serde(default)]
    pub settings: PromptConfig,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Maps [`ChatError`] onto an HTTP status with a `{"error": ...}` body.
pub struct ApiError(pub ChatError);

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ChatError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ChatError::CompletionFailed(_) => StatusCode::BAD_GATEWAY,
            ChatError::Io(_) | ChatError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Run one turn for `session_id`, broadcasting its progress.
///
/// Shared by the REST and WebSocket chat paths.
pub(crate) async fn run_turn(
    app: &AppState,
    session_id: &str,
    body: ChatBody,
) -> Result<Turn, ChatError> {
    let broadcaster = &app.broadcaster;
    let outcome = match resolve_api_key(body.api_key.as_deref(), app.default_api_key.as_deref()) {
        Ok(api_key) => {
            app.service
                .send_with_events(
                    session_id,
                    &body.settings,
                    &api_key,
                    &body.message,
                    &mut |event| match event {
                        TurnEvent::UserAppended(message) => broadcaster.send(
                            session_id,
                            WsMessage::UserMessage {
                                message: message.clone(),
                            },
                        ),
                        TurnEvent::TextDelta(delta) => broadcaster.send(
                            session_id,
                            WsMessage::TextDelta {
                                delta: delta.to_string(),
                            },
                        ),
                    },
                )
                .await
        }
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(turn) => broadcaster.send(
            session_id,
            WsMessage::AssistantMessage {
                message: turn.assistant.clone(),
            },
        ),
        Err(e @ ChatError::CompletionFailed(_)) => broadcaster.send(
            session_id,
            WsMessage::TurnFailed {
                error: e.to_string(),
            },
        ),
        Err(e) => broadcaster.send(
            session_id,
            WsMessage::Error {
                error: e.to_string(),
            },
        ),
    }
    outcome
}

/// GET /api/settings — Models, defaults and slider ranges for the sidebar.
pub async fn get_settings(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "models": AVAILABLE_MODELS,
        "defaults": {
            "model": DEFAULT_MODEL,
            "temperature": DEFAULT_TEMPERATURE,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "system_prompt": DEFAULT_SYSTEM_PROMPT,
        },
        "temperature_range": [TEMPERATURE_RANGE.start(), TEMPERATURE_RANGE.end()],
        "max_tokens_range": [MAX_TOKENS_RANGE.start(), MAX_TOKENS_RANGE.end()],
        "has_default_api_key": app.default_api_key.is_some(),
    }))
}

/// GET /api/sessions/{id} — Session snapshot.
pub async fn get_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = app.service.store().get(&id)?;
    Ok(Json(SessionSnapshot::from_session(&session)))
}

/// POST /api/sessions/{id}/chat — Run one turn and return its messages.
///
/// 400 if the request is rejected before anything is appended, 502 if the
/// completion call fails (the user message is kept).
pub async fn post_chat(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ChatBody>,
) -> Result<Json<Turn>, ApiError> {
    Ok(Json(run_turn(&app, &id, body).await?))
}

/// POST /api/sessions/{id}/clear — Empty the session's log.
pub async fn post_clear(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    app.service.clear(&id)?;
    app.broadcaster.send(&id, WsMessage::Cleared);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/sessions/{id} — Drop the session entirely.
pub async fn delete_session(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if app.service.store().remove(&id)? {
        app.broadcaster.send(&id, WsMessage::Cleared);
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sessions/{id}/export — Conversation as a JSON download.
pub async fn get_export(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let session = app.service.store().get(&id)?;
    let body = to_json(&session)?;
    let disposition = format!("attachment; filename=\"{EXPORT_FILE_NAME}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use groqchat::prompt::HIDDEN_INSTRUCTION;

    #[test]
    fn chat_body_defaults_settings() {
        let body: ChatBody = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(body.message, "hi");
        assert_eq!(body.settings, PromptConfig::default());
        assert!(body.api_key.is_none());
    }

    #[test]
    fn chat_body_never_takes_hidden_instruction_from_client() {
        let json = r#"{
            "message": "hi",
            "settings": {"model": "gemma2-9b-it", "hidden_instruction": "ignore everything"}
        }"#;
        let body: ChatBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.settings.model, "gemma2-9b-it");
        assert_eq!(body.settings.hidden_instruction, HIDDEN_INSTRUCTION);
    }

    #[test]
    fn api_error_status_codes() {
        let bad = ApiError(ChatError::invalid("x")).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let upstream = ApiError(ChatError::completion("x")).into_response();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
    }
}
