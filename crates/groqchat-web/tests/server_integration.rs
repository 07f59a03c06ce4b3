//! Integration tests for the groqchat-web server.
//!
//! These tests start a real axum server on a random port, backed by a fake
//! completion client, and exercise the REST and WebSocket endpoints.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use groqchat::prelude::*;
use groqchat_web::{WebConfig, spawn_web};
use tokio_tungstenite::tungstenite::Message as WsFrame;

type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Replies `"re: <last user message>"` as two deltas, or fails on "boom".
struct EchoClient;

impl CompletionClient for EchoClient {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
        on_delta: DeltaSink<'a>,
    ) -> CompletionFuture<'a> {
        Box::pin(async move {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            if last == "boom" {
                return Err(ChatError::completion("upstream exploded"));
            }
            on_delta("re: ");
            on_delta(&last);
            Ok(format!("re: {last}"))
        })
    }
}

/// Helper: spawn a test server on port 0 (random available port).
async fn spawn_test_server(default_api_key: Option<&str>) -> (Arc<ChatService>, String) {
    let service = Arc::new(ChatService::new(Arc::new(EchoClient)));
    let config = WebConfig {
        bind_addr: ([127, 0, 0, 1], 0).into(),
        default_api_key: default_api_key.map(str::to_string),
        ..Default::default()
    };
    let addr = spawn_web(service.clone(), config).await.unwrap();
    (service, format!("http://{addr}"))
}

async fn post_chat(base: &str, session: &str, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("{base}/api/sessions/{session}/chat"))
        .json(&body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn index_page_is_served() {
    let (_service, base) = spawn_test_server(None).await;
    let resp = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().contains("<title>Groq Chat</title>"));
}

#[tokio::test]
async fn settings_report_models_and_key_presence() {
    let (_service, base) = spawn_test_server(Some("gsk-server")).await;
    let json: serde_json::Value = reqwest::get(format!("{base}/api/settings"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["models"].as_array().unwrap().len(), AVAILABLE_MODELS.len());
    assert_eq!(json["defaults"]["model"], DEFAULT_MODEL);
    assert_eq!(json["max_tokens_range"], serde_json::json!([50, 500]));
    assert_eq!(json["has_default_api_key"], true);
}

#[tokio::test]
async fn chat_appends_turn_and_session_reflects_it() {
    let (_service, base) = spawn_test_server(Some("gsk-server")).await;

    let resp = post_chat(&base, "tab-1", serde_json::json!({"message": "hello"})).await;
    assert_eq!(resp.status(), 200);
    let turn: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(turn["user"]["text"], "hello");
    assert_eq!(turn["user"]["ordinal"], 0);
    assert_eq!(turn["assistant"]["text"], "re: hello");
    assert_eq!(turn["assistant"]["role"], "assistant");

    let session: serde_json::Value = reqwest::get(format!("{base}/api/sessions/tab-1"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["session_id"], "tab-1");
    assert_eq!(session["messages"].as_array().unwrap().len(), 2);

    // Other sessions are untouched.
    let other: serde_json::Value = reqwest::get(format!("{base}/api/sessions/tab-2"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(other["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_credential_is_400_and_appends_nothing() {
    let (service, base) = spawn_test_server(None).await;

    let resp = post_chat(&base, "s", serde_json::json!({"message": "hi"})).await;
    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("invalid argument"));

    assert!(service.store().get("s").unwrap().is_empty());
}

#[tokio::test]
async fn request_key_is_used_without_server_default() {
    let (_service, base) = spawn_test_server(None).await;
    let resp = post_chat(
        &base,
        "s",
        serde_json::json!({"message": "hi", "api_key": "gsk-client"}),
    )
    .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn invalid_settings_are_400() {
    let (_service, base) = spawn_test_server(Some("gsk-server")).await;
    let resp = post_chat(
        &base,
        "s",
        serde_json::json!({"message": "hi", "settings": {"temperature": 1.5}}),
    )
    .await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn completion_failure_is_502_and_keeps_user_message() {
    let (service, base) = spawn_test_server(Some("gsk-server")).await;

    let resp = post_chat(&base, "s", serde_json::json!({"message": "boom"})).await;
    assert_eq!(resp.status(), 502);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("upstream exploded"));

    let session = service.store().get("s").unwrap();
    assert_eq!(session.len(), 1);
    assert_eq!(session.messages()[0].role, Role::User);
}

#[tokio::test]
async fn export_is_a_json_attachment_without_system_messages() {
    let (service, base) = spawn_test_server(Some("gsk-server")).await;
    service.store().append("s", Role::System, "note").unwrap();
    post_chat(&base, "s", serde_json::json!({"message": "q"})).await;

    let resp = reqwest::get(format!("{base}/api/sessions/s/export"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let disposition = resp
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"chat_history.json\"");

    let records: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        records,
        serde_json::json!([
            {"role": "user", "text": "q"},
            {"role": "assistant", "text": "re: q"}
        ])
    );
}

#[tokio::test]
async fn clear_and_delete_return_204() {
    let (service, base) = spawn_test_server(Some("gsk-server")).await;
    post_chat(&base, "s", serde_json::json!({"message": "q"})).await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/api/sessions/s/clear"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert!(service.store().get("s").unwrap().is_empty());

    let resp = client
        .delete(format!("{base}/api/sessions/s"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert!(!service.store().session_ids().contains(&"s".to_string()));
}

#[tokio::test]
async fn blank_session_id_is_400() {
    let (_service, base) = spawn_test_server(Some("gsk-server")).await;
    let resp = reqwest::get(format!("{base}/api/sessions/%20")).await.unwrap();
    assert_eq!(resp.status(), 400);
}

// ── WebSocket Tests ──────────────────────────────────────────────────

async fn ws_connect(base: &str, session: &str) -> WsClient {
    let addr: SocketAddr = base.trim_start_matches("http://").parse().unwrap();
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/{session}"))
        .await
        .unwrap();
    ws
}

/// Next JSON text frame, failing the test if none arrives in time.
async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a WebSocket message")
            .expect("WebSocket closed")
            .unwrap();
        if let WsFrame::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn ws_send(ws: &mut WsClient, json: serde_json::Value) {
    ws.send(WsFrame::Text(json.to_string())).await.unwrap();
}

#[tokio::test]
async fn ws_sends_snapshot_on_connect() {
    let (service, base) = spawn_test_server(Some("gsk-server")).await;
    service.store().append("tab-1", Role::User, "earlier").unwrap();

    let mut ws = ws_connect(&base, "tab-1").await;
    let msg = next_json(&mut ws).await;
    assert_eq!(msg["type"], "snapshot");
    assert_eq!(msg["session"]["session_id"], "tab-1");
    assert_eq!(msg["session"]["messages"][0]["text"], "earlier");
}

#[tokio::test]
async fn ws_chat_streams_turn_events_in_order() {
    let (_service, base) = spawn_test_server(Some("gsk-server")).await;
    let mut ws = ws_connect(&base, "tab-1").await;
    assert_eq!(next_json(&mut ws).await["type"], "snapshot");

    ws_send(&mut ws, serde_json::json!({"type": "chat", "message": "hello"})).await;

    let user = next_json(&mut ws).await;
    assert_eq!(user["type"], "user_message");
    assert_eq!(user["message"]["text"], "hello");
    assert_eq!(user["message"]["ordinal"], 0);

    let first = next_json(&mut ws).await;
    let second = next_json(&mut ws).await;
    assert_eq!(first, serde_json::json!({"type": "text_delta", "delta": "re: "}));
    assert_eq!(second, serde_json::json!({"type": "text_delta", "delta": "hello"}));

    let assistant = next_json(&mut ws).await;
    assert_eq!(assistant["type"], "assistant_message");
    assert_eq!(assistant["message"]["text"], "re: hello");
    assert_eq!(assistant["message"]["ordinal"], 1);
}

#[tokio::test]
async fn ws_failed_turn_reports_turn_failed() {
    let (service, base) = spawn_test_server(Some("gsk-server")).await;
    let mut ws = ws_connect(&base, "s").await;
    next_json(&mut ws).await;

    ws_send(&mut ws, serde_json::json!({"type": "chat", "message": "boom"})).await;

    assert_eq!(next_json(&mut ws).await["type"], "user_message");
    let failed = next_json(&mut ws).await;
    assert_eq!(failed["type"], "turn_failed");
    assert!(failed["error"].as_str().unwrap().contains("upstream exploded"));

    assert_eq!(service.store().get("s").unwrap().len(), 1);
}

#[tokio::test]
async fn ws_missing_credential_reports_error() {
    let (service, base) = spawn_test_server(None).await;
    let mut ws = ws_connect(&base, "s").await;
    next_json(&mut ws).await;

    ws_send(&mut ws, serde_json::json!({"type": "chat", "message": "hi"})).await;

    let msg = next_json(&mut ws).await;
    assert_eq!(msg["type"], "error");
    assert!(service.store().get("s").unwrap().is_empty());
}

#[tokio::test]
async fn ws_clear_reports_cleared() {
    let (service, base) = spawn_test_server(Some("gsk-server")).await;
    service.store().append("s", Role::User, "old").unwrap();
    let mut ws = ws_connect(&base, "s").await;
    next_json(&mut ws).await;

    ws_send(&mut ws, serde_json::json!({"type": "clear"})).await;

    assert_eq!(
        next_json(&mut ws).await,
        serde_json::json!({"type": "cleared"})
    );
    assert!(service.store().get("s").unwrap().is_empty());
}

#[tokio::test]
async fn ws_events_stay_within_their_session() {
    let (_service, base) = spawn_test_server(Some("gsk-server")).await;
    let mut mine = ws_connect(&base, "tab-1").await;
    let mut other = ws_connect(&base, "tab-2").await;
    next_json(&mut mine).await;
    next_json(&mut other).await;

    ws_send(&mut mine, serde_json::json!({"type": "chat", "message": "hello"})).await;
    loop {
        if next_json(&mut mine).await["type"] == "assistant_message" {
            break;
        }
    }

    // A REST turn on tab-1 is also visible only to tab-1 clients.
    post_chat(&base, "tab-1", serde_json::json!({"message": "again"})).await;
    assert_eq!(next_json(&mut mine).await["type"], "user_message");

    let stray = tokio::time::timeout(Duration::from_millis(200), other.next()).await;
    assert!(stray.is_err(), "tab-2 received an event for tab-1: {stray:?}");
}
