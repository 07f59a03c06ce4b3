//! WebSocket upgrade handler and message dispatch.
//!
//! Each client connects to `/ws/{id}` for one session and receives:
//! 1. A full [`SessionSnapshot`] on connect.
//! 2. Every [`WsMessage`] broadcast for that session afterwards.
//!
//! Clients send `{"type":"chat", ...}` to start a turn or `{"type":"clear"}`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::{AppState, ChatBody, run_turn};
use crate::broadcast::{SessionEvent, WsMessage};
use crate::snapshot::SessionSnapshot;

/// A message sent from a WebSocket client.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Chat(ChatBody),
    Clear,
}

/// GET /ws/{id} — WebSocket upgrade handler.
pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(app): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app, session_id))
}

/// The session's current state, or an error message if the id is invalid.
fn snapshot_message(app: &AppState, session_id: &str) -> WsMessage {
    match app.service.store().get(session_id) {
        Ok(session) => WsMessage::Snapshot {
            session: SessionSnapshot::from_session(&session),
        },
        Err(e) => WsMessage::Error {
            error: e.to_string(),
        },
    }
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, app: AppState, session_id: String) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe before the snapshot so nothing falls between the two.
    let mut events = app.broadcaster.subscribe();

    if ws_send(&mut sink, &snapshot_message(&app, &session_id)).await.is_err() {
        return;
    }

    debug!("WebSocket client connected to session {session_id}");

    // Forward this session's broadcast events to the client.
    let resync_app = app.clone();
    let resync_id = session_id.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(msg) = next_for_session(&mut events, &resync_app, &resync_id).await {
            if ws_send(&mut sink, &msg).await.is_err() {
                break; // Client disconnected.
            }
        }
    });

    // Handle incoming messages from this client.
    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(text) => handle_client_message(&text, &app, &session_id),
            Message::Close(_) => break,
            _ => {} // Ignore binary, ping, pong.
        }
    }

    debug!("WebSocket client disconnected from session {session_id}");
    forward_task.abort();
}

/// Wait for the next message the client viewing `session_id` should see.
///
/// Events for other sessions are skipped. A receiver that fell behind gets a
/// fresh snapshot instead of the dropped events. `None` once the channel
/// closes.
async fn next_for_session(
    events: &mut broadcast::Receiver<SessionEvent>,
    app: &AppState,
    session_id: &str,
) -> Option<WsMessage> {
    loop {
        match events.recv().await {
            Ok(event) if event.session_id == session_id => return Some(event.message),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("WebSocket client lagged by {n} messages, resending snapshot");
                return Some(snapshot_message(app, session_id));
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

/// Process a JSON message received from a client.
///
/// Turns run on their own task so the socket keeps reading while a reply
/// streams; results reach the client through the broadcast channel.
fn handle_client_message(text: &str, app: &AppState, session_id: &str) {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Ignoring malformed WebSocket message: {e}");
            app.broadcaster.send(
                session_id,
                WsMessage::Error {
                    error: format!("malformed message: {e}"),
                },
            );
            return;
        }
    };

    match msg {
        ClientMessage::Chat(body) => {
            let app = app.clone();
            let session_id = session_id.to_string();
            tokio::spawn(async move {
                // Outcome is already broadcast.
                let _ = run_turn(&app, &session_id, body).await;
            });
        }
        ClientMessage::Clear => match app.service.clear(session_id) {
            Ok(()) => app.broadcaster.send(session_id, WsMessage::Cleared),
            Err(e) => app.broadcaster.send(
                session_id,
                WsMessage::Error {
                    error: e.to_string(),
                },
            ),
        },
    }
}

/// Serialize a `WsMessage` and send it over the WebSocket sink.
async fn ws_send(sink: &mut SplitSink<WebSocket, Message>, msg: &WsMessage) -> Result<(), ()> {
    let json = serde_json::to_string(msg).unwrap_or_default();
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
