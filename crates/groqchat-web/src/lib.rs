//! Browser-based chat UI for groqchat sessions.
//!
//! `groqchat-web` wraps a [`ChatService`] in an axum server: a REST API for
//! request/response use, a WebSocket per session for streamed replies, and an
//! embedded single-page chat UI served at `/`.
//!
//! # Quick start
//!
//! ```ignore
//! use groqchat::prelude::*;
//! use groqchat_web::{WebConfig, spawn_web};
//! use std::sync::Arc;
//!
//! let service = Arc::new(ChatService::new(Arc::new(GroqClient::new()?)));
//! let addr = spawn_web(service, WebConfig::default()).await?;
//! println!("Web UI: http://{addr}");
//! ```
//!
//! # Architecture
//!
//! ```text
//! browser ──POST /api/sessions/{id}/chat──▶ ChatService::send_with_events
//!    ▲       {"type":"chat"} over /ws/{id}            │
//!    │                                                 ▼ TurnEvent
//!    └──────── WsMessage (filtered by session) ◀── Broadcaster
//! ```
//!
//! Each browser tab owns one session id (kept in `sessionStorage`), so
//! separate tabs hold separate conversations.

mod api;
pub mod broadcast;
mod server;
pub mod snapshot;
mod ws;

pub use broadcast::{Broadcaster, SessionEvent, WsMessage};
pub use snapshot::SessionSnapshot;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use groqchat::turn::ChatService;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
    /// Directory to serve instead of the embedded page.
    pub static_dir: Option<PathBuf>,
    /// Maximum WebSocket broadcast channel capacity. Default: 256.
    ///
    /// Clients that fall behind by this many messages receive a fresh
    /// session snapshot to resynchronize.
    pub broadcast_capacity: usize,
    /// Credential used when a request carries none (usually `GROQ_API_KEY`).
    pub default_api_key: Option<String>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            static_dir: None,
            broadcast_capacity: 256,
            default_api_key: None,
        }
    }
}

impl WebConfig {
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(dir.into());
        self
    }

    pub fn with_default_api_key(mut self, key: Option<String>) -> Self {
        self.default_api_key = key;
        self
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down.
pub async fn spawn_web(service: Arc<ChatService>, config: WebConfig) -> std::io::Result<SocketAddr> {
    let router = server::build_router(service, &config);
    server::start_server(router, config.bind_addr).await
}
