//! Axum server setup and router construction.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::response::Html;
use axum::routing::{get, post};
use groqchat::turn::ChatService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::WebConfig;
use crate::api::{self, AppState};
use crate::broadcast::Broadcaster;
use crate::ws;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Build the full axum router.
///
/// The router serves:
/// - WebSocket at `/ws/{id}`
/// - REST API at `/api/*`
/// - The chat page at `/` (or `static_dir` when configured)
pub fn build_router(service: Arc<ChatService>, config: &WebConfig) -> Router {
    let state = AppState {
        service,
        broadcaster: Broadcaster::new(config.broadcast_capacity),
        default_api_key: config.default_api_key.clone(),
    };

    // CORS layer for development (UI served from another origin).
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = Router::new()
        .route("/ws/{id}", get(ws::ws_upgrade))
        .route("/api/settings", get(api::get_settings))
        .route(
            "/api/sessions/{id}",
            get(api::get_session).delete(api::delete_session),
        )
        .route("/api/sessions/{id}/chat", post(api::post_chat))
        .route("/api/sessions/{id}/clear", post(api::post_clear))
        .route("/api/sessions/{id}/export", get(api::get_export))
        .with_state(state);

    let router = match &config.static_dir {
        Some(dir) => routes.fallback_service(ServeDir::new(dir)),
        None => routes.route("/", get(|| async { Html(INDEX_HTML) })),
    };

    router.layer(cors)
}

/// Bind `bind_addr`, serve `router` on a background task, and return the
/// bound address.
pub async fn start_server(router: Router, bind_addr: SocketAddr) -> std::io::Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;
    info!("Listening on http://{addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!("Web server stopped: {e}");
        }
    });

    Ok(addr)
}
