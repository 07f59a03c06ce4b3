//! Groq chat in the browser.
//!
//! Serves the chat page and its API, then runs until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! GROQ_API_KEY=gsk_... cargo run -p groqchat-web
//! cargo run -p groqchat-web -- --port 8080        # key entered in the sidebar
//! cargo run -p groqchat-web -- --static-dir ./ui  # serve a custom frontend
//! ```
//!
//! ## Sending messages
//!
//! **WebSocket** (connect to `/ws/{session}`):
//! ```json
//! {"type": "chat", "message": "What is a monad?", "settings": {"temperature": 0.3}}
//! ```
//!
//! **REST** (`POST /api/sessions/{session}/chat`):
//! ```json
//! {"message": "What is a monad?", "api_key": "gsk_..."}
//! ```

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use groqchat::config::default_api_key_from_env;
use groqchat::prelude::*;
use groqchat_web::{WebConfig, spawn_web};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Browser UI for chatting with Groq-hosted models.
#[derive(Parser)]
#[command(name = "groqchat-web")]
struct Args {
    /// Port for the web UI server.
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Serve this directory instead of the built-in page.
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Per-turn timeout in seconds (0 disables).
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Ask for whole replies instead of streamed deltas.
    #[arg(long)]
    no_stream: bool,
}

async fn run(args: Args) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let default_api_key = default_api_key_from_env();
    if default_api_key.is_none() {
        info!("{API_KEY_ENV} not set; clients must supply an API key");
    }

    let timeout = (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs));
    let service = ChatService::new(Arc::new(GroqClient::new()?))
        .with_timeout(timeout)
        .with_streaming(!args.no_stream);

    let mut config = WebConfig::default()
        .with_bind_addr(([127, 0, 0, 1], args.port).into())
        .with_default_api_key(default_api_key);
    if let Some(dir) = args.static_dir {
        config = config.with_static_dir(dir);
    }

    let addr = spawn_web(Arc::new(service), config).await?;
    println!("Web UI: http://{addr}");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Args::parse()).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
