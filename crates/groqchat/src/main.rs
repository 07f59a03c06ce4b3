//! Chat with a Groq-hosted model from the terminal.
//!
//! Reads the API key from `--api-key` or the `GROQ_API_KEY` environment
//! variable. Each line typed is one turn; the reply streams to stdout.
//!
//! # Examples
//!
//! ```sh
//! groqchat
//! groqchat --model llama-3.3-70b-versatile --temperature 0.2
//! groqchat --system "You are a terse Rust reviewer." --max-tokens 400
//! ```
//!
//! Commands inside the session:
//!
//! - `/clear` — forget the conversation so far
//! - `/export [path]` — write the conversation as JSON (default `chat_history.json`)
//! - `/quit` — exit

use clap::Parser;
use groqchat::config::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE,
    default_api_key_from_env, resolve_api_key,
};
use groqchat::export::{EXPORT_FILE_NAME, write_export};
use groqchat::prelude::*;
use std::io::{self, BufRead, Write};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Chat with a Groq-hosted model from the terminal.
#[derive(Parser)]
#[command(name = "groqchat")]
struct Cli {
    /// API key (falls back to GROQ_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Model to use
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature (0.0 – 1.0)
    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    /// Maximum tokens in each reply
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,

    /// System prompt appended after the built-in instruction
    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system: String,

    /// Session identifier
    #[arg(long, default_value = "default")]
    session: String,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    no_stream: bool,

    /// Per-turn timeout in seconds (0 disables)
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

enum Command {
    Clear,
    Export(String),
    Quit,
    Say(String),
}

fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let cmd = match line.split_once(char::is_whitespace) {
        Some(("/export", path)) => Command::Export(path.trim().to_string()),
        None if line == "/export" => Command::Export(EXPORT_FILE_NAME.to_string()),
        _ if line == "/clear" => Command::Clear,
        _ if line == "/quit" || line == "/exit" => Command::Quit,
        _ => Command::Say(line.to_string()),
    };
    Some(cmd)
}

async fn run(cli: Cli) -> Result<()> {
    let default_key = default_api_key_from_env();
    let api_key = resolve_api_key(cli.api_key.as_deref(), default_key.as_deref())?;

    let config = PromptConfig::default()
        .with_model(&cli.model)
        .with_temperature(cli.temperature)
        .with_max_tokens(cli.max_tokens)
        .with_system_prompt(&cli.system);
    config.validate()?;

    let timeout = (cli.timeout_secs > 0).then(|| Duration::from_secs(cli.timeout_secs));
    let client = GroqClient::new()?;
    let service = ChatService::new(Arc::new(client))
        .with_timeout(timeout)
        .with_streaming(!cli.no_stream);

    eprintln!("groqchat — {} (type /quit to exit)", config.model);

    let stdin = io::stdin();
    loop {
        print!("\n> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match parse_line(&line) {
            None => continue,
            Some(Command::Quit) => break,
            Some(Command::Clear) => {
                service.clear(&cli.session)?;
                eprintln!("  [cleared]");
            }
            Some(Command::Export(path)) => {
                let session = service.store().get(&cli.session)?;
                write_export(&session, &path)?;
                eprintln!("  [exported {} message(s) to {path}]", export(&session).len());
            }
            Some(Command::Say(text)) => {
                let streaming = !cli.no_stream;
                let mut on_delta = |delta: &str| {
                    print!("{delta}");
                    let _ = io::stdout().flush();
                };
                match service
                    .send(&cli.session, &config, &api_key, &text, &mut on_delta)
                    .await
                {
                    Ok(turn) if !streaming => println!("{}", turn.assistant.text),
                    Ok(_) => println!(),
                    Err(e) => eprintln!("\n  Error: {e}"),
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert!(parse_line("   ").is_none());
        assert!(matches!(parse_line("/clear"), Some(Command::Clear)));
        assert!(matches!(parse_line("/quit"), Some(Command::Quit)));
        assert!(
            matches!(parse_line("/export"), Some(Command::Export(p)) if p == EXPORT_FILE_NAME)
        );
        assert!(matches!(parse_line("/export out.json"), Some(Command::Export(p)) if p == "out.json"));
        assert!(matches!(parse_line("hello there"), Some(Command::Say(t)) if t == "hello there"));
    }
}
