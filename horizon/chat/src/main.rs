//! Horizon Chat - Terminal Client for the Assistant Service
//!
//! Line-oriented chat over the resilient assistant link. Responses stream to
//! stdout as they arrive; connection notices and logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Default endpoint (ws://127.0.0.1:8765/chat-ws)
//! horizon-chat
//!
//! # Another service, deeper analysis on
//! horizon-chat --url wss://assist.example.org/chat-ws --smarter
//!
//! # Attach context to the first message
//! horizon-chat --image screen.png --browser-url https://docs.rs
//!
//! # Verbose logging
//! RUST_LOG=debug horizon-chat
//! ```
//!
//! # Commands
//!
//! - `/status`: connection and turn state
//! - `/history`: the message log
//! - `/clear`: start a new conversation
//! - `/quit`: disconnect and exit (also Ctrl-C or end of input)

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use horizon_core::config::{load_config, load_config_from_path};
use horizon_core::{
    AssistClient, CapturedContext, ClientError, ConfigOverrides, LogNotifier, UserTurn,
};

use render::StdoutRenderer;

/// Horizon Chat - talk to the assistant service from a terminal
#[derive(Parser, Debug)]
#[command(name = "horizon-chat")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Service URL (ws:// or wss://)
    #[arg(short = 'u', long, env = "HORIZON_WS_URL", value_name = "URL")]
    url: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "HORIZON_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "HORIZON_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Ask the service for its deeper analysis pass
    #[arg(long)]
    smarter: bool,

    /// Automatic reconnect attempts before giving up
    #[arg(long, value_name = "N")]
    reconnect_attempts: Option<u32>,

    /// Image file sent with the first message
    #[arg(long, value_name = "FILE")]
    image: Option<PathBuf>,

    /// Selected text sent with the first message
    #[arg(long, value_name = "TEXT")]
    selected_text: Option<String>,

    /// OCR text sent with the first message
    #[arg(long, value_name = "TEXT")]
    ocr_text: Option<String>,

    /// Browser URL sent with the first message
    #[arg(long, value_name = "URL")]
    browser_url: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        overrides.url.clone_from(&self.url);
        overrides.reconnect_attempts = self.reconnect_attempts;
        if self.smarter {
            overrides.smarter_analysis = Some(true);
        }
        overrides
    }

    async fn first_turn_context(&self) -> Result<CapturedContext> {
        let image = match self.image {
            Some(ref path) => Some(
                tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read image: {}", path.display()))?,
            ),
            None => None,
        };
        Ok(CapturedContext {
            selected_text: self.selected_text.clone(),
            ocr_text: self.ocr_text.clone(),
            browser_url: self.browser_url.clone(),
            image,
        })
    }
}

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Send(&'a str),
    Status,
    History,
    Clear,
    Quit,
    Unknown(&'a str),
    Empty,
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Empty,
            "/status" => Self::Status,
            "/history" => Self::History,
            "/clear" => Self::Clear,
            "/quit" | "/exit" => Self::Quit,
            cmd if cmd.starts_with('/') => Self::Unknown(cmd),
            text => Self::Send(text),
        }
    }
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("horizon_chat={level},horizon_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

fn print_status(client: &AssistClient) {
    let status = client.status();
    eprintln!(
        "phase: {}  connected: {}  receiving: {}  maintain: {}  attempts: {}  messages: {}",
        status.phase,
        status.connected,
        status.receiving,
        status.should_maintain,
        status.attempt_count,
        status.message_count,
    );
    if let Some(id) = status.connection_id {
        eprintln!("link: {id}");
    }
    if let Some(backoff) = status.last_backoff {
        eprintln!("last backoff: {}ms", backoff.as_millis());
    }
}

fn print_history(client: &AssistClient) {
    let messages = client.messages();
    if messages.is_empty() {
        eprintln!("(no messages)");
    }
    for message in messages {
        eprintln!("{}: {}", message.role, message.content);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let mut config = match args.config {
        Some(ref path) => load_config_from_path(Some(path.as_path())),
        None => load_config(),
    }
    .context("Failed to load configuration")?;
    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        url = %config.transport.url,
        source = %config.source(),
        "Starting horizon-chat"
    );

    let mut pending_context = Some(args.first_turn_context().await?);
    let renderer = Arc::new(StdoutRenderer::new());
    let client = AssistClient::from_config(&config)
        .observer(renderer.clone())
        .notifier(Arc::new(LogNotifier))
        .build();

    if !client.connect().await {
        warn!(url = %config.transport.url, "Service unreachable, retrying in the background");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Status => print_status(&client),
            Command::History => print_history(&client),
            Command::Clear => {
                client.clear_conversation();
                renderer.finish_turn();
                eprintln!("(conversation cleared)");
            }
            Command::Unknown(cmd) => {
                eprintln!("unknown command {cmd}; try /status /history /clear /quit");
            }
            Command::Send(text) => {
                renderer.finish_turn();
                let mut turn = UserTurn::new(text).with_smarter_analysis(config.smarter_analysis);
                if let Some(context) = pending_context.take() {
                    turn = turn.with_context(context);
                }
                match client.send(turn).await {
                    Ok(()) => {}
                    Err(ClientError::NotConnected) => {
                        eprintln!("(not connected; message not sent)");
                    }
                    Err(e) => eprintln!("(send failed: {e})"),
                }
            }
        }
    }

    renderer.finish_turn();
    client.disconnect().await;
    Ok(())
}
