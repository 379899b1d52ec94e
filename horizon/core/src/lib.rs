//! Horizon Core - Resilient Streaming Link to the Assistant Service
//!
//! This crate keeps a desktop assistant talking to its remote AI service:
//! it holds a WebSocket link open, resends the whole conversation with each
//! user turn, assembles streamed replies, and reconnects with bounded
//! exponential backoff when the link drops.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         UI Surface                           │
//! │        (desktop overlay, horizon-chat CLI, headless)         │
//! └──────────────┬────────────────────────────▲──────────────────┘
//!                │ send / connect             │ ChatObserver
//!                │ disconnect / clear         │ ConnectionEvent
//! ┌──────────────▼────────────────────────────┴──────────────────┐
//! │                        AssistClient                          │
//! │  ┌──────────────┐  ┌──────────────────┐  ┌─────────────────┐ │
//! │  │ Conversation │  │ ResponseAssembler│  │ ConnectionState │ │
//! │  │ (log+bubbles)│  │ (streamed reply) │  │ (backoff, phase)│ │
//! │  └──────────────┘  └──────────────────┘  └─────────────────┘ │
//! └──────────────┬───────────────────────────────────────────────┘
//!                │ Connector
//! ┌──────────────▼───────────────────────────────────────────────┐
//! │   WebSocketConnector (keepalive)   │   InProcessConnector    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`AssistClient`]: the facade a surface talks to
//! - [`UserTurn`]: one user message with its desktop context
//! - [`ChatObserver`]: callbacks for the current response and link state
//! - [`ConnectionEvent`]: connection transitions, including retries
//! - [`ClientConfig`]: loaded from TOML, environment and CLI overrides
//!
//! # Quick Start
//!
//! ```ignore
//! use horizon_core::{config::load_config, AssistClient, UserTurn};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let client = AssistClient::from_config(&config).build();
//!
//!     client.connect().await;
//!     client.send(UserTurn::new("summarize this page")).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`client`]: the facade and its background tasks
//! - [`config`]: TOML configuration with environment overrides
//! - [`connection`]: connection state machine and backoff policy
//! - [`context`]: desktop context capture and notification seams
//! - [`events`]: observer trait and connection events
//! - [`messages`]: message log and display record types
//! - [`session`]: the conversation
//! - [`streaming`]: assembly of streamed replies
//! - [`transport`]: connectors (WebSocket, in-process)

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod connection;
pub mod context;
pub mod events;
pub mod messages;
pub mod session;
pub mod streaming;
pub mod transport;

// Re-exports for convenience
pub use client::{
    AssistClient, AssistClientBuilder, ClientError, ConnectionStatus, Transcript, UserTurn,
};
pub use config::{ClientConfig, ConfigError, ConfigOverrides, ConfigSource};
pub use connection::{ConnectionPhase, ConnectionState, HealthMonitorConfig, ReconnectPolicy};
pub use context::{CapturedContext, ContextProvider, LogNotifier, NotificationSink, StaticContext};
pub use events::{CallbackObserver, ChatObserver, ConnectionEvent, NoopObserver};
pub use messages::{DisplayRecord, Message, MessageMetadata, MessageRole, RecordId};
pub use session::Conversation;
pub use streaming::{AssistantReply, InboundFrame, ResponseAssembler};
pub use transport::{Connector, InProcessConnector, TransportConfig, TransportError};

#[cfg(feature = "websocket")]
pub use transport::WebSocketConnector;
