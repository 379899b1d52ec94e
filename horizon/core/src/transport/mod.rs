//! Transport Layer for the Assistant Link
//!
//! Provides abstraction over the ways the client reaches the assistant service:
//! - `WebSocket`: the remote service (default, `websocket` feature)
//! - `InProcess`: channel pair for embedding and tests
//!
//! # Design Philosophy
//!
//! Transports only move frames. Reconnection, backoff and turn assembly all
//! live in the client, so every transport gets identical recovery behavior
//! and the in-process transport exercises exactly the code paths the
//! WebSocket transport does.

pub mod config;
pub mod frame;
pub mod heartbeat;
pub mod in_process;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-exports for convenience
pub use config::{TransportConfig, DEFAULT_SERVICE_URL};
pub use frame::{InboundPayload, OutboundRequest, WireMessage};
pub use heartbeat::{ConnectionHealth, HeartbeatConfig, HeartbeatMonitor, HeartbeatVerdict};
pub use in_process::{InProcessConnector, ServiceEndpoint, ServiceListener};
pub use traits::{ConnectionId, Connector, FrameSink, FrameStream, Link, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnector;
