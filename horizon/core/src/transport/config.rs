//! Transport Configuration
//!
//! Where the assistant service lives and how patient the transport is with it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::heartbeat::HeartbeatConfig;

/// Default endpoint of the assistant service
pub const DEFAULT_SERVICE_URL: &str = "ws://127.0.0.1:8765/chat-ws";

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// WebSocket URL of the assistant service (`ws://` or `wss://`)
    pub url: String,

    /// Connection timeout in milliseconds
    ///
    /// Covers TCP connect plus the WebSocket handshake.
    pub connect_timeout_ms: u64,

    /// How long a graceful close may take, in milliseconds
    pub close_timeout_ms: u64,

    /// Largest inbound message accepted, in bytes (None = unlimited)
    pub max_message_size: Option<usize>,

    /// Ping/pong keepalive
    pub keepalive: HeartbeatConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVICE_URL.to_string(),
            connect_timeout_ms: 10_000,
            close_timeout_ms: 10_000,
            max_message_size: Some(1 << 20),
            keepalive: HeartbeatConfig::default(),
        }
    }
}

impl TransportConfig {
    /// Create configuration for a specific endpoint
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Short timeouts for tests
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            connect_timeout_ms: 1000,
            close_timeout_ms: 200,
            keepalive: HeartbeatConfig::for_testing(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `HORIZON_WS_URL`: Service URL
    /// - `HORIZON_CONNECT_TIMEOUT`: Connection timeout in ms
    /// - `HORIZON_CLOSE_TIMEOUT`: Close timeout in ms
    /// - `HORIZON_MAX_MESSAGE_SIZE`: Inbound message limit in bytes (0 = unlimited)
    /// - `HORIZON_KEEPALIVE`: "0" or "false" to disable pings
    /// - `HORIZON_KEEPALIVE_INTERVAL`: Ping interval in ms
    /// - `HORIZON_KEEPALIVE_TIMEOUT`: Pong timeout in ms
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(&|key| std::env::var(key).ok());
        config
    }

    /// Apply `HORIZON_*` transport variables read through `lookup`
    ///
    /// Returns true if any variable was applied.
    pub(crate) fn apply_env(&mut self, lookup: &dyn Fn(&str) -> Option<String>) -> bool {
        let mut applied = false;

        if let Some(url) = lookup("HORIZON_WS_URL") {
            self.url = url;
            applied = true;
        }
        if let Some(ms) = lookup("HORIZON_CONNECT_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.connect_timeout_ms = ms;
            applied = true;
        }
        if let Some(ms) = lookup("HORIZON_CLOSE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.close_timeout_ms = ms;
            applied = true;
        }
        if let Some(size) = lookup("HORIZON_MAX_MESSAGE_SIZE").and_then(|v| v.parse::<usize>().ok())
        {
            self.max_message_size = (size > 0).then_some(size);
            applied = true;
        }
        if let Some(enabled) = lookup("HORIZON_KEEPALIVE") {
            self.keepalive.enabled = enabled != "0" && enabled.to_lowercase() != "false";
            applied = true;
        }
        if let Some(ms) = lookup("HORIZON_KEEPALIVE_INTERVAL").and_then(|v| v.parse().ok()) {
            self.keepalive.heartbeat_interval = Duration::from_millis(ms);
            applied = true;
        }
        if let Some(ms) = lookup("HORIZON_KEEPALIVE_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.keepalive.response_timeout = Duration::from_millis(ms);
            applied = true;
        }

        applied
    }

    /// Connection timeout as a `Duration`
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Close timeout as a `Duration`
    #[must_use]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Whether the URL asks for TLS
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.starts_with("wss://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.url, DEFAULT_SERVICE_URL);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.close_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_message_size, Some(1024 * 1024));
        assert!(config.keepalive.enabled);
        assert!(!config.is_secure());
    }

    #[test]
    fn test_apply_env() {
        let mut config = TransportConfig::default();
        let applied = config.apply_env(&lookup_from(&[
            ("HORIZON_WS_URL", "wss://assist.example.org/chat-ws"),
            ("HORIZON_CONNECT_TIMEOUT", "2500"),
            ("HORIZON_MAX_MESSAGE_SIZE", "0"),
            ("HORIZON_KEEPALIVE", "false"),
            ("HORIZON_KEEPALIVE_INTERVAL", "15000"),
        ]));

        assert!(applied);
        assert_eq!(config.url, "wss://assist.example.org/chat-ws");
        assert!(config.is_secure());
        assert_eq!(config.connect_timeout_ms, 2500);
        assert_eq!(config.max_message_size, None);
        assert!(!config.keepalive.enabled);
        assert_eq!(config.keepalive.heartbeat_interval, Duration::from_secs(15));
    }

    #[test]
    fn test_apply_env_ignores_garbage() {
        let mut config = TransportConfig::default();
        let applied = config.apply_env(&lookup_from(&[("HORIZON_CONNECT_TIMEOUT", "soon")]));

        assert!(!applied);
        assert_eq!(config, TransportConfig::default());
    }
}
