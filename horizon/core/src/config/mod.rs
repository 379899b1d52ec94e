//! TOML Configuration File Support
//!
//! Configuration lives at `$XDG_CONFIG_HOME/horizon/assist.toml`
//! (typically `~/.config/horizon/assist.toml`).
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables (`HORIZON_*`)
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [connection]
//! url = "wss://assist.example.org/chat-ws"
//! connect_timeout_ms = 5000
//! max_message_size = 1048576
//!
//! [keepalive]
//! enabled = true
//! interval_secs = 30
//! timeout_secs = 10
//!
//! [reconnect]
//! max_attempts = 10
//! base_delay_ms = 1000
//! max_delay_ms = 30000
//!
//! [health]
//! interval_secs = 10
//!
//! [assistant]
//! smarter_analysis = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection::{HealthMonitorConfig, ReconnectPolicy};
use crate::transport::config::TransportConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Where the configuration last got a value from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line argument
    Cli,
    /// Environment variable
    Env,
    /// TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[connection]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionToml {
    /// Service URL
    pub url: Option<String>,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Close timeout in milliseconds
    pub close_timeout_ms: Option<u64>,
    /// Inbound message limit in bytes (0 = unlimited)
    pub max_message_size: Option<usize>,
}

/// `[keepalive]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveToml {
    /// Whether to send pings
    pub enabled: Option<bool>,
    /// Ping interval in seconds
    pub interval_secs: Option<u64>,
    /// Pong timeout in seconds
    pub timeout_secs: Option<u64>,
    /// Missed pongs tolerated before the link is declared dead
    pub max_missed_pongs: Option<u32>,
}

/// `[reconnect]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectToml {
    /// Automatic attempts before giving up
    pub max_attempts: Option<u32>,
    /// Delay before the first attempt in milliseconds
    pub base_delay_ms: Option<u64>,
    /// Backoff cap in milliseconds
    pub max_delay_ms: Option<u64>,
}

/// `[health]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthToml {
    /// Whether the health monitor runs
    pub enabled: Option<bool>,
    /// Seconds between checks
    pub interval_secs: Option<u64>,
}

/// `[assistant]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantToml {
    /// Request smarter analysis by default
    pub smarter_analysis: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistToml {
    /// Connection section
    pub connection: ConnectionToml,
    /// Keepalive section
    pub keepalive: KeepaliveToml,
    /// Reconnect section
    pub reconnect: ReconnectToml,
    /// Health monitor section
    pub health: HealthToml,
    /// Assistant section
    pub assistant: AssistantToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Everything needed to build an [`AssistClient`](crate::AssistClient)
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Transport settings
    pub transport: TransportConfig,

    /// Reconnection backoff
    pub reconnect: ReconnectPolicy,

    /// Health monitor
    pub health: HealthMonitorConfig,

    /// Request smarter analysis by default
    pub smarter_analysis: bool,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            reconnect: ReconnectPolicy::default(),
            health: HealthMonitorConfig::default(),
            smarter_analysis: false,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Check values that would make the client unusable
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a non-WebSocket URL, a zero base delay,
    /// or a backoff cap below the base delay.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.transport.url;
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "service url must start with ws:// or wss://, got {url:?}"
            )));
        }
        if self.reconnect.base_delay.is_zero() {
            return Err(ConfigError::ValidationError(
                "reconnect base delay must be greater than zero".to_string(),
            ));
        }
        if self.reconnect.max_delay < self.reconnect.base_delay {
            return Err(ConfigError::ValidationError(
                "reconnect max delay must not be below the base delay".to_string(),
            ));
        }
        if self.health.enabled && self.health.interval.is_zero() {
            return Err(ConfigError::ValidationError(
                "health check interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/horizon/assist.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("horizon").join("assist.toml"))
}

/// Load configuration from the default path and the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// result fails validation. A missing file is not an error.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path().as_deref())
}

/// Load configuration from a specific path and the environment
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the result
/// fails validation.
pub fn load_config_from_path(path: Option<&Path>) -> Result<ClientConfig, ConfigError> {
    load_config_with(path, &|key| std::env::var(key).ok())
}

/// Load with an injected environment lookup
pub(crate) fn load_config_with(
    path: Option<&Path>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.to_path_buf(),
                    source: e,
                })?;

            let toml_config: AssistToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.to_path_buf());
            config.source = ConfigSource::File;

            tracing::info!(path = %config_path.display(), "Loaded configuration from file");
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, lookup);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut ClientConfig, toml: &AssistToml) {
    let connection = &toml.connection;
    if let Some(ref url) = connection.url {
        config.transport.url.clone_from(url);
    }
    if let Some(ms) = connection.connect_timeout_ms {
        config.transport.connect_timeout_ms = ms;
    }
    if let Some(ms) = connection.close_timeout_ms {
        config.transport.close_timeout_ms = ms;
    }
    if let Some(size) = connection.max_message_size {
        config.transport.max_message_size = (size > 0).then_some(size);
    }

    let keepalive = &mut config.transport.keepalive;
    if let Some(enabled) = toml.keepalive.enabled {
        keepalive.enabled = enabled;
    }
    if let Some(secs) = toml.keepalive.interval_secs {
        keepalive.heartbeat_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.keepalive.timeout_secs {
        keepalive.response_timeout = Duration::from_secs(secs);
    }
    if let Some(max_missed) = toml.keepalive.max_missed_pongs {
        keepalive.max_missed_pongs = max_missed;
    }

    if let Some(attempts) = toml.reconnect.max_attempts {
        config.reconnect.max_attempts = attempts;
    }
    if let Some(ms) = toml.reconnect.base_delay_ms {
        config.reconnect.base_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.reconnect.max_delay_ms {
        config.reconnect.max_delay = Duration::from_millis(ms);
    }

    if let Some(enabled) = toml.health.enabled {
        config.health.enabled = enabled;
    }
    if let Some(secs) = toml.health.interval_secs {
        config.health.interval = Duration::from_secs(secs);
    }

    if let Some(smarter) = toml.assistant.smarter_analysis {
        config.smarter_analysis = smarter;
    }
}

/// Apply `HORIZON_*` environment overrides
///
/// Beyond the transport variables read by [`TransportConfig::from_env`]:
/// - `HORIZON_RECONNECT_ATTEMPTS`
/// - `HORIZON_RECONNECT_BASE_DELAY_MS`
/// - `HORIZON_RECONNECT_MAX_DELAY_MS`
/// - `HORIZON_HEALTH_INTERVAL` (seconds, 0 disables the monitor)
/// - `HORIZON_SMARTER_ANALYSIS`
fn apply_env_config(config: &mut ClientConfig, lookup: &dyn Fn(&str) -> Option<String>) {
    let mut applied = config.transport.apply_env(lookup);

    if let Some(n) = lookup("HORIZON_RECONNECT_ATTEMPTS").and_then(|v| v.parse().ok()) {
        config.reconnect.max_attempts = n;
        applied = true;
    }
    if let Some(ms) = lookup("HORIZON_RECONNECT_BASE_DELAY_MS").and_then(|v| v.parse().ok()) {
        config.reconnect.base_delay = Duration::from_millis(ms);
        applied = true;
    }
    if let Some(ms) = lookup("HORIZON_RECONNECT_MAX_DELAY_MS").and_then(|v| v.parse().ok()) {
        config.reconnect.max_delay = Duration::from_millis(ms);
        applied = true;
    }
    if let Some(secs) = lookup("HORIZON_HEALTH_INTERVAL").and_then(|v| v.parse::<u64>().ok()) {
        if secs == 0 {
            config.health.enabled = false;
        } else {
            config.health.interval = Duration::from_secs(secs);
        }
        applied = true;
    }
    if let Some(smarter) = lookup("HORIZON_SMARTER_ANALYSIS") {
        config.smarter_analysis = smarter != "0" && smarter.to_lowercase() != "false";
        applied = true;
    }

    if applied {
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Overrides collected from the command line
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Service URL override
    pub url: Option<String>,

    /// Connect timeout override
    pub connect_timeout_ms: Option<u64>,

    /// Reconnect attempts override
    pub reconnect_attempts: Option<u32>,

    /// Keepalive override
    pub keepalive_enabled: Option<bool>,

    /// Smarter analysis override
    pub smarter_analysis: Option<bool>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set service URL override
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Set reconnect attempts override
    #[must_use]
    pub fn with_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.reconnect_attempts = Some(attempts);
        self
    }

    /// Set keepalive override
    #[must_use]
    pub fn with_keepalive_enabled(mut self, enabled: bool) -> Self {
        self.keepalive_enabled = Some(enabled);
        self
    }

    /// Set smarter analysis override
    #[must_use]
    pub fn with_smarter_analysis(mut self, enabled: bool) -> Self {
        self.smarter_analysis = Some(enabled);
        self
    }

    fn is_empty(&self) -> bool {
        self.url.is_none()
            && self.connect_timeout_ms.is_none()
            && self.reconnect_attempts.is_none()
            && self.keepalive_enabled.is_none()
            && self.smarter_analysis.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if self.is_empty() {
            return;
        }
        config.source = ConfigSource::Cli;

        if let Some(ref url) = self.url {
            config.transport.url.clone_from(url);
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.transport.connect_timeout_ms = ms;
        }
        if let Some(attempts) = self.reconnect_attempts {
            config.reconnect.max_attempts = attempts;
        }
        if let Some(enabled) = self.keepalive_enabled {
            config.transport.keepalive.enabled = enabled;
        }
        if let Some(enabled) = self.smarter_analysis {
            config.smarter_analysis = enabled;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
