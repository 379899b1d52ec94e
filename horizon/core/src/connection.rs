//! Connection State Machine
//!
//! ```text
//!   Idle ──► Connecting ──► Connected ──(lost)──► Disconnected
//!                │                                     │
//!                └──(failed)──► Reconnecting ◄─────────┘
//!                                   │    │
//!                        (succeeded)│    │(max_attempts exhausted)
//!                                   ▼    ▼
//!                             Connected  GivenUp
//! ```
//!
//! [`ConnectionState`] only does bookkeeping. The client owns the transport
//! handle and the tasks that drive these transitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::ConnectionId;

/// Bounded exponential backoff
///
/// Attempt `n` (1-based) waits `min(base_delay * 2^(n-1), max_delay)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Automatic attempts before giving up (default: 10)
    pub max_attempts: u32,
    /// Delay before the first attempt (default: 1 second)
    pub base_delay: Duration,
    /// Backoff cap (default: 30 seconds)
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Create a policy with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Short delays for tests
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        }
    }

    /// Set the maximum number of automatic attempts
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay
    #[must_use]
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the backoff cap
    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before the given 1-based attempt
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Periodic health check settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthMonitorConfig {
    /// Time between checks (default: 10 seconds)
    pub interval: Duration,
    /// Whether the monitor runs at all
    pub enabled: bool,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            enabled: true,
        }
    }
}

impl HealthMonitorConfig {
    /// Monitor turned off
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Check every `interval`
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Where the connection is in its lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPhase {
    /// Never connected
    #[default]
    Idle,
    /// A connection attempt is in flight
    Connecting,
    /// A link is up
    Connected,
    /// Waiting out a backoff delay
    Reconnecting,
    /// No link and no retry in progress
    Disconnected,
    /// Automatic retries exhausted; only an explicit connect resumes
    GivenUp,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::GivenUp => "given up",
        };
        f.write_str(name)
    }
}

/// Connection bookkeeping shared by the client's tasks
#[derive(Clone, Debug, Default)]
pub struct ConnectionState {
    phase: ConnectionPhase,
    attempt_count: u32,
    last_backoff: Option<Duration>,
    connection_id: Option<ConnectionId>,
}

impl ConnectionState {
    /// Fresh state in `Idle`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection attempt started
    pub fn mark_connecting(&mut self) {
        if self.phase != ConnectionPhase::Connected {
            self.phase = ConnectionPhase::Connecting;
        }
    }

    /// A link came up; resets the attempt counter and backoff
    pub fn mark_connected(&mut self, connection_id: ConnectionId) {
        self.phase = ConnectionPhase::Connected;
        self.attempt_count = 0;
        self.last_backoff = None;
        self.connection_id = Some(connection_id);
    }

    /// The link is gone (or an attempt failed)
    ///
    /// `GivenUp` is sticky until [`resume`](Self::resume).
    pub fn mark_disconnected(&mut self) {
        self.connection_id = None;
        if self.phase != ConnectionPhase::GivenUp {
            self.phase = ConnectionPhase::Disconnected;
        }
    }

    /// Leave `GivenUp` after an explicit connect request
    pub fn resume(&mut self) {
        if self.phase == ConnectionPhase::GivenUp {
            self.phase = ConnectionPhase::Disconnected;
        }
    }

    /// Advance the backoff schedule
    ///
    /// Returns the attempt number and the delay to wait before it, or `None`
    /// once `max_attempts` is exhausted. Exhaustion resets the counter to 0
    /// and moves to `GivenUp`.
    pub fn next_backoff(&mut self, policy: &ReconnectPolicy) -> Option<(u32, Duration)> {
        if self.attempt_count < policy.max_attempts {
            self.attempt_count += 1;
            let delay = policy.delay_for_attempt(self.attempt_count);
            self.last_backoff = Some(delay);
            self.phase = ConnectionPhase::Reconnecting;
            Some((self.attempt_count, delay))
        } else {
            self.attempt_count = 0;
            self.phase = ConnectionPhase::GivenUp;
            None
        }
    }

    /// Current lifecycle phase
    #[must_use]
    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Whether a link is up
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Connected
    }

    /// Whether automatic retry has given up
    #[must_use]
    pub fn is_given_up(&self) -> bool {
        self.phase == ConnectionPhase::GivenUp
    }

    /// Automatic attempts made since the last successful connection
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Most recent backoff delay
    #[must_use]
    pub fn last_backoff(&self) -> Option<Duration> {
        self.last_backoff
    }

    /// ID of the current link
    #[must_use]
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }
}
