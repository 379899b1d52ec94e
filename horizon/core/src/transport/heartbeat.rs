//! Keepalive Heartbeat
//!
//! Detects links that are open at the socket level but no longer answer.
//! The transport periodically sends a ping carrying a sequence number and
//! expects the matching pong within `response_timeout`.
//!
//! # Protocol
//!
//! 1. After `heartbeat_interval` without inbound traffic, a ping `{seq}` is sent
//! 2. The peer must echo the pong within `response_timeout`
//! 3. After `max_missed_pongs` consecutive misses the link is declared dead
//!
//! The monitor itself never touches the socket. The transport owns the ping
//! writer and watches [`HeartbeatMonitor::wait_dead`] to end the read loop.
//!
//! # Usage
//!
//! ```ignore
//! let monitor = HeartbeatMonitor::new(HeartbeatConfig::default(), link_id);
//!
//! // On every tick
//! if monitor.check_timeout() == HeartbeatVerdict::Dead { /* stop */ }
//! if let Some(seq) = monitor.prepare_ping() {
//!     sink.send(Message::Ping(HeartbeatMonitor::encode_seq(seq))).await?;
//! }
//!
//! // When a pong arrives
//! monitor.record_pong(&payload);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use super::traits::ConnectionId;

/// Configuration for heartbeat behavior
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Quiet time before a ping is sent (default: 30 seconds)
    pub heartbeat_interval: Duration,
    /// Maximum time to wait for a pong response (default: 10 seconds)
    pub response_timeout: Duration,
    /// Number of consecutive missed pongs before the link is dead (default: 1)
    pub max_missed_pongs: u32,
    /// Whether heartbeat is enabled (can be disabled for testing)
    pub enabled: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            response_timeout: Duration::from_secs(10),
            max_missed_pongs: 1,
            enabled: true,
        }
    }
}

impl HeartbeatConfig {
    /// Create a new config with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with heartbeat disabled (for testing)
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Set the heartbeat interval
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the response timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Set the maximum missed pongs
    #[must_use]
    pub fn with_max_missed(mut self, max_missed: u32) -> Self {
        self.max_missed_pongs = max_missed;
        self
    }

    /// Create a config suitable for testing (shorter intervals)
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(100),
            response_timeout: Duration::from_millis(50),
            max_missed_pongs: 2,
            enabled: true,
        }
    }

    /// How often the keepalive task should wake up
    ///
    /// A quarter of the response timeout, never below 10ms.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        (self.response_timeout / 4).max(Duration::from_millis(10))
    }
}

/// Health metrics for a link
#[derive(Clone, Debug)]
pub struct ConnectionHealth {
    /// Number of consecutive missed pongs
    pub missed_pongs: u32,
    /// Last recorded round-trip time
    pub last_rtt: Option<Duration>,
    /// Average round-trip time (exponential moving average)
    pub avg_rtt: Option<Duration>,
    /// Minimum observed RTT
    pub min_rtt: Option<Duration>,
    /// Maximum observed RTT
    pub max_rtt: Option<Duration>,
    /// Total pings sent
    pub pings_sent: u64,
    /// Total pongs received
    pub pongs_received: u64,
    /// Time of last activity (pong or any inbound frame)
    pub last_activity: Instant,
    /// Whether the link is considered healthy
    pub healthy: bool,
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self {
            missed_pongs: 0,
            last_rtt: None,
            avg_rtt: None,
            min_rtt: None,
            max_rtt: None,
            pings_sent: 0,
            pongs_received: 0,
            last_activity: Instant::now(),
            healthy: true,
        }
    }
}

impl ConnectionHealth {
    /// Update RTT statistics with a new measurement
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn update_rtt(&mut self, rtt: Duration) {
        const ALPHA: f64 = 0.2;

        self.last_rtt = Some(rtt);
        self.min_rtt = Some(self.min_rtt.map_or(rtt, |min| min.min(rtt)));
        self.max_rtt = Some(self.max_rtt.map_or(rtt, |max| max.max(rtt)));

        let rtt_nanos = rtt.as_nanos() as f64;
        let new_avg = match self.avg_rtt {
            Some(avg) => {
                let avg_nanos = avg.as_nanos() as f64;
                Duration::from_nanos((ALPHA * rtt_nanos + (1.0 - ALPHA) * avg_nanos) as u64)
            }
            None => rtt,
        };
        self.avg_rtt = Some(new_avg);
    }
}

/// Result of a timeout check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatVerdict {
    /// No ping outstanding past its deadline
    Healthy,
    /// A pong was missed but the link is still within budget
    Missed(u32),
    /// Too many pongs missed
    Dead,
}

#[derive(Debug)]
struct PingState {
    health: ConnectionHealth,
    pending_seq: Option<u64>,
    pending_sent: Option<Instant>,
}

/// Heartbeat bookkeeping for one link
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    connection_id: ConnectionId,
    state: Arc<Mutex<PingState>>,
    seq_counter: Arc<AtomicU64>,
    dead: Arc<AtomicBool>,
    dead_notify: Arc<Notify>,
}

impl HeartbeatMonitor {
    /// Create a monitor for the given link
    #[must_use]
    pub fn new(config: HeartbeatConfig, connection_id: ConnectionId) -> Self {
        Self {
            config,
            connection_id,
            state: Arc::new(Mutex::new(PingState {
                health: ConnectionHealth::default(),
                pending_seq: None,
                pending_sent: None,
            })),
            seq_counter: Arc::new(AtomicU64::new(1)),
            dead: Arc::new(AtomicBool::new(false)),
            dead_notify: Arc::new(Notify::new()),
        }
    }

    /// Get the heartbeat configuration
    #[must_use]
    pub fn config(&self) -> &HeartbeatConfig {
        &self.config
    }

    /// Check if heartbeat is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// The link this monitor watches
    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Encode a sequence number as a ping payload
    #[must_use]
    pub fn encode_seq(seq: u64) -> Vec<u8> {
        seq.to_be_bytes().to_vec()
    }

    /// Decode a pong payload back into a sequence number
    #[must_use]
    pub fn decode_seq(payload: &[u8]) -> Option<u64> {
        let bytes: [u8; 8] = payload.try_into().ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    /// Record a pong payload
    ///
    /// Returns true if the pong matched the pending ping.
    pub fn record_pong(&self, payload: &[u8]) -> bool {
        if !self.config.enabled {
            return false;
        }
        let Some(seq) = Self::decode_seq(payload) else {
            tracing::debug!(
                connection_id = %self.connection_id,
                len = payload.len(),
                "Ignoring pong with foreign payload"
            );
            return false;
        };

        let mut state = self.state.lock();
        if state.pending_seq != Some(seq) {
            tracing::warn!(
                connection_id = %self.connection_id,
                expected_seq = ?state.pending_seq,
                received_seq = seq,
                "Received pong with unexpected sequence number"
            );
            return false;
        }

        let rtt = state
            .pending_sent
            .map(|sent| sent.elapsed())
            .unwrap_or_default();

        state.health.pongs_received += 1;
        state.health.missed_pongs = 0;
        state.health.healthy = true;
        state.health.last_activity = Instant::now();
        state.health.update_rtt(rtt);
        state.pending_seq = None;
        state.pending_sent = None;
        drop(state);

        tracing::trace!(
            connection_id = %self.connection_id,
            seq = seq,
            rtt_ms = rtt.as_millis(),
            "Pong received"
        );
        true
    }

    /// Record inbound traffic (resets the quiet timer)
    pub fn record_activity(&self) {
        if !self.config.enabled {
            return;
        }
        self.state.lock().health.last_activity = Instant::now();
    }

    /// Decide whether a ping is due
    ///
    /// Returns the sequence number to send. The ping counts as outstanding from
    /// this call on.
    pub fn prepare_ping(&self) -> Option<u64> {
        self.prepare_ping_internal(false)
    }

    /// Force a ping regardless of the quiet timer (tests)
    #[cfg(test)]
    pub(crate) fn force_prepare_ping(&self) -> Option<u64> {
        self.prepare_ping_internal(true)
    }

    fn prepare_ping_internal(&self, force: bool) -> Option<u64> {
        if !self.config.enabled || self.is_dead() {
            return None;
        }
        let mut state = self.state.lock();
        if state.pending_seq.is_some() {
            return None;
        }
        if !force && state.health.last_activity.elapsed() < self.config.heartbeat_interval {
            return None;
        }

        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        state.pending_seq = Some(seq);
        state.pending_sent = Some(Instant::now());
        state.health.pings_sent += 1;
        drop(state);

        Some(seq)
    }

    /// Check the outstanding ping against its deadline
    ///
    /// Marks the link dead once `max_missed_pongs` is reached.
    pub fn check_timeout(&self) -> HeartbeatVerdict {
        if self.is_dead() {
            return HeartbeatVerdict::Dead;
        }
        let mut state = self.state.lock();
        let Some(sent) = state.pending_sent else {
            return HeartbeatVerdict::Healthy;
        };
        if sent.elapsed() < self.config.response_timeout {
            return HeartbeatVerdict::Healthy;
        }

        let missed_seq = state.pending_seq.unwrap_or(0);
        state.pending_seq = None;
        state.pending_sent = None;
        state.health.missed_pongs += 1;
        let missed_count = state.health.missed_pongs;

        if missed_count >= self.config.max_missed_pongs {
            state.health.healthy = false;
            drop(state);
            tracing::warn!(
                connection_id = %self.connection_id,
                missed_count,
                "Link stopped answering pings"
            );
            self.mark_dead();
            return HeartbeatVerdict::Dead;
        }
        drop(state);

        tracing::debug!(
            connection_id = %self.connection_id,
            seq = missed_seq,
            missed_count,
            max_missed = self.config.max_missed_pongs,
            "Pong missed"
        );
        HeartbeatVerdict::Missed(missed_count)
    }

    /// Declare the link dead and wake [`wait_dead`](Self::wait_dead)
    pub fn mark_dead(&self) {
        self.dead.store(true, Ordering::SeqCst);
        self.dead_notify.notify_waiters();
    }

    /// Whether the link has been declared dead
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    /// Resolve once the link is declared dead
    pub async fn wait_dead(&self) {
        loop {
            let notified = self.dead_notify.notified();
            if self.is_dead() {
                return;
            }
            notified.await;
        }
    }

    /// Snapshot of the health metrics
    #[must_use]
    pub fn health(&self) -> ConnectionHealth {
        self.state.lock().health.clone()
    }
}

impl std::fmt::Debug for HeartbeatMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatMonitor")
            .field("config", &self.config)
            .field("connection_id", &self.connection_id)
            .field("dead", &self.is_dead())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(config: HeartbeatConfig) -> HeartbeatMonitor {
        HeartbeatMonitor::new(config, ConnectionId("test_link".into()))
    }

    #[test]
    fn test_heartbeat_config_default() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.response_timeout, Duration::from_secs(10));
        assert_eq!(config.max_missed_pongs, 1);
        assert!(config.enabled);
        assert_eq!(config.tick_interval(), Duration::from_millis(2500));
    }

    #[test]
    fn test_heartbeat_config_builder() {
        let config = HeartbeatConfig::new()
            .with_interval(Duration::from_secs(60))
            .with_timeout(Duration::from_secs(20))
            .with_max_missed(5);

        assert_eq!(config.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(config.response_timeout, Duration::from_secs(20));
        assert_eq!(config.max_missed_pongs, 5);
    }

    #[test]
    fn test_tick_interval_floor() {
        let config = HeartbeatConfig::new().with_timeout(Duration::from_millis(8));
        assert_eq!(config.tick_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_seq_encoding() {
        let payload = HeartbeatMonitor::encode_seq(0x0102_0304_0506_0708);
        assert_eq!(payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(HeartbeatMonitor::decode_seq(&payload), Some(0x0102_0304_0506_0708));
        assert_eq!(HeartbeatMonitor::decode_seq(b"short"), None);
    }

    #[test]
    fn test_ping_waits_for_quiet_interval() {
        let monitor = monitor(HeartbeatConfig::default());
        assert_eq!(monitor.prepare_ping(), None);
    }

    #[test]
    fn test_record_pong() {
        let monitor = monitor(HeartbeatConfig::for_testing());
        let seq = monitor.force_prepare_ping().unwrap();

        // only one ping outstanding at a time
        assert_eq!(monitor.force_prepare_ping(), None);

        assert!(monitor.record_pong(&HeartbeatMonitor::encode_seq(seq)));
        let health = monitor.health();
        assert_eq!(health.pings_sent, 1);
        assert_eq!(health.pongs_received, 1);
        assert!(health.last_rtt.is_some());
        assert!(health.healthy);
    }

    #[test]
    fn test_record_pong_wrong_seq() {
        let monitor = monitor(HeartbeatConfig::for_testing());
        let seq = monitor.force_prepare_ping().unwrap();
        assert!(!monitor.record_pong(&HeartbeatMonitor::encode_seq(seq + 1)));
        assert!(!monitor.record_pong(b"not-a-seq"));
        assert_eq!(monitor.health().pongs_received, 0);
    }

    #[test]
    fn test_disabled_monitor_never_pings() {
        let monitor = monitor(HeartbeatConfig::disabled());
        assert_eq!(monitor.force_prepare_ping(), None);
        assert_eq!(monitor.check_timeout(), HeartbeatVerdict::Healthy);
    }

    #[test]
    fn test_connection_health_rtt_stats() {
        let mut health = ConnectionHealth::default();
        health.update_rtt(Duration::from_millis(100));
        health.update_rtt(Duration::from_millis(50));
        health.update_rtt(Duration::from_millis(200));

        assert_eq!(health.min_rtt, Some(Duration::from_millis(50)));
        assert_eq!(health.max_rtt, Some(Duration::from_millis(200)));
        assert_eq!(health.last_rtt, Some(Duration::from_millis(200)));
        let avg = health.avg_rtt.unwrap();
        assert!(avg > Duration::from_millis(50) && avg < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_missed_pongs_declare_dead() {
        let config = HeartbeatConfig::for_testing().with_timeout(Duration::from_millis(5));
        let monitor = monitor(config);

        monitor.force_prepare_ping().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(monitor.check_timeout(), HeartbeatVerdict::Missed(1));
        assert!(!monitor.is_dead());

        monitor.force_prepare_ping().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(monitor.check_timeout(), HeartbeatVerdict::Dead);
        assert!(monitor.is_dead());
        assert!(!monitor.health().healthy);

        tokio::time::timeout(Duration::from_secs(1), monitor.wait_dead())
            .await
            .expect("wait_dead resolves once dead");

        assert_eq!(monitor.health().pings_sent, 2);
        assert_eq!(monitor.health().missed_pongs, 2);
    }

    #[tokio::test]
    async fn test_wait_dead_wakes_pending_waiter() {
        let monitor = monitor(HeartbeatConfig::for_testing());
        let waiter = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.wait_dead().await })
        };
        tokio::task::yield_now().await;

        monitor.mark_dead();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter wakes")
            .unwrap();
    }
}
