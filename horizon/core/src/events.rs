//! Client Events and Observers
//!
//! Two ways to follow what the client is doing:
//!
//! - [`ChatObserver`]: synchronous callbacks for a UI surface. Registered once
//!   at construction and invoked from the client's own tasks, so
//!   implementations must return quickly and must not block.
//! - [`ConnectionEvent`]: an optional unbounded channel carrying every
//!   connection transition, including the ones an observer cannot see
//!   (scheduled retries, giving up).

use std::time::Duration;

use crate::transport::ConnectionId;

/// Connection lifecycle events
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A link came up
    Connected {
        /// The new link
        connection_id: ConnectionId,
    },
    /// A connection attempt failed
    ConnectFailed {
        /// Transport error text
        error: String,
    },
    /// An established link went away
    ConnectionLost {
        /// The link that was lost
        connection_id: ConnectionId,
        /// Transport error text, if the link broke rather than closed
        reason: Option<String>,
    },
    /// A retry is waiting out its backoff
    ReconnectScheduled {
        /// 1-based attempt number
        attempt: u32,
        /// Configured maximum
        max_attempts: u32,
        /// Backoff before the attempt
        delay: Duration,
    },
    /// Automatic retries are exhausted
    GaveUp {
        /// Attempts made before giving up
        attempts: u32,
    },
    /// Explicit disconnect completed
    Disconnected,
}

/// Callbacks for a UI surface
///
/// Both methods default to no-ops. Calls arrive from background tasks; keep
/// them short and never block inside them.
pub trait ChatObserver: Send + Sync {
    /// The current-response text changed
    fn on_message_update(&self, _current: &str) {}

    /// The link went up (`true`) or down (`false`)
    fn on_connection_changed(&self, _connected: bool) {}
}

/// Observer that ignores everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ChatObserver for NoopObserver {}

type UpdateFn = Box<dyn Fn(&str) + Send + Sync>;
type ConnectionFn = Box<dyn Fn(bool) + Send + Sync>;

/// Observer built from closures
///
/// ```
/// use horizon_core::{CallbackObserver, ChatObserver};
///
/// let observer = CallbackObserver::new()
///     .with_message_update(|text| println!("{text}"))
///     .with_connection_changed(|up| println!("connected: {up}"));
/// observer.on_connection_changed(true);
/// ```
#[derive(Default)]
pub struct CallbackObserver {
    on_update: Option<UpdateFn>,
    on_connection: Option<ConnectionFn>,
}

impl CallbackObserver {
    /// Observer with no callbacks set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the message-update callback
    #[must_use]
    pub fn with_message_update(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    /// Set the connection-change callback
    #[must_use]
    pub fn with_connection_changed(mut self, f: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.on_connection = Some(Box::new(f));
        self
    }
}

impl ChatObserver for CallbackObserver {
    fn on_message_update(&self, current: &str) {
        if let Some(ref f) = self.on_update {
            f(current);
        }
    }

    fn on_connection_changed(&self, connected: bool) {
        if let Some(ref f) = self.on_connection {
            f(connected);
        }
    }
}

impl std::fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("on_update", &self.on_update.is_some())
            .field("on_connection", &self.on_connection.is_some())
            .finish()
    }
}
