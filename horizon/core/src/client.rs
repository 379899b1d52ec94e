//! Assistant Client
//!
//! [`AssistClient`] is the public facade: `connect`, `disconnect`, `send`,
//! `clear_conversation`, plus status and transcript snapshots.
//!
//! # Tasks
//!
//! ```text
//!   caller ── send() ──────────┐
//!                              ▼
//!                     ┌──────────────────┐   request   ┌─────────┐
//!                     │   AssistClient   │────────────►│ service │
//!                     │  (shared Inner)  │◄────────────│         │
//!                     └──────────────────┘   payloads  └─────────┘
//!                       ▲      ▲       ▲
//!        receive loop ──┘      │       └── health monitor (every 10s)
//!                        recovery loop (backoff, one at a time)
//! ```
//!
//! The receive loop, the health monitor and the recovery loop run as
//! independent tasks. They hold only weak references to the client, so
//! dropping the last `AssistClient` handle stops them.
//!
//! # Ownership of shared fields
//!
//! - `should_maintain`: starts true and is cleared only by
//!   [`AssistClient::disconnect`], which is final. Every connect path checks it.
//! - `sink`: written by the connect path (install) and by disconnect or the
//!   receive loop's exit path (take). Connect attempts are serialized by
//!   `connect_lock`.
//! - `state`: connection bookkeeping, short critical sections only.
//! - `turn`: message log and response buffer, short critical sections only.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{ConnectionPhase, ConnectionState, HealthMonitorConfig, ReconnectPolicy};
use crate::context::{CapturedContext, ContextProvider, NotificationSink};
use crate::events::{ChatObserver, ConnectionEvent, NoopObserver};
use crate::messages::{DisplayRecord, Message, MessageMetadata};
use crate::session::Conversation;
use crate::streaming::{InboundFrame, ResponseAssembler};
use crate::transport::{
    ConnectionId, Connector, FrameSink, FrameStream, InboundPayload, OutboundRequest,
    TransportError,
};

const NOTIFY_TITLE: &str = "Horizon";

// =============================================================================
// Public Types
// =============================================================================

/// Errors returned to callers of [`AssistClient::send`]
///
/// Connection failures never surface here; they drive the retry machinery and
/// are reported through [`ConnectionEvent`]s instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No link, and a single connect attempt did not produce one
    #[error("not connected to the assistant service")]
    NotConnected,

    /// The request could not be written to the link
    #[error("failed to transmit request: {0}")]
    TransmissionFailure(#[source] TransportError),

    /// The request could not be serialized
    #[error("failed to encode request: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One user turn
///
/// ```
/// use horizon_core::UserTurn;
///
/// let turn = UserTurn::new("what does this error mean?")
///     .with_ocr_text("E0502: cannot borrow `v` as mutable")
///     .with_smarter_analysis(true);
/// assert!(turn.smarter_analysis);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserTurn {
    /// What the user typed or said
    pub text: String,
    /// Text recognized in a screen capture
    pub ocr_text: Option<String>,
    /// Selected text
    pub selected_text: Option<String>,
    /// URL of the focused browser tab
    pub browser_url: Option<String>,
    /// Raw image bytes, sent base64-encoded
    pub image: Option<Vec<u8>>,
    /// Ask the service for its deeper analysis pass
    pub smarter_analysis: bool,
}

impl UserTurn {
    /// Turn with text only
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Attach OCR text
    #[must_use]
    pub fn with_ocr_text(mut self, ocr_text: impl Into<String>) -> Self {
        self.ocr_text = Some(ocr_text.into());
        self
    }

    /// Attach selected text
    #[must_use]
    pub fn with_selected_text(mut self, selected_text: impl Into<String>) -> Self {
        self.selected_text = Some(selected_text.into());
        self
    }

    /// Attach the browser URL
    #[must_use]
    pub fn with_browser_url(mut self, browser_url: impl Into<String>) -> Self {
        self.browser_url = Some(browser_url.into());
        self
    }

    /// Attach an image
    #[must_use]
    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }

    /// Toggle smarter analysis
    #[must_use]
    pub fn with_smarter_analysis(mut self, enabled: bool) -> Self {
        self.smarter_analysis = enabled;
        self
    }

    /// Fill every capture field from a captured context
    #[must_use]
    pub fn with_context(mut self, context: CapturedContext) -> Self {
        self.selected_text = context.selected_text;
        self.ocr_text = context.ocr_text;
        self.browser_url = context.browser_url;
        self.image = context.image;
        self
    }
}

/// Point-in-time view of the client
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// A link is up
    pub connected: bool,
    /// The open turn is still waiting for its first fragment or completion
    pub receiving: bool,
    /// The client is trying to stay connected
    pub should_maintain: bool,
    /// Automatic attempts since the last successful connection
    pub attempt_count: u32,
    /// Messages in the log
    pub message_count: usize,
    /// Lifecycle phase
    pub phase: ConnectionPhase,
    /// Most recent backoff delay
    pub last_backoff: Option<Duration>,
    /// Current link
    pub connection_id: Option<ConnectionId>,
}

/// What a surface needs to render the conversation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transcript {
    /// Visible bubbles, oldest first
    pub records: Vec<DisplayRecord>,
    /// Response text of the open turn (not yet a bubble)
    pub current_response: String,
    /// The open turn is still waiting for its first fragment or completion
    pub receiving: bool,
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`AssistClient`]
pub struct AssistClientBuilder {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    health: HealthMonitorConfig,
    observer: Arc<dyn ChatObserver>,
    notifier: Option<Arc<dyn NotificationSink>>,
    event_tx: Option<mpsc::UnboundedSender<ConnectionEvent>>,
}

impl AssistClientBuilder {
    /// Reconnection backoff
    #[must_use]
    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Health monitor settings
    #[must_use]
    pub fn health_monitor(mut self, health: HealthMonitorConfig) -> Self {
        self.health = health;
        self
    }

    /// Take backoff and health settings from a loaded configuration
    #[must_use]
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.policy = config.reconnect.clone();
        self.health = config.health.clone();
        self
    }

    /// Register the UI observer
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ChatObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Register a notification sink for connection notices
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the client
    #[must_use]
    pub fn build(self) -> AssistClient {
        let (cancel_tx, _) = watch::channel(0u64);
        AssistClient {
            inner: Arc::new(Inner {
                connector: self.connector,
                policy: self.policy,
                health: self.health,
                observer: self.observer,
                notifier: self.notifier,
                event_tx: self.event_tx,
                should_maintain: AtomicBool::new(true),
                recovering: Arc::new(AtomicBool::new(false)),
                cancel_tx,
                generation: AtomicU64::new(0),
                state: Mutex::new(ConnectionState::new()),
                turn: Mutex::new(TurnState::default()),
                sink: tokio::sync::Mutex::new(None),
                connect_lock: tokio::sync::Mutex::new(()),
                tasks: Mutex::new(TaskHandles::default()),
            }),
        }
    }

    /// Build the client with a connection event channel
    #[must_use]
    pub fn build_with_events(mut self) -> (AssistClient, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        (self.build(), rx)
    }
}

// =============================================================================
// Shared State
// =============================================================================

#[derive(Default)]
struct TurnState {
    conversation: Conversation,
    assembler: ResponseAssembler,
}

#[derive(Default)]
struct TaskHandles {
    receive: Option<JoinHandle<()>>,
    monitor: Option<JoinHandle<()>>,
    recovery: Option<JoinHandle<()>>,
}

impl TaskHandles {
    fn abort_all(&mut self) {
        for handle in [
            self.receive.take(),
            self.monitor.take(),
            self.recovery.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }
}

struct Inner {
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    health: HealthMonitorConfig,
    observer: Arc<dyn ChatObserver>,
    notifier: Option<Arc<dyn NotificationSink>>,
    event_tx: Option<mpsc::UnboundedSender<ConnectionEvent>>,
    should_maintain: AtomicBool,
    /// Held by the single recovery loop
    recovering: Arc<AtomicBool>,
    /// Bumped by `disconnect()` to cut backoff sleeps short
    cancel_tx: watch::Sender<u64>,
    /// Incremented per established link; stale receive loops compare against it
    generation: AtomicU64,
    state: Mutex<ConnectionState>,
    turn: Mutex<TurnState>,
    sink: tokio::sync::Mutex<Option<Box<dyn FrameSink>>>,
    connect_lock: tokio::sync::Mutex<()>,
    tasks: Mutex<TaskHandles>,
}

impl Inner {
    fn should_maintain(&self) -> bool {
        self.should_maintain.load(Ordering::SeqCst)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.tasks.get_mut().abort_all();
    }
}

/// Clears the recovery flag when the recovery loop ends, aborted or not
struct RecoveryGuard(Arc<AtomicBool>);

impl Drop for RecoveryGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

// =============================================================================
// Client
// =============================================================================

/// Resilient streaming client for the assistant service
///
/// Cheap to clone; clones share one connection and one conversation.
///
/// ```ignore
/// let client = AssistClient::builder(WebSocketConnector::new(config.transport.clone()))
///     .config(&config)
///     .observer(Arc::new(MySurface::default()))
///     .build();
///
/// client.connect().await;
/// client.send(UserTurn::new("hello")).await?;
/// ```
#[derive(Clone)]
pub struct AssistClient {
    inner: Arc<Inner>,
}

impl AssistClient {
    /// Start building a client around a connector
    pub fn builder(connector: impl Connector + 'static) -> AssistClientBuilder {
        AssistClientBuilder {
            connector: Arc::new(connector),
            policy: ReconnectPolicy::default(),
            health: HealthMonitorConfig::default(),
            observer: Arc::new(NoopObserver),
            notifier: None,
            event_tx: None,
        }
    }

    /// Build a WebSocket client from a loaded configuration
    #[cfg(feature = "websocket")]
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> AssistClientBuilder {
        Self::builder(crate::transport::WebSocketConnector::new(
            config.transport.clone(),
        ))
        .config(config)
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    // -------------------------------------------------------------------------
    // Connection lifecycle
    // -------------------------------------------------------------------------

    /// Connect to the service
    ///
    /// Makes one attempt, leaving `GivenUp` first if the retry budget ran out.
    /// On failure the recovery loop takes over in the background. Does nothing
    /// while connected or after [`disconnect`](Self::disconnect).
    ///
    /// Returns whether a link is up when the call returns.
    pub async fn connect(&self) -> bool {
        if !self.inner.should_maintain() {
            debug!("Connect ignored after disconnect");
            return false;
        }
        self.inner.state.lock().resume();

        if self.connect_once().await.is_err() {
            self.schedule_recovery();
        }
        self.is_connected()
    }

    /// Disconnect and stop all automatic reconnection
    ///
    /// Cancels the receive loop, the health monitor and any pending backoff,
    /// then closes the link. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        self.inner.should_maintain.store(false, Ordering::SeqCst);
        self.inner.cancel_tx.send_modify(|n| *n = n.wrapping_add(1));

        // taking the sink waits out a connect that is installing a link
        let sink = self.inner.sink.lock().await.take();
        self.inner.tasks.lock().abort_all();

        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "Error while closing link");
            }
        }

        self.inner.state.lock().mark_disconnected();
        self.inner.turn.lock().assembler.stop_receiving();

        info!("Disconnected from assistant service");
        self.emit(ConnectionEvent::Disconnected);
        self.inner.observer.on_connection_changed(false);
    }

    /// One connection attempt
    ///
    /// No-op if a link exists or `should_maintain` is false.
    async fn connect_once(&self) -> Result<(), TransportError> {
        let _serial = self.inner.connect_lock.lock().await;
        self.connect_locked().await
    }

    /// Body of [`connect_once`](Self::connect_once); caller holds `connect_lock`
    async fn connect_locked(&self) -> Result<(), TransportError> {
        if !self.inner.should_maintain() || self.inner.sink.lock().await.is_some() {
            return Ok(());
        }

        self.inner.state.lock().mark_connecting();
        debug!(endpoint = %self.inner.connector.endpoint(), "Connecting to assistant service");

        let link = match self.inner.connector.connect().await {
            Ok(link) => link,
            Err(e) => {
                warn!(
                    endpoint = %self.inner.connector.endpoint(),
                    error = %e,
                    "Connection attempt failed"
                );
                self.inner.state.lock().mark_disconnected();
                self.emit(ConnectionEvent::ConnectFailed {
                    error: e.to_string(),
                });
                self.inner.observer.on_connection_changed(false);
                return Err(e);
            }
        };

        let mut slot = self.inner.sink.lock().await;
        if !self.inner.should_maintain() {
            drop(slot);
            let mut sink = link.sink;
            let _ = sink.close().await;
            self.inner.state.lock().mark_disconnected();
            debug!(connection_id = %link.id, "Discarding link opened during disconnect");
            return Ok(());
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *slot = Some(link.sink);
        self.inner.state.lock().mark_connected(link.id.clone());
        self.spawn_receive_loop(link.stream, link.id.clone(), generation);
        self.ensure_health_monitor();
        drop(slot);

        info!(
            connection_id = %link.id,
            endpoint = %self.inner.connector.endpoint(),
            "Connected to assistant service"
        );
        self.emit(ConnectionEvent::Connected {
            connection_id: link.id,
        });
        self.inner.observer.on_connection_changed(true);
        Ok(())
    }

    /// Drop any stale link and connect again
    ///
    /// Both the recovery loop and the health monitor land here. Whichever
    /// gets `connect_lock` second sees the link the first one opened and
    /// returns without touching it.
    async fn reconnect(&self) -> Result<(), TransportError> {
        if !self.inner.should_maintain() {
            return Ok(());
        }

        let _serial = self.inner.connect_lock.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let stale = self.inner.sink.lock().await.take();
        if let Some(mut sink) = stale {
            if let Err(e) = sink.close().await {
                debug!(error = %e, "Ignoring error while closing stale link");
            }
        }
        self.connect_locked().await
    }

    /// Start the recovery loop unless one is already running
    fn schedule_recovery(&self) {
        {
            let state = self.inner.state.lock();
            if !self.inner.should_maintain() || state.is_given_up() || state.is_connected() {
                return;
            }
        }
        if self
            .inner
            .recovering
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Reconnection already in progress");
            return;
        }

        let guard = RecoveryGuard(Arc::clone(&self.inner.recovering));
        let weak = Arc::downgrade(&self.inner);
        let cancel = self.inner.cancel_tx.subscribe();
        let handle = tokio::spawn(recovery_loop(weak, cancel, guard));
        if let Some(previous) = self.inner.tasks.lock().recovery.replace(handle) {
            previous.abort();
        }
    }

    fn spawn_receive_loop(
        &self,
        stream: Box<dyn FrameStream>,
        connection_id: ConnectionId,
        generation: u64,
    ) {
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(receive_loop(weak, stream, connection_id, generation));
        if let Some(previous) = self.inner.tasks.lock().receive.replace(handle) {
            previous.abort();
        }
    }

    fn ensure_health_monitor(&self) {
        if !self.inner.health.enabled {
            return;
        }
        let mut tasks = self.inner.tasks.lock();
        if tasks.monitor.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        tasks.monitor = Some(tokio::spawn(health_loop(weak, self.inner.health.interval)));
    }

    /// The receive loop for `generation` ended
    async fn handle_link_lost(
        &self,
        connection_id: &ConnectionId,
        generation: u64,
        reason: Option<String>,
    ) {
        let serial = self.inner.connect_lock.lock().await;
        if self.inner.generation.load(Ordering::SeqCst) != generation {
            return;
        }

        let sink = self.inner.sink.lock().await.take();
        let Some(mut sink) = sink else {
            // disconnect or reconnect already took the link
            return;
        };
        let _ = sink.close().await;

        self.inner.state.lock().mark_disconnected();
        self.inner.turn.lock().assembler.stop_receiving();

        warn!(
            connection_id = %connection_id,
            reason = reason.as_deref().unwrap_or("closed by service"),
            "Lost connection to assistant service"
        );
        self.emit(ConnectionEvent::ConnectionLost {
            connection_id: connection_id.clone(),
            reason,
        });
        self.inner.observer.on_connection_changed(false);
        drop(serial);

        self.schedule_recovery();
    }

    // -------------------------------------------------------------------------
    // Conversation
    // -------------------------------------------------------------------------

    /// Send a user turn
    ///
    /// If there is no link, one connect attempt is made first. A response
    /// left in the buffer by a streamed turn is committed to the log before
    /// the new user message.
    ///
    /// A transmission failure leaves the log as it is: the user message stays
    /// in the log even though the service never saw it.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NotConnected`] if no link could be established; the
    ///   conversation is untouched.
    /// - [`ClientError::TransmissionFailure`] if writing the request failed.
    pub async fn send(&self, turn: UserTurn) -> Result<(), ClientError> {
        if !self.is_connected() {
            if self.connect_once().await.is_err() {
                self.schedule_recovery();
            }
            if !self.is_connected() {
                return Err(ClientError::NotConnected);
            }
        }

        let request = {
            let mut guard = self.inner.turn.lock();
            let TurnState {
                conversation,
                assembler,
            } = &mut *guard;

            if let Some(pending) = assembler.take_pending() {
                conversation.push_display(pending.content.clone(), false);
                if !pending.committed {
                    conversation.push_assistant(pending.content);
                }
            }

            conversation.push_display(turn.text.clone(), true);
            let metadata = MessageMetadata::from_parts(
                turn.ocr_text.as_deref(),
                turn.selected_text.as_deref(),
                turn.browser_url.as_deref(),
            );
            conversation.push_user(turn.text, metadata);

            let image = turn.image.as_deref().map(|bytes| STANDARD.encode(bytes));
            let encoded =
                OutboundRequest::new(conversation.messages(), image, turn.smarter_analysis)
                    .encode()?;
            assembler.begin_turn();
            encoded
        };

        let result = {
            let mut slot = self.inner.sink.lock().await;
            match slot.as_mut() {
                Some(sink) => sink.send_text(request).await,
                None => Err(TransportError::ConnectionClosed),
            }
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to transmit request");
            self.inner.turn.lock().assembler.stop_receiving();
            return Err(ClientError::TransmissionFailure(e));
        }

        debug!(
            message_count = self.inner.turn.lock().conversation.message_count(),
            "Request sent"
        );
        Ok(())
    }

    /// Send plain text
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), ClientError> {
        self.send(UserTurn::new(text)).await
    }

    /// Capture desktop context and send it with the text
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_with_context(
        &self,
        text: impl Into<String>,
        provider: &dyn ContextProvider,
        smarter_analysis: bool,
    ) -> Result<(), ClientError> {
        let context = provider.capture().await;
        let turn = UserTurn::new(text)
            .with_context(context)
            .with_smarter_analysis(smarter_analysis);
        self.send(turn).await
    }

    /// Empty the message log, the display records and the response buffer
    ///
    /// Connection state, including the receiving flag, is left alone.
    pub fn clear_conversation(&self) {
        {
            let mut turn = self.inner.turn.lock();
            turn.conversation.clear();
            turn.assembler.clear_buffer();
        }
        info!("Conversation cleared");
        self.inner.observer.on_message_update("");
    }

    /// Fold one inbound payload into the open turn
    fn handle_payload(&self, payload: InboundPayload) {
        let Some(text) = payload.into_text() else {
            return;
        };
        let frame = InboundFrame::classify(&text);

        let current = {
            let mut turn = self.inner.turn.lock();
            if let Some(content) = turn.assembler.ingest(frame) {
                debug!(len = content.len(), "Assistant turn complete");
                turn.conversation.push_assistant(content);
            }
            turn.assembler.current().to_owned()
        };
        self.inner.observer.on_message_update(&current);
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Whether a link is up
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().is_connected()
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        let (receiving, message_count) = {
            let turn = self.inner.turn.lock();
            (
                turn.assembler.is_receiving(),
                turn.conversation.message_count(),
            )
        };
        let state = self.inner.state.lock();
        ConnectionStatus {
            connected: state.is_connected(),
            receiving,
            should_maintain: self.inner.should_maintain(),
            attempt_count: state.attempt_count(),
            message_count,
            phase: state.phase(),
            last_backoff: state.last_backoff(),
            connection_id: state.connection_id().cloned(),
        }
    }

    /// Display records plus the live response
    #[must_use]
    pub fn transcript(&self) -> Transcript {
        let turn = self.inner.turn.lock();
        Transcript {
            records: turn.conversation.display_records().to_vec(),
            current_response: turn.assembler.current().to_owned(),
            receiving: turn.assembler.is_receiving(),
        }
    }

    /// Copy of the message log
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.turn.lock().conversation.messages().to_vec()
    }

    fn emit(&self, event: ConnectionEvent) {
        if let Some(notifier) = self.inner.notifier.as_deref() {
            match &event {
                ConnectionEvent::ConnectionLost { .. } => {
                    notifier.notify(NOTIFY_TITLE, "Lost connection to the assistant, reconnecting");
                }
                ConnectionEvent::GaveUp { .. } => {
                    notifier.notify(NOTIFY_TITLE, "Unable to reach the assistant service");
                }
                _ => {}
            }
        }
        if let Some(ref tx) = self.inner.event_tx {
            let _ = tx.send(event);
        }
    }
}

impl std::fmt::Debug for AssistClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssistClient")
            .field("endpoint", &self.inner.connector.endpoint())
            .field("status", &self.status())
            .finish()
    }
}

// =============================================================================
// Background Tasks
// =============================================================================

async fn receive_loop(
    weak: Weak<Inner>,
    mut stream: Box<dyn FrameStream>,
    connection_id: ConnectionId,
    generation: u64,
) {
    let reason = loop {
        match stream.next_payload().await {
            Some(Ok(payload)) => {
                let Some(client) = AssistClient::from_weak(&weak) else {
                    return;
                };
                client.handle_payload(payload);
            }
            Some(Err(e)) => break Some(e.to_string()),
            None => break None,
        }
    };
    drop(stream);

    if let Some(client) = AssistClient::from_weak(&weak) {
        client
            .handle_link_lost(&connection_id, generation, reason)
            .await;
    }
}

/// Backoff-and-retry until connected, cancelled, or out of attempts
async fn recovery_loop(weak: Weak<Inner>, mut cancel: watch::Receiver<u64>, _guard: RecoveryGuard) {
    loop {
        let Some(client) = AssistClient::from_weak(&weak) else {
            return;
        };
        if !client.inner.should_maintain() || client.is_connected() {
            return;
        }

        let max_attempts = client.inner.policy.max_attempts;
        let next = client.inner.state.lock().next_backoff(&client.inner.policy);
        let Some((attempt, delay)) = next else {
            warn!(max_attempts, "Giving up on reconnecting to assistant service");
            client.emit(ConnectionEvent::GaveUp {
                attempts: max_attempts,
            });
            return;
        };

        info!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis(),
            "Scheduling reconnect with backoff"
        );
        client.emit(ConnectionEvent::ReconnectScheduled {
            attempt,
            max_attempts,
            delay,
        });
        drop(client);

        // backoff delay; disconnect() cuts it short
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = cancel.changed() => {
                debug!(attempt, "Reconnect backoff cancelled");
                return;
            }
        }

        let Some(client) = AssistClient::from_weak(&weak) else {
            return;
        };
        if !client.inner.should_maintain() {
            return;
        }
        if client.reconnect().await.is_ok() && client.is_connected() {
            return;
        }
    }
}

/// Periodically repair a client that should be connected but is not
///
/// Runs alongside any recovery loop; a monitor tick can end a long backoff
/// sleep early by connecting first.
async fn health_loop(weak: Weak<Inner>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // the first tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;

        let Some(client) = AssistClient::from_weak(&weak) else {
            return;
        };
        if !client.inner.should_maintain() {
            return;
        }

        let stale = {
            let state = client.inner.state.lock();
            !state.is_connected() && !state.is_given_up()
        };
        if !stale {
            continue;
        }

        info!("Health check found no live link, reconnecting");
        if let Err(e) = client.reconnect().await {
            debug!(error = %e, "Health check reconnect failed");
            client.schedule_recovery();
        }
    }
}
