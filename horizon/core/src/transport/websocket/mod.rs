//! WebSocket Transport
//!
//! Connects to the assistant service over `ws://` (or `wss://` with the `tls`
//! feature) using tokio-tungstenite. Each connection is split into a sink and
//! a stream; the sink is shared with a keepalive task that sends
//! sequence-numbered pings while the link is quiet.
//!
//! ```text
//!            ┌──────────── WebSocketSink ───────────┐
//! requests ─►│ Arc<Mutex<SplitSink>> ◄── keepalive  │──► service
//!            └──────────────────────────────────────┘      │
//!            ┌──────────── WebSocketStream ─────────┐      │
//! payloads ◄─│ SplitStream  (pong → HeartbeatMonitor)│◄────┘
//!            └──────────────────────────────────────┘
//! ```
//!
//! A link whose pongs stop arriving is reported as a receive error, which the
//! client treats like any other lost connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::config::TransportConfig;
use super::frame::InboundPayload;
use super::heartbeat::{HeartbeatMonitor, HeartbeatVerdict};
use super::traits::{ConnectionId, Connector, FrameSink, FrameStream, Link, TransportError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SharedWriter = Arc<Mutex<SplitSink<Socket, Message>>>;

/// Dials the assistant service over WebSocket
#[derive(Clone, Debug)]
pub struct WebSocketConnector {
    config: TransportConfig,
}

impl WebSocketConnector {
    /// Create a connector for the configured endpoint
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// The transport configuration in use
    #[must_use]
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self) -> Result<Link, TransportError> {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = self.config.max_message_size;

        let handshake = tokio_tungstenite::connect_async_with_config(
            self.config.url.as_str(),
            Some(ws_config),
            true,
        );
        let (socket, response) = tokio::time::timeout(self.config.connect_timeout(), handshake)
            .await
            .map_err(|_| {
                TransportError::Timeout(format!(
                    "no handshake with {} after {}ms",
                    self.config.url, self.config.connect_timeout_ms
                ))
            })?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let id = ConnectionId::new();
        tracing::debug!(
            connection_id = %id,
            url = %self.config.url,
            status = %response.status(),
            "WebSocket handshake complete"
        );

        let (writer, reader) = socket.split();
        let writer: SharedWriter = Arc::new(Mutex::new(writer));
        let monitor = HeartbeatMonitor::new(self.config.keepalive.clone(), id.clone());

        let keepalive = monitor
            .is_enabled()
            .then(|| tokio::spawn(run_keepalive(monitor.clone(), Arc::clone(&writer))));

        Ok(Link {
            id,
            sink: Box::new(WebSocketSink {
                writer,
                close_timeout: self.config.close_timeout(),
                closed: false,
            }),
            stream: Box::new(WebSocketReader {
                reader,
                monitor,
                keepalive,
            }),
        })
    }

    fn endpoint(&self) -> String {
        self.config.url.clone()
    }
}

/// Send pings while the link is quiet and declare it dead when pongs stop
async fn run_keepalive(monitor: HeartbeatMonitor, writer: SharedWriter) {
    let tick = monitor.config().tick_interval();
    tracing::debug!(
        connection_id = %monitor.connection_id(),
        interval_secs = monitor.config().heartbeat_interval.as_secs(),
        timeout_ms = monitor.config().response_timeout.as_millis(),
        "Starting keepalive"
    );

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        if monitor.check_timeout() == HeartbeatVerdict::Dead {
            break;
        }

        if let Some(seq) = monitor.prepare_ping() {
            let ping = Message::Ping(HeartbeatMonitor::encode_seq(seq));
            if let Err(e) = writer.lock().await.send(ping).await {
                tracing::warn!(
                    connection_id = %monitor.connection_id(),
                    error = %e,
                    "Failed to send ping"
                );
                monitor.mark_dead();
                break;
            }
            tracing::trace!(connection_id = %monitor.connection_id(), seq, "Ping sent");
        }
    }
}

struct WebSocketSink {
    writer: SharedWriter,
    close_timeout: Duration,
    closed: bool,
}

#[async_trait]
impl FrameSink for WebSocketSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed);
        }
        self.writer
            .lock()
            .await
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if std::mem::replace(&mut self.closed, true) {
            return Ok(());
        }
        let writer = Arc::clone(&self.writer);
        let close = async move { writer.lock().await.close().await };
        match tokio::time::timeout(self.close_timeout, close).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(TransportError::SendFailed(e.to_string())),
            Err(_) => Err(TransportError::Timeout(format!(
                "close not acknowledged within {}ms",
                self.close_timeout.as_millis()
            ))),
        }
    }
}

struct WebSocketReader {
    reader: SplitStream<Socket>,
    monitor: HeartbeatMonitor,
    keepalive: Option<JoinHandle<()>>,
}

#[async_trait]
impl FrameStream for WebSocketReader {
    async fn next_payload(&mut self) -> Option<Result<InboundPayload, TransportError>> {
        loop {
            let message = tokio::select! {
                () = self.monitor.wait_dead() => {
                    return Some(Err(TransportError::Timeout(
                        "keepalive pong not received".to_string(),
                    )));
                }
                message = self.reader.next() => message,
            };

            match message {
                None => return None,
                Some(Err(e)) => return Some(Err(TransportError::ReceiveFailed(e.to_string()))),
                Some(Ok(Message::Text(text))) => {
                    self.monitor.record_activity();
                    return Some(Ok(InboundPayload::Text(text)));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    self.monitor.record_activity();
                    return Some(Ok(InboundPayload::Binary(bytes)));
                }
                Some(Ok(Message::Pong(payload))) => {
                    self.monitor.record_pong(&payload);
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite queues the pong reply itself
                    self.monitor.record_activity();
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(
                        connection_id = %self.monitor.connection_id(),
                        frame = ?frame,
                        "Service closed the connection"
                    );
                    return None;
                }
                Some(Ok(Message::Frame(_))) => {}
            }
        }
    }
}

impl Drop for WebSocketReader {
    fn drop(&mut self) {
        if let Some(handle) = self.keepalive.take() {
            handle.abort();
        }
    }
}
