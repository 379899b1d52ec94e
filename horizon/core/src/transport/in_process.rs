//! In-Process Transport
//!
//! Channel-based connector for embedding the assistant service in the same
//! process, and for driving the client deterministically in tests.
//!
//! # Usage
//!
//! ```ignore
//! let (connector, mut listener) = InProcessConnector::new_pair();
//! let client = AssistClient::builder(connector.clone()).build();
//!
//! // Service side
//! tokio::spawn(async move {
//!     while let Some(mut endpoint) = listener.accept().await {
//!         while let Some(request) = endpoint.recv_request().await {
//!             endpoint.send_text(r#"{"content":"hi","is_complete":true}"#).await.ok();
//!         }
//!     }
//! });
//! ```

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::frame::InboundPayload;
use super::traits::{ConnectionId, Connector, FrameSink, FrameStream, Link, TransportError};

const DEFAULT_CAPACITY: usize = 100;

struct Shared {
    accept_tx: mpsc::UnboundedSender<ServiceEndpoint>,
    capacity: usize,
    attempts: AtomicU32,
    fail_next: AtomicU32,
    refusing: AtomicBool,
}

/// Connector that pairs the client with an in-process [`ServiceListener`]
///
/// Clones share state, so a test can keep one clone to script failures while
/// the client owns another.
#[derive(Clone)]
pub struct InProcessConnector {
    shared: Arc<Shared>,
}

impl InProcessConnector {
    /// Create a connector and the listener that accepts its connections
    #[must_use]
    pub fn new_pair() -> (Self, ServiceListener) {
        Self::new_pair_with_capacity(DEFAULT_CAPACITY)
    }

    /// Create with custom per-connection channel capacity
    #[must_use]
    pub fn new_pair_with_capacity(capacity: usize) -> (Self, ServiceListener) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let connector = Self {
            shared: Arc::new(Shared {
                accept_tx,
                capacity,
                attempts: AtomicU32::new(0),
                fail_next: AtomicU32::new(0),
                refusing: AtomicBool::new(false),
            }),
        };
        (connector, ServiceListener { accept_rx })
    }

    /// Make the next `count` connection attempts fail
    pub fn fail_next(&self, count: u32) {
        self.shared.fail_next.store(count, Ordering::SeqCst);
    }

    /// Refuse (or stop refusing) every connection attempt
    pub fn set_refusing(&self, refusing: bool) {
        self.shared.refusing.store(refusing, Ordering::SeqCst);
    }

    /// Number of connection attempts made so far, failed ones included
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    fn take_scripted_failure(&self) -> bool {
        self.shared
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Connector for InProcessConnector {
    async fn connect(&self) -> Result<Link, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);

        if self.shared.refusing.load(Ordering::SeqCst) || self.take_scripted_failure() {
            return Err(TransportError::ConnectionFailed(
                "in-process service refused the connection".to_string(),
            ));
        }

        let id = ConnectionId::new();
        let (request_tx, request_rx) = mpsc::channel(self.shared.capacity);
        let (reply_tx, reply_rx) = mpsc::channel(self.shared.capacity);

        let endpoint = ServiceEndpoint {
            id: id.clone(),
            requests: request_rx,
            replies: reply_tx,
        };
        self.shared
            .accept_tx
            .send(endpoint)
            .map_err(|_| TransportError::ConnectionFailed("Listener closed".to_string()))?;

        Ok(Link {
            id,
            sink: Box::new(InProcessSink {
                tx: Some(request_tx),
            }),
            stream: Box::new(InProcessStream { rx: reply_rx }),
        })
    }

    fn endpoint(&self) -> String {
        "in-process".to_string()
    }
}

struct InProcessSink {
    tx: Option<mpsc::Sender<String>>,
}

#[async_trait]
impl FrameSink for InProcessSink {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(TransportError::ConnectionClosed);
        };
        tx.send(text)
            .await
            .map_err(|_| TransportError::SendFailed("Channel closed".to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

struct InProcessStream {
    rx: mpsc::Receiver<InboundPayload>,
}

#[async_trait]
impl FrameStream for InProcessStream {
    async fn next_payload(&mut self) -> Option<Result<InboundPayload, TransportError>> {
        self.rx.recv().await.map(Ok)
    }
}

/// Accepts connections made through an [`InProcessConnector`]
pub struct ServiceListener {
    accept_rx: mpsc::UnboundedReceiver<ServiceEndpoint>,
}

impl ServiceListener {
    /// Wait for the next connection
    ///
    /// Returns `None` once every connector clone is dropped.
    pub async fn accept(&mut self) -> Option<ServiceEndpoint> {
        self.accept_rx.recv().await
    }

    /// Take an already established connection without waiting
    pub fn try_accept(&mut self) -> Option<ServiceEndpoint> {
        self.accept_rx.try_recv().ok()
    }
}

/// Service side of one in-process connection
///
/// Dropping the endpoint closes the connection from the service side.
pub struct ServiceEndpoint {
    id: ConnectionId,
    requests: mpsc::Receiver<String>,
    replies: mpsc::Sender<InboundPayload>,
}

impl ServiceEndpoint {
    /// Connection ID shared with the client side
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Wait for the next request frame
    ///
    /// Returns `None` once the client closed its side.
    pub async fn recv_request(&mut self) -> Option<String> {
        self.requests.recv().await
    }

    /// Stop accepting requests while keeping the reply side open
    ///
    /// Later client sends fail; payloads can still be sent to the client.
    pub fn close_requests(&mut self) {
        self.requests.close();
    }

    /// Send a text payload to the client
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the client side is gone.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.send(InboundPayload::Text(text.into())).await
    }

    /// Send a binary payload to the client
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the client side is gone.
    pub async fn send_binary(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.send(InboundPayload::Binary(bytes)).await
    }

    async fn send(&self, payload: InboundPayload) -> Result<(), TransportError> {
        self.replies
            .send(payload)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_process_roundtrip() {
        let (connector, mut listener) = InProcessConnector::new_pair();

        let mut link = connector.connect().await.unwrap();
        let mut endpoint = listener.accept().await.unwrap();
        assert_eq!(endpoint.id(), &link.id);

        link.sink.send_text("ping".to_string()).await.unwrap();
        assert_eq!(endpoint.recv_request().await.as_deref(), Some("ping"));

        endpoint.send_text("pong").await.unwrap();
        let payload = link.stream.next_payload().await.unwrap().unwrap();
        assert_eq!(payload, InboundPayload::Text("pong".into()));
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let (connector, _listener) = InProcessConnector::new_pair();
        connector.fail_next(2);

        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_ok());
        assert_eq!(connector.attempts(), 3);
    }

    #[tokio::test]
    async fn test_refusing() {
        let (connector, _listener) = InProcessConnector::new_pair();
        connector.set_refusing(true);
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));

        connector.set_refusing(false);
        assert!(connector.connect().await.is_ok());
    }

    #[tokio::test]
    async fn test_listener_dropped() {
        let (connector, listener) = InProcessConnector::new_pair();
        drop(listener);
        assert!(matches!(
            connector.connect().await,
            Err(TransportError::ConnectionFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_close_ends_both_directions() {
        let (connector, mut listener) = InProcessConnector::new_pair();
        let mut link = connector.connect().await.unwrap();
        let mut endpoint = listener.accept().await.unwrap();

        link.sink.close().await.unwrap();
        assert_eq!(endpoint.recv_request().await, None);
        assert!(matches!(
            link.sink.send_text("late".into()).await,
            Err(TransportError::ConnectionClosed)
        ));

        drop(endpoint);
        assert!(link.stream.next_payload().await.is_none());
    }
}
