//! WebSocket Transport Tests
//!
//! Drives `AssistClient` over a real WebSocket against a small service on
//! `127.0.0.1`.

#![cfg(feature = "websocket")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{accept_async, WebSocketStream};

use common::{next_event, wait_until, RecordingObserver};
use horizon_core::{
    AssistClient, ConnectionEvent, HealthMonitorConfig, MessageRole, ReconnectPolicy,
    TransportConfig, WebSocketConnector,
};

type ServerSocket = WebSocketStream<tokio::net::TcpStream>;

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/chat-ws", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    accept_async(stream).await.unwrap()
}

/// Answers each request with one fragment and one completion frame
async fn echo_service(mut ws: ServerSocket) {
    while let Some(Ok(message)) = ws.next().await {
        let WsMessage::Text(request) = message else {
            continue;
        };
        let request: Value = serde_json::from_str(&request).unwrap();
        let question = request["messages"]
            .as_array()
            .and_then(|m| m.last())
            .and_then(|m| m["content"].as_str())
            .unwrap_or_default()
            .to_string();

        let reply = json!({"content": format!("You asked: {question}"), "is_complete": true});
        if ws.send(WsMessage::Text("Thinking".into())).await.is_err()
            || ws.send(WsMessage::Text(reply.to_string())).await.is_err()
        {
            break;
        }
    }
}

fn client_for(
    url: &str,
    policy: ReconnectPolicy,
) -> (
    AssistClient,
    Arc<RecordingObserver>,
    mpsc::UnboundedReceiver<ConnectionEvent>,
) {
    let mut config = TransportConfig::for_testing();
    config.url = url.to_string();
    let observer = RecordingObserver::new();
    let (client, events) = AssistClient::builder(WebSocketConnector::new(config))
        .reconnect_policy(policy)
        .health_monitor(HealthMonitorConfig::disabled())
        .observer(observer.clone())
        .build_with_events();
    (client, observer, events)
}

#[tokio::test]
async fn test_round_trip_over_websocket() {
    let (listener, url) = bind().await;
    let service = tokio::spawn(async move { echo_service(accept(&listener).await).await });
    let (client, observer, _events) = client_for(&url, ReconnectPolicy::for_testing());

    assert!(client.connect().await);
    client.send_text("ping?").await.unwrap();

    assert!(wait_until(|| client.messages().len() == 2).await);
    let reply = &client.messages()[1];
    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, "You asked: ping?");
    assert_eq!(
        observer.updates(),
        vec!["Thinking".to_string(), "You asked: ping?".into()]
    );

    // several keepalive rounds against a service that answers pings
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(client.is_connected());

    client.disconnect().await;
    tokio::time::timeout(Duration::from_secs(2), service)
        .await
        .expect("service sees the close")
        .unwrap();
}

#[tokio::test]
async fn test_reconnects_after_service_closes() {
    let (listener, url) = bind().await;
    let service = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        first.close(None).await.ok();
        echo_service(accept(&listener).await).await;
    });
    let (client, _observer, mut events) = client_for(&url, ReconnectPolicy::for_testing());

    assert!(client.connect().await);
    let ConnectionEvent::Connected { connection_id } = next_event(&mut events).await else {
        panic!("expected Connected");
    };

    let lost = next_event(&mut events).await;
    assert!(
        matches!(lost, ConnectionEvent::ConnectionLost { connection_id: ref id, .. } if *id == connection_id),
        "unexpected {lost:?}"
    );
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectScheduled { attempt: 1, .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected { .. }
    ));

    client.send_text("still there?").await.unwrap();
    assert!(wait_until(|| client.messages().len() == 2).await);

    client.disconnect().await;
    service.abort();
}

#[tokio::test]
async fn test_silent_service_is_declared_dead() {
    let (listener, url) = bind().await;
    let service = tokio::spawn(async move {
        // hold the socket without reading, so pings go unanswered
        let _ws = accept(&listener).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
    });
    let (client, observer, mut events) =
        client_for(&url, ReconnectPolicy::for_testing().with_max_attempts(0));

    assert!(client.connect().await);
    next_event(&mut events).await;

    let lost = next_event(&mut events).await;
    let ConnectionEvent::ConnectionLost { reason, .. } = lost else {
        panic!("expected ConnectionLost, got {lost:?}");
    };
    assert!(reason.unwrap_or_default().contains("keepalive"));
    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::GaveUp { attempts: 0 }
    );
    assert_eq!(observer.connections(), vec![true, false]);

    service.abort();
}
