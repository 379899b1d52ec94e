//! Shared helpers for client integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use horizon_core::{
    AssistClient, ChatObserver, ConnectionEvent, HealthMonitorConfig, InProcessConnector,
    ReconnectPolicy,
};
use horizon_core::transport::ServiceListener;

/// How long a test waits for something that should happen promptly
pub const PROMPT: Duration = Duration::from_secs(2);

/// Observer that records every callback
#[derive(Default)]
pub struct RecordingObserver {
    updates: Mutex<Vec<String>>,
    connections: Mutex<Vec<bool>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn updates(&self) -> Vec<String> {
        self.updates.lock().clone()
    }

    pub fn last_update(&self) -> Option<String> {
        self.updates.lock().last().cloned()
    }

    pub fn connections(&self) -> Vec<bool> {
        self.connections.lock().clone()
    }
}

impl ChatObserver for RecordingObserver {
    fn on_message_update(&self, current: &str) {
        self.updates.lock().push(current.to_string());
    }

    fn on_connection_changed(&self, connected: bool) {
        self.connections.lock().push(connected);
    }
}

/// Client over an in-process link, health monitor off
pub struct Harness {
    pub client: AssistClient,
    pub connector: InProcessConnector,
    pub listener: ServiceListener,
    pub observer: Arc<RecordingObserver>,
    pub events: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Harness {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self::with_health(policy, HealthMonitorConfig::disabled())
    }

    pub fn with_health(policy: ReconnectPolicy, health: HealthMonitorConfig) -> Self {
        let (connector, listener) = InProcessConnector::new_pair();
        let observer = RecordingObserver::new();
        let (client, events) = AssistClient::builder(connector.clone())
            .reconnect_policy(policy)
            .health_monitor(health)
            .observer(observer.clone())
            .build_with_events();

        Self {
            client,
            connector,
            listener,
            observer,
            events,
        }
    }

    /// Next event, failing the test if none arrives in time
    pub async fn next_event(&mut self) -> ConnectionEvent {
        next_event(&mut self.events).await
    }

    /// Skip events until one matches
    pub async fn wait_for_event(
        &mut self,
        matches: impl Fn(&ConnectionEvent) -> bool,
    ) -> ConnectionEvent {
        loop {
            let event = self.next_event().await;
            if matches(&event) {
                return event;
            }
        }
    }
}

pub async fn next_event(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(PROMPT, rx.recv())
        .await
        .expect("timed out waiting for connection event")
        .expect("event channel closed")
}

/// Poll `condition` until it holds or `PROMPT` elapses
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + PROMPT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
