#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use futures_util::StreamExt;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use fanout_api::config::Config;
use fanout_api::registry::{Connection, ConnectionRegistry, MemoryRegistry, RegistryError};
use fanout_api::{AppState, Backends};

pub const TEST_STREAM: &str = "call-events";

pub type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Registry whose backing store is always unreachable.
pub struct DownRegistry;

#[async_trait]
impl ConnectionRegistry for DownRegistry {
    async fn put(&self, _: &Connection) -> Result<(), RegistryError> {
        Err(RegistryError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _: &str) -> Result<(), RegistryError> {
        Err(RegistryError::Unavailable("connection refused".into()))
    }

    async fn list_all(&self) -> Result<Vec<String>, RegistryError> {
        Err(RegistryError::Unavailable("connection refused".into()))
    }
}

/// Build an AppState over the given registry with the in-process gateway,
/// and start its stream consumer.
pub fn test_state_with(registry: Arc<dyn ConnectionRegistry>) -> AppState {
    let (state, consumer) = AppState::new(Config::for_tests(TEST_STREAM), Backends::local(registry));
    tokio::spawn(consumer.run(state.entry.clone()));
    state
}

pub fn test_state() -> (AppState, Arc<MemoryRegistry>) {
    let registry = Arc::new(MemoryRegistry::new());
    let state = test_state_with(registry.clone());
    (state, registry)
}

/// Build the full application router wired to a fresh in-memory state.
pub fn test_app() -> (Router, AppState, Arc<MemoryRegistry>) {
    let (state, registry) = test_state();
    let app = fanout_api::routes::router().with_state(state.clone());
    (app, state, registry)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background for the rest of the test.
pub async fn start_server() -> (SocketAddr, AppState, Arc<MemoryRegistry>) {
    let (app, state, registry) = test_app();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, registry)
}

pub async fn connect_ws(addr: SocketAddr) -> WsClient {
    let url = format!("ws://{addr}/gateway");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

/// Next text frame, skipping control frames.
pub async fn next_text(ws: &mut WsClient) -> String {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended")
            .expect("ws read error");
        if let Message::Text(text) = msg {
            return text.to_string();
        }
    }
}

/// Assert nothing but control frames arrive within `wait`.
pub async fn assert_silent(ws: &mut WsClient, wait: Duration) {
    let deadline = time::Instant::now() + wait;
    while let Ok(msg) = time::timeout_at(deadline, ws.next()).await {
        match msg {
            Some(Ok(Message::Text(text))) => panic!("unexpected message: {text}"),
            Some(Ok(_)) => continue,
            _ => return,
        }
    }
}

/// Poll until the registry holds exactly `expected` ids.
pub async fn wait_for_registry(registry: &MemoryRegistry, expected: usize) -> Vec<String> {
    for _ in 0..250 {
        let ids = registry.list_all().await.unwrap();
        if ids.len() == expected {
            return ids;
        }
        time::sleep(Duration::from_millis(20)).await;
    }
    panic!(
        "registry never reached {expected} entries: {:?}",
        registry.list_all().await.unwrap()
    );
}

/// A platform stream envelope carrying the given raw payloads.
pub fn stream_envelope(payloads: &[&[u8]]) -> serde_json::Value {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    let records: Vec<_> = payloads
        .iter()
        .enumerate()
        .map(|(i, p)| {
            serde_json::json!({
                "kinesis": {
                    "data": BASE64.encode(p),
                    "partitionKey": "call-1",
                    "sequenceNumber": i.to_string(),
                    "approximateArrivalTimestamp": 1_700_000_000.0
                }
            })
        })
        .collect();
    serde_json::json!({ "Records": records })
}

pub fn lifecycle_envelope(connection_id: &str, event_type: &str) -> serde_json::Value {
    serde_json::json!({
        "requestContext": {
            "connectionId": connection_id,
            "eventType": event_type,
            "routeKey": format!("${}", event_type.to_lowercase()),
        }
    })
}
