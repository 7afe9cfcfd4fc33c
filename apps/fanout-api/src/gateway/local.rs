//! In-process gateway: WebSocket connections accepted on `/gateway`.
//!
//! Accepting a socket raises CONNECT through the entry router, closing it
//! raises DISCONNECT. Broadcasts reach the socket through a bounded per-socket
//! queue; a full queue drops the payload for that socket only.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use fanout_common::id::{prefix, prefixed_ulid};

use crate::entry::EntryRouter;
use crate::error::ApiError;
use crate::trigger::{LifecycleEvent, Trigger};
use crate::AppState;

use super::{PushError, PushGateway};

/// Payloads queued per socket before pushes start failing as transient.
const OUTBOUND_BUFFER: usize = 256;

/// Close code sent when the CONNECT notification could not be recorded.
const CLOSE_INTERNAL_ERROR: u16 = 1011;

/// Live sockets hosted by this process, keyed by connection id.
pub struct LocalGateway {
    connections: DashMap<String, mpsc::Sender<Arc<[u8]>>>,
}

impl LocalGateway {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Allocate an id and outbound queue for a new socket.
    pub fn attach(&self) -> (String, mpsc::Receiver<Arc<[u8]>>) {
        let connection_id = prefixed_ulid(prefix::CONNECTION);
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.connections.insert(connection_id.clone(), tx);
        (connection_id, rx)
    }

    pub fn detach(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for LocalGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushGateway for LocalGateway {
    async fn send(&self, connection_id: &str, data: &[u8]) -> Result<(), PushError> {
        let Some(tx) = self.connections.get(connection_id) else {
            return Err(PushError::StaleTarget(connection_id.to_string()));
        };

        match tx.try_send(Arc::from(data)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(PushError::transient(connection_id, "outbound buffer full"))
            }
            Err(TrySendError::Closed(_)) => Err(PushError::StaleTarget(connection_id.to_string())),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let Some(gateway) = state.local_gateway.clone() else {
        return ApiError::not_found("Connections are hosted by a remote gateway").into_response();
    };
    let entry = state.entry.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, gateway, entry))
}

async fn handle_connection(socket: WebSocket, gateway: Arc<LocalGateway>, entry: Arc<EntryRouter>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Attach first so pushes succeed as soon as the registry lists the id.
    let (connection_id, mut outbound) = gateway.attach();

    if let Err(e) = entry
        .route(Trigger::lifecycle(&connection_id, LifecycleEvent::Connect))
        .await
    {
        tracing::error!(%connection_id, error = %e, "failed to register connection");
        gateway.detach(&connection_id);
        let _ = send_close(&mut ws_tx, CLOSE_INTERNAL_ERROR, "Registry unavailable").await;
        return;
    }

    tracing::info!(%connection_id, "gateway connection opened");

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_))) => {
                        let trigger = Trigger::lifecycle(&connection_id, LifecycleEvent::Message);
                        if let Err(e) = entry.route(trigger).await {
                            tracing::warn!(%connection_id, error = %e, "client message not handled");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, %connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            data = outbound.recv() => {
                let Some(data) = data else { break };
                let msg = match String::from_utf8(data.to_vec()) {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => Message::Binary(e.into_bytes().into()),
                };
                if ws_tx.send(msg).await.is_err() {
                    break;
                }
            }
        }
    }

    gateway.detach(&connection_id);

    if let Err(e) = entry
        .route(Trigger::lifecycle(&connection_id, LifecycleEvent::Disconnect))
        .await
    {
        // The entry is pruned by the next broadcast that reaches it.
        tracing::warn!(%connection_id, error = %e, "failed to deregister connection");
    }

    tracing::info!(%connection_id, "gateway connection closed");
}

async fn send_close(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    code: u16,
    reason: &str,
) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
