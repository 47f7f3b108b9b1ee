//! WebSocket signaling endpoint.
//!
//! One upgrade per participant at `GET /ws`. Each connection gets a
//! relay-assigned UUIDv4 id, announced to the client in a `connected`
//! frame; peers use that id as the `target` of relayed offers and answers.
//!
//! The socket splits into a reader (decoding frames into
//! [`ClientEvent`](crate::protocol::ClientEvent)s for the router) and a
//! writer task draining the connection's outbound channel. Frames that fail to decode are logged and dropped; they never
//! reach the router.

use crate::actors::{RelayMetrics, RouterActorHandle};
use crate::protocol::{decode_frame, ServerEvent};
use crate::transport::ChannelTransport;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Shared state for the signaling endpoint.
#[derive(Clone)]
pub struct SignalingState {
    /// Router actor handle.
    pub router: RouterActorHandle,
    /// Connection registry and group fan-out.
    pub transport: Arc<ChannelTransport>,
    /// Shared relay metrics.
    pub metrics: Arc<RelayMetrics>,
}

/// Create the signaling router exposing `GET /ws`.
pub fn signaling_router(state: SignalingState) -> Router {
    Router::new().route("/ws", get(ws_handler)).with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SignalingState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one WebSocket connection from accept to cleanup.
async fn handle_socket(socket: WebSocket, state: SignalingState) {
    let connection_id = uuid::Uuid::new_v4().to_string();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    state.transport.register(&connection_id, outbound_tx);
    state.metrics.connection_opened();

    info!(
        target: "sr.ws",
        connection_id = %connection_id,
        "Client connected"
    );

    // Tell the client its id; peers address offers/answers with it.
    state
        .transport
        .send(&connection_id, ServerEvent::Connected(connection_id.clone()));

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer_connection_id = connection_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(
                        target: "sr.ws",
                        connection_id = %writer_connection_id,
                        error = %e,
                        "Failed to encode outbound frame"
                    );
                    continue;
                }
            };
            if ws_tx.send(Message::Text(frame)).await.is_err() {
                // Peer is gone; the read loop will observe it too.
                break;
            }
        }
    });

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => match decode_frame(&text) {
                Ok(event) => {
                    if state
                        .router
                        .client_event(connection_id.clone(), event)
                        .await
                        .is_err()
                    {
                        // Router gone: relay is shutting down.
                        break;
                    }
                }
                Err(e) => {
                    warn!(
                        target: "sr.ws",
                        connection_id = %connection_id,
                        error = %e,
                        "Dropping malformed frame"
                    );
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                // Binary, ping and pong frames are not part of the protocol.
            }
            Err(e) => {
                debug!(
                    target: "sr.ws",
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket read error"
                );
                break;
            }
        }
    }

    // Registry first (group membership dies with the connection), then
    // room cleanup through the router.
    state.transport.unregister(&connection_id);
    if let Err(e) = state.router.disconnected(connection_id.clone()).await {
        warn!(
            target: "sr.ws",
            connection_id = %connection_id,
            error = %e,
            "Failed to signal disconnect to router"
        );
    }
    state.metrics.connection_closed();
    writer.abort();

    info!(
        target: "sr.ws",
        connection_id = %connection_id,
        "Client disconnected"
    );
}
