//! WebSocket handler for relay subscribers.
//!
//! Every connection becomes a subscriber of the [`BroadcastRelay`] and
//! receives envelopes as JSON text:
//! - `{ "type": "price", "message": { ... }, "timestamp": "..." }`
//! - `{ "type": "opportunity", "message": { ... }, "timestamp": "..." }`
//!
//! Valid envelopes sent by a client are re-published to everyone,
//! including the sender.

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use tracing::{debug, info};

use super::relay::{BroadcastRelay, Subscription};
use super::AppState;
use crate::core::types::RelayEnvelope;

/// WebSocket upgrade handler at GET / and GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state, peer))
}

/// Handle an individual WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: AppState, peer: SocketAddr) {
    let Subscription { id, mut rx } = state.relay.subscribe();
    let mut shutdown = state.shutdown.subscribe();

    info!(
        peer = %peer,
        subscriber = %id,
        subscribers = state.relay.subscriber_count(),
        "Subscriber connected"
    );

    loop {
        tokio::select! {
            // Forward relay envelopes to the client
            payload = rx.recv() => {
                match payload {
                    Some(json) => {
                        if socket.send(Message::Text(json.to_string())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if state.rebroadcast_inbound {
                            rebroadcast_inbound(&state.relay, &text);
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
            _ = shutdown.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
        }
    }

    state.relay.unsubscribe(&id);
    info!(peer = %peer, subscriber = %id, "Subscriber disconnected");
}

/// Re-publish a client frame if it is a well-formed envelope.
///
/// Returns the number of deliveries, or `None` when the frame was ignored.
pub fn rebroadcast_inbound(relay: &BroadcastRelay, text: &str) -> Option<usize> {
    match serde_json::from_str::<RelayEnvelope>(text) {
        Ok(envelope) => Some(relay.publish_envelope(&envelope)),
        Err(e) => {
            debug!(error = %e, "Ignoring inbound frame that is not an envelope");
            None
        }
    }
}
