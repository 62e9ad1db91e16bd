//! WebSocket endpoint streaming lifecycle events to dashboard clients.
//!
//! Each connection registers as an observer with the broadcaster and
//! forwards its queue to the socket. The stream is one-way: inbound
//! frames only keep the connection alive, except `Close`, which tears
//! the session down. Clients joining mid-stream receive no replay; they
//! are expected to fetch current state over REST first.

use crate::AppState;
use axum::{
    extract::{
        ws::{Message as AxumMessage, WebSocket},
        Extension, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;

/// Handler for `GET /ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles one WebSocket connection from registration to cleanup.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let (observer_id, mut rx) = state.broadcaster.register().await;

    // Forward queued events to the socket until the queue closes or the
    // client goes away.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are liveness only.
    while let Some(Ok(msg)) = receiver.next().await {
        if let AxumMessage::Close(_) = msg {
            break;
        }
    }

    state.broadcaster.deregister(observer_id).await;
    send_task.abort();
    tracing::debug!(observer = observer_id, "websocket session closed");
}
