//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use tokio::sync::mpsc;

use crate::{
    domain::{ConnectionId, OutboundFrame},
    ui::{session::ChatSession, state::AppState},
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that receives frames from the rx channel and writes them to the WebSocket.
///
/// `OutboundFrame::Close` is written as a close frame with the protocol-error
/// code and ends the task.
///
/// # Arguments
///
/// * `rx` - Channel receiver fed by the session and the message pusher
/// * `sender` - WebSocket sink of this connection
///
/// # Returns
///
/// A `JoinHandle` for the spawned task
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    mut sender: SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                OutboundFrame::Close { reason } => {
                    let close = CloseFrame {
                        code: close_code::PROTOCOL,
                        reason: reason.into(),
                    };
                    if let Err(e) = sender.send(Message::Close(Some(close))).await {
                        tracing::debug!("Failed to send close frame: {}", e);
                    }
                    break;
                }
            }
        }
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::generate();
    tracing::info!("Connection '{}' opened", connection_id);

    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    // Payloads are processed on the worker pool, in arrival order
    let session = ChatSession::on_open(connection_id, tx, state.clone());
    let queue = state.worker_pool.spawn_queue(session);

    let mut send_task = pusher_loop(rx, sender);

    let recv_queue = &queue;
    let recv = async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on connection '{}': {}", connection_id, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    tracing::debug!(
                        "Received text on connection '{}': {}",
                        connection_id,
                        text.as_str()
                    );
                    if !recv_queue.submit(text.as_str().to_owned()) {
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection_id);
                    break;
                }
                Message::Binary(_) => {
                    tracing::debug!("Ignoring binary frame on connection '{}'", connection_id);
                }
                // Ping/pong is handled automatically by the WebSocket protocol
                _ => {}
            }
        }
    };

    // If either side completes, stop the other
    tokio::select! {
        _ = recv => {}
        _ = &mut send_task => {}
    };

    // Drain pending payloads and run disconnect cleanup
    queue.shutdown().await;
    send_task.abort();

    tracing::info!("Connection '{}' closed", connection_id);
}
