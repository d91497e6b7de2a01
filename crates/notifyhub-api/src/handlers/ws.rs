//! WebSocket upgrade handler.

use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{error, info, warn};

use notifyhub_realtime::message::serializer::serialize_outbound;

use crate::state::AppState;

/// How long the writer may take to flush after the reader stops.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// GET /ws
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_ws_connection(state, socket))
}

/// Drives one established WebSocket connection.
async fn handle_ws_connection(state: AppState, socket: WebSocket) {
    if state.engine.is_shutting_down() {
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (mut handler, mut outbound_rx) = state.engine.open_connection();
    let conn_id = handler.id();
    let close = handler.close_token();

    info!(conn_id = %conn_id, "WebSocket connection established");

    let writer_close = close.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = outbound_rx.recv() => {
                    let Some(msg) = msg else { break };
                    let text = match serialize_outbound(&msg) {
                        Ok(text) => text,
                        Err(e) => {
                            error!(conn_id = %conn_id, kind = msg.kind(), error = %e, "Failed to encode message");
                            continue;
                        }
                    };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = writer_close.cancelled() => {
                    // Flush what is already queued, then close.
                    while let Ok(msg) = outbound_rx.try_recv() {
                        let Ok(text) = serialize_outbound(&msg) else { continue };
                        if ws_tx.send(Message::Text(text.into())).await.is_err() {
                            return;
                        }
                    }
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            _ = close.cancelled() => break,
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => handler.handle_text(text.as_str()).await,
                Some(Ok(Message::Binary(_))) => handler.handle_binary(),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
            },
        }
    }

    handler.close();
    if tokio::time::timeout(WRITER_DRAIN, writer).await.is_err() {
        warn!(conn_id = %conn_id, "Writer did not finish in time");
    }

    info!(conn_id = %conn_id, "WebSocket connection closed");
}
