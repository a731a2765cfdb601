use crate::presence::ConnectionHandle;
use crate::signaling::{ClientConnection, SignalingRelay};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use callbridge_core::ClientMessage;
use futures::{SinkExt, StreamExt};
use tracing::{error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(relay): State<SignalingRelay>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, relay))
}

async fn handle_socket(socket: WebSocket, relay: SignalingRelay) {
    let (mut sender, mut receiver) = socket.split();
    let (handle, mut rx) = ConnectionHandle::channel();
    info!("New WebSocket connection #{}", handle.id());

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut conn = ClientConnection::new(handle);

    // Frames of one connection are handled strictly in arrival order.
    loop {
        tokio::select! {
            _ = &mut send_task => break,

            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => relay.handle_message(&mut conn, msg),
                    Err(e) => warn!("Invalid frame on #{}: {}", conn.handle().id(), e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!("WebSocket error on #{}: {}", conn.handle().id(), e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    send_task.abort();
    let connection_id = conn.handle().id();
    relay.disconnect(conn);
    info!("WebSocket #{} disconnected", connection_id);
}
