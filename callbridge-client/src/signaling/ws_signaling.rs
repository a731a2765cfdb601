use crate::error::SignalingError;
use crate::signaling::SignalingLink;
use async_trait::async_trait;
use callbridge_core::{ClientMessage, ServerMessage};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// WebSocket connection to the relay.
pub struct WsSignaling {
    tx: mpsc::UnboundedSender<String>,
}

impl WsSignaling {
    /// Opens the socket and returns the sender together with the stream of relay messages.
    /// The stream ends when the socket closes.
    pub async fn connect(
        url: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ServerMessage>), SignalingError> {
        let (socket, _response) = connect_async(url).await?;
        info!("Connected to relay at {}", url);
        let (mut sink, mut stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<ServerMessage>();

        tokio::spawn(async move {
            while let Some(json) = out_rx.recv().await {
                if let Err(e) = sink.send(Message::text(json)).await {
                    error!("Failed to write to relay: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerMessage>(text.as_str()) {
                            Ok(msg) => {
                                if in_tx.send(msg).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Ignoring invalid relay frame: {}", e),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Relay connection error: {}", e);
                        break;
                    }
                }
            }
            debug!("Relay connection closed");
        });

        Ok((Self { tx: out_tx }, in_rx))
    }
}

#[async_trait]
impl SignalingLink for WsSignaling {
    async fn send(&self, msg: ClientMessage) -> Result<(), SignalingError> {
        let json = serde_json::to_string(&msg)?;
        self.tx.send(json).map_err(|_| SignalingError::Closed)
    }
}
