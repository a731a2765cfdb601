use anyhow::{Context, Result};
use callbridge_core::{ClientMessage, ServerMessage, SessionId};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Raw WebSocket client speaking the relay protocol.
pub struct TestClient {
    write: SplitSink<Socket, Message>,
    read: SplitStream<Socket>,
    /// Identifier assigned by the relay, once `init` has completed.
    pub id: Option<SessionId>,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let url = format!("ws://{}/bridge", addr);
        let (socket, _response) = connect_async(url.as_str())
            .await
            .context("Failed to connect to relay")?;
        let (write, read) = socket.split();

        Ok(Self {
            write,
            read,
            id: None,
        })
    }

    /// Connects and completes the `init` handshake.
    pub async fn joined(addr: SocketAddr) -> Result<Self> {
        let mut client = Self::connect(addr).await?;
        client.init().await?;
        Ok(client)
    }

    pub async fn init(&mut self) -> Result<SessionId> {
        self.send(&ClientMessage::Init).await?;
        match self.recv(super::SIGNAL_TIMEOUT_MS).await? {
            ServerMessage::Init { id } => {
                tracing::debug!("[TestClient] assigned {}", id);
                self.id = Some(id.clone());
                Ok(id)
            }
            other => anyhow::bail!("Expected init, got {:?}", other),
        }
    }

    pub fn session_id(&self) -> Result<SessionId> {
        self.id.clone().context("Client has not completed init")
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.send_raw(json).await
    }

    pub async fn send_raw(&mut self, text: String) -> Result<()> {
        self.write
            .send(Message::text(text))
            .await
            .context("Failed to send frame")
    }

    /// Next protocol message, skipping control frames.
    pub async fn recv(&mut self, timeout_ms: u64) -> Result<ServerMessage> {
        let deadline = Duration::from_millis(timeout_ms);
        loop {
            let frame = tokio::time::timeout(deadline, self.read.next())
                .await
                .context("Timeout waiting for relay message")?
                .context("Relay closed the connection")??;

            if let Message::Text(text) = frame {
                return serde_json::from_str(text.as_str()).context("Unparseable relay message");
            }
        }
    }

    /// Succeeds when nothing arrives within `window_ms`.
    pub async fn expect_silence(&mut self, window_ms: u64) -> Result<()> {
        match tokio::time::timeout(Duration::from_millis(window_ms), self.read.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(Message::Text(text)))) => anyhow::bail!("Unexpected message: {}", text),
            Ok(other) => anyhow::bail!("Unexpected frame: {:?}", other),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.write
            .send(Message::Close(None))
            .await
            .context("Failed to close socket")
    }
}
