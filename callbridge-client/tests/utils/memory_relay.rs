use async_trait::async_trait;
use callbridge_client::{SignalingError, SignalingLink};
use callbridge_core::{ClientMessage, ServerMessage};
use callbridge_server::{ClientConnection, ConnectionHandle, PresenceRegistry, SignalingRelay};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// The real relay logic without the WebSocket in between.
pub struct MemoryRelay {
    relay: SignalingRelay,
}

impl MemoryRelay {
    pub fn new() -> Self {
        Self {
            relay: SignalingRelay::new(Arc::new(PresenceRegistry::new())),
        }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        self.relay.registry()
    }

    pub fn connect(&self) -> (Arc<MemoryLink>, mpsc::UnboundedReceiver<ServerMessage>) {
        let (handle, rx) = ConnectionHandle::channel();
        let link = MemoryLink {
            relay: self.relay.clone(),
            conn: Mutex::new(Some(ClientConnection::new(handle))),
        };
        (Arc::new(link), rx)
    }
}

pub struct MemoryLink {
    relay: SignalingRelay,
    conn: Mutex<Option<ClientConnection>>,
}

impl MemoryLink {
    /// Drops the connection as if the socket closed.
    pub async fn disconnect(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            self.relay.disconnect(conn);
        }
    }
}

#[async_trait]
impl SignalingLink for MemoryLink {
    async fn send(&self, msg: ClientMessage) -> Result<(), SignalingError> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(SignalingError::Closed)?;
        self.relay.handle_message(conn, msg);
        Ok(())
    }
}
