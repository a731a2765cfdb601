use crate::presence::{ConnectionHandle, PresenceRegistry};
use callbridge_core::{ClientMessage, ServerMessage, SessionId};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Relay-side state of one client connection.
///
/// The session id is assigned by the relay on `init`; nothing the client sends can change it.
#[derive(Debug)]
pub struct ClientConnection {
    handle: ConnectionHandle,
    session_id: Option<SessionId>,
}

impl ClientConnection {
    pub fn new(handle: ConnectionHandle) -> Self {
        Self {
            handle,
            session_id: None,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}

/// Forwards call-control messages between sessions by identifier lookup.
///
/// Keeps no call state of its own; reachability is always asked of the registry.
#[derive(Clone)]
pub struct SignalingRelay {
    registry: Arc<PresenceRegistry>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PresenceRegistry> {
        &self.registry
    }

    pub fn handle_message(&self, conn: &mut ClientConnection, msg: ClientMessage) {
        match msg {
            ClientMessage::Init => self.handle_init(conn),

            ClientMessage::Request { to } => {
                let Some(from) = conn.session_id.clone() else {
                    warn!("Request from unregistered connection #{}", conn.handle.id());
                    Self::reply(conn, ServerMessage::Failed);
                    return;
                };
                self.forward_or_fail(conn, &to, ServerMessage::Request { from });
            }

            ClientMessage::Call(call) => {
                let Some(from) = conn.session_id.clone() else {
                    warn!("Call from unregistered connection #{}", conn.handle.id());
                    Self::reply(conn, ServerMessage::Failed);
                    return;
                };
                let msg = ServerMessage::call(from, call.negotiation);
                self.forward_or_fail(conn, &call.to, msg);
            }

            ClientMessage::End { to } => {
                let Some(from) = conn.session_id.clone() else {
                    debug!("End from unregistered connection #{}", conn.handle.id());
                    return;
                };
                let Some(target) = self.registry.get(&to) else {
                    debug!("End from {} for unknown session {}", from, to);
                    return;
                };
                debug!("Relaying end {} -> {}", from, to);
                if target.send(ServerMessage::End { from }).is_err() {
                    debug!("Session {} gone before end", to);
                }
            }
        }
    }

    /// Evicts the connection's session. Nothing is forwarded to or from it afterwards.
    pub fn disconnect(&self, conn: ClientConnection) {
        match conn.session_id {
            Some(id) => {
                self.registry.remove(&id);
                info!("{} disconnected", id);
            }
            None => debug!("Connection #{} closed before init", conn.handle.id()),
        }
    }

    fn handle_init(&self, conn: &mut ClientConnection) {
        if let Some(id) = conn.session_id.clone() {
            Self::reply(conn, ServerMessage::Init { id });
            return;
        }

        match self.registry.create(conn.handle.clone()) {
            Ok(id) => {
                conn.session_id = Some(id.clone());
                Self::reply(conn, ServerMessage::Init { id });
            }
            Err(e) => {
                warn!("Session id assignment failed for #{}: {}", conn.handle.id(), e);
                Self::reply(
                    conn,
                    ServerMessage::Error {
                        message: "Failed to generate session id".to_owned(),
                    },
                );
            }
        }
    }

    fn forward_or_fail(&self, conn: &ClientConnection, to: &SessionId, msg: ServerMessage) {
        let delivered = self
            .registry
            .get(to)
            .is_some_and(|target| target.send(msg).is_ok());

        if !delivered {
            debug!("Target {} unreachable", to);
            Self::reply(conn, ServerMessage::Failed);
        }
    }

    fn reply(conn: &ClientConnection, msg: ServerMessage) {
        if conn.handle.send(msg).is_err() {
            debug!("Connection #{} gone before reply", conn.handle.id());
        }
    }
}
