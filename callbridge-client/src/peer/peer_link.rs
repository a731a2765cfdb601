use crate::call::{AgentInput, CallId};
use crate::error::PeerError;
use crate::media::LocalStream;
use async_trait::async_trait;
use callbridge_core::{IceCandidate, IceServerConfig, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Remote media announced by the peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// Locally gathered candidate, `None` once gathering is complete.
    LocalCandidate(Option<IceCandidate>),
    RemoteStream(RemoteStream),
    /// The connection broke after it was set up.
    Failed(String),
}

/// Where a peer connection reports its events.
///
/// Each sink is bound to the call that created the connection, so events arriving after that
/// call ended are recognised and dropped.
#[derive(Debug, Clone)]
pub struct PeerEventSink {
    call_id: CallId,
    tx: mpsc::UnboundedSender<AgentInput>,
}

impl PeerEventSink {
    pub(crate) fn new(call_id: CallId, tx: mpsc::UnboundedSender<AgentInput>) -> Self {
        Self { call_id, tx }
    }

    /// Returns `false` once the client has shut down.
    pub fn emit(&self, event: PeerEvent) -> bool {
        self.tx
            .send(AgentInput::Peer {
                call_id: self.call_id,
                event,
            })
            .is_ok()
    }
}

/// One peer-to-peer media connection.
///
/// Calls on a link are never overlapped; the client awaits each before issuing the next.
#[async_trait]
pub trait PeerLink: Send + Sync {
    async fn attach_local_stream(&self, stream: &LocalStream) -> Result<(), PeerError>;

    /// Creates an offer and installs it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription, PeerError>;

    /// Creates an answer to the applied remote offer and installs it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription, PeerError>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), PeerError>;

    /// `None` marks the end of the remote candidates.
    async fn add_ice_candidate(&self, candidate: Option<IceCandidate>) -> Result<(), PeerError>;

    async fn close(&self) -> Result<(), PeerError>;
}

#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: PeerEventSink,
    ) -> Result<Arc<dyn PeerLink>, PeerError>;
}
