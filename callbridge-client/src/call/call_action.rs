use crate::call::CallEvent;
use callbridge_core::{CallConfig, ClientMessage, IceCandidate, SessionDescription};

/// Side effects requested by a [`crate::CallSession`]. The agent carries them out in order.
#[derive(Debug, Clone)]
pub enum CallAction {
    /// Open the peer link and acquire local media for this call.
    PrepareMedia(CallConfig),
    Send(ClientMessage),
    /// Create the offer and report it back as the local description.
    CreateOffer,
    /// Apply the remote offer, then create the answer.
    AcceptOffer(SessionDescription),
    ApplyAnswer(SessionDescription),
    AddCandidate(Option<IceCandidate>),
    Emit(CallEvent),
    /// Close the peer link and release local media.
    Teardown,
}
