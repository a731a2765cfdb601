mod call_config;
mod ice;
mod negotiation;
mod session_id;
mod signaling;

pub use call_config::CallConfig;
pub use ice::IceServerConfig;
pub use negotiation::{
    IceCandidate, Negotiation, NegotiationPayload, ProtocolError, SdpKind, SessionDescription,
};
pub use session_id::SessionId;
pub use signaling::{ClientMessage, InboundCall, OutboundCall, ServerMessage};
