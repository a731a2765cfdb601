use crate::model::negotiation::Negotiation;
use crate::model::session_id::SessionId;
use serde::{Deserialize, Serialize};

/// Frames a client sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Ask the relay for an identifier.
    Init,
    /// Ring the target.
    Request { to: SessionId },
    /// Negotiation message for the target.
    Call(OutboundCall),
    /// Hang up, or decline a ringing call.
    End { to: SessionId },
}

impl ClientMessage {
    pub fn call(to: SessionId, negotiation: Negotiation) -> Self {
        Self::Call(OutboundCall { to, negotiation })
    }

    /// Identifier the message is addressed to, if any.
    pub fn target(&self) -> Option<&SessionId> {
        match self {
            Self::Init => None,
            Self::Request { to } | Self::End { to } => Some(to),
            Self::Call(call) => Some(&call.to),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundCall {
    pub to: SessionId,
    #[serde(flatten)]
    pub negotiation: Negotiation,
}

/// Frames the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "d", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Identifier assigned to this connection.
    Init { id: SessionId },
    /// Identifier assignment failed.
    Error { message: String },
    /// Incoming ring.
    Request { from: SessionId },
    /// Relayed negotiation message.
    Call(InboundCall),
    /// Target of a `request`/`call` is unreachable.
    Failed,
    /// The remote side ended the call, or declined a ring.
    End { from: SessionId },
}

impl ServerMessage {
    pub fn call(from: SessionId, negotiation: Negotiation) -> Self {
        Self::Call(InboundCall { from, negotiation })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundCall {
    pub from: SessionId,
    #[serde(flatten)]
    pub negotiation: Negotiation,
}
