use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed session description: {0}")]
    Description(#[source] serde_json::Error),

    #[error("malformed ICE candidate: {0}")]
    Candidate(#[source] serde_json::Error),

    #[error("failed to encode negotiation payload: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Negotiation message as it travels through the relay.
///
/// The payload is kept as raw JSON so the relay can forward it without looking inside.
/// Flattened into the enclosing `call` payload, it becomes either an `sdp` or a `candidate` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Negotiation {
    Sdp(Value),
    Candidate(Value),
}

impl Negotiation {
    pub fn description(desc: &SessionDescription) -> Result<Self, ProtocolError> {
        serde_json::to_value(desc)
            .map(Self::Sdp)
            .map_err(ProtocolError::Encode)
    }

    /// `None` signals end-of-candidates and is sent as `null`.
    pub fn candidate(candidate: Option<&IceCandidate>) -> Result<Self, ProtocolError> {
        serde_json::to_value(candidate)
            .map(Self::Candidate)
            .map_err(ProtocolError::Encode)
    }

    pub fn decode(&self) -> Result<NegotiationPayload, ProtocolError> {
        match self {
            Self::Sdp(value) => SessionDescription::deserialize(value)
                .map(NegotiationPayload::Description)
                .map_err(ProtocolError::Description),
            Self::Candidate(value) => Option::<IceCandidate>::deserialize(value)
                .map(NegotiationPayload::Candidate)
                .map_err(ProtocolError::Candidate),
        }
    }
}

/// Client-side view of a decoded [`Negotiation`].
#[derive(Debug, Clone, PartialEq)]
pub enum NegotiationPayload {
    Description(SessionDescription),
    Candidate(Option<IceCandidate>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Field names follow the browser's `RTCIceCandidateInit` JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
}
