use callbridge_core::{ProtocolError, SessionId};
use thiserror::Error;

/// Errors returned to the caller of a [`crate::CallClient`] operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// Only one call may be active at a time.
    #[error("a call is already in progress")]
    CallInProgress,

    #[error("there is no ringing call to answer")]
    NotRinging,

    /// The relay has not assigned this client an identifier yet.
    #[error("not registered with the relay")]
    NotRegistered,

    #[error("cannot call own session {0}")]
    SelfCall(SessionId),

    #[error("call agent has stopped")]
    AgentStopped,
}

/// Capture device failures. These are user-visible and always abort the call attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("access to camera/microphone was denied: {0}")]
    PermissionDenied(String),

    #[error("camera/microphone unavailable: {0}")]
    Unavailable(String),

    /// The acquisition finished after the stream was released or superseded.
    #[error("media acquisition cancelled")]
    Cancelled,

    #[error("media backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("peer connection error: {0}")]
    Transport(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("peer connection is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("relay connection closed")]
    Closed,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to encode relay message: {0}")]
    Encode(#[from] serde_json::Error),
}
