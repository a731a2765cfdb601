use crate::call::{CallState, EndReason};
use crate::error::MediaError;
use crate::media::LocalStream;
use crate::peer::RemoteStream;
use callbridge_core::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallTopic {
    Registered,
    IncomingCall,
    StateChanged,
    LocalStream,
    RemoteStream,
    Ended,
    Error,
}

#[derive(Debug, Clone)]
pub enum CallEvent {
    /// The relay assigned this client an identifier.
    Registered(SessionId),
    IncomingCall(SessionId),
    StateChanged(CallState),
    LocalStream(LocalStream),
    RemoteStream(RemoteStream),
    Ended(EndReason),
    Error(CallFailure),
}

impl CallEvent {
    pub fn topic(&self) -> CallTopic {
        match self {
            Self::Registered(_) => CallTopic::Registered,
            Self::IncomingCall(_) => CallTopic::IncomingCall,
            Self::StateChanged(_) => CallTopic::StateChanged,
            Self::LocalStream(_) => CallTopic::LocalStream,
            Self::RemoteStream(_) => CallTopic::RemoteStream,
            Self::Ended(_) => CallTopic::Ended,
            Self::Error(_) => CallTopic::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    /// The relay could not assign an identifier.
    Registration(String),
    Media(MediaError),
    Negotiation(String),
}
