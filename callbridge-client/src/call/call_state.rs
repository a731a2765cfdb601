use crate::error::MediaError;
use callbridge_core::SessionId;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one call attempt. Results of asynchronous work carry the id of the attempt
/// that started it and are dropped once that attempt is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(u64);

impl CallId {
    pub fn next() -> Self {
        Self(NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    /// Sent the `request`; answers the offer.
    Caller,
    /// Accepted the `request`; produces the offer.
    Callee,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallState {
    Idle,
    AwaitingLocalMedia,
    Requesting,
    Ringing { from: SessionId },
    Negotiating { role: CallRole },
    Connected,
    Ended,
}

impl CallState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingLocalMedia => write!(f, "awaiting local media"),
            Self::Requesting => write!(f, "requesting"),
            Self::Ringing { from } => write!(f, "ringing from {}", from),
            Self::Negotiating { role: CallRole::Caller } => write!(f, "negotiating (caller)"),
            Self::Negotiating { role: CallRole::Callee } => write!(f, "negotiating (callee)"),
            Self::Connected => write!(f, "connected"),
            Self::Ended => write!(f, "ended"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    LocalHangup,
    /// The remote side sent `end`, including declining our request.
    RemoteHangup,
    /// The relay answered `failed`.
    PeerUnreachable,
    /// The relay connection dropped.
    TransportLost,
    MediaUnavailable(MediaError),
    PeerFailed(String),
    RingTimeout,
    NegotiationTimeout,
}

impl EndReason {
    /// Whether the remote side must be told with an `end` message.
    pub fn notifies_remote(&self) -> bool {
        matches!(
            self,
            Self::LocalHangup
                | Self::MediaUnavailable(_)
                | Self::PeerFailed(_)
                | Self::RingTimeout
                | Self::NegotiationTimeout
        )
    }
}
