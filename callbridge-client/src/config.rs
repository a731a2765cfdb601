use crate::media::MediaConstraints;
use callbridge_core::IceServerConfig;
use std::time::Duration;

pub const DEFAULT_RELAY_URL: &str = "ws://localhost:5000/bridge";
pub const DEFAULT_RING_TIMEOUT: Duration = Duration::from_secs(45);
pub const DEFAULT_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Which timer guards the current call phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Waiting for the other side to pick up (or for us to answer).
    Ring,
    /// Offer/answer exchanged but media not flowing yet.
    Negotiation,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub relay_url: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub constraints: MediaConstraints,
    /// `None` lets a call ring forever.
    pub ring_timeout: Option<Duration>,
    /// `None` disables the negotiation stall guard.
    pub negotiation_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn with_relay_url(relay_url: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout_for(&self, kind: TimeoutKind) -> Option<Duration> {
        match kind {
            TimeoutKind::Ring => self.ring_timeout,
            TimeoutKind::Negotiation => self.negotiation_timeout,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_owned(),
            ice_servers: vec![IceServerConfig::default()],
            constraints: MediaConstraints::default(),
            ring_timeout: Some(DEFAULT_RING_TIMEOUT),
            negotiation_timeout: Some(DEFAULT_NEGOTIATION_TIMEOUT),
        }
    }
}
