use crate::error::SignalingError;
use async_trait::async_trait;
use callbridge_core::ClientMessage;

/// Outbound half of the relay connection.
///
/// The inbound half is a plain receiver of `ServerMessage`; when it yields `None` the
/// transport is gone.
#[async_trait]
pub trait SignalingLink: Send + Sync {
    async fn send(&self, msg: ClientMessage) -> Result<(), SignalingError>;
}
