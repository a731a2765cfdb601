use anyhow::Result;
use callbridge_server::{PresenceRegistry, RelayServer, ServerConfig};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

/// Timeout for a single relay round trip (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 5000;

/// How long to listen before concluding nothing was delivered (ms).
pub const SILENCE_WINDOW_MS: u64 = 300;

/// Running relay on an ephemeral local port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub registry: Arc<PresenceRegistry>,
}

pub async fn start_relay() -> Result<TestRelay> {
    start_relay_with(ServerConfig::default()).await
}

/// Starts a relay from `config`, overriding only the listen address.
pub async fn start_relay_with(config: ServerConfig) -> Result<TestRelay> {
    let config = ServerConfig {
        host: Ipv4Addr::LOCALHOST.into(),
        port: 0,
        ..config
    };

    let server = RelayServer::bind(&config).await?;
    let addr = server.local_addr()?;
    let registry = server.registry();

    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("[TestRelay] server stopped: {}", e);
        }
    });

    Ok(TestRelay { addr, registry })
}

/// Polls until the registry holds `expected` sessions.
pub async fn wait_for_sessions(registry: &PresenceRegistry, expected: usize) -> bool {
    for _ in 0..(SIGNAL_TIMEOUT_MS / 20) {
        if registry.len() == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
