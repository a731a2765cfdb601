use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::presence::PresenceRegistry;
use crate::signaling::{SignalingRelay, ws_handler};
use axum::Router;
use axum::routing::get;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

/// HTTP application: the relay WebSocket route, plus the client bundle when configured.
///
/// Responses are gzip-compressed when the client accepts it; the WebSocket upgrade carries no
/// body and passes through untouched.
pub fn build_router(config: &ServerConfig, relay: SignalingRelay) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route(&config.relay_path, get(ws_handler))
        .with_state(relay);

    let router = match &config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(CompressionLayer::new()).layer(cors)
}

/// Relay bound to its listening socket, ready to serve.
pub struct RelayServer {
    listener: TcpListener,
    router: Router,
    registry: Arc<PresenceRegistry>,
}

impl RelayServer {
    pub async fn bind(config: &ServerConfig) -> Result<Self, RelayError> {
        let registry = Arc::new(PresenceRegistry::new());
        let relay = SignalingRelay::new(registry.clone());
        let router = build_router(config, relay);
        let listener = TcpListener::bind(config.socket_addr()).await?;

        Ok(Self {
            listener,
            router,
            registry,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<PresenceRegistry> {
        self.registry.clone()
    }

    pub async fn run(self) -> Result<(), RelayError> {
        self.run_until(std::future::pending()).await
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<(), RelayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Relay listening on {}", self.local_addr()?);
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("Relay stopped");
        Ok(())
    }
}
