//! WebSocket gateway server
//!
//! Serves the player-facing `/ws` endpoint and hands each accepted socket to
//! the connection handler.

use crate::gateway::connection::ws_handler;
use crate::matchmaking::CoordinatorHandle;
use crate::metrics::MetricsCollector;
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Gateway server configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Shared state for WebSocket handlers
#[derive(Clone)]
pub struct GatewayState {
    pub coordinator: CoordinatorHandle,
    pub metrics: Option<Arc<MetricsCollector>>,
}

pub struct GatewayServer {
    config: GatewayConfig,
    state: GatewayState,
    shutdown_tx: broadcast::Sender<()>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, coordinator: CoordinatorHandle) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: GatewayState {
                coordinator,
                metrics: None,
            },
            shutdown_tx,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.state.metrics = Some(metrics);
        self
    }

    /// Bind the configured address and serve until stopped
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid gateway address")?;

        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind gateway to {}", addr))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until stopped
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let app = self.router();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        info!("WebSocket gateway listening on ws://{}/ws", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Gateway shutdown signal received");
            })
            .await?;

        info!("Gateway stopped");
        Ok(())
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .with_state(self.state.clone())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping gateway...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to gateway: {}", e);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchmakingSettings;
    use crate::matchmaking::CoordinatorActor;
    use crate::notify::ChannelNotifier;
    use crate::session::InMemorySessionStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_plain_get_is_not_upgraded() {
        let (coordinator, _task) = CoordinatorActor::spawn(
            MatchmakingSettings::default(),
            Arc::new(ChannelNotifier::new()),
            Arc::new(InMemorySessionStore::new()),
            None,
        );
        let server = GatewayServer::new(GatewayConfig::default(), coordinator);

        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/ws?playerId=p1&displayName=Alice")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        assert_ne!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (coordinator, _task) = CoordinatorActor::spawn(
            MatchmakingSettings::default(),
            Arc::new(ChannelNotifier::new()),
            Arc::new(InMemorySessionStore::new()),
            None,
        );
        let server = GatewayServer::new(GatewayConfig::default(), coordinator);

        let response = server
            .router()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
