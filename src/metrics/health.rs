//! Health check endpoints and Prometheus metrics server
//!
//! This module provides HTTP endpoints for health checks and Prometheus metrics
//! for the QuizBattle matchmaker using Axum.

use crate::metrics::collector::MetricsCollector;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

const SERVICE: &str = env!("CARGO_PKG_NAME");

/// Health server configuration
#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Port to bind the health server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            port: 9090,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the health server
#[derive(Clone)]
pub struct HealthServerState {
    pub metrics_collector: Arc<MetricsCollector>,
    pub app_state: Option<Arc<AppState>>,
}

/// Health server that provides HTTP endpoints for monitoring
pub struct HealthServer {
    config: HealthServerConfig,
    state: HealthServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl HealthServer {
    /// Create a new health server
    pub fn new(config: HealthServerConfig, metrics_collector: Arc<MetricsCollector>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HealthServerState {
                metrics_collector,
                app_state: None,
            },
            shutdown_tx,
        }
    }

    /// Set the application state for health checks
    pub fn with_app_state(mut self, app_state: Arc<AppState>) -> Self {
        self.state.app_state = Some(app_state);
        self
    }

    /// Bind the configured address and serve until stopped
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid health server address")?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until stopped
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        let app = self.create_router();

        info!("Health server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Health server shutdown signal received");
            })
            .await?;

        info!("Health server stopped");
        Ok(())
    }

    /// Create the Axum router with all health endpoints
    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/alive", get(alive_handler))
            .route("/metrics", get(metrics_handler))
            .route("/stats", get(stats_handler))
            .with_state(self.state.clone())
    }

    /// Stop the health server
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping health server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to health server: {}", e);
        }

        Ok(())
    }
}

/// Root endpoint handler - shows service information
async fn root_handler() -> impl IntoResponse {
    let info = json!({
        "service": SERVICE,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/ws",
            "/health",
            "/ready",
            "/alive",
            "/metrics",
            "/stats"
        ]
    });

    Json(info)
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Health check requested");

    let status = match &state.app_state {
        Some(app_state) => HealthCheck::liveness_check(app_state.clone())
            .await
            .unwrap_or(HealthStatus::Unhealthy),
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": SERVICE,
                    "version": env!("CARGO_PKG_VERSION"),
                    "error": "Service not initialized"
                })),
            );
        }
    };

    let code = match status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(json!({
            "status": status,
            "service": SERVICE,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Readiness check requested");

    match &state.app_state {
        Some(app_state) => match HealthCheck::readiness_check(app_state.clone()).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Ready"),
            Ok(HealthStatus::Degraded) => (StatusCode::OK, "Degraded but ready"),
            Ok(HealthStatus::Unhealthy) => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
            Err(e) => {
                error!("Readiness check failed: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Not ready")
            }
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Liveness check endpoint handler
async fn alive_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Liveness check requested");

    match &state.app_state {
        Some(app_state) => match HealthCheck::liveness_check(app_state.clone()).await {
            Ok(HealthStatus::Healthy) => (StatusCode::OK, "Alive"),
            _ => (StatusCode::SERVICE_UNAVAILABLE, "Not alive"),
        },
        None => (StatusCode::SERVICE_UNAVAILABLE, "Service not initialized"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<HealthServerState>) -> Response {
    debug!("Metrics endpoint requested");

    let registry = state.metrics_collector.registry();
    let metric_families = registry.gather();
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&metric_families) {
        Ok(metrics_output) => {
            debug!("Serving {} metric families", metric_families.len());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, encoder.format_type().to_string())],
                metrics_output,
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Detailed service statistics endpoint handler
async fn stats_handler(State(state): State<HealthServerState>) -> impl IntoResponse {
    debug!("Stats endpoint requested");

    let Some(app_state) = &state.app_state else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "service": {
                    "name": SERVICE,
                    "version": env!("CARGO_PKG_VERSION"),
                    "status": "error"
                },
                "error": "Service not initialized",
                "timestamp": chrono::Utc::now()
            })),
        );
    };

    let health = match HealthCheck::check(app_state.clone()).await {
        Ok(health) => health,
        Err(e) => {
            error!("Failed to get stats: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "service": {
                        "name": SERVICE,
                        "version": env!("CARGO_PKG_VERSION"),
                        "status": "error"
                    },
                    "error": "Failed to get service stats",
                    "timestamp": chrono::Utc::now()
                })),
            );
        }
    };

    let coordinator = app_state.coordinator().stats().await.ok();
    let stats = json!({
        "service": {
            "name": health.service,
            "version": health.version,
            "status": health.status,
            "uptime": health.stats.uptime_info
        },
        "players": {
            "online": health.stats.online_players,
            "queued": health.stats.queued_players
        },
        "matches": {
            "pending": health.stats.pending_matches,
            "formed": health.stats.matches_formed,
            "confirmed": health.stats.matches_confirmed,
            "sessions_created": health.stats.sessions_created
        },
        "coordinator": coordinator,
        "components": health.checks,
        "timestamp": chrono::Utc::now()
    });

    (StatusCode::OK, Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt; // for oneshot

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let server = HealthServer::new(HealthServerConfig::default(), collector);
        let app = server.create_router();

        let response = app.oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        collector.record_match_formed();
        collector.update_health_status(2);

        let server = HealthServer::new(HealthServerConfig::default(), collector);
        let app = server.create_router();

        let response = app.oneshot(get("/metrics")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("quizbattle_matches_formed_total 1"));
    }

    #[tokio::test]
    async fn test_health_endpoints_without_app_state() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let server = HealthServer::new(HealthServerConfig::default(), collector);
        let app = server.create_router();

        for uri in ["/health", "/ready", "/alive", "/stats"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(
                response.status(),
                StatusCode::SERVICE_UNAVAILABLE,
                "unexpected status for {}",
                uri
            );
        }
    }

    #[tokio::test]
    async fn test_stats_with_app_state() {
        let app_state = Arc::new(AppState::new(AppConfig::default()).await.unwrap());
        let server = HealthServer::new(
            HealthServerConfig::default(),
            app_state.metrics_collector(),
        )
        .with_app_state(app_state);
        let app = server.create_router();

        let response = app.oneshot(get("/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let stats: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(stats["players"]["online"], 0);
        assert_eq!(stats["coordinator"]["pending_matches"], 0);
    }

    #[test]
    fn test_health_server_config() {
        let config = HealthServerConfig::default();
        assert_eq!(config.port, 9090);
        assert_eq!(config.host, "0.0.0.0");
    }

    #[tokio::test]
    async fn test_404_handling() {
        let collector = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
        let server = HealthServer::new(HealthServerConfig::default(), collector);
        let app = server.create_router();

        let response = app.oneshot(get("/nonexistent")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
