//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the coordinator
//! task, the WebSocket gateway, the health/metrics server and the background
//! maintenance tasks together.

use crate::config::AppConfig;
use crate::gateway::{GatewayConfig, GatewayServer};
use crate::matchmaking::{CoordinatorActor, CoordinatorHandle, CoordinatorStats};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::notify::ChannelNotifier;
use crate::session::InMemorySessionStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Interval of the uptime/health gauge refresh
const HEALTH_METRICS_INTERVAL: Duration = Duration::from_secs(60);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Failed to bind {component} to {addr}: {message}")]
    Bind {
        component: String,
        addr: String,
        message: String,
    },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Sender side of the coordinator task
    coordinator: CoordinatorHandle,

    /// Coordinator task handle, taken on shutdown
    coordinator_task: Mutex<Option<JoinHandle<()>>>,

    /// Sessions opened for confirmed matches
    sessions: Arc<InMemorySessionStore>,

    /// Prometheus metrics
    metrics_collector: Arc<MetricsCollector>,

    /// Player-facing WebSocket server
    gateway: Arc<GatewayServer>,

    /// Health/metrics server, created on start
    health_server: Mutex<Option<Arc<HealthServer>>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies. The coordinator
    /// task is running afterwards; the servers start with [`AppState::start`].
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing QuizBattle matchmaking service");
        info!(
            "Configuration: service={}, gateway port={}, metrics port={}, accept window={}s",
            config.service.name,
            config.service.http_port,
            config.service.metrics_port,
            config.matchmaking.accept_timeout_seconds
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let sessions = Arc::new(InMemorySessionStore::new());
        let notifier = Arc::new(ChannelNotifier::with_metrics(metrics_collector.clone()));

        let (coordinator, coordinator_task) = CoordinatorActor::spawn(
            config.matchmaking.clone(),
            notifier,
            sessions.clone(),
            Some(metrics_collector.clone()),
        );

        let gateway_config = GatewayConfig {
            host: config.service.http_host.clone(),
            port: config.service.http_port,
        };
        let gateway = Arc::new(
            GatewayServer::new(gateway_config, coordinator.clone())
                .with_metrics(metrics_collector.clone()),
        );

        Ok(Self {
            config,
            coordinator,
            coordinator_task: Mutex::new(Some(coordinator_task)),
            sessions,
            metrics_collector,
            gateway,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        })
    }

    /// Bind and start the servers and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting QuizBattle matchmaking service");

        let gateway_listener = Self::bind(
            "gateway",
            &self.config.service.http_host,
            self.config.service.http_port,
        )
        .await?;
        let health_listener = Self::bind(
            "health server",
            &self.config.service.http_host,
            self.config.service.metrics_port,
        )
        .await?;

        // Mark as running
        *self.is_running.write().await = true;

        self.start_health_server(health_listener).await;
        self.start_gateway(gateway_listener).await;
        self.start_background_tasks().await;

        info!("✅ QuizBattle matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown and return the final coordinator stats
    pub async fn shutdown(&self) -> Result<CoordinatorStats, ServiceError> {
        info!("Starting graceful shutdown of QuizBattle matchmaker");

        // Mark as not running
        *self.is_running.write().await = false;

        let final_stats =
            self.coordinator
                .stats()
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        if let Err(e) = self.gateway.stop().await {
            warn!("Failed to stop gateway: {}", e);
        }

        if let Some(health_server) = self.health_server.lock().await.take() {
            if let Err(e) = health_server.stop().await {
                warn!("Failed to stop health server: {}", e);
            } else {
                info!("✅ Health server stopped");
            }
        }

        // Stopping the coordinator drops every connection handle, which
        // closes the open sockets and lets the gateway drain.
        if let Err(e) = self.coordinator.shutdown() {
            debug!("Coordinator already stopped: {}", e);
        }
        if let Some(task) = self.coordinator_task.lock().await.take() {
            match tokio::time::timeout(self.config.shutdown_timeout(), task).await {
                Ok(Ok(())) => info!("✅ Coordinator stopped"),
                Ok(Err(e)) => warn!("Coordinator task ended abnormally: {}", e),
                Err(_) => warn!("Coordinator did not stop within the shutdown timeout"),
            }
        }

        self.stop_background_tasks().await;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ QuizBattle matchmaker shutdown completed");

        Ok(final_stats)
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    pub fn sessions(&self) -> Arc<InMemorySessionStore> {
        self.sessions.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn bind(component: &str, host: &str, port: u16) -> Result<TcpListener, ServiceError> {
        let addr: SocketAddr =
            format!("{}:{}", host, port)
                .parse()
                .map_err(|e| ServiceError::Configuration {
                    message: format!("Invalid {} address {}:{}: {}", component, host, port, e),
                })?;

        TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::Bind {
                component: component.to_string(),
                addr: addr.to_string(),
                message: e.to_string(),
            })
    }

    async fn start_health_server(self: &Arc<Self>, listener: TcpListener) {
        let health_config = HealthServerConfig {
            port: self.config.service.metrics_port,
            host: self.config.service.http_host.clone(),
        };
        let health_server = Arc::new(
            HealthServer::new(health_config, self.metrics_collector.clone())
                .with_app_state(self.clone()),
        );
        *self.health_server.lock().await = Some(health_server.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = health_server.serve(listener).await {
                error!("Health server failed: {}", e);
            } else {
                info!("Health server task completed");
            }
        });
        self.background_tasks.lock().await.push(handle);

        info!(
            "✅ Health server started on port {}",
            self.config.service.metrics_port
        );
    }

    async fn start_gateway(&self, listener: TcpListener) {
        let gateway = self.gateway.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = gateway.serve(listener).await {
                error!("Gateway failed: {}", e);
            } else {
                info!("Gateway task completed");
            }
        });
        self.background_tasks.lock().await.push(handle);

        info!(
            "✅ WebSocket gateway started on port {}",
            self.config.service.http_port
        );
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&self) {
        info!("Starting background maintenance tasks...");

        info!(
            "Starting coordinator stats task ({}s interval)...",
            self.config.stats_interval().as_secs()
        );
        let stats_task = {
            let coordinator = self.coordinator.clone();
            let metrics_collector = self.metrics_collector.clone();
            let stats_interval = self.config.stats_interval();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(stats_interval);
                info!("Coordinator stats task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match coordinator.stats().await {
                        Ok(stats) => {
                            debug!(
                                "Coordinator stats - online: {}, queued: {}, pending: {}, confirmed: {}",
                                stats.online_players,
                                stats.queued_players,
                                stats.pending_matches,
                                stats.matches_confirmed
                            );
                            metrics_collector.update_from_stats(&stats);
                        }
                        Err(e) => {
                            warn!("Failed to get coordinator stats: {}", e);
                        }
                    }
                }

                info!("Coordinator stats task stopped");
            })
        };

        info!(
            "Starting health metrics task ({}s interval)...",
            HEALTH_METRICS_INTERVAL.as_secs()
        );
        let health_metrics_task = {
            let coordinator = self.coordinator.clone();
            let metrics_collector = self.metrics_collector.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(HEALTH_METRICS_INTERVAL);
                info!("Health metrics task started");

                while *is_running.read().await {
                    interval.tick().await;

                    metrics_collector.update_uptime(started_at.elapsed());

                    let coordinator_alive = !coordinator.is_closed();
                    metrics_collector.update_component_health("coordinator", coordinator_alive);
                    metrics_collector.update_component_health("gateway", true);
                    metrics_collector.update_health_status(if coordinator_alive { 2 } else { 0 });

                    debug!(
                        "Updated service health metrics - uptime: {}s",
                        started_at.elapsed().as_secs()
                    );
                }

                info!("Health metrics task stopped");
            })
        };

        let mut tasks = self.background_tasks.lock().await;
        tasks.push(stats_task);
        tasks.push(health_metrics_task);

        info!("{} background tasks running", tasks.len());
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&self) {
        let mut tasks = self.background_tasks.lock().await;
        let task_count = tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("✅ All {} background tasks stopped", task_count);
    }
}
