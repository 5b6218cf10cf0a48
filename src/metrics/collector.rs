//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the QuizBattle matchmaker
//! using Prometheus metrics.

use crate::matchmaking::CoordinatorStats;
use crate::types::MatchOutcome;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Presence and connection metrics
    presence_metrics: PresenceMetrics,

    /// Queue metrics
    queue_metrics: QueueMetrics,

    /// Pending match metrics
    match_metrics: MatchMetrics,

    /// Notification delivery metrics
    notification_metrics: NotificationMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Presence and connection metrics
#[derive(Clone)]
pub struct PresenceMetrics {
    /// Players currently registered
    pub online_players: IntGauge,

    /// Accepted WebSocket connections by status (registered, inert)
    pub connections_total: IntCounterVec,

    /// Disconnects ignored because a newer connection had replaced them
    pub stale_disconnects_total: IntCounter,
}

/// Queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Players currently waiting
    pub queued_players: IntGauge,

    /// Queue join requests
    pub queue_joins_total: IntCounter,

    /// Queue leave requests
    pub queue_leaves_total: IntCounter,
}

/// Pending match metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Matches awaiting acceptance
    pub pending_matches: IntGauge,

    /// Matches formed from the queue
    pub matches_formed_total: IntCounter,

    /// Resolved matches by outcome
    pub match_resolutions_total: IntCounterVec,

    /// Time between a match request and a player's acceptance
    pub accept_latency_seconds: Histogram,

    /// Game session hand-offs by status
    pub sessions_created_total: IntCounterVec,
}

/// Notification delivery metrics
#[derive(Clone)]
pub struct NotificationMetrics {
    /// Notifications by event kind and status (delivered, dropped)
    pub notifications_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let presence_metrics = PresenceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let notification_metrics = NotificationMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            presence_metrics,
            queue_metrics,
            match_metrics,
            notification_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get presence metrics
    pub fn presence(&self) -> &PresenceMetrics {
        &self.presence_metrics
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get match metrics
    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    /// Get notification metrics
    pub fn notifications(&self) -> &NotificationMetrics {
        &self.notification_metrics
    }

    /// Update current-state gauges from coordinator stats
    pub fn update_from_stats(&self, stats: &CoordinatorStats) {
        self.presence_metrics
            .online_players
            .set(stats.online_players as i64);
        self.queue_metrics
            .queued_players
            .set(stats.queued_players as i64);
        self.match_metrics
            .pending_matches
            .set(stats.pending_matches as i64);
    }

    /// Record a new connection, registered or inert
    pub fn record_connection(&self, registered: bool) {
        let status = if registered { "registered" } else { "inert" };
        self.presence_metrics
            .connections_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn record_stale_disconnect(&self) {
        self.presence_metrics.stale_disconnects_total.inc();
    }

    pub fn record_queue_join(&self) {
        self.queue_metrics.queue_joins_total.inc();
    }

    pub fn record_queue_leave(&self) {
        self.queue_metrics.queue_leaves_total.inc();
    }

    pub fn record_match_formed(&self) {
        self.match_metrics.matches_formed_total.inc();
    }

    /// Record a pending match reaching a terminal state
    pub fn record_match_resolved(&self, outcome: MatchOutcome) {
        self.match_metrics
            .match_resolutions_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn record_accept_latency(&self, latency: Duration) {
        self.match_metrics
            .accept_latency_seconds
            .observe(latency.as_secs_f64());
    }

    /// Record a game session hand-off
    pub fn record_session_created(&self, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.match_metrics
            .sessions_created_total
            .with_label_values(&[status])
            .inc();
    }

    /// Record a notification attempt
    pub fn record_notification(&self, event: &str, delivered: bool) {
        let status = if delivered { "delivered" } else { "dropped" };
        self.notification_metrics
            .notifications_total
            .with_label_values(&[event, status])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("quizbattle_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "quizbattle_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("quizbattle_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl PresenceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let online_players =
            IntGauge::new("quizbattle_online_players", "Players currently connected")?;
        registry.register(Box::new(online_players.clone()))?;

        let connections_total = IntCounterVec::new(
            Opts::new(
                "quizbattle_connections_total",
                "Accepted WebSocket connections",
            ),
            &["status"],
        )?;
        registry.register(Box::new(connections_total.clone()))?;

        let stale_disconnects_total = IntCounter::new(
            "quizbattle_stale_disconnects_total",
            "Disconnects of replaced connections that were ignored",
        )?;
        registry.register(Box::new(stale_disconnects_total.clone()))?;

        Ok(Self {
            online_players,
            connections_total,
            stale_disconnects_total,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queued_players =
            IntGauge::new("quizbattle_queued_players", "Players waiting for a match")?;
        registry.register(Box::new(queued_players.clone()))?;

        let queue_joins_total =
            IntCounter::new("quizbattle_queue_joins_total", "Queue join requests")?;
        registry.register(Box::new(queue_joins_total.clone()))?;

        let queue_leaves_total =
            IntCounter::new("quizbattle_queue_leaves_total", "Queue leave requests")?;
        registry.register(Box::new(queue_leaves_total.clone()))?;

        Ok(Self {
            queued_players,
            queue_joins_total,
            queue_leaves_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let pending_matches = IntGauge::new(
            "quizbattle_pending_matches",
            "Matches awaiting mutual acceptance",
        )?;
        registry.register(Box::new(pending_matches.clone()))?;

        let matches_formed_total =
            IntCounter::new("quizbattle_matches_formed_total", "Matches formed")?;
        registry.register(Box::new(matches_formed_total.clone()))?;

        let match_resolutions_total = IntCounterVec::new(
            Opts::new(
                "quizbattle_match_resolutions_total",
                "Resolved matches by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(match_resolutions_total.clone()))?;

        let accept_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "quizbattle_accept_latency_seconds",
                "Time from match request to acceptance",
            )
            .buckets(vec![0.5, 1.0, 2.0, 3.0, 5.0, 7.5, 10.0]),
        )?;
        registry.register(Box::new(accept_latency_seconds.clone()))?;

        let sessions_created_total = IntCounterVec::new(
            Opts::new(
                "quizbattle_sessions_created_total",
                "Game session hand-offs",
            ),
            &["status"],
        )?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        Ok(Self {
            pending_matches,
            matches_formed_total,
            match_resolutions_total,
            accept_latency_seconds,
            sessions_created_total,
        })
    }
}

impl NotificationMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let notifications_total = IntCounterVec::new(
            Opts::new(
                "quizbattle_notifications_total",
                "Notifications pushed to players",
            ),
            &["event", "status"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        Ok(Self {
            notifications_total,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
