//! Health check functionality
//!
//! This module provides health checks for the matchmaker, including
//! readiness and liveness probes.

use crate::matchmaking::CoordinatorStats;
use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// How long the coordinator may take to answer a stats probe
const COORDINATOR_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Players currently connected
    pub online_players: usize,
    /// Players waiting in the queue
    pub queued_players: usize,
    /// Matches awaiting acceptance
    pub pending_matches: usize,
    /// Matches formed since service start
    pub matches_formed: u64,
    /// Matches confirmed since service start
    pub matches_confirmed: u64,
    /// Game sessions handed off since service start
    pub sessions_created: u64,
    /// Service uptime information
    pub uptime_info: String,
}

impl ServiceStats {
    fn from_coordinator(stats: &CoordinatorStats, uptime: Duration) -> Self {
        Self {
            online_players: stats.online_players,
            queued_players: stats.queued_players,
            pending_matches: stats.pending_matches,
            matches_formed: stats.matches_formed,
            matches_confirmed: stats.matches_confirmed,
            sessions_created: stats.sessions_created,
            uptime_info: format!("Up {}s", uptime.as_secs()),
        }
    }
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        let service_check = Self::check_service_running(&app_state).await;
        if service_check.status != HealthStatus::Healthy {
            overall_status = HealthStatus::Unhealthy;
        }
        checks.push(service_check);

        let (coordinator_check, coordinator_stats) = Self::check_coordinator(&app_state).await;
        if coordinator_check.status == HealthStatus::Unhealthy {
            overall_status = HealthStatus::Unhealthy;
        } else if coordinator_check.status == HealthStatus::Degraded
            && overall_status == HealthStatus::Healthy
        {
            overall_status = HealthStatus::Degraded;
        }
        checks.push(coordinator_check);

        let stats = match coordinator_stats {
            Some(stats) => ServiceStats::from_coordinator(&stats, app_state.uptime()),
            None => ServiceStats {
                uptime_info: format!("Up {}s", app_state.uptime().as_secs()),
                ..Default::default()
            },
        };

        Ok(HealthCheck {
            status: overall_status,
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify the coordinator answers
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let (check, _) = Self::check_coordinator(&app_state).await;
        Ok(check.status)
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Probe the coordinator task with a stats request
    async fn check_coordinator(app_state: &AppState) -> (ComponentCheck, Option<CoordinatorStats>) {
        let start = std::time::Instant::now();

        let probe =
            tokio::time::timeout(COORDINATOR_PROBE_TIMEOUT, app_state.coordinator().stats()).await;
        let (status, message, stats) = match probe {
            Ok(Ok(stats)) => (HealthStatus::Healthy, None, Some(stats)),
            Ok(Err(e)) => {
                error!("Coordinator health probe failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()), None)
            }
            Err(_) => {
                debug!("Coordinator health probe timed out");
                (
                    HealthStatus::Degraded,
                    Some("Coordinator is slow to respond".to_string()),
                    None,
                )
            }
        };

        let check = ComponentCheck {
            name: "coordinator".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        (check, stats)
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[tokio::test]
    async fn test_not_started_service_is_unhealthy() {
        let app_state = Arc::new(AppState::new(AppConfig::default()).await.unwrap());

        let health = HealthCheck::check(app_state.clone()).await.unwrap();
        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.checks.len(), 2);

        // The coordinator itself answers even before the servers start
        assert_eq!(health.checks[1].status, HealthStatus::Healthy);
        assert_eq!(
            HealthCheck::liveness_check(app_state.clone()).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(app_state).await.unwrap(),
            HealthStatus::Unhealthy
        );
    }

    #[tokio::test]
    async fn test_health_check_serializes() {
        let app_state = Arc::new(AppState::new(AppConfig::default()).await.unwrap());
        let health = HealthCheck::check(app_state).await.unwrap();

        let json = health.to_json().unwrap();
        assert!(json.contains("\"coordinator\""));
        assert!(json.contains("\"unhealthy\""));
    }
}
