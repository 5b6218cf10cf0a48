//! Metrics and monitoring for the QuizBattle matchmaker
//!
//! This module provides Prometheus metrics collection and the HTTP server
//! exposing health probes, metrics and coordinator statistics.

pub mod collector;
pub mod health;

pub use collector::{
    MatchMetrics, MetricsCollector, NotificationMetrics, PresenceMetrics, QueueMetrics,
    ServiceMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
