//! Main application configuration
//!
//! This module defines the primary configuration structures for the matchmaker,
//! including environment variable loading, TOML files and validation.

use crate::error::MatchmakingError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

macro_rules! config_error {
    ($($arg:tt)*) => {
        anyhow::Error::from(MatchmakingError::ConfigurationError {
            message: format!($($arg)*),
        })
    };
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interface the gateway and health servers bind to
    pub http_host: String,
    /// Port for the WebSocket gateway
    pub http_port: u16,
    /// Port for health check and metrics endpoints
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// How long each player has to accept a pending match
    pub accept_timeout_seconds: u64,
    /// Length of generated room tokens
    pub room_id_length: usize,
    /// Resolve a pending match as a timeout as soon as an undecided member disconnects
    pub resolve_pending_on_disconnect: bool,
    /// Interval for the stats/metrics refresh task
    pub stats_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "quizbattle-matchmaker".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            metrics_port: 9090,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            accept_timeout_seconds: 10,
            room_id_length: 8,
            resolve_pending_on_disconnect: false,
            stats_interval_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; environment variables still override it
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text without touching the environment
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)
            .map_err(|e| config_error!("Invalid TOML configuration: {}", e))?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.http_host = host;
        }
        if let Ok(port) = env::var("HTTP_PORT") {
            self.service.http_port = port
                .parse()
                .map_err(|_| config_error!("Invalid HTTP_PORT value: {}", port))?;
        }
        if let Ok(port) = env::var("METRICS_PORT") {
            self.service.metrics_port = port
                .parse()
                .map_err(|_| config_error!("Invalid METRICS_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| config_error!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Matchmaking settings
        if let Ok(timeout) = env::var("ACCEPT_TIMEOUT_SECONDS") {
            self.matchmaking.accept_timeout_seconds = timeout
                .parse()
                .map_err(|_| config_error!("Invalid ACCEPT_TIMEOUT_SECONDS value: {}", timeout))?;
        }
        if let Ok(length) = env::var("ROOM_ID_LENGTH") {
            self.matchmaking.room_id_length = length
                .parse()
                .map_err(|_| config_error!("Invalid ROOM_ID_LENGTH value: {}", length))?;
        }
        if let Ok(resolve) = env::var("RESOLVE_PENDING_ON_DISCONNECT") {
            self.matchmaking.resolve_pending_on_disconnect = resolve.parse().map_err(|_| {
                config_error!("Invalid RESOLVE_PENDING_ON_DISCONNECT value: {}", resolve)
            })?;
        }
        if let Ok(interval) = env::var("STATS_INTERVAL_SECONDS") {
            self.matchmaking.stats_interval_seconds = interval
                .parse()
                .map_err(|_| config_error!("Invalid STATS_INTERVAL_SECONDS value: {}", interval))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the accept window as Duration
    pub fn accept_timeout(&self) -> Duration {
        Duration::from_secs(self.matchmaking.accept_timeout_seconds)
    }

    /// Get stats refresh interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.stats_interval_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(config_error!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(config_error!("HTTP port cannot be 0"));
    }
    if config.service.metrics_port == 0 {
        return Err(config_error!("Metrics port cannot be 0"));
    }
    if config.service.http_port == config.service.metrics_port {
        return Err(config_error!(
            "HTTP port and metrics port must differ (both {})",
            config.service.http_port
        ));
    }
    if config.service.http_host.is_empty() {
        return Err(config_error!("HTTP host cannot be empty"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(config_error!("Shutdown timeout must be greater than 0"));
    }
    if config.matchmaking.accept_timeout_seconds == 0 {
        return Err(config_error!("Accept timeout must be greater than 0"));
    }
    if config.matchmaking.stats_interval_seconds == 0 {
        return Err(config_error!("Stats interval must be greater than 0"));
    }

    // Room tokens need enough entropy to stay unique among pending matches
    if !(4..=32).contains(&config.matchmaking.room_id_length) {
        return Err(config_error!(
            "Room id length must be between 4 and 32, got {}",
            config.matchmaking.room_id_length
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.accept_timeout(), Duration::from_secs(10));
        assert!(!config.matchmaking.resolve_pending_on_disconnect);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [matchmaking]
            accept_timeout_seconds = 15
            resolve_pending_on_disconnect = true
            "#,
        )
        .unwrap();

        assert_eq!(config.matchmaking.accept_timeout_seconds, 15);
        assert!(config.matchmaking.resolve_pending_on_disconnect);
        assert_eq!(config.matchmaking.room_id_length, 8);
        assert_eq!(config.service.http_port, 3000);
    }

    #[test]
    fn test_validation_failure_is_configuration_error() {
        let mut config = AppConfig::default();
        config.matchmaking.room_id_length = 2;

        let err = validate_config(&config).unwrap_err();
        match err.downcast_ref::<MatchmakingError>() {
            Some(MatchmakingError::ConfigurationError { message }) => {
                assert!(message.contains("Room id length"));
            }
            other => panic!("expected a configuration error, got {:?}", other),
        }

        let err = AppConfig::from_toml_str("[matchmaking]\naccept_timeout_seconds = \"soon\"")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.matchmaking.accept_timeout_seconds = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.service.metrics_port = config.service.http_port;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.matchmaking.room_id_length = 2;
        assert!(validate_config(&config).is_err());

        assert!(AppConfig::from_toml_str("[service]\nhttp_port = \"nope\"").is_err());
    }
}
