//! Main entry point for the QuizBattle matchmaking service
//!
//! Initializes configuration and logging, starts the coordinator, the
//! WebSocket gateway and the health server, and shuts them down gracefully
//! on SIGINT/SIGTERM.

use anyhow::Result;
use clap::Parser;
use quizbattle_matchmaker::config::{validate_config, AppConfig};
use quizbattle_matchmaker::service::{AppState, HealthCheck};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// QuizBattle Matchmaker - queueing and mutual acceptance for quiz duels
#[derive(Parser)]
#[command(
    name = "quizbattle-matchmaker",
    version,
    about = "Matchmaking and mutual-acceptance coordinator for QuizBattle",
    long_about = "Tracks online players, pairs queued players FIFO, and runs a timed \
                 two-phase accept/reject before handing confirmed matches to a game session. \
                 Clients connect over WebSocket at /ws?playerId=..&displayName=.."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override WebSocket gateway port")]
    http_port: Option<u16>,

    /// Metrics port override
    #[arg(long, value_name = "PORT", help = "Override metrics server port")]
    metrics_port: Option<u16>,

    /// Accept window override
    #[arg(
        long,
        value_name = "SECONDS",
        help = "Override how long players have to accept a match"
    )]
    accept_timeout: Option<u64>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Log a health summary periodically
async fn health_check_task(app_state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));

    while app_state.is_running().await {
        interval.tick().await;

        match HealthCheck::check(app_state.clone()).await {
            Ok(health) => {
                info!(
                    "Health check: {} - {} online, {} queued, {} pending, {} confirmed",
                    health.status,
                    health.stats.online_players,
                    health.stats.queued_players,
                    health.stats.pending_matches,
                    health.stats.matches_confirmed
                );
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 QuizBattle Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Gateway: ws://{}:{}/ws",
        config.service.http_host, config.service.http_port
    );
    info!("   Health port: {}", config.service.metrics_port);
    info!(
        "   Accept window: {}s",
        config.matchmaking.accept_timeout_seconds
    );
    info!(
        "   Resolve pending on disconnect: {}",
        config.matchmaking.resolve_pending_on_disconnect
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file/environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(metrics_port) = args.metrics_port {
        config.service.metrics_port = metrics_port;
    }

    if let Some(accept_timeout) = args.accept_timeout {
        config.matchmaking.accept_timeout_seconds = accept_timeout;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args can override environment/config file)
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    // Initialize logging early (before any other operations)
    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Some(config_path) = &args.config {
        info!("Loaded configuration from: {}", config_path.display());
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    // Initialize application state
    info!("Initializing service components...");
    let app_state = match AppState::new(config.clone()).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    // Start the service
    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    // Start health check monitoring
    let health_task = {
        let app_state = app_state.clone();
        tokio::spawn(async move {
            health_check_task(app_state).await;
        })
    };

    info!("✅ QuizBattle Matchmaking Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(stats)) => {
            info!(
                "✅ Graceful shutdown completed ({} matches formed, {} confirmed)",
                stats.matches_formed, stats.matches_confirmed
            );
        }
        Ok(Err(e)) => {
            error!("Shutdown failed: {}", e);
        }
        Err(_) => {
            warn!("⚠️  Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("🛑 QuizBattle Matchmaking Service stopped");
    Ok(())
}
