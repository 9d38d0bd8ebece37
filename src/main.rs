//! Main entry point for the Waypoint matchmaking service
//!
//! This is the production entry point that initializes and runs the
//! matchmaking service with logging and graceful shutdown.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info, warn};
use waypoint::config::{validate_config, AppConfig};
use waypoint::routing::RoutingMode;
use waypoint::service::AppState;

/// Waypoint Matchmaking Service - FIFO queues and player routing
#[derive(Parser)]
#[command(
    name = "waypoint",
    version,
    about = "FIFO matchmaking service that fills ready matches and routes players",
    long_about = "Waypoint keeps per-mode wait queues, polls a session registry for ready \
                 matches, and moves matched players either through a central relay with \
                 polled referrals or by pushing transfers to their origin server."
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

    /// Registry URL override
    #[arg(long, value_name = "URL", help = "Override session registry URL")]
    registry_url: Option<String>,

    /// Relay URL override
    #[arg(long, value_name = "URL", help = "Override relay route API URL")]
    relay_url: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Tick rate override
    #[arg(long, value_name = "MS", help = "Override matcher tick rate in milliseconds")]
    tick_rate_ms: Option<u64>,

    /// Routing mode override
    #[arg(long, value_name = "MODE", help = "Routing mode: relay or direct")]
    routing_mode: Option<RoutingMode>,

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

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Waypoint Matchmaking Service v{}", waypoint::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   HTTP: {}", config.bind_address());
    info!("   Registry: {}", config.registry.url);
    info!("   Routing: {}", config.matchmaking.routing_mode);
    info!(
        "   Relay: {}",
        config.relay.url.as_deref().unwrap_or("not configured")
    );
    info!(
        "   Referrals point at: {}:{}",
        config.relay.referral_host, config.relay.referral_port
    );
    info!("   Tick rate: {}ms", config.matchmaking.tick_rate_ms);
    match config.queue_timeout() {
        Some(timeout) => info!("   Queue timeout: {}s", timeout.as_secs()),
        None => info!("   Queue timeout: disabled"),
    }
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment or file and CLI arguments
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

    if let Some(registry_url) = &args.registry_url {
        config.registry.url = registry_url.clone();
    }

    if let Some(relay_url) = &args.relay_url {
        config.relay.url = Some(relay_url.clone());
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(tick_rate_ms) = args.tick_rate_ms {
        config.matchmaking.tick_rate_ms = tick_rate_ms;
    }

    if let Some(routing_mode) = args.routing_mode {
        config.matchmaking.routing_mode = routing_mode;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration (CLI args override environment/config file)
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
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("✅ Waypoint Matchmaking Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => {
            info!("✅ Graceful shutdown completed successfully");
        }
        Ok(Err(e)) => {
            warn!("Shutdown finished with errors: {}", e);
        }
        Err(_) => {
            warn!("⚠️  Shutdown timeout exceeded, forcing exit");
        }
    }

    info!("🛑 Waypoint Matchmaking Service stopped");
    Ok(())
}
