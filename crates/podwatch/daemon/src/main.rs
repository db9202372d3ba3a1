//! Podwatch Daemon - Keeps workflow run state and platform pods consistent
//!
//! The podwatch daemon provides:
//! - Periodic reconciliation of running instances against platform pods
//! - Garbage collection of orphaned, finished pods
//! - REST API for the debug override, active instances and recovery events
//! - Prometheus metrics

use clap::Parser;
use podwatch_daemon::config::{DaemonConfig, PlatformBackend};
use podwatch_daemon::error::{DaemonError, DaemonResult};
use podwatch_daemon::Server;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Podwatch Daemon CLI
#[derive(Parser)]
#[command(name = "podwatchd")]
#[command(about = "Podwatch Daemon - Workflow pod reconciler", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "PODWATCH_CONFIG")]
    config: Option<String>,

    /// Listen address
    #[arg(short, long, env = "PODWATCH_LISTEN_ADDR")]
    listen: Option<String>,

    /// Platform namespace to reconcile
    #[arg(short, long, env = "PODWATCH_NAMESPACE")]
    namespace: Option<String>,

    /// Kubernetes API server; the in-memory platform is used when unset
    #[arg(long, env = "PODWATCH_API_SERVER")]
    api_server: Option<String>,

    /// File holding a bearer token for the API server
    #[arg(long, env = "PODWATCH_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// Start with the debug override enabled
    #[arg(long, env = "PODWATCH_DEBUG")]
    debug: bool,

    /// Log level
    #[arg(long, env = "PODWATCH_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "PODWATCH_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(namespace) = cli.namespace {
        config.platform.namespace = namespace;
    }
    if let Some(api_server) = cli.api_server {
        config.platform.backend = PlatformBackend::Kubernetes {
            api_server,
            bearer_token_file: cli.token_file,
        };
    }
    if cli.debug {
        config.reconciler.debug = true;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        namespace = %config.platform.namespace,
        interval_secs = config.reconciler.interval_secs,
        "Starting podwatchd"
    );

    // Create and run server
    let server = Server::new(config)?;
    server.run().await
}
