//! Configuration for podwatch-daemon

use podwatch_reconciler::ReconcilerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Admin API server
    #[serde(default)]
    pub server: ServerConfig,

    /// Orchestration platform connection
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Reconciliation loop
    #[serde(default)]
    pub reconciler: ReconcilerSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Where the reconciled containers live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlatformBackend {
    /// In-process platform (for development/testing)
    Memory,

    /// Kubernetes API server
    Kubernetes {
        /// API server base URL
        api_server: String,

        /// File holding a bearer token, sent verbatim
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bearer_token_file: Option<PathBuf>,
    },
}

/// Orchestration platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_backend")]
    pub backend: PlatformBackend,

    /// Namespace holding the scheduler's containers
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Timeout applied to every platform call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            namespace: default_namespace(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl PlatformConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Reconciliation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    /// Seconds between cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Upper bound on concurrent single-container lookups
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,

    /// Start with the debug override enabled
    #[serde(default)]
    pub debug: bool,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            debug: false,
        }
    }
}

impl ReconcilerSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            max_concurrent_lookups: self.max_concurrent_lookups,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_backend() -> PlatformBackend {
    PlatformBackend::Memory
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_interval() -> u64 {
    60
}

fn default_max_concurrent_lookups() -> usize {
    ReconcilerConfig::default().max_concurrent_lookups
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables with PODWATCH_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("PODWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
