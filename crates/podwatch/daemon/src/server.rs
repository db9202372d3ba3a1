//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{DaemonConfig, PlatformBackend};
use crate::error::{DaemonError, DaemonResult};
use crate::kube::KubeRestClient;
use crate::scheduler::Scheduler;
use podwatch_reconciler::{
    DebugOverride, InMemoryPlatform, InMemoryStateManager, OrchestrationClient, Reconciler,
    ReconcilerMetrics,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Podwatch Daemon Server
pub struct Server {
    config: DaemonConfig,
    state: AppState,
    reconcile_rx: tokio::sync::mpsc::Receiver<()>,
}

impl Server {
    /// Create a new server with the given configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let client: Arc<dyn OrchestrationClient> = match &config.platform.backend {
            PlatformBackend::Memory => {
                Arc::new(InMemoryPlatform::new(config.platform.namespace.clone()))
            }
            PlatformBackend::Kubernetes { .. } => {
                Arc::new(KubeRestClient::from_config(&config.platform)?)
            }
        };

        let registry = Registry::new_custom(Some("podwatch".to_string()), None)
            .map_err(|e| DaemonError::Server(e.to_string()))?;
        let metrics = Arc::new(ReconcilerMetrics::new(&registry));

        let states = Arc::new(InMemoryStateManager::new());
        let debug = DebugOverride::new(config.reconciler.debug);

        let reconciler = Reconciler::new(
            config.reconciler.reconciler_config(),
            client,
            states.clone(),
            debug.clone(),
        )
        .with_metrics(metrics);

        let (scheduler, reconcile_rx) =
            Scheduler::new(config.reconciler.interval(), Arc::new(reconciler));

        let state = AppState::new(
            states,
            scheduler,
            debug,
            registry,
            config.platform.namespace.clone(),
        );

        Ok(Self {
            config,
            state,
            reconcile_rx,
        })
    }

    /// Run the server
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;
        let scheduler = self.state.scheduler.clone();

        let app = create_router(self.state, self.config.server.enable_cors);
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Podwatch daemon listening on {}", addr);
        tracing::info!(
            namespace = %self.config.platform.namespace,
            backend = ?self.config.platform.backend,
            debug = self.config.reconciler.debug,
            "Reconciling platform namespace"
        );

        // Start scheduler in background
        let scheduler_handle = tokio::spawn(scheduler.clone().start(self.reconcile_rx));

        // Run server with graceful shutdown
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Podwatch daemon shutting down");

        // Stop scheduler; an in-flight cycle is abandoned
        scheduler.stop().await;
        scheduler_handle.abort();

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
