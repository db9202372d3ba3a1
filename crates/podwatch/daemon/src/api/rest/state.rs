//! Application state for API handlers

use crate::scheduler::Scheduler;
use podwatch_reconciler::{DebugOverride, InMemoryStateManager};
use prometheus::Registry;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Stand-in for the scheduler's workflow state machine
    pub states: Arc<InMemoryStateManager>,

    /// Scheduler handle
    pub scheduler: Arc<Scheduler>,

    /// Shared with the reconciler
    pub debug: DebugOverride,

    /// Metrics registry
    pub registry: Registry,

    /// Platform namespace being reconciled
    pub namespace: String,

    /// Daemon version
    pub version: String,

    /// Daemon start time
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        states: Arc<InMemoryStateManager>,
        scheduler: Arc<Scheduler>,
        debug: DebugOverride,
        registry: Registry,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            states,
            scheduler,
            debug,
            registry,
            namespace: namespace.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let duration = chrono::Utc::now() - self.started_at;
        let secs = duration.num_seconds();

        if secs < 60 {
            format!("{}s", secs)
        } else if secs < 3600 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else if secs < 86400 {
            format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
        } else {
            format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
        }
    }
}
