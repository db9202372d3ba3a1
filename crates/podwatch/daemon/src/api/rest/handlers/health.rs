//! Health and status handlers

use crate::api::rest::state::AppState;
use crate::scheduler::LastCycle;
use axum::{extract::State, Json};
use serde::Serialize;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: String,
    pub version: String,
    pub uptime: String,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime: state.uptime(),
    })
}

/// Daemon status response
#[derive(Debug, Serialize)]
pub struct DaemonStatusResponse {
    pub version: String,
    pub uptime: String,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub namespace: String,
    pub scheduler_running: bool,
    pub debug_override: bool,
    pub active_instances: usize,
    pub last_cycle: Option<LastCycle>,
}

/// Daemon status endpoint
pub async fn daemon_status(State(state): State<AppState>) -> Json<DaemonStatusResponse> {
    Json(DaemonStatusResponse {
        version: state.version.clone(),
        uptime: state.uptime(),
        started_at: state.started_at,
        namespace: state.namespace.clone(),
        scheduler_running: state.scheduler.is_running().await,
        debug_override: state.debug.get(),
        active_instances: state.states.states().await.len(),
        last_cycle: state.scheduler.last_cycle().await,
    })
}
