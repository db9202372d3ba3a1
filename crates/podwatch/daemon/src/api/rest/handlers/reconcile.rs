//! Reconciliation trigger handler

use crate::api::rest::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

/// Trigger response
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    /// False when a triggered cycle was already pending
    pub triggered: bool,
}

/// Request an immediate reconciliation cycle
pub async fn trigger_reconcile(
    State(state): State<AppState>,
) -> (StatusCode, Json<TriggerResponse>) {
    let triggered = state.scheduler.trigger_reconcile();
    tracing::debug!(triggered, "Reconciliation requested");
    (StatusCode::ACCEPTED, Json(TriggerResponse { triggered }))
}
