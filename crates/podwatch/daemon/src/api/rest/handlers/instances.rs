//! Active instance handlers
//!
//! The daemon keeps the active set in memory; these endpoints are how the
//! scheduler publishes it.

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use podwatch_types::{RunState, WorkflowInstance};
use serde::Serialize;

/// List active instances
pub async fn list_instances(State(state): State<AppState>) -> Json<Vec<RunState>> {
    Json(state.states.states().await)
}

/// Create or replace an active instance
///
/// Identities that cannot round-trip through the ownership annotation are
/// rejected here, before they can reach the reconciler.
pub async fn upsert_instance(
    State(state): State<AppState>,
    payload: Result<Json<RunState>, JsonRejection>,
) -> ApiResult<Json<RunState>> {
    let Json(run_state) = payload?;
    if run_state.phase.is_closed() {
        return Err(ApiError::BadRequest(format!(
            "{} is {}; close the instance instead",
            run_state.instance, run_state.phase
        )));
    }

    tracing::debug!(
        instance = %run_state.instance,
        phase = %run_state.phase,
        "Upserting instance"
    );
    state.states.upsert(run_state.clone()).await;
    Ok(Json(run_state))
}

/// Close instance response
#[derive(Debug, Serialize)]
pub struct CloseInstanceResponse {
    pub closed: bool,
}

/// Close an instance's state stream, removing it from the active set
pub async fn close_instance(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<CloseInstanceResponse>> {
    let instance: WorkflowInstance = key.parse()?;

    if !state.states.close(&instance).await {
        return Err(ApiError::NotFound(format!("Instance {} not active", key)));
    }

    tracing::info!(instance = %instance, "Closed instance");
    Ok(Json(CloseInstanceResponse { closed: true }))
}
