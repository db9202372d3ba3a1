//! Debug override handlers

use crate::api::rest::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

/// Debug override state
#[derive(Debug, Serialize, Deserialize)]
pub struct DebugState {
    pub enabled: bool,
}

/// Response to a debug override change
#[derive(Debug, Serialize)]
pub struct SetDebugResponse {
    pub enabled: bool,
    pub previous: bool,
}

/// Read the debug override
pub async fn get_debug(State(state): State<AppState>) -> Json<DebugState> {
    Json(DebugState {
        enabled: state.debug.get(),
    })
}

/// Enable or disable the debug override
pub async fn set_debug(
    State(state): State<AppState>,
    Json(request): Json<DebugState>,
) -> Json<SetDebugResponse> {
    let previous = state.debug.set(request.enabled);
    if previous != request.enabled {
        if request.enabled {
            tracing::warn!("Debug override enabled, orphaned containers will be kept");
        } else {
            tracing::info!("Debug override disabled");
        }
    }

    Json(SetDebugResponse {
        enabled: request.enabled,
        previous,
    })
}
