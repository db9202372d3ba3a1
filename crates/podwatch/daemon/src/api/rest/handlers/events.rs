//! Recovery event handlers

use crate::api::rest::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use podwatch_reconciler::ReceivedEvent;
use serde::Deserialize;

/// Get events query params
#[derive(Debug, Deserialize)]
pub struct GetEventsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// Most recent recovery events, newest first
///
/// Only the bounded history the state manager retains is available.
pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<GetEventsQuery>,
) -> Json<Vec<ReceivedEvent>> {
    Json(state.states.recent_events(query.limit).await)
}
