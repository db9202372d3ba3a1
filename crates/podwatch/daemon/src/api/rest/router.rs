//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and status
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::daemon_status))
        // Debug override
        .route("/debug", get(handlers::get_debug))
        .route("/debug", put(handlers::set_debug))
        // Reconciliation
        .route("/reconcile", post(handlers::trigger_reconcile))
        // Active instances
        .route("/instances", get(handlers::list_instances))
        .route("/instances", put(handlers::upsert_instance))
        .route("/instances/:key", delete(handlers::close_instance))
        // Recovery events
        .route("/events", get(handlers::get_events))
        // Container manifests
        .route("/manifests", post(handlers::render_manifest));

    let router = Router::new()
        .route("/metrics", get(handlers::export_metrics))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
