use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recordings
        .route(
            "/recordings",
            post(handlers::upload_recording).get(handlers::list_recordings),
        )
        .route(
            "/recordings/:id",
            get(handlers::get_recording).delete(handlers::delete_recording),
        )
        .route("/recordings/:id/process", post(handlers::process_recording))
        .route("/recordings/:id/results", get(handlers::get_results))
        // Exports
        .route("/recordings/:id/exports", post(handlers::create_export))
        .route("/exports/:id/download", get(handlers::download_export))
        .route("/exports/:id", axum::routing::delete(handlers::delete_export))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
