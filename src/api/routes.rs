use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health_check))
        // Recommendations
        .route("/api/recommend", get(handlers::recommend))
        .route("/api/popular", get(handlers::popular))
        // Interaction events
        .route("/api/event", post(handlers::log_event))
        // Engine administration
        .route("/api/admin/retrain", post(handlers::retrain))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
