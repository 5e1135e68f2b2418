//! API route definitions

use crate::config::ServerConfig;
use crate::models::{ModelCache, ModelRegistry, StorageBackend};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: Arc<ModelRegistry>,
    pub cache: Arc<ModelCache>,
    /// Same backend the cache loads from; uploads are written here
    pub storage: Arc<dyn StorageBackend>,
    pub prometheus_handle: metrics_exporter_prometheus::PrometheusHandle,
}

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    // Leave headroom so oversized uploads reach the handler's own check
    let body_limit = state.config.max_upload_bytes() as usize + 1024;

    Router::new()
        // Health and status
        .route("/health", get(handlers::health))
        .route("/health/ready", get(handlers::readiness))
        .route("/health/live", get(handlers::liveness))
        .route("/metrics", get(handlers::metrics))
        // Model management
        .route(
            "/models",
            get(handlers::list_models).post(handlers::upload_model),
        )
        .route(
            "/models/{id}",
            get(handlers::get_model)
                .patch(handlers::update_model)
                .delete(handlers::delete_model),
        )
        // Inference
        .route("/predict/{id}", post(handlers::predict))
        // Cache administration
        .route(
            "/cache",
            get(handlers::cache_status).delete(handlers::clear_cache),
        )
        .route("/cache/{id}", delete(handlers::evict_cached_model))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}
