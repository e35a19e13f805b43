use super::handlers::{health_check, price, release, stats, touch};
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Thin demo surface over `InterestApi` (spec §6): not the core engine,
/// just enough HTTP plumbing to touch/release/price tokens and observe
/// engine stats from the outside.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/v1/touch", post(touch))
        .route("/v1/release", post(release))
        .route("/v1/price", get(price))
        .route("/v1/stats", get(stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
