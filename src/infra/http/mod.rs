pub mod api;
mod middleware;

pub use api::rate_limit::FeedRateLimiter;
pub use api::{ApiState, build_api_router};

use axum::{Router, middleware as axum_middleware, routing::get};

/// Full HTTP surface: the versioned API plus the database health probe.
pub fn build_router(state: ApiState) -> Router {
    build_api_router(state.clone())
        .route("/_health/db", get(api::handlers::db_health))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
        .with_state(state)
}
