pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

pub fn build_api_router(state: ApiState) -> Router<ApiState> {
    let rate_state = state.clone();

    Router::new()
        .route(
            "/api/v1/users/{user_id}/newsfeeds",
            get(handlers::list_newsfeed).route_layer(axum_middleware::from_fn_with_state(
                rate_state,
                middleware::feed_rate_limit,
            )),
        )
        .route("/api/v1/publications", post(handlers::publish_content))
        .route("/api/v1/friendships", post(handlers::create_friendship))
        .route(
            "/api/v1/friendships/{from_user_id}/{to_user_id}",
            delete(handlers::delete_friendship),
        )
}
