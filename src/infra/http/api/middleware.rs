use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::error::ApiError;
use super::state::ApiState;

const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

pub async fn feed_rate_limit(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (allowed, remaining) = state.rate_limiter.allow(user_id);
    if !allowed {
        debug!(
            target = "feedline::http::rate_limit",
            user_id,
            limit = state.rate_limiter.limit(),
            "feed read rejected"
        );
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        RATE_LIMIT_REMAINING_HEADER,
        HeaderValue::from(remaining),
    );
    response
}
