//! Feed read handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use feedline_api_types::FeedQuery;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::page_response;
use crate::infra::http::api::state::ApiState;

pub async fn list_newsfeed(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.feed.page(user_id, &query).await?;
    Ok(Json(page_response(page)))
}
