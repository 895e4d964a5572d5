//! Follow graph handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{FollowRequest, follow_view};
use crate::infra::http::api::state::ApiState;

pub async fn create_friendship(
    State(state): State<ApiState>,
    Json(payload): Json<FollowRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let followed = state
        .friendships
        .follow(payload.from_user_id, payload.to_user_id)
        .await?;
    let status = if followed.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(follow_view(&followed.edge))))
}

pub async fn delete_friendship(
    State(state): State<ApiState>,
    Path((from_user_id, to_user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    if state.friendships.unfollow(from_user_id, to_user_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("friendship not found"))
    }
}
