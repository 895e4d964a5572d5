//! Publish handlers

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use time::OffsetDateTime;

use crate::application::fanout::PublishEvent;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{PublishRequest, publish_accepted};
use crate::infra::http::api::state::ApiState;

/// Write the publisher's own entry and queue the subscriber fanout.
pub async fn publish_content(
    State(state): State<ApiState>,
    Json(payload): Json<PublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let event = PublishEvent {
        content_id: payload.content_id,
        publisher_id: payload.publisher_id,
        created_at: payload.created_at.unwrap_or_else(OffsetDateTime::now_utc),
    };
    let receipt = state.fanout.publish(event).await?;
    Ok((StatusCode::ACCEPTED, Json(publish_accepted(&receipt))))
}
