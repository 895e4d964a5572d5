//! Shared request and response types for the feedline HTTP API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Query string accepted by the feed read endpoint.
///
/// At most one of `created_at__gt` / `created_at__lt` may be present. Values are
/// ISO-8601 timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedQuery {
    #[serde(
        rename = "created_at__gt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_after: Option<String>,
    #[serde(
        rename = "created_at__lt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// One page of feed results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPageResponse<T> {
    pub results: Vec<T>,
    pub has_next_page: bool,
    pub beyond_upside_paginate: bool,
}

/// A feed entry as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FeedEntryView {
    pub owner_id: i64,
    pub content_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Content-publish event handed to the fanout coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub content_id: i64,
    pub publisher_id: i64,
    /// Defaults to the time the request is received.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishAccepted {
    pub content_id: i64,
    pub backend: String,
    pub self_entry: FeedEntryView,
    pub job_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowRequest {
    pub from_user_id: i64,
    pub to_user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FollowView {
    pub from_user_id: i64,
    pub to_user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
