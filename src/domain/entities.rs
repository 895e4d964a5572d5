//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One (owner, content) visibility relationship in a user's feed.
///
/// At most one entry exists per `(owner_id, content_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub owner_id: i64,
    pub content_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl FeedEntry {
    pub fn new(owner_id: i64, content_id: i64, created_at: OffsetDateTime) -> Self {
        Self {
            owner_id,
            content_id,
            created_at,
        }
    }
}

/// Directed follow edge: `from_user_id` subscribes to `to_user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub from_user_id: i64,
    pub to_user_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateRecord {
    pub name: String,
    pub percent: u8,
    pub description: String,
}

impl GateRecord {
    pub fn closed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            percent: 0,
            description: String::new(),
        }
    }
}
