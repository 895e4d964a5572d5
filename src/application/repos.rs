//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{FeedEntry, Friendship, GateRecord};
use crate::domain::types::JobType;
use crate::wide::WideColumnError;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    WideColumn(#[from] WideColumnError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RepoError::Timeout | RepoError::Unavailable(_) | RepoError::Persistence(_)
        ) || matches!(self, RepoError::WideColumn(WideColumnError::Table(_)))
    }
}

/// Relational feed persistence.
///
/// Reads return entries newest first; ties on `created_at` fall back to
/// insertion order, newest insert first.
#[async_trait]
pub trait NewsFeedRepo: Send + Sync {
    /// Insert entries, skipping `(owner_id, content_id)` pairs that already
    /// exist. Returns only the entries that were inserted.
    async fn insert_entries(&self, entries: &[FeedEntry]) -> Result<Vec<FeedEntry>, RepoError>;

    async fn find_entry(
        &self,
        owner_id: i64,
        content_id: i64,
    ) -> Result<Option<FeedEntry>, RepoError>;

    async fn list_latest(&self, owner_id: i64, limit: usize) -> Result<Vec<FeedEntry>, RepoError>;

    /// Entries strictly older than `before`.
    async fn list_older(
        &self,
        owner_id: i64,
        before: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<FeedEntry>, RepoError>;

    /// Every entry strictly newer than `after`.
    async fn list_newer(
        &self,
        owner_id: i64,
        after: OffsetDateTime,
    ) -> Result<Vec<FeedEntry>, RepoError>;
}

/// Relational follow-graph persistence.
#[async_trait]
pub trait FriendshipRepo: Send + Sync {
    /// Returns false when the edge already existed.
    async fn insert_friendship(&self, edge: &Friendship) -> Result<bool, RepoError>;

    async fn find_friendship(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<Option<Friendship>, RepoError>;

    /// Removes the edge, returning it when it existed.
    async fn delete_friendship(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<Option<Friendship>, RepoError>;

    async fn follower_ids(&self, to_user_id: i64) -> Result<Vec<i64>, RepoError>;

    async fn following_ids(&self, from_user_id: i64) -> Result<Vec<i64>, RepoError>;
}

#[async_trait]
pub trait GateRepo: Send + Sync {
    async fn find_gate(&self, name: &str) -> Result<Option<GateRecord>, RepoError>;

    async fn upsert_gate(&self, gate: &GateRecord) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    /// Push a job onto its queue, returning the assigned job id.
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
