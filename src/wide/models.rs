//! Wide-column representations of feed and follow-graph entities.

use time::OffsetDateTime;

use crate::domain::entities::{FeedEntry, Friendship};
use crate::domain::timestamps::{from_micros, to_micros};

use super::codec::{FieldSet, FieldSpec};
use super::error::WideColumnError;
use super::schema::{ColumnSpec, TableSchema, WideModel};

fn timestamp(fields: &FieldSet, name: &str) -> Result<OffsetDateTime, WideColumnError> {
    from_micros(fields.int(name)?).map_err(|err| WideColumnError::decode(err.to_string()))
}

/// Feed entry keyed by `reverse(user_id):created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsFeedRow {
    pub user_id: i64,
    pub created_at: OffsetDateTime,
    pub content_id: i64,
}

impl WideModel for NewsFeedRow {
    const SCHEMA: TableSchema = TableSchema {
        table_name: "newsfeeds",
        row_key: &[
            FieldSpec::integer("user_id").reversed(),
            FieldSpec::timestamp("created_at"),
        ],
        columns: &[ColumnSpec::new("cf", FieldSpec::integer("content_id"))],
    };

    fn to_fields(&self) -> FieldSet {
        FieldSet::new()
            .with("user_id", self.user_id)
            .with("created_at", to_micros(self.created_at))
            .with("content_id", self.content_id)
    }

    fn from_fields(fields: FieldSet) -> Result<Self, WideColumnError> {
        Ok(Self {
            user_id: fields.int("user_id")?,
            created_at: timestamp(&fields, "created_at")?,
            content_id: fields.int("content_id")?,
        })
    }
}

impl From<&FeedEntry> for NewsFeedRow {
    fn from(entry: &FeedEntry) -> Self {
        Self {
            user_id: entry.owner_id,
            created_at: entry.created_at,
            content_id: entry.content_id,
        }
    }
}

impl From<NewsFeedRow> for FeedEntry {
    fn from(row: NewsFeedRow) -> Self {
        FeedEntry::new(row.user_id, row.content_id, row.created_at)
    }
}

/// Content index for feed entries, keyed by `reverse(user_id):content_id`.
///
/// `newsfeeds` rows are keyed by time, so this table is what makes an entry
/// unique per owner and content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsFeedContentRow {
    pub user_id: i64,
    pub content_id: i64,
    pub created_at: OffsetDateTime,
}

impl NewsFeedContentRow {
    pub fn key_fields(user_id: i64, content_id: i64) -> FieldSet {
        FieldSet::new()
            .with("user_id", user_id)
            .with("content_id", content_id)
    }
}

impl WideModel for NewsFeedContentRow {
    const SCHEMA: TableSchema = TableSchema {
        table_name: "newsfeed_contents",
        row_key: &[
            FieldSpec::integer("user_id").reversed(),
            FieldSpec::integer("content_id"),
        ],
        columns: &[ColumnSpec::new("cf", FieldSpec::timestamp("created_at"))],
    };

    fn to_fields(&self) -> FieldSet {
        Self::key_fields(self.user_id, self.content_id)
            .with("created_at", to_micros(self.created_at))
    }

    fn from_fields(fields: FieldSet) -> Result<Self, WideColumnError> {
        Ok(Self {
            user_id: fields.int("user_id")?,
            content_id: fields.int("content_id")?,
            created_at: timestamp(&fields, "created_at")?,
        })
    }
}

impl From<&FeedEntry> for NewsFeedContentRow {
    fn from(entry: &FeedEntry) -> Self {
        Self {
            user_id: entry.owner_id,
            content_id: entry.content_id,
            created_at: entry.created_at,
        }
    }
}

impl From<NewsFeedContentRow> for FeedEntry {
    fn from(row: NewsFeedContentRow) -> Self {
        FeedEntry::new(row.user_id, row.content_id, row.created_at)
    }
}

/// Who `from_user_id` follows, keyed by `reverse(from_user_id):created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowingRow {
    pub from_user_id: i64,
    pub created_at: OffsetDateTime,
    pub to_user_id: i64,
}

impl WideModel for FollowingRow {
    const SCHEMA: TableSchema = TableSchema {
        table_name: "followings",
        row_key: &[
            FieldSpec::integer("from_user_id").reversed(),
            FieldSpec::timestamp("created_at"),
        ],
        columns: &[ColumnSpec::new("cf", FieldSpec::integer("to_user_id"))],
    };

    fn to_fields(&self) -> FieldSet {
        FieldSet::new()
            .with("from_user_id", self.from_user_id)
            .with("created_at", to_micros(self.created_at))
            .with("to_user_id", self.to_user_id)
    }

    fn from_fields(fields: FieldSet) -> Result<Self, WideColumnError> {
        Ok(Self {
            from_user_id: fields.int("from_user_id")?,
            created_at: timestamp(&fields, "created_at")?,
            to_user_id: fields.int("to_user_id")?,
        })
    }
}

/// Who follows `to_user_id`, keyed by `reverse(to_user_id):created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerRow {
    pub to_user_id: i64,
    pub created_at: OffsetDateTime,
    pub from_user_id: i64,
}

impl WideModel for FollowerRow {
    const SCHEMA: TableSchema = TableSchema {
        table_name: "followers",
        row_key: &[
            FieldSpec::integer("to_user_id").reversed(),
            FieldSpec::timestamp("created_at"),
        ],
        columns: &[ColumnSpec::new("cf", FieldSpec::integer("from_user_id"))],
    };

    fn to_fields(&self) -> FieldSet {
        FieldSet::new()
            .with("to_user_id", self.to_user_id)
            .with("created_at", to_micros(self.created_at))
            .with("from_user_id", self.from_user_id)
    }

    fn from_fields(fields: FieldSet) -> Result<Self, WideColumnError> {
        Ok(Self {
            to_user_id: fields.int("to_user_id")?,
            created_at: timestamp(&fields, "created_at")?,
            from_user_id: fields.int("from_user_id")?,
        })
    }
}

impl From<&Friendship> for FollowingRow {
    fn from(edge: &Friendship) -> Self {
        Self {
            from_user_id: edge.from_user_id,
            created_at: edge.created_at,
            to_user_id: edge.to_user_id,
        }
    }
}

impl From<&Friendship> for FollowerRow {
    fn from(edge: &Friendship) -> Self {
        Self {
            to_user_id: edge.to_user_id,
            created_at: edge.created_at,
            from_user_id: edge.from_user_id,
        }
    }
}
