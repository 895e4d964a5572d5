use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::repos::{NewsFeedRepo, RepoError};
use crate::domain::entities::FeedEntry;

use super::util::sql_limit;
use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct NewsFeedRow {
    owner_id: i64,
    content_id: i64,
    created_at: OffsetDateTime,
}

impl From<NewsFeedRow> for FeedEntry {
    fn from(row: NewsFeedRow) -> Self {
        FeedEntry::new(row.owner_id, row.content_id, row.created_at)
    }
}

#[async_trait]
impl NewsFeedRepo for PostgresRepositories {
    async fn insert_entries(&self, entries: &[FeedEntry]) -> Result<Vec<FeedEntry>, RepoError> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO newsfeeds (owner_id, content_id, created_at) ");
        qb.push_values(entries, |mut row, entry| {
            row.push_bind(entry.owner_id)
                .push_bind(entry.content_id)
                .push_bind(entry.created_at);
        });
        qb.push(
            " ON CONFLICT (owner_id, content_id) DO NOTHING \
              RETURNING owner_id, content_id, created_at",
        );

        let rows: Vec<NewsFeedRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(FeedEntry::from).collect())
    }

    async fn find_entry(
        &self,
        owner_id: i64,
        content_id: i64,
    ) -> Result<Option<FeedEntry>, RepoError> {
        let row = sqlx::query_as::<_, NewsFeedRow>(
            r#"
            SELECT owner_id, content_id, created_at
            FROM newsfeeds
            WHERE owner_id = $1 AND content_id = $2
            "#,
        )
        .bind(owner_id)
        .bind(content_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(FeedEntry::from))
    }

    async fn list_latest(&self, owner_id: i64, limit: usize) -> Result<Vec<FeedEntry>, RepoError> {
        let rows = sqlx::query_as::<_, NewsFeedRow>(
            r#"
            SELECT owner_id, content_id, created_at
            FROM newsfeeds
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(owner_id)
        .bind(sql_limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(FeedEntry::from).collect())
    }

    async fn list_older(
        &self,
        owner_id: i64,
        before: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        let rows = sqlx::query_as::<_, NewsFeedRow>(
            r#"
            SELECT owner_id, content_id, created_at
            FROM newsfeeds
            WHERE owner_id = $1 AND created_at < $2
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(owner_id)
        .bind(before)
        .bind(sql_limit(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(FeedEntry::from).collect())
    }

    async fn list_newer(
        &self,
        owner_id: i64,
        after: OffsetDateTime,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        let rows = sqlx::query_as::<_, NewsFeedRow>(
            r#"
            SELECT owner_id, content_id, created_at
            FROM newsfeeds
            WHERE owner_id = $1 AND created_at > $2
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .bind(after)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(FeedEntry::from).collect())
    }
}
