use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{FriendshipRepo, RepoError};
use crate::domain::entities::Friendship;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct FriendshipRow {
    from_user_id: i64,
    to_user_id: i64,
    created_at: OffsetDateTime,
}

impl From<FriendshipRow> for Friendship {
    fn from(row: FriendshipRow) -> Self {
        Friendship {
            from_user_id: row.from_user_id,
            to_user_id: row.to_user_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl FriendshipRepo for PostgresRepositories {
    async fn insert_friendship(&self, edge: &Friendship) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO friendships (from_user_id, to_user_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (from_user_id, to_user_id) DO NOTHING
            "#,
        )
        .bind(edge.from_user_id)
        .bind(edge.to_user_id)
        .bind(edge.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_friendship(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<Option<Friendship>, RepoError> {
        let row = sqlx::query_as::<_, FriendshipRow>(
            r#"
            SELECT from_user_id, to_user_id, created_at
            FROM friendships
            WHERE from_user_id = $1 AND to_user_id = $2
            "#,
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Friendship::from))
    }

    async fn delete_friendship(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<Option<Friendship>, RepoError> {
        let row = sqlx::query_as::<_, FriendshipRow>(
            r#"
            DELETE FROM friendships
            WHERE from_user_id = $1 AND to_user_id = $2
            RETURNING from_user_id, to_user_id, created_at
            "#,
        )
        .bind(from_user_id)
        .bind(to_user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(Friendship::from))
    }

    async fn follower_ids(&self, to_user_id: i64) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT from_user_id
            FROM friendships
            WHERE to_user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(to_user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn following_ids(&self, from_user_id: i64) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT to_user_id
            FROM friendships
            WHERE from_user_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(from_user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
