use async_trait::async_trait;

use crate::application::repos::{GateRepo, RepoError};
use crate::domain::entities::GateRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct GateRow {
    name: String,
    percent: i16,
    description: String,
}

impl From<GateRow> for GateRecord {
    fn from(row: GateRow) -> Self {
        GateRecord {
            name: row.name,
            percent: u8::try_from(row.percent.clamp(0, 100)).unwrap_or(0),
            description: row.description,
        }
    }
}

#[async_trait]
impl GateRepo for PostgresRepositories {
    async fn find_gate(&self, name: &str) -> Result<Option<GateRecord>, RepoError> {
        let row = sqlx::query_as::<_, GateRow>(
            r#"
            SELECT name, percent, description
            FROM gatekeepers
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(row.map(GateRecord::from))
    }

    async fn upsert_gate(&self, gate: &GateRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO gatekeepers (name, percent, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
               SET percent = EXCLUDED.percent,
                   description = EXCLUDED.description,
                   updated_at = now()
            "#,
        )
        .bind(&gate.name)
        .bind(i16::from(gate.percent))
        .bind(&gate.description)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
