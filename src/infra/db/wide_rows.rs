//! Sorted wide-column table over the `wide_rows` relation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder, postgres::PgPool};

use crate::wide::{Columns, Row, ScanRange, SortedTable, WideColumnError, prefix_successor};

use super::util::sql_limit;

/// `bytea` compares bytewise, so row-key ranges map onto plain comparisons
/// over the `(table_name, row_key)` primary key.
#[derive(Clone)]
pub struct PgSortedTable {
    pool: PgPool,
}

impl PgSortedTable {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WideRow {
    row_key: Vec<u8>,
    columns: Value,
}

#[derive(sqlx::FromRow)]
struct WrittenKey {
    row_key: Vec<u8>,
    inserted: bool,
}

fn table_error(err: sqlx::Error) -> WideColumnError {
    WideColumnError::table(err.to_string())
}

fn columns_to_json(columns: &Columns) -> Result<Value, WideColumnError> {
    let mut object = Map::with_capacity(columns.len());
    for (qualifier, value) in columns {
        let text = std::str::from_utf8(value).map_err(|err| {
            WideColumnError::table(format!("column `{qualifier}` is not utf-8: {err}"))
        })?;
        object.insert(qualifier.clone(), Value::String(text.to_string()));
    }
    Ok(Value::Object(object))
}

fn columns_from_json(value: Value) -> Result<Columns, WideColumnError> {
    let Value::Object(object) = value else {
        return Err(WideColumnError::decode("stored columns are not an object"));
    };
    let mut columns = BTreeMap::new();
    for (qualifier, value) in object {
        let Value::String(text) = value else {
            return Err(WideColumnError::decode(format!(
                "column `{qualifier}` is not a string"
            )));
        };
        columns.insert(qualifier, text.into_bytes());
    }
    Ok(columns)
}

#[async_trait]
impl SortedTable for PgSortedTable {
    async fn put(&self, table: &str, row: Row) -> Result<(), WideColumnError> {
        sqlx::query(
            r#"
            INSERT INTO wide_rows (table_name, row_key, columns)
            VALUES ($1, $2, $3)
            ON CONFLICT (table_name, row_key) DO UPDATE SET columns = EXCLUDED.columns
            "#,
        )
        .bind(table)
        .bind(&row.key)
        .bind(columns_to_json(&row.columns)?)
        .execute(&self.pool)
        .await
        .map_err(table_error)?;
        Ok(())
    }

    async fn put_batch(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Vec<u8>>, WideColumnError> {
        // One statement cannot upsert the same key twice; the last write wins.
        let mut unique: BTreeMap<Vec<u8>, Columns> = BTreeMap::new();
        for row in rows {
            unique.insert(row.key, row.columns);
        }
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let mut encoded = Vec::with_capacity(unique.len());
        for (key, columns) in unique {
            encoded.push((key, columns_to_json(&columns)?));
        }

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO wide_rows (table_name, row_key, columns) ");
        qb.push_values(&encoded, |mut row, (key, columns)| {
            row.push_bind(table).push_bind(key).push_bind(columns);
        });
        qb.push(
            " ON CONFLICT (table_name, row_key) DO UPDATE SET columns = EXCLUDED.columns \
              RETURNING row_key, (xmax = 0) AS inserted",
        );

        let written: Vec<WrittenKey> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(table_error)?;
        Ok(written
            .into_iter()
            .filter(|row| row.inserted)
            .map(|row| row.row_key)
            .collect())
    }

    async fn put_absent_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
    ) -> Result<Vec<Vec<u8>>, WideColumnError> {
        // The first row for a repeated key wins, matching a put-if-absent per row.
        let mut unique: BTreeMap<Vec<u8>, Columns> = BTreeMap::new();
        for row in rows {
            unique.entry(row.key).or_insert(row.columns);
        }
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let mut encoded = Vec::with_capacity(unique.len());
        for (key, columns) in unique {
            encoded.push((key, columns_to_json(&columns)?));
        }

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO wide_rows (table_name, row_key, columns) ");
        qb.push_values(&encoded, |mut row, (key, columns)| {
            row.push_bind(table).push_bind(key).push_bind(columns);
        });
        qb.push(" ON CONFLICT (table_name, row_key) DO NOTHING RETURNING row_key");

        qb.build_query_scalar::<Vec<u8>>()
            .fetch_all(&self.pool)
            .await
            .map_err(table_error)
    }

    async fn get(&self, table: &str, key: &[u8]) -> Result<Option<Columns>, WideColumnError> {
        let value = sqlx::query_scalar::<_, Value>(
            r#"
            SELECT columns FROM wide_rows WHERE table_name = $1 AND row_key = $2
            "#,
        )
        .bind(table)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(table_error)?;
        value.map(columns_from_json).transpose()
    }

    async fn scan(&self, table: &str, range: &ScanRange) -> Result<Vec<Row>, WideColumnError> {
        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT row_key, columns FROM wide_rows WHERE table_name = ");
        qb.push_bind(table);

        let (lower_op, upper_op, lower, upper) = if range.reverse {
            (" AND row_key > ", " AND row_key <= ", range.stop.clone(), range.start.clone())
        } else {
            (" AND row_key >= ", " AND row_key < ", range.start.clone(), range.stop.clone())
        };
        if let Some(lower) = lower {
            qb.push(lower_op).push_bind(lower);
        }
        if let Some(upper) = upper {
            qb.push(upper_op).push_bind(upper);
        }
        if let Some(prefix) = range.prefix.as_ref() {
            qb.push(" AND row_key >= ").push_bind(prefix.clone());
            if let Some(successor) = prefix_successor(prefix) {
                qb.push(" AND row_key < ").push_bind(successor);
            }
        }

        qb.push(if range.reverse {
            " ORDER BY row_key DESC"
        } else {
            " ORDER BY row_key ASC"
        });
        if let Some(limit) = range.limit {
            qb.push(" LIMIT ").push_bind(sql_limit(limit));
        }

        let rows: Vec<WideRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(table_error)?;
        rows.into_iter()
            .map(|row| {
                Ok(Row {
                    key: row.row_key,
                    columns: columns_from_json(row.columns)?,
                })
            })
            .collect()
    }

    async fn delete(&self, table: &str, key: &[u8]) -> Result<bool, WideColumnError> {
        let result = sqlx::query("DELETE FROM wide_rows WHERE table_name = $1 AND row_key = $2")
            .bind(table)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(table_error)?;
        Ok(result.rows_affected() > 0)
    }
}
