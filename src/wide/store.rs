//! Typed model operations over a [`SortedTable`].

use std::{collections::HashSet, marker::PhantomData, sync::Arc};

use tracing::debug;

use super::codec::{FieldSet, FieldValue};
use super::error::WideColumnError;
use super::schema::WideModel;
use super::table::{Row, ScanRange, SortedTable};

/// Scan request expressed in row-key field values.
///
/// `start`, `stop` and `prefix` are leading subsets of the row-key fields;
/// trailing fields are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub start: Option<Vec<FieldValue>>,
    pub stop: Option<Vec<FieldValue>>,
    pub prefix: Option<Vec<FieldValue>>,
    pub limit: Option<usize>,
    pub reverse: bool,
}

/// Outcome of one row in a batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written<M> {
    pub entity: M,
    /// False when the row key already existed and was overwritten.
    pub inserted: bool,
}

pub struct WideColumnStore<M> {
    table: Arc<dyn SortedTable>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for WideColumnStore<M> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            _model: PhantomData,
        }
    }
}

impl<M: WideModel> WideColumnStore<M> {
    pub fn new(table: Arc<dyn SortedTable>) -> Self {
        Self {
            table,
            _model: PhantomData,
        }
    }

    fn encode_row(fields: &FieldSet) -> Result<Row, WideColumnError> {
        Ok(Row {
            key: M::SCHEMA.row_key(fields)?,
            columns: M::SCHEMA.columns(fields)?,
        })
    }

    fn encode_bound(values: Option<&Vec<FieldValue>>) -> Result<Option<Vec<u8>>, WideColumnError> {
        let Some(values) = values else {
            return Ok(None);
        };
        let mut padded: Vec<Option<FieldValue>> = values.iter().cloned().map(Some).collect();
        padded.resize(M::SCHEMA.row_key.len().max(values.len()), None);
        M::SCHEMA.key_prefix(&padded).map(Some)
    }

    pub async fn create(&self, fields: FieldSet) -> Result<M, WideColumnError> {
        let row = Self::encode_row(&fields)?;
        self.table.put(M::SCHEMA.table_name, row).await?;
        M::from_fields(fields)
    }

    /// Encode a batch, keeping the first row for each key.
    ///
    /// Every row is encoded before anything is written, so a bad row key
    /// fails the whole batch without partial writes.
    fn encode_batch(batch: Vec<FieldSet>) -> Result<(Vec<Row>, Vec<(Vec<u8>, M)>), WideColumnError> {
        let mut rows = Vec::with_capacity(batch.len());
        let mut seen = HashSet::with_capacity(batch.len());
        let mut entities = Vec::with_capacity(batch.len());
        for fields in batch {
            let row = Self::encode_row(&fields)?;
            if !seen.insert(row.key.clone()) {
                continue;
            }
            entities.push((row.key.clone(), M::from_fields(fields)?));
            rows.push(row);
        }
        Ok((rows, entities))
    }

    fn written(entities: Vec<(Vec<u8>, M)>, inserted: Vec<Vec<u8>>) -> Vec<Written<M>> {
        let inserted: HashSet<Vec<u8>> = inserted.into_iter().collect();
        entities
            .into_iter()
            .map(|(key, entity)| Written {
                inserted: inserted.contains(&key),
                entity,
            })
            .collect()
    }

    /// Write all rows with a single table call, overwriting existing keys.
    pub async fn batch_create(
        &self,
        batch: Vec<FieldSet>,
    ) -> Result<Vec<Written<M>>, WideColumnError> {
        let (rows, entities) = Self::encode_batch(batch)?;
        let inserted = self.table.put_batch(M::SCHEMA.table_name, rows).await?;

        debug!(
            target = "feedline::wide::store",
            table = M::SCHEMA.table_name,
            rows = entities.len(),
            inserted = inserted.len(),
            "batch written"
        );
        Ok(Self::written(entities, inserted))
    }

    /// Write only the rows whose keys are absent, with a single table call.
    ///
    /// A row reported as not inserted carries the proposed values, not the
    /// stored ones.
    pub async fn batch_create_absent(
        &self,
        batch: Vec<FieldSet>,
    ) -> Result<Vec<Written<M>>, WideColumnError> {
        let (rows, entities) = Self::encode_batch(batch)?;
        let inserted = self
            .table
            .put_absent_batch(M::SCHEMA.table_name, rows)
            .await?;
        Ok(Self::written(entities, inserted))
    }

    pub async fn get(&self, key_fields: &FieldSet) -> Result<Option<M>, WideColumnError> {
        let key = M::SCHEMA.row_key(key_fields)?;
        let Some(columns) = self.table.get(M::SCHEMA.table_name, &key).await? else {
            return Ok(None);
        };
        if columns.is_empty() {
            return Ok(None);
        }
        let fields = M::SCHEMA.decode_row(&key, &columns)?;
        M::from_fields(fields).map(Some)
    }

    pub async fn filter(&self, filter: &Filter) -> Result<Vec<M>, WideColumnError> {
        let range = ScanRange {
            start: Self::encode_bound(filter.start.as_ref())?,
            stop: Self::encode_bound(filter.stop.as_ref())?,
            prefix: Self::encode_bound(filter.prefix.as_ref())?,
            limit: filter.limit,
            reverse: filter.reverse,
        };

        self.table
            .scan(M::SCHEMA.table_name, &range)
            .await?
            .into_iter()
            .map(|row| {
                let fields = M::SCHEMA.decode_row(&row.key, &row.columns)?;
                M::from_fields(fields)
            })
            .collect()
    }

    pub async fn delete(&self, key_fields: &FieldSet) -> Result<bool, WideColumnError> {
        let key = M::SCHEMA.row_key(key_fields)?;
        self.table.delete(M::SCHEMA.table_name, &key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::MemoryTable;
    use crate::wide::NewsFeedRow;

    fn store() -> WideColumnStore<NewsFeedRow> {
        WideColumnStore::new(Arc::new(MemoryTable::new()))
    }

    fn row(user_id: i64, micros: i64, content_id: i64) -> FieldSet {
        FieldSet::new()
            .with("user_id", user_id)
            .with("created_at", micros)
            .with("content_id", content_id)
    }

    #[tokio::test]
    async fn create_without_columns_is_rejected() {
        let err = store()
            .create(FieldSet::new().with("user_id", 1).with("created_at", 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WideColumnError::EmptyColumn { table: "newsfeeds" }
        ));
    }

    #[tokio::test]
    async fn batch_rerun_reports_nothing_inserted() {
        let store = store();
        let batch = vec![row(7, 1_000, 1), row(8, 1_000, 1)];

        let first = store.batch_create(batch.clone()).await.unwrap();
        assert!(first.iter().all(|written| written.inserted));

        let again = store.batch_create(batch).await.unwrap();
        assert_eq!(again.len(), 2);
        assert!(again.iter().all(|written| !written.inserted));
    }

    #[tokio::test]
    async fn absent_batch_leaves_existing_rows_alone() {
        let store = store();
        store.create(row(7, 1_000, 1)).await.unwrap();

        let written = store
            .batch_create_absent(vec![row(7, 1_000, 2), row(7, 2_000, 3)])
            .await
            .unwrap();

        let inserted: Vec<bool> = written.iter().map(|written| written.inserted).collect();
        assert_eq!(inserted, vec![false, true]);
        let key = FieldSet::new().with("user_id", 7).with("created_at", 1_000);
        assert_eq!(store.get(&key).await.unwrap().unwrap().content_id, 1);
    }

    #[tokio::test]
    async fn reverse_prefix_scan_returns_one_owner_newest_first() {
        let store = store();
        store
            .batch_create(vec![
                row(7, 1_000, 1),
                row(7, 2_000, 2),
                row(7, 3_000, 3),
                row(8, 2_500, 9),
            ])
            .await
            .unwrap();

        let rows = store
            .filter(&Filter {
                prefix: Some(vec![FieldValue::Int(7)]),
                limit: Some(2),
                reverse: true,
                ..Filter::default()
            })
            .await
            .unwrap();

        let contents: Vec<i64> = rows.iter().map(|row| row.content_id).collect();
        assert_eq!(contents, vec![3, 2]);
        assert!(rows.iter().all(|row| row.user_id == 7));
    }

    #[tokio::test]
    async fn get_and_delete_by_row_key() {
        let store = store();
        store.create(row(5, 4_000, 44)).await.unwrap();
        let key = FieldSet::new().with("user_id", 5).with("created_at", 4_000);

        let found = store.get(&key).await.unwrap().unwrap();
        assert_eq!(found.content_id, 44);

        assert!(store.delete(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(!store.delete(&key).await.unwrap());
    }
}
