use std::{
    collections::{BTreeMap, HashMap, btree_map::Entry},
    ops::Bound,
    sync::RwLock,
};

use async_trait::async_trait;

use crate::cache::lock::{rw_read, rw_write};
use crate::wide::{Columns, Row, ScanRange, SortedTable, WideColumnError, prefix_successor};

const SOURCE: &str = "infra::memory::table";

/// Sorted tables held in `BTreeMap`s, one per table name.
#[derive(Default)]
pub struct MemoryTable {
    tables: RwLock<HashMap<String, BTreeMap<Vec<u8>, Columns>>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self, table: &str) -> usize {
        rw_read(&self.tables, SOURCE, "len")
            .get(table)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

fn candidate_bounds(range: &ScanRange) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    match range.prefix.as_ref() {
        Some(prefix) => (
            Bound::Included(prefix.clone()),
            prefix_successor(prefix).map_or(Bound::Unbounded, Bound::Excluded),
        ),
        None => (Bound::Unbounded, Bound::Unbounded),
    }
}

#[async_trait]
impl SortedTable for MemoryTable {
    async fn put(&self, table: &str, row: Row) -> Result<(), WideColumnError> {
        rw_write(&self.tables, SOURCE, "put")
            .entry(table.to_string())
            .or_default()
            .insert(row.key, row.columns);
        Ok(())
    }

    async fn put_batch(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Vec<u8>>, WideColumnError> {
        let mut tables = rw_write(&self.tables, SOURCE, "put_batch");
        let rows_by_key = tables.entry(table.to_string()).or_default();
        let mut inserted = Vec::new();
        for row in rows {
            let key = row.key.clone();
            if rows_by_key.insert(row.key, row.columns).is_none() {
                inserted.push(key);
            }
        }
        Ok(inserted)
    }

    async fn put_absent_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
    ) -> Result<Vec<Vec<u8>>, WideColumnError> {
        let mut tables = rw_write(&self.tables, SOURCE, "put_absent_batch");
        let rows_by_key = tables.entry(table.to_string()).or_default();
        let mut written = Vec::new();
        for row in rows {
            if let Entry::Vacant(slot) = rows_by_key.entry(row.key) {
                written.push(slot.key().clone());
                slot.insert(row.columns);
            }
        }
        Ok(written)
    }

    async fn get(&self, table: &str, key: &[u8]) -> Result<Option<Columns>, WideColumnError> {
        Ok(rw_read(&self.tables, SOURCE, "get")
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned())
    }

    async fn scan(&self, table: &str, range: &ScanRange) -> Result<Vec<Row>, WideColumnError> {
        let tables = rw_read(&self.tables, SOURCE, "scan");
        let Some(rows) = tables.get(table) else {
            return Ok(Vec::new());
        };

        let candidates = rows
            .range(candidate_bounds(range))
            .filter(|(key, _)| range.contains(key));
        let limit = range.limit.unwrap_or(usize::MAX);
        let to_row = |(key, columns): (&Vec<u8>, &Columns)| Row {
            key: key.clone(),
            columns: columns.clone(),
        };

        Ok(if range.reverse {
            candidates.rev().take(limit).map(to_row).collect()
        } else {
            candidates.take(limit).map(to_row).collect()
        })
    }

    async fn delete(&self, table: &str, key: &[u8]) -> Result<bool, WideColumnError> {
        Ok(rw_write(&self.tables, SOURCE, "delete")
            .get_mut(table)
            .is_some_and(|rows| rows.remove(key).is_some()))
    }
}
