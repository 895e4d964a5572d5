//! Sorted key-value table seam.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::error::WideColumnError;

/// Column values keyed by `family:field`.
pub type Columns = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: Vec<u8>,
    pub columns: Columns,
}

/// Byte-range scan parameters.
///
/// Forward scans include `start` and exclude `stop`. Reverse scans walk
/// downwards from `start` (inclusive, the upper key) and stop before `stop`
/// (exclusive, the lower key). `prefix` restricts results to keys beginning
/// with it in both directions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRange {
    pub start: Option<Vec<u8>>,
    pub stop: Option<Vec<u8>>,
    pub prefix: Option<Vec<u8>>,
    pub limit: Option<usize>,
    pub reverse: bool,
}

impl ScanRange {
    /// Whether `key` lies inside the range, ignoring `limit`.
    pub fn contains(&self, key: &[u8]) -> bool {
        if let Some(prefix) = self.prefix.as_deref()
            && !key.starts_with(prefix)
        {
            return false;
        }

        let (upper_inclusive, lower_exclusive, lower_inclusive, upper_exclusive) = if self.reverse {
            (self.start.as_deref(), self.stop.as_deref(), None, None)
        } else {
            (None, None, self.start.as_deref(), self.stop.as_deref())
        };

        if let Some(bound) = lower_inclusive
            && key < bound
        {
            return false;
        }
        if let Some(bound) = upper_exclusive
            && key >= bound
        {
            return false;
        }
        if let Some(bound) = upper_inclusive
            && key > bound
        {
            return false;
        }
        if let Some(bound) = lower_exclusive
            && key <= bound
        {
            return false;
        }
        true
    }
}

/// Smallest key greater than every key starting with `prefix`, if one exists.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bytes = prefix.to_vec();
    while let Some(last) = bytes.pop() {
        if last < u8::MAX {
            bytes.push(last + 1);
            return Some(bytes);
        }
    }
    None
}

/// A sorted table addressed by byte-string row keys.
#[async_trait]
pub trait SortedTable: Send + Sync {
    async fn put(&self, table: &str, row: Row) -> Result<(), WideColumnError>;

    /// Write every row in one round trip, returning the keys that did not exist before.
    async fn put_batch(&self, table: &str, rows: Vec<Row>) -> Result<Vec<Vec<u8>>, WideColumnError>;

    /// Write the rows whose keys are absent in one round trip, leaving existing
    /// rows untouched. Returns the keys written.
    async fn put_absent_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
    ) -> Result<Vec<Vec<u8>>, WideColumnError>;

    async fn get(&self, table: &str, key: &[u8]) -> Result<Option<Columns>, WideColumnError>;

    async fn scan(&self, table: &str, range: &ScanRange) -> Result<Vec<Row>, WideColumnError>;

    /// Returns whether a row was removed.
    async fn delete(&self, table: &str, key: &[u8]) -> Result<bool, WideColumnError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_range_is_half_open() {
        let range = ScanRange {
            start: Some(b"b".to_vec()),
            stop: Some(b"d".to_vec()),
            ..ScanRange::default()
        };
        assert!(!range.contains(b"a"));
        assert!(range.contains(b"b"));
        assert!(range.contains(b"c"));
        assert!(!range.contains(b"d"));
    }

    #[test]
    fn reverse_range_includes_start_and_excludes_stop() {
        let range = ScanRange {
            start: Some(b"d".to_vec()),
            stop: Some(b"b".to_vec()),
            reverse: true,
            ..ScanRange::default()
        };
        assert!(range.contains(b"d"));
        assert!(range.contains(b"c"));
        assert!(!range.contains(b"b"));
        assert!(!range.contains(b"e"));
    }

    #[test]
    fn prefix_filters_both_directions() {
        let range = ScanRange {
            prefix: Some(b"12:".to_vec()),
            reverse: true,
            ..ScanRange::default()
        };
        assert!(range.contains(b"12:5"));
        assert!(!range.contains(b"13:5"));
    }

    #[test]
    fn successor_skips_saturated_bytes() {
        assert_eq!(prefix_successor(b"ab:"), Some(b"ab;".to_vec()));
        assert_eq!(prefix_successor(&[b'a', 0xff]), Some(b"b".to_vec()));
        assert_eq!(prefix_successor(&[0xff, 0xff]), None);
    }
}
