//! Per-entity table declarations.

use super::codec::{FieldSet, FieldSpec, FieldValue, RowKeyCodec};
use super::error::WideColumnError;
use super::table::Columns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub family: &'static str,
    pub field: FieldSpec,
}

impl ColumnSpec {
    pub const fn new(family: &'static str, field: FieldSpec) -> Self {
        Self { family, field }
    }

    fn qualifier(&self) -> String {
        format!("{}:{}", self.family, self.field.name)
    }
}

/// Row-key and column layout of one wide-column entity type.
///
/// Row-key field order matters: leading fields are matched exactly, the
/// trailing field supports range scans.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub table_name: &'static str,
    pub row_key: &'static [FieldSpec],
    pub columns: &'static [ColumnSpec],
}

impl TableSchema {
    pub fn row_key(&self, fields: &FieldSet) -> Result<Vec<u8>, WideColumnError> {
        RowKeyCodec::encode(self.row_key, fields)
    }

    pub fn key_prefix(&self, values: &[Option<FieldValue>]) -> Result<Vec<u8>, WideColumnError> {
        RowKeyCodec::encode_prefix(self.row_key, values)
    }

    /// Encode the non-key fields present in `fields`.
    pub fn columns(&self, fields: &FieldSet) -> Result<Columns, WideColumnError> {
        let mut columns = Columns::new();
        for column in self.columns {
            let Some(value) = fields.get(column.field.name) else {
                continue;
            };
            let encoded = RowKeyCodec::encode_value(&column.field, value)?;
            columns.insert(column.qualifier(), encoded.into_bytes());
        }

        if columns.is_empty() {
            return Err(WideColumnError::EmptyColumn {
                table: self.table_name,
            });
        }
        Ok(columns)
    }

    pub fn decode_row(&self, key: &[u8], columns: &Columns) -> Result<FieldSet, WideColumnError> {
        let mut fields = RowKeyCodec::decode(self.row_key, key)?;
        for (qualifier, raw) in columns {
            let Some(column) = self
                .columns
                .iter()
                .find(|column| column.qualifier() == *qualifier)
            else {
                continue;
            };
            let raw = std::str::from_utf8(raw).map_err(|err| {
                WideColumnError::decode(format!("column `{qualifier}` is not utf-8: {err}"))
            })?;
            fields.insert(
                column.field.name,
                RowKeyCodec::decode_value(&column.field, raw)?,
            );
        }
        Ok(fields)
    }
}

/// A typed entity stored through [`super::WideColumnStore`].
pub trait WideModel: Sized + Send + Sync {
    const SCHEMA: TableSchema;

    fn to_fields(&self) -> FieldSet;

    fn from_fields(fields: FieldSet) -> Result<Self, WideColumnError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: TableSchema = TableSchema {
        table_name: "followings",
        row_key: &[
            FieldSpec::integer("from_user_id").reversed(),
            FieldSpec::timestamp("created_at"),
        ],
        columns: &[ColumnSpec::new("cf", FieldSpec::integer("to_user_id"))],
    };

    #[test]
    fn columns_use_family_qualifiers() {
        let fields = FieldSet::new()
            .with("from_user_id", 1)
            .with("created_at", 5)
            .with("to_user_id", 2);
        let columns = SCHEMA.columns(&fields).unwrap();
        assert_eq!(
            columns.get("cf:to_user_id").map(Vec::as_slice),
            Some(b"0000000000000002".as_slice())
        );
        assert_eq!(columns.len(), 1);
    }

    #[test]
    fn missing_column_data_is_rejected() {
        let fields = FieldSet::new().with("from_user_id", 1).with("created_at", 5);
        let err = SCHEMA.columns(&fields).unwrap_err();
        assert!(matches!(
            err,
            WideColumnError::EmptyColumn {
                table: "followings"
            }
        ));
    }

    #[test]
    fn decode_row_merges_key_and_columns() {
        let fields = FieldSet::new()
            .with("from_user_id", 31)
            .with("created_at", 9)
            .with("to_user_id", 4);
        let key = SCHEMA.row_key(&fields).unwrap();
        let columns = SCHEMA.columns(&fields).unwrap();
        assert_eq!(SCHEMA.decode_row(&key, &columns).unwrap(), fields);
    }
}
