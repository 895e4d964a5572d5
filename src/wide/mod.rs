//! Wide-column model layer.
//!
//! Entities are stored in a [`SortedTable`] under an order-preserving row key
//! built by [`RowKeyCodec`]. Row-key fields support `==` lookups on leading
//! fields and range scans on the trailing one; every other field is stored as a
//! `family:field` column.

mod codec;
mod error;
mod models;
mod schema;
mod store;
mod table;

pub use codec::{
    DELIMITER, FIELD_WIDTH, FieldKind, FieldSet, FieldSpec, FieldValue, MAX_ENCODABLE, RowKeyCodec,
};
pub use error::WideColumnError;
pub use models::{FollowerRow, FollowingRow, NewsFeedContentRow, NewsFeedRow};
pub use schema::{ColumnSpec, TableSchema, WideModel};
pub use store::{Filter, WideColumnStore, Written};
pub use table::{Columns, Row, ScanRange, SortedTable, prefix_successor};
