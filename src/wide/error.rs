use thiserror::Error;

#[derive(Debug, Error)]
pub enum WideColumnError {
    #[error("bad row key: {0}")]
    BadRowKey(String),
    #[error("no column data to store in `{table}`")]
    EmptyColumn { table: &'static str },
    #[error("failed to decode row: {0}")]
    Decode(String),
    #[error("sorted table error: {0}")]
    Table(String),
}

impl WideColumnError {
    pub fn bad_row_key(message: impl Into<String>) -> Self {
        Self::BadRowKey(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn table(err: impl std::fmt::Display) -> Self {
        Self::Table(err.to_string())
    }
}
