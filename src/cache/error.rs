use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to encode cache payload: {0}")]
    Encode(String),
    #[error("failed to decode cache payload: {0}")]
    Decode(String),
    #[error("unsupported cache payload version {0}")]
    UnsupportedVersion(u16),
    #[error("no decoder registered for `{0}`")]
    UnknownModel(String),
    #[error("key `{key}` holds a value of the wrong type")]
    WrongType { key: String },
    #[error("list store unavailable: {0}")]
    Unavailable(String),
}
