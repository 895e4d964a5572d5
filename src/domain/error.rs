use thiserror::Error;

/// Values rejected when they enter the domain.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid timestamp `{raw}`: {reason}")]
    InvalidTimestamp { raw: String, reason: String },
    #[error("timestamp of {micros} microseconds is outside the supported range")]
    TimestampOutOfRange { micros: i64 },
}
