//! Microsecond timestamp helpers.
//!
//! Feed ordering, wide-column row keys and relational columns all work at
//! microsecond precision, so every timestamp entering the system is truncated
//! once with [`truncate_micros`].

use time::OffsetDateTime;
use time::format_description::well_known::Iso8601;

use super::error::DomainError;

pub fn truncate_micros(value: OffsetDateTime) -> OffsetDateTime {
    let micros = value.microsecond();
    value
        .replace_microsecond(micros)
        .unwrap_or(value)
        .to_offset(time::UtcOffset::UTC)
}

pub fn to_micros(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000) as i64
}

pub fn from_micros(micros: i64) -> Result<OffsetDateTime, DomainError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
        .map_err(|_| DomainError::TimestampOutOfRange { micros })
}

/// Parse a client-supplied ISO-8601 timestamp.
pub fn parse_iso8601(raw: &str) -> Result<OffsetDateTime, DomainError> {
    OffsetDateTime::parse(raw.trim(), &Iso8601::DEFAULT)
        .map(truncate_micros)
        .map_err(|err| DomainError::InvalidTimestamp {
            raw: raw.to_string(),
            reason: err.to_string(),
        })
}
