//! Order-preserving row-key codec.
//!
//! Integers and timestamps are written as zero-padded decimal strings of
//! [`FIELD_WIDTH`] digits, so byte order equals numeric order. A reversed field
//! has its padded digits written back to front, which scatters sequential ids
//! across the keyspace at the cost of range queries on that field.

use std::collections::BTreeMap;

use super::error::WideColumnError;

pub const DELIMITER: u8 = b':';
pub const FIELD_WIDTH: usize = 16;

/// Largest integer a row-key field can hold.
pub const MAX_ENCODABLE: i64 = 9_999_999_999_999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    /// Microseconds since the Unix epoch.
    Timestamp,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub reverse: bool,
}

impl FieldSpec {
    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Integer,
            reverse: false,
        }
    }

    pub const fn timestamp(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Timestamp,
            reverse: false,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            reverse: false,
        }
    }

    pub const fn reversed(self) -> Self {
        Self {
            reverse: true,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Named field values of one wide-column entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet(BTreeMap<String, FieldValue>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<FieldValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn int(&self, name: &str) -> Result<i64, WideColumnError> {
        match self.0.get(name) {
            Some(FieldValue::Int(value)) => Ok(*value),
            Some(FieldValue::Text(_)) => Err(WideColumnError::decode(format!(
                "field `{name}` is not an integer"
            ))),
            None => Err(WideColumnError::decode(format!("field `{name}` is missing"))),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Stateless encoder for row keys and column values.
pub struct RowKeyCodec;

impl RowKeyCodec {
    /// Encode a single field value.
    pub fn encode_value(spec: &FieldSpec, value: &FieldValue) -> Result<String, WideColumnError> {
        let encoded = match (spec.kind, value) {
            (FieldKind::Integer | FieldKind::Timestamp, FieldValue::Int(number)) => {
                if !(0..=MAX_ENCODABLE).contains(number) {
                    return Err(WideColumnError::bad_row_key(format!(
                        "`{}` value {number} does not fit {FIELD_WIDTH} digits",
                        spec.name
                    )));
                }
                format!("{number:0width$}", width = FIELD_WIDTH)
            }
            (FieldKind::Text, FieldValue::Text(text)) => text.clone(),
            _ => {
                return Err(WideColumnError::bad_row_key(format!(
                    "`{}` has the wrong value type",
                    spec.name
                )));
            }
        };

        if encoded.as_bytes().contains(&DELIMITER) {
            return Err(WideColumnError::bad_row_key(format!(
                "`{}` should not contain `:` in value: {encoded}",
                spec.name
            )));
        }

        Ok(if spec.reverse {
            encoded.chars().rev().collect()
        } else {
            encoded
        })
    }

    /// Decode a single field value, undoing reversal and padding.
    pub fn decode_value(spec: &FieldSpec, raw: &str) -> Result<FieldValue, WideColumnError> {
        let ordered: String = if spec.reverse {
            raw.chars().rev().collect()
        } else {
            raw.to_string()
        };

        match spec.kind {
            FieldKind::Integer | FieldKind::Timestamp => ordered
                .parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|err| {
                    WideColumnError::decode(format!("`{}` value `{raw}`: {err}", spec.name))
                }),
            FieldKind::Text => Ok(FieldValue::Text(ordered)),
        }
    }

    /// Encode every field of `specs` into a full row key.
    pub fn encode(specs: &[FieldSpec], fields: &FieldSet) -> Result<Vec<u8>, WideColumnError> {
        let mut parts = Vec::with_capacity(specs.len());
        for spec in specs {
            let value = fields
                .get(spec.name)
                .ok_or_else(|| WideColumnError::bad_row_key(format!("missing row key: {}", spec.name)))?;
            parts.push(Self::encode_value(spec, value)?);
        }
        Ok(parts.join(":").into_bytes())
    }

    /// Encode a leading subset of the row-key fields for range scans.
    ///
    /// Encoding stops at the first `None`. A truncated key ends with the
    /// delimiter so that it only matches complete leading fields.
    pub fn encode_prefix(
        specs: &[FieldSpec],
        values: &[Option<FieldValue>],
    ) -> Result<Vec<u8>, WideColumnError> {
        if values.len() > specs.len() {
            return Err(WideColumnError::bad_row_key(format!(
                "{} values supplied for a {}-field row key",
                values.len(),
                specs.len()
            )));
        }

        let mut parts = Vec::new();
        for (spec, value) in specs.iter().zip(values) {
            match value {
                Some(value) => parts.push(Self::encode_value(spec, value)?),
                None => break,
            }
        }

        let mut key = parts.join(":").into_bytes();
        if !parts.is_empty() && parts.len() < specs.len() {
            key.push(DELIMITER);
        }
        Ok(key)
    }

    pub fn decode(specs: &[FieldSpec], key: &[u8]) -> Result<FieldSet, WideColumnError> {
        let text = std::str::from_utf8(key)
            .map_err(|err| WideColumnError::decode(format!("row key is not utf-8: {err}")))?;
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != specs.len() {
            return Err(WideColumnError::decode(format!(
                "row key `{text}` has {} fields, expected {}",
                parts.len(),
                specs.len()
            )));
        }

        let mut fields = FieldSet::new();
        for (spec, raw) in specs.iter().zip(parts) {
            fields.insert(spec.name, Self::decode_value(spec, raw)?);
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED_KEY: [FieldSpec; 2] = [
        FieldSpec::integer("user_id").reversed(),
        FieldSpec::timestamp("created_at"),
    ];

    #[test]
    fn integers_are_zero_padded() {
        let encoded =
            RowKeyCodec::encode_value(&FieldSpec::integer("id"), &FieldValue::Int(123)).unwrap();
        assert_eq!(encoded, "0000000000000123");
    }

    #[test]
    fn reversed_fields_flip_the_padded_digits() {
        let encoded = RowKeyCodec::encode_value(
            &FieldSpec::integer("id").reversed(),
            &FieldValue::Int(123),
        )
        .unwrap();
        assert_eq!(encoded, "3210000000000000");
    }

    #[test]
    fn padded_order_matches_numeric_order() {
        let spec = FieldSpec::timestamp("created_at");
        let mut values = vec![10, 9, 100, 2, 1_000_000];
        let mut encoded: Vec<String> = values
            .iter()
            .map(|value| RowKeyCodec::encode_value(&spec, &FieldValue::Int(*value)).unwrap())
            .collect();
        values.sort();
        encoded.sort();
        let decoded: Vec<i64> = encoded
            .iter()
            .map(|raw| match RowKeyCodec::decode_value(&spec, raw).unwrap() {
                FieldValue::Int(value) => value,
                FieldValue::Text(_) => unreachable!(),
            })
            .collect();
        assert_eq!(decoded, values);
    }

    #[test]
    fn full_key_round_trips() {
        let fields = FieldSet::new()
            .with("user_id", 42)
            .with("created_at", 1_687_940_380_899_457);
        let key = RowKeyCodec::encode(&FEED_KEY, &fields).unwrap();
        assert_eq!(key, b"2400000000000000:1687940380899457".to_vec());
        assert_eq!(RowKeyCodec::decode(&FEED_KEY, &key).unwrap(), fields);
    }

    #[test]
    fn missing_field_is_a_bad_row_key() {
        let fields = FieldSet::new().with("user_id", 42);
        let err = RowKeyCodec::encode(&FEED_KEY, &fields).unwrap_err();
        assert!(matches!(err, WideColumnError::BadRowKey(_)));
    }

    #[test]
    fn delimiter_in_text_is_rejected() {
        let err = RowKeyCodec::encode_value(&FieldSpec::text("name"), &"a:b".into()).unwrap_err();
        assert!(matches!(err, WideColumnError::BadRowKey(_)));
    }

    #[test]
    fn out_of_range_integers_are_rejected() {
        let spec = FieldSpec::integer("id");
        assert!(RowKeyCodec::encode_value(&spec, &FieldValue::Int(-1)).is_err());
        assert!(RowKeyCodec::encode_value(&spec, &FieldValue::Int(MAX_ENCODABLE + 1)).is_err());
    }

    #[test]
    fn prefix_stops_at_first_missing_field() {
        let prefix = RowKeyCodec::encode_prefix(&FEED_KEY, &[Some(FieldValue::Int(42)), None])
            .unwrap();
        assert_eq!(prefix, b"2400000000000000:".to_vec());

        let full = RowKeyCodec::encode_prefix(
            &FEED_KEY,
            &[Some(FieldValue::Int(42)), Some(FieldValue::Int(7))],
        )
        .unwrap();
        assert_eq!(full, b"2400000000000000:0000000000000007".to_vec());
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        let err = RowKeyCodec::decode(&FEED_KEY, b"2400000000000000").unwrap_err();
        assert!(matches!(err, WideColumnError::Decode(_)));
    }
}
