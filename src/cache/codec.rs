//! Tagged cache payloads for feed entries.
//!
//! A payload records which store produced the entry and carries that store's
//! own representation, so a single list can hold entries written before and
//! after a backend switch. The `format` tag selects the decoder.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::entities::FeedEntry;
use crate::domain::types::Backend;
use crate::wide::{NewsFeedRow, WideModel};

use super::error::CacheError;

pub const PAYLOAD_VERSION: u16 = 1;

const RELATIONAL_MODEL: &str = "newsfeeds.newsfeed";

#[derive(Debug, Deserialize)]
struct VersionProbe {
    v: u16,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u16,
    #[serde(flatten)]
    body: Body,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
enum Body {
    Relational {
        model: String,
        fields: FeedEntry,
    },
    WideColumn {
        table: String,
        row_key: String,
        columns: BTreeMap<String, String>,
    },
}

pub struct FeedEntryCodec;

impl FeedEntryCodec {
    pub fn encode(entry: &FeedEntry, backend: Backend) -> Result<Vec<u8>, CacheError> {
        let body = match backend {
            Backend::Relational => Body::Relational {
                model: RELATIONAL_MODEL.to_string(),
                fields: entry.clone(),
            },
            Backend::WideColumn => {
                let fields = NewsFeedRow::from(entry).to_fields();
                let schema = NewsFeedRow::SCHEMA;
                let row_key = schema
                    .row_key(&fields)
                    .map_err(|err| CacheError::Encode(err.to_string()))?;
                let columns = schema
                    .columns(&fields)
                    .map_err(|err| CacheError::Encode(err.to_string()))?
                    .into_iter()
                    .map(|(qualifier, value)| {
                        String::from_utf8(value)
                            .map(|value| (qualifier, value))
                            .map_err(|err| CacheError::Encode(err.to_string()))
                    })
                    .collect::<Result<_, _>>()?;
                Body::WideColumn {
                    table: schema.table_name.to_string(),
                    row_key: String::from_utf8(row_key)
                        .map_err(|err| CacheError::Encode(err.to_string()))?,
                    columns,
                }
            }
        };

        serde_json::to_vec(&Envelope {
            v: PAYLOAD_VERSION,
            body,
        })
        .map_err(|err| CacheError::Encode(err.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<FeedEntry, CacheError> {
        let probe: VersionProbe =
            serde_json::from_slice(bytes).map_err(|err| CacheError::Decode(err.to_string()))?;
        if probe.v > PAYLOAD_VERSION {
            return Err(CacheError::UnsupportedVersion(probe.v));
        }

        let envelope: Envelope =
            serde_json::from_slice(bytes).map_err(|err| CacheError::Decode(err.to_string()))?;
        if envelope.v == 0 {
            return Err(CacheError::UnsupportedVersion(envelope.v));
        }

        match envelope.body {
            Body::Relational { model, fields } => {
                if model != RELATIONAL_MODEL {
                    return Err(CacheError::UnknownModel(model));
                }
                Ok(fields)
            }
            Body::WideColumn {
                table,
                row_key,
                columns,
            } => {
                let schema = NewsFeedRow::SCHEMA;
                if table != schema.table_name {
                    return Err(CacheError::UnknownModel(table));
                }
                let columns = columns
                    .into_iter()
                    .map(|(qualifier, value)| (qualifier, value.into_bytes()))
                    .collect();
                let fields = schema
                    .decode_row(row_key.as_bytes(), &columns)
                    .map_err(|err| CacheError::Decode(err.to_string()))?;
                NewsFeedRow::from_fields(fields)
                    .map(FeedEntry::from)
                    .map_err(|err| CacheError::Decode(err.to_string()))
            }
        }
    }
}
