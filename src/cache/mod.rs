//! Feed cache.
//!
//! Each owner's most recent feed entries live in a bounded list inside a
//! shared [`ListStore`]. Lists are filled lazily from the store of record on
//! the first read or push, kept in `created_at` order as fanout writes land,
//! and trimmed to the configured length.
//!
//! ```toml
//! [cache]
//! list_length_limit = 200
//! key_ttl_seconds = 604800
//! max_keys = 100000
//! ```

mod codec;
mod config;
mod counters;
mod error;
mod feed_cache;
mod keys;
pub(crate) mod lock;
mod list_store;

pub use codec::{FeedEntryCodec, PAYLOAD_VERSION};
pub use config::FeedCacheConfig;
pub use counters::CounterCache;
pub use error::CacheError;
pub use feed_cache::{FeedCache, RecentLoader};
pub use keys::CacheKey;
pub use list_store::{ListStore, MemoryListStore, ScoredItem};

pub(crate) const METRIC_CACHE_HIT: &str = "feedline_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "feedline_cache_miss_total";
pub(crate) const METRIC_CACHE_ERROR: &str = "feedline_cache_error_total";
