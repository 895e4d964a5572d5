//! Feed cache configuration.

use std::{num::NonZeroUsize, time::Duration};

const DEFAULT_LIST_LENGTH_LIMIT: usize = 200;
const DEFAULT_KEY_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
const DEFAULT_MAX_KEYS: usize = 100_000;

#[derive(Debug, Clone)]
pub struct FeedCacheConfig {
    /// Maximum entries kept in one owner's list.
    pub list_length_limit: usize,
    /// Lifetime of a populated list.
    pub key_ttl: Duration,
    /// Maximum number of keys held by the in-process list store.
    pub max_keys: usize,
}

impl Default for FeedCacheConfig {
    fn default() -> Self {
        Self {
            list_length_limit: DEFAULT_LIST_LENGTH_LIMIT,
            key_ttl: DEFAULT_KEY_TTL,
            max_keys: DEFAULT_MAX_KEYS,
        }
    }
}

impl From<&crate::config::CacheSettings> for FeedCacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            list_length_limit: settings.list_length_limit.get() as usize,
            key_ttl: settings.key_ttl,
            max_keys: settings.max_keys.get() as usize,
        }
    }
}

impl FeedCacheConfig {
    /// Returns the list length limit, clamping to 1 if zero.
    pub fn list_length_limit(&self) -> usize {
        self.list_length_limit.max(1)
    }

    /// Returns the key capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn max_keys_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_keys).unwrap_or(NonZeroUsize::MIN)
    }
}
