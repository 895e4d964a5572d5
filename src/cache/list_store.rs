//! Atomic list and counter store backing the feed cache.

use std::{
    collections::VecDeque,
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use lru::LruCache;

use super::config::FeedCacheConfig;
use super::error::CacheError;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::list_store";
const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 3600);

/// List member ordered by `score`, highest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredItem {
    pub score: i64,
    pub payload: Vec<u8>,
}

impl ScoredItem {
    pub fn new(score: i64, payload: Vec<u8>) -> Self {
        Self { score, payload }
    }
}

/// Shared list store.
///
/// Lists are kept in descending score order, so trimming always drops the
/// lowest scores. Every method is a single atomic operation on one key;
/// callers get no other synchronisation.
#[async_trait]
pub trait ListStore: Send + Sync {
    /// All payloads of the list at `key`, highest score first, or `None` when
    /// the key is absent.
    async fn range(&self, key: &str) -> Result<Option<Vec<Vec<u8>>>, CacheError>;

    /// Replace the list at `key` with `items` and set its time-to-live.
    async fn replace(
        &self,
        key: &str,
        items: Vec<ScoredItem>,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Insert `item` into an existing list at its score position and trim the
    /// list to `max_len` items. A payload already in the list is left alone.
    ///
    /// Returns false without writing when no list exists at `key`.
    async fn insert_existing(
        &self,
        key: &str,
        item: ScoredItem,
        max_len: usize,
    ) -> Result<bool, CacheError>;

    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Atomically add `delta` to the counter at `key`, creating it at zero.
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError>;

    async fn counter(&self, key: &str) -> Result<Option<i64>, CacheError>;
}

enum Slot {
    List {
        items: VecDeque<ScoredItem>,
        expires_at: Instant,
    },
    Counter(i64),
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        match self {
            Slot::List { expires_at, .. } => now >= *expires_at,
            Slot::Counter(_) => false,
        }
    }
}

/// In-process list store with LRU eviction across keys.
pub struct MemoryListStore {
    slots: Mutex<LruCache<String, Slot>>,
}

impl MemoryListStore {
    pub fn new(config: &FeedCacheConfig) -> Self {
        Self {
            slots: Mutex::new(LruCache::new(config.max_keys_non_zero())),
        }
    }

    fn evict_if_expired(slots: &mut LruCache<String, Slot>, key: &str) {
        if slots
            .peek(key)
            .is_some_and(|slot| slot.is_expired(Instant::now()))
        {
            slots.pop(key);
        }
    }
}

#[async_trait]
impl ListStore for MemoryListStore {
    async fn range(&self, key: &str) -> Result<Option<Vec<Vec<u8>>>, CacheError> {
        let mut slots = mutex_lock(&self.slots, SOURCE, "range");
        Self::evict_if_expired(&mut slots, key);
        match slots.get(key) {
            None => Ok(None),
            Some(Slot::List { items, .. }) => {
                Ok(Some(items.iter().map(|item| item.payload.clone()).collect()))
            }
            Some(Slot::Counter(_)) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn replace(
        &self,
        key: &str,
        mut items: Vec<ScoredItem>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        items.sort_by(|a, b| b.score.cmp(&a.score));
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + MAX_TTL);
        let mut slots = mutex_lock(&self.slots, SOURCE, "replace");
        slots.put(
            key.to_string(),
            Slot::List {
                items: items.into(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn insert_existing(
        &self,
        key: &str,
        item: ScoredItem,
        max_len: usize,
    ) -> Result<bool, CacheError> {
        let mut slots = mutex_lock(&self.slots, SOURCE, "insert_existing");
        Self::evict_if_expired(&mut slots, key);
        match slots.get_mut(key) {
            None => Ok(false),
            Some(Slot::List { items, .. }) => {
                if items.iter().any(|existing| existing.payload == item.payload) {
                    return Ok(true);
                }
                let at = items.partition_point(|existing| existing.score >= item.score);
                items.insert(at, item);
                items.truncate(max_len);
                Ok(true)
            }
            Some(Slot::Counter(_)) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut slots = mutex_lock(&self.slots, SOURCE, "delete");
        Ok(slots.pop(key).is_some())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let mut slots = mutex_lock(&self.slots, SOURCE, "incr_by");
        match slots.get_mut(key) {
            Some(Slot::Counter(value)) => {
                *value += delta;
                Ok(*value)
            }
            Some(Slot::List { .. }) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
            None => {
                slots.put(key.to_string(), Slot::Counter(delta));
                Ok(delta)
            }
        }
    }

    async fn counter(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let mut slots = mutex_lock(&self.slots, SOURCE, "counter");
        match slots.get(key) {
            None => Ok(None),
            Some(Slot::Counter(value)) => Ok(Some(*value)),
            Some(Slot::List { .. }) => Err(CacheError::WrongType {
                key: key.to_string(),
            }),
        }
    }
}
