//! Bounded per-owner feed lists.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};

use crate::application::repos::RepoError;
use crate::domain::entities::FeedEntry;
use crate::domain::timestamps::to_micros;
use crate::domain::types::Backend;

use super::codec::FeedEntryCodec;
use super::config::FeedCacheConfig;
use super::error::CacheError;
use super::keys::CacheKey;
use super::list_store::{ListStore, ScoredItem};
use super::{METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS};

/// Loads an owner's most recent entries from the store of record.
#[async_trait]
pub trait RecentLoader: Send + Sync {
    fn backend(&self) -> Backend;

    /// Up to `limit` entries, newest first.
    async fn load_recent(&self, owner_id: i64, limit: usize) -> Result<Vec<FeedEntry>, RepoError>;
}

pub struct FeedCache {
    store: Arc<dyn ListStore>,
    config: FeedCacheConfig,
}

impl FeedCache {
    pub fn new(store: Arc<dyn ListStore>, config: FeedCacheConfig) -> Self {
        Self { store, config }
    }

    pub fn list_length_limit(&self) -> usize {
        self.config.list_length_limit()
    }

    /// The owner's cached entries, newest first.
    ///
    /// A missing, expired or undecodable list is rebuilt from `loader`. When
    /// the list store itself fails the entries come straight from `loader`.
    pub async fn get(
        &self,
        owner_id: i64,
        loader: &dyn RecentLoader,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        let key = CacheKey::NewsFeed(owner_id).to_string();

        match self.store.range(&key).await {
            Ok(Some(items)) => match decode_list(&items) {
                Ok(entries) => {
                    counter!(METRIC_CACHE_HIT, "kind" => "newsfeed").increment(1);
                    return Ok(entries);
                }
                Err(err) => {
                    warn!(
                        target = "feedline::cache::feed",
                        owner_id,
                        error = %err,
                        "discarding undecodable feed list"
                    );
                    self.discard(&key).await;
                }
            },
            Ok(None) => {}
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "range").increment(1);
                warn!(
                    target = "feedline::cache::feed",
                    owner_id,
                    error = %err,
                    "list store read failed; serving from store of record"
                );
                return loader
                    .load_recent(owner_id, self.list_length_limit())
                    .await;
            }
        }

        counter!(METRIC_CACHE_MISS, "kind" => "newsfeed").increment(1);
        self.reload(owner_id, &key, loader).await
    }

    /// Record a persisted entry in its owner's list.
    ///
    /// The entry must already be written to the store behind `loader`. When no
    /// list exists yet the full recent history is loaded instead of creating a
    /// list holding only `entry`. The list stays ordered by `created_at`, so a
    /// late entry older than a full list is dropped rather than evicting a
    /// newer one. Pushing an entry already in the list changes nothing.
    pub async fn push(&self, entry: &FeedEntry, loader: &dyn RecentLoader) -> Result<(), RepoError> {
        let key = CacheKey::NewsFeed(entry.owner_id).to_string();
        let payload = match FeedEntryCodec::encode(entry, loader.backend()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    target = "feedline::cache::feed",
                    owner_id = entry.owner_id,
                    error = %err,
                    "failed to encode feed entry; dropping cached list"
                );
                self.discard(&key).await;
                return Ok(());
            }
        };

        match self
            .store
            .insert_existing(
                &key,
                ScoredItem::new(to_micros(entry.created_at), payload),
                self.list_length_limit(),
            )
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => self.reload(entry.owner_id, &key, loader).await.map(|_| ()),
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "push").increment(1);
                warn!(
                    target = "feedline::cache::feed",
                    owner_id = entry.owner_id,
                    error = %err,
                    "list store push failed; dropping cached list"
                );
                self.discard(&key).await;
                Ok(())
            }
        }
    }

    /// Drop the owner's list so the next read reloads it.
    pub async fn invalidate(&self, owner_id: i64) -> Result<bool, CacheError> {
        self.store
            .delete(&CacheKey::NewsFeed(owner_id).to_string())
            .await
    }

    async fn reload(
        &self,
        owner_id: i64,
        key: &str,
        loader: &dyn RecentLoader,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        let entries = loader
            .load_recent(owner_id, self.list_length_limit())
            .await?;
        if entries.is_empty() {
            return Ok(entries);
        }

        let backend = loader.backend();
        let encoded: Result<Vec<ScoredItem>, CacheError> = entries
            .iter()
            .map(|entry| {
                FeedEntryCodec::encode(entry, backend)
                    .map(|payload| ScoredItem::new(to_micros(entry.created_at), payload))
            })
            .collect();

        let result = match encoded {
            Ok(items) => self.store.replace(key, items, self.config.key_ttl).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => debug!(
                target = "feedline::cache::feed",
                owner_id,
                entries = entries.len(),
                backend = backend.as_str(),
                "feed list loaded"
            ),
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "replace").increment(1);
                warn!(
                    target = "feedline::cache::feed",
                    owner_id,
                    error = %err,
                    "failed to populate feed list"
                );
            }
        }

        Ok(entries)
    }

    async fn discard(&self, key: &str) {
        if let Err(err) = self.store.delete(key).await {
            counter!(METRIC_CACHE_ERROR, "op" => "delete").increment(1);
            warn!(
                target = "feedline::cache::feed",
                key,
                error = %err,
                "failed to drop cached list"
            );
        }
    }
}

/// Decode a cached list into newest-first order.
///
/// Items written by different backends may carry the same content, so
/// repeated content is dropped after sorting.
fn decode_list(items: &[Vec<u8>]) -> Result<Vec<FeedEntry>, CacheError> {
    let mut entries = items
        .iter()
        .map(|item| FeedEntryCodec::decode(item))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut seen = HashSet::with_capacity(entries.len());
    entries.retain(|entry| seen.insert(entry.content_id));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use time::{Duration, OffsetDateTime, macros::datetime};

    use super::*;
    use crate::cache::MemoryListStore;

    struct VecLoader {
        backend: Backend,
        entries: Mutex<Vec<FeedEntry>>,
        calls: Mutex<usize>,
    }

    impl VecLoader {
        fn new(backend: Backend) -> Self {
            Self {
                backend,
                entries: Mutex::new(Vec::new()),
                calls: Mutex::new(0),
            }
        }

        fn persist(&self, entry: FeedEntry) {
            self.entries.lock().unwrap().push(entry);
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl RecentLoader for VecLoader {
        fn backend(&self) -> Backend {
            self.backend
        }

        async fn load_recent(
            &self,
            owner_id: i64,
            limit: usize,
        ) -> Result<Vec<FeedEntry>, RepoError> {
            *self.calls.lock().unwrap() += 1;
            let mut entries: Vec<FeedEntry> = self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|entry| entry.owner_id == owner_id)
                .cloned()
                .collect();
            entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            entries.truncate(limit);
            Ok(entries)
        }
    }

    fn cache(limit: usize) -> FeedCache {
        let config = FeedCacheConfig {
            list_length_limit: limit,
            ..FeedCacheConfig::default()
        };
        FeedCache::new(Arc::new(MemoryListStore::new(&config)), config)
    }

    fn at(seconds: i64) -> OffsetDateTime {
        datetime!(2024-01-01 00:00:00 UTC) + Duration::seconds(seconds)
    }

    #[tokio::test]
    async fn miss_loads_once_then_hits() {
        let cache = cache(10);
        let loader = VecLoader::new(Backend::Relational);
        loader.persist(FeedEntry::new(1, 100, at(1)));

        assert_eq!(cache.get(1, &loader).await.unwrap().len(), 1);
        assert_eq!(cache.get(1, &loader).await.unwrap().len(), 1);
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn push_into_cold_key_loads_full_history() {
        let cache = cache(10);
        let loader = VecLoader::new(Backend::WideColumn);
        loader.persist(FeedEntry::new(7, 1, at(1)));
        loader.persist(FeedEntry::new(7, 2, at(2)));
        let fresh = FeedEntry::new(7, 3, at(3));
        loader.persist(fresh.clone());

        cache.push(&fresh, &loader).await.unwrap();
        let ids: Vec<i64> = cache
            .get(7, &loader)
            .await
            .unwrap()
            .iter()
            .map(|entry| entry.content_id)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn list_is_trimmed_to_limit() {
        let cache = cache(3);
        let loader = VecLoader::new(Backend::Relational);
        let first = FeedEntry::new(1, 1, at(1));
        loader.persist(first.clone());
        cache.push(&first, &loader).await.unwrap();

        for content_id in 2..=5 {
            let entry = FeedEntry::new(1, content_id, at(content_id));
            loader.persist(entry.clone());
            cache.push(&entry, &loader).await.unwrap();
        }

        let ids: Vec<i64> = cache
            .get(1, &loader)
            .await
            .unwrap()
            .iter()
            .map(|entry| entry.content_id)
            .collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn out_of_order_pushes_read_newest_first() {
        let cache = cache(10);
        let loader = VecLoader::new(Backend::Relational);
        let seed = FeedEntry::new(1, 1, at(1));
        loader.persist(seed.clone());
        cache.get(1, &loader).await.unwrap();

        cache.push(&FeedEntry::new(1, 3, at(3)), &loader).await.unwrap();
        cache.push(&FeedEntry::new(1, 2, at(2)), &loader).await.unwrap();
        cache.push(&FeedEntry::new(1, 3, at(3)), &loader).await.unwrap();

        let ids: Vec<i64> = cache
            .get(1, &loader)
            .await
            .unwrap()
            .iter()
            .map(|entry| entry.content_id)
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = cache(10);
        let loader = VecLoader::new(Backend::Relational);
        loader.persist(FeedEntry::new(1, 1, at(1)));

        cache.get(1, &loader).await.unwrap();
        assert!(cache.invalidate(1).await.unwrap());
        cache.get(1, &loader).await.unwrap();
        assert_eq!(loader.calls(), 2);
    }

    fn ids(entries: &[FeedEntry]) -> Vec<i64> {
        entries.iter().map(|entry| entry.content_id).collect()
    }

    #[tokio::test]
    async fn late_older_entry_does_not_evict_newer_ones() {
        let cache = cache(3);
        let loader = VecLoader::new(Backend::Relational);
        for (content_id, seconds) in [(98, 98), (99, 99), (100, 100)] {
            loader.persist(FeedEntry::new(2, content_id, at(seconds)));
        }
        cache.get(2, &loader).await.unwrap();

        for (content_id, seconds) in [(50, 50), (40, 40)] {
            let late = FeedEntry::new(2, content_id, at(seconds));
            loader.persist(late.clone());
            cache.push(&late, &loader).await.unwrap();
        }

        assert_eq!(ids(&cache.get(2, &loader).await.unwrap()), vec![100, 99, 98]);
        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn late_entry_joins_a_list_with_room() {
        let cache = cache(5);
        let loader = VecLoader::new(Backend::WideColumn);
        loader.persist(FeedEntry::new(2, 10, at(10)));
        loader.persist(FeedEntry::new(2, 30, at(30)));
        cache.get(2, &loader).await.unwrap();

        let late = FeedEntry::new(2, 20, at(20));
        loader.persist(late.clone());
        cache.push(&late, &loader).await.unwrap();
        cache.push(&late, &loader).await.unwrap();

        assert_eq!(ids(&cache.get(2, &loader).await.unwrap()), vec![30, 20, 10]);
    }

    #[tokio::test]
    async fn expired_list_is_reloaded_from_the_store() {
        let config = FeedCacheConfig {
            list_length_limit: 5,
            key_ttl: std::time::Duration::ZERO,
            ..FeedCacheConfig::default()
        };
        let cache = FeedCache::new(Arc::new(MemoryListStore::new(&config)), config);
        let loader = VecLoader::new(Backend::Relational);
        loader.persist(FeedEntry::new(4, 1, at(1)));

        cache.get(4, &loader).await.unwrap();
        loader.persist(FeedEntry::new(4, 2, at(2)));
        cache.push(&FeedEntry::new(4, 2, at(2)), &loader).await.unwrap();

        assert_eq!(ids(&cache.get(4, &loader).await.unwrap()), vec![2, 1]);
        assert_eq!(loader.calls(), 3);
    }
}
