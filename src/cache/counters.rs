use std::sync::Arc;

use super::error::CacheError;
use super::keys::CacheKey;
use super::list_store::ListStore;

/// Denormalized counters kept next to the feed lists.
///
/// Every update is a single atomic increment on the list store; there is no
/// read-modify-write.
#[derive(Clone)]
pub struct CounterCache {
    store: Arc<dyn ListStore>,
}

impl CounterCache {
    pub fn new(store: Arc<dyn ListStore>) -> Self {
        Self { store }
    }

    pub async fn incr_by(&self, key: CacheKey, delta: i64) -> Result<i64, CacheError> {
        self.store.incr_by(&key.to_string(), delta).await
    }

    pub async fn decr_by(&self, key: CacheKey, delta: i64) -> Result<i64, CacheError> {
        self.store.incr_by(&key.to_string(), -delta).await
    }

    /// Current value; zero when the counter was never touched.
    pub async fn get(&self, key: CacheKey) -> Result<i64, CacheError> {
        Ok(self.store.counter(&key.to_string()).await?.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FeedCacheConfig, MemoryListStore};

    fn counters() -> CounterCache {
        CounterCache::new(Arc::new(MemoryListStore::new(&FeedCacheConfig::default())))
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let counters = counters();
        let key = CacheKey::ContentDeliveries(9);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let counters = counters.clone();
                tokio::spawn(async move { counters.incr_by(key, 5).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(counters.get(key).await.unwrap(), 80);
        assert_eq!(counters.decr_by(key, 30).await.unwrap(), 50);
    }

    #[tokio::test]
    async fn untouched_counter_reads_zero() {
        assert_eq!(
            counters()
                .get(CacheKey::ContentDeliveries(1))
                .await
                .unwrap(),
            0
        );
    }
}
