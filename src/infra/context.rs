//! Service assembly shared by the binary and the integration tests.

use std::sync::Arc;

use crate::application::fanout::{BatchWorker, FanoutCoordinator};
use crate::application::feed::NewsFeedService;
use crate::application::feed_store::{FeedStores, RelationalFeedStore, WideFeedStore};
use crate::application::friendships::FriendshipService;
use crate::application::gatekeeper::GateKeeper;
use crate::application::jobs::FanoutJobContext;
use crate::application::pagination::CursorPaginator;
use crate::application::repos::{
    FriendshipRepo, GateRepo, HealthRepo, JobsRepo, NewsFeedRepo, RepoError,
};
use crate::application::selector::StoreSelector;
use crate::cache::{CounterCache, FeedCache, FeedCacheConfig, ListStore, MemoryListStore};
use crate::config::Settings;
use crate::infra::db::{PgSortedTable, PostgresRepositories};
use crate::infra::http::{ApiState, FeedRateLimiter};
use crate::infra::memory::{MemoryRepositories, MemoryTable};
use crate::wide::{SortedTable, WideColumnStore};

/// Storage seams the services are built over.
#[derive(Clone)]
pub struct Adapters {
    pub newsfeeds: Arc<dyn NewsFeedRepo>,
    pub friendships: Arc<dyn FriendshipRepo>,
    pub gates: Arc<dyn GateRepo>,
    pub jobs: Arc<dyn JobsRepo>,
    pub health: Arc<dyn HealthRepo>,
    pub table: Arc<dyn SortedTable>,
}

impl Adapters {
    pub fn memory(repos: Arc<MemoryRepositories>, table: Arc<MemoryTable>) -> Self {
        Self {
            newsfeeds: repos.clone(),
            friendships: repos.clone(),
            gates: repos.clone(),
            jobs: repos.clone(),
            health: repos,
            table,
        }
    }

    /// Postgres for everything; the wide-column tables live in `wide_rows`.
    pub fn postgres(repos: Arc<PostgresRepositories>) -> Self {
        let table = Arc::new(PgSortedTable::new(repos.pool().clone()));
        Self {
            newsfeeds: repos.clone(),
            friendships: repos.clone(),
            gates: repos.clone(),
            jobs: repos.clone(),
            health: repos,
            table,
        }
    }
}

/// Fully wired services.
#[derive(Clone)]
pub struct AppContext {
    pub selector: StoreSelector,
    pub stores: FeedStores,
    pub cache: Arc<FeedCache>,
    pub counters: CounterCache,
    pub feed: Arc<NewsFeedService>,
    pub friendships: Arc<FriendshipService>,
    pub fanout: Arc<FanoutCoordinator>,
    pub jobs: FanoutJobContext,
    pub health: Arc<dyn HealthRepo>,
}

impl AppContext {
    /// Wire every service and seed the configured gate percentages.
    pub async fn build(adapters: Adapters, settings: &Settings) -> Result<Self, RepoError> {
        let gates = GateKeeper::new(adapters.gates.clone());
        gates.seed(&settings.gates.seeds).await?;
        let selector = StoreSelector::new(gates, &settings.gates);

        let cache_config = FeedCacheConfig::from(&settings.cache);
        let list_store: Arc<dyn ListStore> = Arc::new(MemoryListStore::new(&cache_config));
        let cache = Arc::new(FeedCache::new(list_store.clone(), cache_config));
        let counters = CounterCache::new(list_store);

        let stores = FeedStores::new(
            Arc::new(RelationalFeedStore::new(adapters.newsfeeds.clone())),
            Arc::new(WideFeedStore::new(adapters.table.clone())),
        );

        let friendships = Arc::new(FriendshipService::new(
            selector.clone(),
            adapters.friendships.clone(),
            WideColumnStore::new(adapters.table.clone()),
            WideColumnStore::new(adapters.table.clone()),
        ));

        let feed = Arc::new(NewsFeedService::new(
            selector.clone(),
            stores.clone(),
            cache.clone(),
            CursorPaginator::from_settings(&settings.pagination),
        ));

        let max_attempts = i32::try_from(settings.jobs.max_attempts.get()).unwrap_or(i32::MAX);
        let fanout = Arc::new(FanoutCoordinator::new(
            selector.clone(),
            stores.clone(),
            cache.clone(),
            friendships.clone(),
            adapters.jobs.clone(),
            settings.fanout.batch_size.get() as usize,
            max_attempts,
        ));

        let jobs = FanoutJobContext {
            coordinator: fanout.clone(),
            worker: Arc::new(BatchWorker::new(
                stores.clone(),
                cache.clone(),
                counters.clone(),
            )),
            batch_time_limit: settings.jobs.batch_time_limit,
        };

        Ok(Self {
            selector,
            stores,
            cache,
            counters,
            feed,
            friendships,
            fanout,
            jobs,
            health: adapters.health,
        })
    }

    pub fn api_state(&self, settings: &Settings) -> ApiState {
        ApiState {
            feed: self.feed.clone(),
            fanout: self.fanout.clone(),
            friendships: self.friendships.clone(),
            health: self.health.clone(),
            rate_limiter: Arc::new(FeedRateLimiter::from_settings(&settings.rate_limit)),
        }
    }
}
