//! Feed read path: cached list first, store of record on fallback.

use std::sync::Arc;

use feedline_api_types::FeedQuery;
use metrics::counter;
use thiserror::Error;
use tracing::debug;

use crate::application::feed_store::{FeedStores, StoreLoader};
use crate::application::pagination::{CursorPaginator, FeedPage, PageRequest, PaginationError};
use crate::application::repos::RepoError;
use crate::application::selector::StoreSelector;
use crate::cache::FeedCache;
use crate::domain::entities::FeedEntry;
use crate::domain::types::EntityFamily;

const METRIC_FEED_PAGES: &str = "feedline_feed_pages_total";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

pub struct NewsFeedService {
    selector: StoreSelector,
    stores: FeedStores,
    cache: Arc<FeedCache>,
    paginator: CursorPaginator,
}

impl NewsFeedService {
    pub fn new(
        selector: StoreSelector,
        stores: FeedStores,
        cache: Arc<FeedCache>,
        paginator: CursorPaginator,
    ) -> Self {
        Self {
            selector,
            stores,
            cache,
            paginator,
        }
    }

    pub fn paginator(&self) -> &CursorPaginator {
        &self.paginator
    }

    /// Serve one page for raw query parameters.
    pub async fn page(&self, owner_id: i64, query: &FeedQuery) -> Result<FeedPage, FeedError> {
        let request = self.paginator.parse(query)?;
        Ok(self.read(owner_id, &request).await?)
    }

    pub async fn read(&self, owner_id: i64, request: &PageRequest) -> Result<FeedPage, RepoError> {
        let backend = self.selector.select(EntityFamily::NewsFeed).await?;
        let store = self.stores.get(backend);

        let cached = self.cache.get(owner_id, &StoreLoader(store)).await?;
        if let Some(page) =
            self.paginator
                .paginate_cached(&cached, self.cache.list_length_limit(), request)
        {
            counter!(METRIC_FEED_PAGES, "source" => "cache").increment(1);
            return Ok(page);
        }

        debug!(
            target = "feedline::application::feed",
            owner_id,
            backend = backend.as_str(),
            cached = cached.len(),
            "cached list cannot answer; reading store"
        );
        let page = self.paginator.paginate_store(store, owner_id, request).await?;
        counter!(METRIC_FEED_PAGES, "source" => backend.as_str()).increment(1);
        Ok(page)
    }

    /// The owner's cached entries, newest first.
    pub async fn recent(&self, owner_id: i64) -> Result<Vec<FeedEntry>, RepoError> {
        let backend = self.selector.select(EntityFamily::NewsFeed).await?;
        self.cache
            .get(owner_id, &StoreLoader(self.stores.get(backend)))
            .await
    }
}
