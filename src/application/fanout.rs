//! Publish-time fanout: the publisher's own entry, batch scheduling and
//! batch execution.

use std::{collections::HashSet, sync::Arc, time::Instant};

use metrics::{counter, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::application::feed_store::{FeedStores, StoreLoader};
use crate::application::friendships::FriendshipService;
use crate::application::jobs::{
    FanoutBatchJobPayload, FanoutMainJobPayload, enqueue_fanout_batch_job, enqueue_fanout_main_job,
};
use crate::application::repos::{JobsRepo, RepoError};
use crate::application::selector::StoreSelector;
use crate::cache::{CacheKey, CounterCache, FeedCache};
use crate::domain::entities::FeedEntry;
use crate::domain::timestamps::truncate_micros;
use crate::domain::types::{Backend, EntityFamily, JobType};

pub(crate) const METRIC_FANOUT_BATCHES: &str = "feedline_fanout_batches_total";
pub(crate) const METRIC_FANOUT_ENTRIES: &str = "feedline_fanout_entries_written_total";
pub(crate) const METRIC_FANOUT_BATCH_MS: &str = "feedline_fanout_batch_ms";

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("failed to enqueue {job_type} job: {source}")]
    Queue {
        job_type: &'static str,
        #[source]
        source: RepoError,
    },
    #[error("fanout batch for content {content_id} exceeded its {budget_secs}s budget")]
    TimedOut { content_id: i64, budget_secs: u64 },
}

impl FanoutError {
    fn queue(job_type: JobType, source: RepoError) -> Self {
        Self::Queue {
            job_type: job_type.as_str(),
            source,
        }
    }
}

/// Content-publish event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishEvent {
    pub content_id: i64,
    pub publisher_id: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub self_entry: FeedEntry,
    pub backend: Backend,
    pub job_id: String,
}

/// Accepts publish events and schedules their fanout.
pub struct FanoutCoordinator {
    selector: StoreSelector,
    stores: FeedStores,
    cache: Arc<FeedCache>,
    friendships: Arc<FriendshipService>,
    jobs: Arc<dyn JobsRepo>,
    batch_size: usize,
    max_attempts: i32,
}

impl FanoutCoordinator {
    pub fn new(
        selector: StoreSelector,
        stores: FeedStores,
        cache: Arc<FeedCache>,
        friendships: Arc<FriendshipService>,
        jobs: Arc<dyn JobsRepo>,
        batch_size: usize,
        max_attempts: i32,
    ) -> Self {
        Self {
            selector,
            stores,
            cache,
            friendships,
            jobs,
            batch_size: batch_size.max(1),
            max_attempts,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write the publisher's own entry and schedule the subscriber fanout.
    ///
    /// The backend is selected once here and travels with every job so the
    /// whole event lands in one store.
    pub async fn publish(&self, event: PublishEvent) -> Result<PublishReceipt, FanoutError> {
        let backend = self.selector.select(EntityFamily::NewsFeed).await?;
        let created_at = truncate_micros(event.created_at);
        let store = self.stores.get(backend);

        let (self_entry, _) = store
            .get_or_create(&FeedEntry::new(
                event.publisher_id,
                event.content_id,
                created_at,
            ))
            .await?;
        // A retried publish may have written the entry without reaching the cache.
        self.cache.push(&self_entry, &StoreLoader(store)).await?;

        let payload = FanoutMainJobPayload {
            content_id: event.content_id,
            publisher_id: event.publisher_id,
            created_at: self_entry.created_at,
            backend,
        };
        let job_id = enqueue_fanout_main_job(self.jobs.as_ref(), &payload, self.max_attempts)
            .await
            .map_err(|err| FanoutError::queue(JobType::FanoutMain, err))?;

        info!(
            target = "feedline::application::fanout",
            content_id = event.content_id,
            publisher_id = event.publisher_id,
            backend = backend.as_str(),
            job_id = %job_id,
            "publish accepted"
        );

        Ok(PublishReceipt {
            self_entry,
            backend,
            job_id,
        })
    }

    /// Resolve subscribers and enqueue one batch job per chunk.
    ///
    /// Returns the enqueued job ids. Re-running is safe because batches are
    /// idempotent.
    pub async fn schedule_batches(
        &self,
        payload: &FanoutMainJobPayload,
    ) -> Result<Vec<String>, FanoutError> {
        let mut seen = HashSet::new();
        let subscribers: Vec<i64> = self
            .friendships
            .follower_ids(payload.publisher_id)
            .await?
            .into_iter()
            .filter(|id| *id != payload.publisher_id && seen.insert(*id))
            .collect();

        let mut job_ids = Vec::with_capacity(subscribers.len().div_ceil(self.batch_size));
        for chunk in subscribers.chunks(self.batch_size) {
            let batch = FanoutBatchJobPayload {
                content_id: payload.content_id,
                created_at: payload.created_at,
                backend: payload.backend,
                owner_ids: chunk.to_vec(),
            };
            let job_id = enqueue_fanout_batch_job(self.jobs.as_ref(), &batch, self.max_attempts)
                .await
                .map_err(|err| FanoutError::queue(JobType::FanoutBatch, err))?;
            job_ids.push(job_id);
        }

        info!(
            target = "feedline::application::fanout",
            content_id = payload.content_id,
            publisher_id = payload.publisher_id,
            subscribers = subscribers.len(),
            batches = job_ids.len(),
            "fanout batches scheduled"
        );
        Ok(job_ids)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub requested: usize,
    pub created: usize,
}

/// Writes one fanout batch and updates the affected feed lists.
pub struct BatchWorker {
    stores: FeedStores,
    cache: Arc<FeedCache>,
    counters: CounterCache,
}

impl BatchWorker {
    pub fn new(stores: FeedStores, cache: Arc<FeedCache>, counters: CounterCache) -> Self {
        Self {
            stores,
            cache,
            counters,
        }
    }

    /// Create one entry per owner in a single store call, then push every
    /// owner's stored entry into its list.
    ///
    /// Existing rows are not written again. They are read back and still
    /// pushed, since an earlier attempt may have stored them and failed
    /// before the cache update. The list ignores entries it already holds.
    pub async fn run(&self, payload: &FanoutBatchJobPayload) -> Result<BatchOutcome, FanoutError> {
        let started = Instant::now();
        let store = self.stores.get(payload.backend);
        let entries: Vec<FeedEntry> = payload
            .owner_ids
            .iter()
            .map(|&owner_id| FeedEntry::new(owner_id, payload.content_id, payload.created_at))
            .collect();

        let created = match store.insert_entries(&entries).await {
            Ok(created) => created,
            Err(err) => {
                counter!(METRIC_FANOUT_BATCHES, "outcome" => "failed").increment(1);
                return Err(err.into());
            }
        };

        let loader = StoreLoader(store);
        let fresh: HashSet<i64> = created.iter().map(|entry| entry.owner_id).collect();
        for entry in &created {
            self.cache.push(entry, &loader).await?;
        }
        for entry in entries.iter().filter(|entry| !fresh.contains(&entry.owner_id)) {
            let (stored, _) = store.get_or_create(entry).await?;
            self.cache.push(&stored, &loader).await?;
        }

        if !created.is_empty() {
            let delta = i64::try_from(created.len()).unwrap_or(i64::MAX);
            if let Err(err) = self
                .counters
                .incr_by(CacheKey::ContentDeliveries(payload.content_id), delta)
                .await
            {
                warn!(
                    target = "feedline::application::fanout",
                    content_id = payload.content_id,
                    error = %err,
                    "failed to record delivery count"
                );
            }
        }

        counter!(METRIC_FANOUT_BATCHES, "outcome" => "completed").increment(1);
        counter!(METRIC_FANOUT_ENTRIES, "backend" => payload.backend.as_str())
            .increment(created.len() as u64);
        histogram!(METRIC_FANOUT_BATCH_MS).record(started.elapsed().as_secs_f64() * 1_000.0);

        info!(
            target = "feedline::application::fanout",
            content_id = payload.content_id,
            backend = payload.backend.as_str(),
            requested = entries.len(),
            created = created.len(),
            "fanout batch written"
        );

        Ok(BatchOutcome {
            requested: entries.len(),
            created: created.len(),
        })
    }
}
