//! Feed entry persistence over either backend.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::warn;

use crate::application::repos::{NewsFeedRepo, RepoError};
use crate::cache::RecentLoader;
use crate::domain::entities::FeedEntry;
use crate::domain::timestamps::to_micros;
use crate::domain::types::Backend;
use crate::wide::{
    FieldSet, FieldValue, Filter, MAX_ENCODABLE, NewsFeedContentRow, NewsFeedRow, SortedTable,
    WideColumnStore, WideModel,
};

/// Store of record for feed entries.
///
/// Every read returns entries newest first.
#[async_trait]
pub trait FeedStore: Send + Sync {
    fn backend(&self) -> Backend;

    /// Whether `older` and `newer` include entries equal to the boundary.
    fn inclusive_bounds(&self) -> bool;

    /// Persist entries, tolerating ones that already exist. Returns only the
    /// entries this call created.
    async fn insert_entries(&self, entries: &[FeedEntry]) -> Result<Vec<FeedEntry>, RepoError>;

    /// The stored entry for `entry`'s key, writing it first when absent.
    /// The flag is true when this call created it.
    async fn get_or_create(&self, entry: &FeedEntry) -> Result<(FeedEntry, bool), RepoError>;

    async fn latest(&self, owner_id: i64, limit: usize) -> Result<Vec<FeedEntry>, RepoError>;

    async fn older(
        &self,
        owner_id: i64,
        before: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<FeedEntry>, RepoError>;

    /// Every entry newer than `after`, without a count limit.
    async fn newer(
        &self,
        owner_id: i64,
        after: OffsetDateTime,
    ) -> Result<Vec<FeedEntry>, RepoError>;
}

/// Presents a [`FeedStore`] as the cache's reload source.
pub struct StoreLoader<'a>(pub &'a dyn FeedStore);

#[async_trait]
impl RecentLoader for StoreLoader<'_> {
    fn backend(&self) -> Backend {
        self.0.backend()
    }

    async fn load_recent(&self, owner_id: i64, limit: usize) -> Result<Vec<FeedEntry>, RepoError> {
        self.0.latest(owner_id, limit).await
    }
}

pub struct RelationalFeedStore {
    repo: Arc<dyn NewsFeedRepo>,
}

impl RelationalFeedStore {
    pub fn new(repo: Arc<dyn NewsFeedRepo>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl FeedStore for RelationalFeedStore {
    fn backend(&self) -> Backend {
        Backend::Relational
    }

    fn inclusive_bounds(&self) -> bool {
        false
    }

    async fn insert_entries(&self, entries: &[FeedEntry]) -> Result<Vec<FeedEntry>, RepoError> {
        self.repo.insert_entries(entries).await
    }

    async fn get_or_create(&self, entry: &FeedEntry) -> Result<(FeedEntry, bool), RepoError> {
        if let Some(existing) = self
            .repo
            .find_entry(entry.owner_id, entry.content_id)
            .await?
        {
            return Ok((existing, false));
        }

        if let Some(created) = self
            .repo
            .insert_entries(std::slice::from_ref(entry))
            .await?
            .pop()
        {
            return Ok((created, true));
        }

        // Lost the insert race to a concurrent writer.
        self.repo
            .find_entry(entry.owner_id, entry.content_id)
            .await?
            .map(|existing| (existing, false))
            .ok_or(RepoError::NotFound)
    }

    async fn latest(&self, owner_id: i64, limit: usize) -> Result<Vec<FeedEntry>, RepoError> {
        self.repo.list_latest(owner_id, limit).await
    }

    async fn older(
        &self,
        owner_id: i64,
        before: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        self.repo.list_older(owner_id, before, limit).await
    }

    async fn newer(
        &self,
        owner_id: i64,
        after: OffsetDateTime,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        self.repo.list_newer(owner_id, after).await
    }
}

/// Feed entries in the `newsfeeds` wide-column table.
///
/// Row keys are `reverse(owner_id):created_at`, so scans only bound on
/// whole timestamps and include the boundary row. The `newsfeed_contents`
/// index keeps one entry per owner and content.
pub struct WideFeedStore {
    rows: WideColumnStore<NewsFeedRow>,
    contents: WideColumnStore<NewsFeedContentRow>,
}

impl WideFeedStore {
    pub fn new(table: Arc<dyn SortedTable>) -> Self {
        Self {
            rows: WideColumnStore::new(table.clone()),
            contents: WideColumnStore::new(table),
        }
    }

    fn owner_prefix(owner_id: i64) -> Vec<FieldValue> {
        vec![FieldValue::Int(owner_id)]
    }

    fn owner_at(owner_id: i64, micros: i64) -> Vec<FieldValue> {
        vec![FieldValue::Int(owner_id), FieldValue::Int(micros)]
    }

    /// Ids and timestamps outside this range have no row key and no rows.
    fn encodable(value: i64) -> bool {
        (0..=MAX_ENCODABLE).contains(&value)
    }

    async fn scan(&self, filter: Filter) -> Result<Vec<FeedEntry>, RepoError> {
        Ok(self
            .rows
            .filter(&filter)
            .await?
            .into_iter()
            .map(FeedEntry::from)
            .collect())
    }

    /// Store each entry once per owner and content.
    ///
    /// The content index is claimed first and the feed rows follow, so an
    /// index row always names the entry's stored `created_at`. A feed row
    /// missing behind an existing index row, left by an interrupted earlier
    /// write, is written again. Returns every entry as stored with a flag
    /// telling whether this call wrote its feed row.
    async fn persist(&self, entries: &[FeedEntry]) -> Result<Vec<(FeedEntry, bool)>, RepoError> {
        let claims = self
            .contents
            .batch_create_absent(
                entries
                    .iter()
                    .map(|entry| NewsFeedContentRow::from(entry).to_fields())
                    .collect(),
            )
            .await?;

        let mut persisted = Vec::with_capacity(claims.len());
        for claim in claims {
            if claim.inserted {
                persisted.push((FeedEntry::from(claim.entity), true));
                continue;
            }

            let proposed = FeedEntry::from(claim.entity);
            let stored = self
                .contents
                .get(&NewsFeedContentRow::key_fields(
                    proposed.owner_id,
                    proposed.content_id,
                ))
                .await?
                .map(FeedEntry::from)
                .unwrap_or(proposed);
            let row_key = FieldSet::new()
                .with("user_id", stored.owner_id)
                .with("created_at", to_micros(stored.created_at));
            let missing = self.rows.get(&row_key).await?.is_none();
            if missing {
                warn!(
                    target = "feedline::application::feed_store",
                    owner_id = stored.owner_id,
                    content_id = stored.content_id,
                    "restoring feed row behind an existing content index row"
                );
            }
            persisted.push((stored, missing));
        }

        let rows: Vec<FieldSet> = persisted
            .iter()
            .filter(|(_, write)| *write)
            .map(|(entry, _)| NewsFeedRow::from(entry).to_fields())
            .collect();
        if !rows.is_empty() {
            self.rows.batch_create(rows).await?;
        }
        Ok(persisted)
    }
}

#[async_trait]
impl FeedStore for WideFeedStore {
    fn backend(&self) -> Backend {
        Backend::WideColumn
    }

    fn inclusive_bounds(&self) -> bool {
        true
    }

    async fn insert_entries(&self, entries: &[FeedEntry]) -> Result<Vec<FeedEntry>, RepoError> {
        Ok(self
            .persist(entries)
            .await?
            .into_iter()
            .filter_map(|(entry, created)| created.then_some(entry))
            .collect())
    }

    async fn get_or_create(&self, entry: &FeedEntry) -> Result<(FeedEntry, bool), RepoError> {
        self.persist(std::slice::from_ref(entry))
            .await?
            .pop()
            .ok_or(RepoError::NotFound)
    }

    async fn latest(&self, owner_id: i64, limit: usize) -> Result<Vec<FeedEntry>, RepoError> {
        if !Self::encodable(owner_id) {
            return Ok(Vec::new());
        }
        self.scan(Filter {
            prefix: Some(Self::owner_prefix(owner_id)),
            limit: Some(limit),
            reverse: true,
            ..Filter::default()
        })
        .await
    }

    async fn older(
        &self,
        owner_id: i64,
        before: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        let before = to_micros(before);
        if !Self::encodable(owner_id) || before < 0 {
            return Ok(Vec::new());
        }
        self.scan(Filter {
            start: Some(Self::owner_at(owner_id, before.min(MAX_ENCODABLE))),
            stop: Some(Self::owner_prefix(owner_id)),
            prefix: Some(Self::owner_prefix(owner_id)),
            limit: Some(limit),
            reverse: true,
        })
        .await
    }

    async fn newer(
        &self,
        owner_id: i64,
        after: OffsetDateTime,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        let after = to_micros(after);
        if !Self::encodable(owner_id) || after > MAX_ENCODABLE {
            return Ok(Vec::new());
        }
        let mut entries = self
            .scan(Filter {
                start: Some(Self::owner_at(owner_id, after.max(0))),
                prefix: Some(Self::owner_prefix(owner_id)),
                ..Filter::default()
            })
            .await?;
        entries.reverse();
        Ok(entries)
    }
}

/// Both feed backends, selected per call.
#[derive(Clone)]
pub struct FeedStores {
    relational: Arc<RelationalFeedStore>,
    wide: Arc<WideFeedStore>,
}

impl FeedStores {
    pub fn new(relational: Arc<RelationalFeedStore>, wide: Arc<WideFeedStore>) -> Self {
        Self { relational, wide }
    }

    pub fn get(&self, backend: Backend) -> &dyn FeedStore {
        match backend {
            Backend::Relational => self.relational.as_ref(),
            Backend::WideColumn => self.wide.as_ref(),
        }
    }
}
