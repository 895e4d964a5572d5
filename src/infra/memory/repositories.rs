use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Mutex, RwLock,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    FriendshipRepo, GateRepo, HealthRepo, JobsRepo, NewJobRecord, NewsFeedRepo, RepoError,
};
use crate::cache::lock::{mutex_lock, rw_read, rw_write};
use crate::domain::entities::{FeedEntry, Friendship, GateRecord};
use crate::domain::types::JobType;

const SOURCE: &str = "infra::memory::repositories";

struct Sequenced<T> {
    next_id: i64,
    rows: BTreeMap<(i64, i64), (i64, T)>,
}

impl<T> Default for Sequenced<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Sequenced<T> {
    /// Insert unless the key exists; returns whether it was inserted.
    fn insert(&mut self, key: (i64, i64), value: T) -> bool {
        if self.rows.contains_key(&key) {
            return false;
        }
        self.next_id += 1;
        self.rows.insert(key, (self.next_id, value));
        true
    }
}

/// A job accepted by [`MemoryRepositories::enqueue_job`].
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: String,
    pub record: NewJobRecord,
}

/// Repositories held in process memory.
///
/// `set_available(false)` makes every call fail as an unavailable store.
/// `set_write_delay` slows feed entry inserts down.
pub struct MemoryRepositories {
    available: AtomicBool,
    write_delay_ms: AtomicU64,
    newsfeeds: RwLock<Sequenced<FeedEntry>>,
    friendships: RwLock<Sequenced<Friendship>>,
    gates: RwLock<HashMap<String, GateRecord>>,
    jobs: Mutex<Vec<QueuedJob>>,
}

impl Default for MemoryRepositories {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            write_delay_ms: AtomicU64::new(0),
            newsfeeds: RwLock::new(Sequenced::default()),
            friendships: RwLock::new(Sequenced::default()),
            gates: RwLock::new(HashMap::new()),
            jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_write_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.write_delay_ms.store(millis, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepoError::Unavailable("memory store marked unavailable".to_string()))
        }
    }

    /// Remove and return queued jobs of one type, oldest first.
    pub fn take_jobs(&self, job_type: JobType) -> Vec<QueuedJob> {
        let mut jobs = mutex_lock(&self.jobs, SOURCE, "take_jobs");
        let (taken, kept): (Vec<QueuedJob>, Vec<QueuedJob>) = jobs
            .drain(..)
            .partition(|job| job.record.job_type == job_type);
        *jobs = kept;
        taken
    }

    pub fn queued(&self, job_type: JobType) -> usize {
        mutex_lock(&self.jobs, SOURCE, "queued")
            .iter()
            .filter(|job| job.record.job_type == job_type)
            .count()
    }

    pub fn entry_count(&self) -> usize {
        rw_read(&self.newsfeeds, SOURCE, "entry_count").rows.len()
    }

    /// Owner entries newest first; ties go to the later insert.
    fn owner_entries<F>(&self, owner_id: i64, keep: F) -> Vec<FeedEntry>
    where
        F: Fn(&FeedEntry) -> bool,
    {
        let table = rw_read(&self.newsfeeds, SOURCE, "owner_entries");
        let mut rows: Vec<(i64, FeedEntry)> = table
            .rows
            .range((owner_id, i64::MIN)..=(owner_id, i64::MAX))
            .filter(|(_, (_, entry))| keep(entry))
            .map(|(_, (id, entry))| (*id, entry.clone()))
            .collect();
        rows.sort_by(|(a_id, a), (b_id, b)| {
            b.created_at.cmp(&a.created_at).then(b_id.cmp(a_id))
        });
        rows.into_iter().map(|(_, entry)| entry).collect()
    }
}

#[async_trait]
impl NewsFeedRepo for MemoryRepositories {
    async fn insert_entries(&self, entries: &[FeedEntry]) -> Result<Vec<FeedEntry>, RepoError> {
        self.check()?;
        let delay = self.write_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let mut table = rw_write(&self.newsfeeds, SOURCE, "insert_entries");
        Ok(entries
            .iter()
            .filter(|entry| table.insert((entry.owner_id, entry.content_id), (*entry).clone()))
            .cloned()
            .collect())
    }

    async fn find_entry(
        &self,
        owner_id: i64,
        content_id: i64,
    ) -> Result<Option<FeedEntry>, RepoError> {
        self.check()?;
        Ok(rw_read(&self.newsfeeds, SOURCE, "find_entry")
            .rows
            .get(&(owner_id, content_id))
            .map(|(_, entry)| entry.clone()))
    }

    async fn list_latest(&self, owner_id: i64, limit: usize) -> Result<Vec<FeedEntry>, RepoError> {
        self.check()?;
        let mut entries = self.owner_entries(owner_id, |_| true);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn list_older(
        &self,
        owner_id: i64,
        before: OffsetDateTime,
        limit: usize,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        self.check()?;
        let mut entries = self.owner_entries(owner_id, |entry| entry.created_at < before);
        entries.truncate(limit);
        Ok(entries)
    }

    async fn list_newer(
        &self,
        owner_id: i64,
        after: OffsetDateTime,
    ) -> Result<Vec<FeedEntry>, RepoError> {
        self.check()?;
        Ok(self.owner_entries(owner_id, |entry| entry.created_at > after))
    }
}

#[async_trait]
impl FriendshipRepo for MemoryRepositories {
    async fn insert_friendship(&self, edge: &Friendship) -> Result<bool, RepoError> {
        self.check()?;
        Ok(rw_write(&self.friendships, SOURCE, "insert_friendship")
            .insert((edge.from_user_id, edge.to_user_id), edge.clone()))
    }

    async fn find_friendship(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<Option<Friendship>, RepoError> {
        self.check()?;
        Ok(rw_read(&self.friendships, SOURCE, "find_friendship")
            .rows
            .get(&(from_user_id, to_user_id))
            .map(|(_, edge)| edge.clone()))
    }

    async fn delete_friendship(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<Option<Friendship>, RepoError> {
        self.check()?;
        Ok(rw_write(&self.friendships, SOURCE, "delete_friendship")
            .rows
            .remove(&(from_user_id, to_user_id))
            .map(|(_, edge)| edge))
    }

    async fn follower_ids(&self, to_user_id: i64) -> Result<Vec<i64>, RepoError> {
        self.check()?;
        let table = rw_read(&self.friendships, SOURCE, "follower_ids");
        let mut followers: Vec<(i64, i64)> = table
            .rows
            .values()
            .filter(|(_, edge)| edge.to_user_id == to_user_id)
            .map(|(id, edge)| (*id, edge.from_user_id))
            .collect();
        followers.sort_unstable();
        Ok(followers.into_iter().map(|(_, from)| from).collect())
    }

    async fn following_ids(&self, from_user_id: i64) -> Result<Vec<i64>, RepoError> {
        self.check()?;
        let table = rw_read(&self.friendships, SOURCE, "following_ids");
        let mut following: Vec<(i64, i64)> = table
            .rows
            .range((from_user_id, i64::MIN)..=(from_user_id, i64::MAX))
            .map(|(_, (id, edge))| (*id, edge.to_user_id))
            .collect();
        following.sort_unstable();
        Ok(following.into_iter().map(|(_, to)| to).collect())
    }
}

#[async_trait]
impl GateRepo for MemoryRepositories {
    async fn find_gate(&self, name: &str) -> Result<Option<GateRecord>, RepoError> {
        self.check()?;
        Ok(rw_read(&self.gates, SOURCE, "find_gate").get(name).cloned())
    }

    async fn upsert_gate(&self, gate: &GateRecord) -> Result<(), RepoError> {
        self.check()?;
        rw_write(&self.gates, SOURCE, "upsert_gate").insert(gate.name.clone(), gate.clone());
        Ok(())
    }
}

#[async_trait]
impl JobsRepo for MemoryRepositories {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        self.check()?;
        let id = Uuid::new_v4().to_string();
        mutex_lock(&self.jobs, SOURCE, "enqueue_job").push(QueuedJob {
            id: id.clone(),
            record: job,
        });
        Ok(id)
    }
}

#[async_trait]
impl HealthRepo for MemoryRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        self.check()
    }
}
