#![allow(dead_code)]

use std::sync::Arc;

use feedline::application::fanout::{PublishEvent, PublishReceipt};
use feedline::config::{ServeOverrides, Settings};
use feedline::domain::types::EntityFamily;
use feedline::infra::context::{Adapters, AppContext};
use feedline::infra::memory::{DrainReport, MemoryRepositories, MemoryTable, drain_jobs};
use time::{Duration, OffsetDateTime, macros::datetime};

pub struct Harness {
    pub repos: Arc<MemoryRepositories>,
    pub table: Arc<MemoryTable>,
    pub settings: Settings,
    pub app: AppContext,
}

impl Harness {
    pub async fn new(overrides: ServeOverrides) -> Self {
        let settings = Settings::from_overrides(&overrides).expect("valid settings");
        let repos = Arc::new(MemoryRepositories::new());
        let table = Arc::new(MemoryTable::new());
        let app = AppContext::build(Adapters::memory(repos.clone(), table.clone()), &settings)
            .await
            .expect("services build");
        Self {
            repos,
            table,
            settings,
            app,
        }
    }

    pub async fn with_defaults() -> Self {
        Self::new(ServeOverrides::default()).await
    }

    pub async fn switch_on(&self, family: EntityFamily) {
        let gate = self.app.selector.gate_name(family).to_string();
        self.app
            .selector
            .gates()
            .turn_on(&gate)
            .await
            .expect("gate flips");
    }

    pub async fn follow_all(&self, publisher_id: i64, followers: impl IntoIterator<Item = i64>) {
        for follower in followers {
            self.app
                .friendships
                .follow(follower, publisher_id)
                .await
                .expect("follow succeeds");
        }
    }

    pub async fn publish(&self, publisher_id: i64, content_id: i64, seconds: i64) -> PublishReceipt {
        self.app
            .fanout
            .publish(PublishEvent {
                content_id,
                publisher_id,
                created_at: at(seconds),
            })
            .await
            .expect("publish accepted")
    }

    pub async fn drain(&self) -> DrainReport {
        drain_jobs(&self.repos, &self.app.jobs).await
    }
}

pub fn at(seconds: i64) -> OffsetDateTime {
    datetime!(2024-03-01 12:00:00 UTC) + Duration::seconds(seconds)
}
