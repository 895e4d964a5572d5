mod common;

use std::{sync::Arc, time::Duration as StdDuration};

use apalis::prelude::{Data, Error as ApalisError};
use common::{Harness, at};
use feedline::application::fanout::FanoutError;
use feedline::application::feed_store::StoreLoader;
use feedline::application::jobs::{
    FanoutBatchJobPayload, FanoutJobContext, process_fanout_batch_job,
};
use feedline::cache::CacheKey;
use feedline::config::ServeOverrides;
use feedline::domain::entities::FeedEntry;
use feedline::domain::timestamps::to_micros;
use feedline::domain::types::{Backend, EntityFamily, JobType};
use feedline::wide::{FieldSet, NewsFeedRow, SortedTable, WideColumnStore};

fn content_ids(entries: &[FeedEntry]) -> Vec<i64> {
    entries.iter().map(|entry| entry.content_id).collect()
}

#[tokio::test]
async fn publish_reaches_every_follower() {
    let harness = Harness::with_defaults().await;
    harness.follow_all(1, [2, 3, 4]).await;

    let receipt = harness.publish(1, 100, 0).await;
    assert_eq!(receipt.backend, Backend::Relational);
    assert_eq!(receipt.self_entry, FeedEntry::new(1, 100, at(0)));
    assert_eq!(harness.repos.queued(JobType::FanoutMain), 1);

    let report = harness.drain().await;
    assert_eq!(report.main_jobs, 1);
    assert_eq!(report.batch_jobs, 1);
    assert_eq!(report.failed, 0);

    for owner in [1, 2, 3, 4] {
        let recent = harness.app.feed.recent(owner).await.unwrap();
        assert_eq!(content_ids(&recent), vec![100], "owner {owner}");
        assert_eq!(recent[0].created_at, at(0));
    }
    assert_eq!(harness.repos.entry_count(), 4);
    assert_eq!(
        harness
            .app
            .counters
            .get(CacheKey::ContentDeliveries(100))
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn followers_are_split_into_batches() {
    let harness = Harness::new(ServeOverrides {
        fanout_batch_size: Some(4),
        ..Default::default()
    })
    .await;
    harness.follow_all(1, 10..20).await;

    harness.publish(1, 7, 0).await;
    let report = harness.drain().await;

    assert_eq!(report.batch_jobs, 3);
    assert_eq!(harness.repos.entry_count(), 11);
}

#[tokio::test]
async fn rerunning_a_batch_changes_nothing() {
    let harness = Harness::with_defaults().await;
    harness.follow_all(1, [2, 3]).await;
    harness.publish(1, 55, 5).await;
    harness.drain().await;

    let payload = FanoutBatchJobPayload {
        content_id: 55,
        created_at: at(5),
        backend: Backend::Relational,
        owner_ids: vec![2, 3],
    };
    let outcome = harness.app.jobs.worker.run(&payload).await.unwrap();

    assert_eq!(outcome.requested, 2);
    assert_eq!(outcome.created, 0);
    assert_eq!(harness.repos.entry_count(), 3);
    let recent = harness.app.feed.recent(2).await.unwrap();
    assert_eq!(content_ids(&recent), vec![55]);
}

#[tokio::test]
async fn publisher_without_followers_only_gets_own_entry() {
    let harness = Harness::with_defaults().await;

    harness.publish(9, 1, 0).await;
    let report = harness.drain().await;

    assert_eq!(report.main_jobs, 1);
    assert_eq!(report.batch_jobs, 0);
    assert_eq!(harness.repos.entry_count(), 1);
}

#[tokio::test]
async fn wide_column_gate_routes_the_whole_event() {
    let harness = Harness::with_defaults().await;
    harness.follow_all(1, [2, 3]).await;
    harness.switch_on(EntityFamily::NewsFeed).await;

    let receipt = harness.publish(1, 42, 30).await;
    assert_eq!(receipt.backend, Backend::WideColumn);
    harness.drain().await;

    assert_eq!(harness.repos.entry_count(), 0);
    assert_eq!(harness.table.len("newsfeeds"), 3);
    let recent = harness.app.feed.recent(3).await.unwrap();
    assert_eq!(recent, vec![FeedEntry::new(3, 42, at(30))]);
}

#[tokio::test]
async fn concurrent_first_pushes_leave_one_copy_each() {
    let harness = Harness::with_defaults().await;
    let store = harness.app.stores.get(Backend::Relational);
    let first = FeedEntry::new(5, 1, at(1));
    let second = FeedEntry::new(5, 2, at(2));
    store
        .insert_entries(&[first.clone(), second.clone()])
        .await
        .unwrap();

    let loader = StoreLoader(store);
    let (a, b) = tokio::join!(
        harness.app.cache.push(&first, &loader),
        harness.app.cache.push(&second, &loader)
    );
    a.unwrap();
    b.unwrap();

    let cached = harness.app.cache.get(5, &loader).await.unwrap();
    assert_eq!(content_ids(&cached), vec![2, 1]);
}

#[tokio::test]
async fn cached_lists_stay_bounded() {
    let harness = Harness::new(ServeOverrides {
        cache_list_length_limit: Some(3),
        ..Default::default()
    })
    .await;
    harness.follow_all(1, [2]).await;

    for content in 1..=5 {
        harness.publish(1, content, content).await;
        harness.drain().await;
    }

    let recent = harness.app.feed.recent(2).await.unwrap();
    assert_eq!(content_ids(&recent), vec![5, 4, 3]);
    assert_eq!(harness.repos.entry_count(), 10);
}

#[tokio::test]
async fn unavailable_store_fails_publish() {
    let harness = Harness::with_defaults().await;
    harness.repos.set_available(false);

    let err = harness
        .app
        .fanout
        .publish(feedline::application::fanout::PublishEvent {
            content_id: 1,
            publisher_id: 1,
            created_at: at(0),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FanoutError::Repo(ref repo) if repo.is_transient()
    ));
}

fn backend_for(family: Option<EntityFamily>) -> Backend {
    match family {
        Some(_) => Backend::WideColumn,
        None => Backend::Relational,
    }
}

async fn harness_for(family: Option<EntityFamily>) -> Harness {
    let harness = Harness::with_defaults().await;
    if let Some(family) = family {
        harness.switch_on(family).await;
    }
    harness
}

#[tokio::test]
async fn entries_stored_by_an_earlier_attempt_reach_a_warm_cache() {
    for family in [None, Some(EntityFamily::NewsFeed)] {
        let harness = harness_for(family).await;
        harness.follow_all(1, [2]).await;
        harness.publish(1, 1, 2).await;
        harness.drain().await;
        let recent = harness.app.feed.recent(2).await.unwrap();
        assert_eq!(content_ids(&recent), vec![1]);

        // Rows written before the earlier attempt stopped short of the cache.
        harness
            .app
            .stores
            .get(backend_for(family))
            .insert_entries(&[FeedEntry::new(1, 2, at(4)), FeedEntry::new(2, 2, at(4))])
            .await
            .unwrap();

        harness.publish(1, 2, 4).await;
        assert_eq!(harness.drain().await.failed, 0);

        for owner in [1, 2] {
            let recent = harness.app.feed.recent(owner).await.unwrap();
            assert_eq!(content_ids(&recent), vec![2, 1], "owner {owner}");
        }
    }
}

#[tokio::test]
async fn republished_content_keeps_its_first_entry() {
    for family in [None, Some(EntityFamily::NewsFeed)] {
        let harness = harness_for(family).await;
        let backend = backend_for(family);
        harness.follow_all(1, [2]).await;
        harness.publish(1, 7, 10).await;
        harness.drain().await;

        let again = harness.publish(1, 7, 20).await;
        assert_eq!(again.self_entry.created_at, at(10));
        assert_eq!(harness.drain().await.failed, 0);

        let outcome = harness
            .app
            .jobs
            .worker
            .run(&FanoutBatchJobPayload {
                content_id: 7,
                created_at: at(20),
                backend,
                owner_ids: vec![2],
            })
            .await
            .unwrap();
        assert_eq!(outcome.created, 0);

        let store = harness.app.stores.get(backend);
        for owner in [1, 2] {
            let stored = store.latest(owner, 10).await.unwrap();
            assert_eq!(stored, vec![FeedEntry::new(owner, 7, at(10))], "owner {owner}");

            let cached = harness.app.feed.recent(owner).await.unwrap();
            assert_eq!(cached, stored, "owner {owner}");
            harness.app.cache.invalidate(owner).await.unwrap();
            let reloaded = harness.app.feed.recent(owner).await.unwrap();
            assert_eq!(reloaded, stored, "owner {owner}");
        }

        if family.is_some() {
            assert_eq!(harness.table.len("newsfeeds"), 2);
            assert_eq!(harness.table.len("newsfeed_contents"), 2);
        }
    }
}

#[tokio::test]
async fn wide_feed_row_missing_behind_its_index_is_restored() {
    let harness = harness_for(Some(EntityFamily::NewsFeed)).await;
    harness.follow_all(1, [2]).await;
    harness.publish(1, 3, 6).await;
    harness.drain().await;

    let table: Arc<dyn SortedTable> = harness.table.clone();
    let rows = WideColumnStore::<NewsFeedRow>::new(table);
    let key = FieldSet::new()
        .with("user_id", 2)
        .with("created_at", to_micros(at(6)));
    assert!(rows.delete(&key).await.unwrap());
    assert_eq!(harness.table.len("newsfeeds"), 1);
    assert_eq!(harness.table.len("newsfeed_contents"), 2);

    let store = harness.app.stores.get(Backend::WideColumn);
    let created = store
        .insert_entries(&[FeedEntry::new(2, 3, at(6))])
        .await
        .unwrap();

    assert_eq!(created, vec![FeedEntry::new(2, 3, at(6))]);
    assert_eq!(
        store.latest(2, 10).await.unwrap(),
        vec![FeedEntry::new(2, 3, at(6))]
    );
}

#[tokio::test]
async fn slow_batch_times_out_without_touching_other_batches() {
    let harness = Harness::with_defaults().await;
    harness.follow_all(1, [2, 3, 4, 5]).await;
    harness.publish(1, 8, 0).await;
    let batch = |owner_ids: Vec<i64>| FanoutBatchJobPayload {
        content_id: 8,
        created_at: at(0),
        backend: Backend::Relational,
        owner_ids,
    };
    let tight = FanoutJobContext {
        batch_time_limit: StdDuration::from_millis(10),
        ..harness.app.jobs.clone()
    };

    harness.repos.set_write_delay(StdDuration::from_millis(500));
    let err = process_fanout_batch_job(batch(vec![2, 3]), Data::new(tight))
        .await
        .unwrap_err();
    match err {
        ApalisError::Failed(inner) => assert!(matches!(
            inner.downcast_ref::<FanoutError>(),
            Some(FanoutError::TimedOut { content_id: 8, .. })
        )),
        other => panic!("unexpected job error: {other:?}"),
    }

    harness.repos.set_write_delay(StdDuration::ZERO);
    process_fanout_batch_job(batch(vec![4, 5]), Data::new(harness.app.jobs.clone()))
        .await
        .unwrap();

    assert_eq!(harness.repos.entry_count(), 3);
    for (owner, expected) in [(1, vec![8]), (2, vec![]), (3, vec![]), (4, vec![8]), (5, vec![8])] {
        let recent = harness.app.feed.recent(owner).await.unwrap();
        assert_eq!(content_ids(&recent), expected, "owner {owner}");
    }

    process_fanout_batch_job(batch(vec![2, 3]), Data::new(harness.app.jobs.clone()))
        .await
        .unwrap();
    assert_eq!(harness.repos.entry_count(), 5);
    let recent = harness.app.feed.recent(2).await.unwrap();
    assert_eq!(content_ids(&recent), vec![8]);
}
