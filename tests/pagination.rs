mod common;

use common::{Harness, at};
use feedline::application::feed::FeedError;
use feedline::application::pagination::{FeedPage, PaginationError};
use feedline::config::ServeOverrides;
use feedline::domain::types::EntityFamily;
use feedline_api_types::FeedQuery;
use time::format_description::well_known::Rfc3339;

const OWNER: i64 = 2;

fn content_ids(page: &FeedPage) -> Vec<i64> {
    page.entries.iter().map(|entry| entry.content_id).collect()
}

fn stamp(seconds: i64) -> Option<String> {
    Some(at(seconds).format(&Rfc3339).unwrap())
}

fn older(seconds: i64) -> FeedQuery {
    FeedQuery {
        created_before: stamp(seconds),
        page_size: Some(2),
        ..FeedQuery::default()
    }
}

fn newer(seconds: i64) -> FeedQuery {
    FeedQuery {
        created_after: stamp(seconds),
        page_size: Some(2),
        ..FeedQuery::default()
    }
}

/// Owner 2 follows publisher 1, who publishes contents 1..=5 at seconds 2, 4, 6, 8, 10.
/// The cached list holds only the newest three entries.
async fn seeded(family_on: Option<EntityFamily>, max_upside: u32) -> Harness {
    let harness = Harness::new(ServeOverrides {
        cache_list_length_limit: Some(3),
        pagination_max_upside_paginate: Some(max_upside),
        ..Default::default()
    })
    .await;
    if let Some(family) = family_on {
        harness.switch_on(family).await;
    }
    harness.follow_all(1, [OWNER]).await;
    for content in 1..=5 {
        harness.publish(1, content, content * 2).await;
    }
    assert_eq!(harness.drain().await.failed, 0);
    harness
}

async fn walk_pages(harness: &Harness) {
    let feed = &harness.app.feed;

    let latest = feed
        .page(
            OWNER,
            &FeedQuery {
                page_size: Some(2),
                ..FeedQuery::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(content_ids(&latest), vec![5, 4]);
    assert!(latest.has_next_page);

    let second = feed.page(OWNER, &older(8)).await.unwrap();
    assert_eq!(content_ids(&second), vec![3, 2]);
    assert!(second.has_next_page);

    let last = feed.page(OWNER, &older(4)).await.unwrap();
    assert_eq!(content_ids(&last), vec![1]);
    assert!(!last.has_next_page);

    let fresh = feed.page(OWNER, &newer(4)).await.unwrap();
    assert_eq!(content_ids(&fresh), vec![5, 4, 3]);
    assert!(!fresh.has_next_page);
    assert!(!fresh.beyond_upside_paginate);
}

#[tokio::test]
async fn relational_pages_cross_the_cached_window() {
    let harness = seeded(None, 100).await;
    walk_pages(&harness).await;
}

#[tokio::test]
async fn wide_column_pages_match_relational_pages() {
    let harness = seeded(Some(EntityFamily::NewsFeed), 100).await;
    walk_pages(&harness).await;
}

#[tokio::test]
async fn pages_survive_a_dropped_cache() {
    let harness = seeded(Some(EntityFamily::NewsFeed), 100).await;
    harness.app.cache.invalidate(OWNER).await.unwrap();
    walk_pages(&harness).await;
}

#[tokio::test]
async fn cursor_on_an_existing_timestamp_excludes_it() {
    for family in [None, Some(EntityFamily::NewsFeed)] {
        let harness = seeded(family, 100).await;
        let page = harness.app.feed.page(OWNER, &newer(8)).await.unwrap();
        assert_eq!(content_ids(&page), vec![5]);

        let page = harness.app.feed.page(OWNER, &older(6)).await.unwrap();
        assert_eq!(content_ids(&page), vec![2, 1]);
        assert!(!page.has_next_page);
    }
}

#[tokio::test]
async fn too_many_newer_entries_signal_a_reload() {
    for family in [None, Some(EntityFamily::NewsFeed)] {
        let harness = seeded(family, 2).await;
        let page = harness.app.feed.page(OWNER, &newer(2)).await.unwrap();

        assert_eq!(content_ids(&page), vec![5, 4]);
        assert!(page.has_next_page);
        assert!(page.beyond_upside_paginate);
    }
}

#[tokio::test]
async fn newer_entries_at_the_ceiling_are_all_returned() {
    let harness = seeded(None, 3).await;
    let page = harness.app.feed.page(OWNER, &newer(4)).await.unwrap();

    assert_eq!(content_ids(&page), vec![5, 4, 3]);
    assert!(!page.beyond_upside_paginate);
}

#[tokio::test]
async fn both_cursors_are_rejected() {
    let harness = seeded(None, 100).await;
    let query = FeedQuery {
        created_after: stamp(2),
        created_before: stamp(8),
        page_size: None,
    };

    let err = harness.app.feed.page(OWNER, &query).await.unwrap_err();
    assert!(matches!(
        err,
        FeedError::Pagination(PaginationError::ConflictingCursors)
    ));
}

#[tokio::test]
async fn empty_feed_has_no_pages() {
    let harness = Harness::with_defaults().await;
    let page = harness
        .app
        .feed
        .page(77, &FeedQuery::default())
        .await
        .unwrap();

    assert!(page.entries.is_empty());
    assert!(!page.has_next_page);
}

fn page_of(size: u32) -> FeedQuery {
    FeedQuery {
        page_size: Some(size),
        ..FeedQuery::default()
    }
}

#[tokio::test]
async fn late_older_entries_leave_the_newest_window_alone() {
    for family in [None, Some(EntityFamily::NewsFeed)] {
        let harness = Harness::new(ServeOverrides {
            cache_list_length_limit: Some(3),
            ..Default::default()
        })
        .await;
        if let Some(family) = family {
            harness.switch_on(family).await;
        }
        harness.follow_all(1, [OWNER]).await;
        for content in [98, 99, 100, 50, 40] {
            harness.publish(1, content, content).await;
            assert_eq!(harness.drain().await.failed, 0);
        }

        let recent = harness.app.feed.recent(OWNER).await.unwrap();
        let recent: Vec<i64> = recent.iter().map(|entry| entry.content_id).collect();
        assert_eq!(recent, vec![100, 99, 98]);

        let query = FeedQuery {
            page_size: Some(1),
            ..older(100)
        };
        let page = harness.app.feed.page(OWNER, &query).await.unwrap();
        assert_eq!(content_ids(&page), vec![99]);
        assert!(page.has_next_page);

        let tail = harness.app.feed.page(OWNER, &older(98)).await.unwrap();
        assert_eq!(content_ids(&tail), vec![50, 40]);
        assert!(!tail.has_next_page);
    }
}

#[tokio::test]
async fn cursors_far_from_the_present_page_like_any_other() {
    let distant_past = Some("1969-12-31T00:00:00Z".to_string());
    let distant_future = Some("2300-01-01T00:00:00Z".to_string());

    for family in [None, Some(EntityFamily::NewsFeed)] {
        let harness = seeded(family, 100).await;
        let feed = &harness.app.feed;

        let before_epoch = FeedQuery {
            created_before: distant_past.clone(),
            ..page_of(2)
        };
        let page = feed.page(OWNER, &before_epoch).await.unwrap();
        assert!(page.entries.is_empty());
        assert!(!page.has_next_page);

        let since_epoch = FeedQuery {
            created_after: distant_past.clone(),
            ..page_of(2)
        };
        let page = feed.page(OWNER, &since_epoch).await.unwrap();
        assert_eq!(content_ids(&page), vec![5, 4, 3, 2, 1]);
        assert!(!page.has_next_page);

        let before_future = FeedQuery {
            created_before: distant_future.clone(),
            ..page_of(5)
        };
        let page = feed.page(OWNER, &before_future).await.unwrap();
        assert_eq!(content_ids(&page), vec![5, 4, 3, 2, 1]);
        assert!(!page.has_next_page);

        let after_future = FeedQuery {
            created_after: distant_future.clone(),
            ..page_of(2)
        };
        let page = feed.page(OWNER, &after_future).await.unwrap();
        assert!(page.entries.is_empty());
    }
}

#[tokio::test]
async fn negative_owner_has_an_empty_feed() {
    for family in [None, Some(EntityFamily::NewsFeed)] {
        let harness = seeded(family, 100).await;
        let feed = &harness.app.feed;

        assert!(feed.page(-3, &page_of(2)).await.unwrap().entries.is_empty());
        let older_page = feed.page(-3, &older(8)).await.unwrap();
        assert!(older_page.entries.is_empty());
        let newer_page = feed.page(-3, &newer(4)).await.unwrap();
        assert!(newer_page.entries.is_empty());
    }
}
