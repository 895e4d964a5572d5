mod common;

use common::Harness;
use feedline::application::friendships::FriendshipError;
use feedline::domain::types::EntityFamily;

fn sorted(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids
}

#[tokio::test]
async fn wide_follow_writes_both_indexes() {
    let harness = Harness::with_defaults().await;
    harness.switch_on(EntityFamily::Friendship).await;
    let graph = &harness.app.friendships;

    assert!(graph.follow(2, 1).await.unwrap().created);
    assert!(graph.follow(3, 1).await.unwrap().created);
    assert!(graph.follow(2, 4).await.unwrap().created);

    assert_eq!(harness.table.len("followings"), 3);
    assert_eq!(harness.table.len("followers"), 3);
    assert_eq!(sorted(graph.follower_ids(1).await.unwrap()), vec![2, 3]);
    assert_eq!(sorted(graph.following_ids(2).await.unwrap()), vec![1, 4]);
    assert!(graph.find(2, 1).await.unwrap().is_some());
}

#[tokio::test]
async fn wide_unfollow_removes_both_indexes() {
    let harness = Harness::with_defaults().await;
    harness.switch_on(EntityFamily::Friendship).await;
    let graph = &harness.app.friendships;
    graph.follow(2, 1).await.unwrap();
    graph.follow(3, 1).await.unwrap();

    assert!(graph.unfollow(2, 1).await.unwrap());
    assert!(!graph.unfollow(2, 1).await.unwrap());

    assert_eq!(graph.follower_ids(1).await.unwrap(), vec![3]);
    assert!(graph.following_ids(2).await.unwrap().is_empty());
    assert_eq!(harness.table.len("followings"), 1);
    assert_eq!(harness.table.len("followers"), 1);
}

#[tokio::test]
async fn repeated_follow_keeps_one_edge() {
    for wide in [false, true] {
        let harness = Harness::with_defaults().await;
        if wide {
            harness.switch_on(EntityFamily::Friendship).await;
        }
        let graph = &harness.app.friendships;

        let first = graph.follow(5, 6).await.unwrap();
        let again = graph.follow(5, 6).await.unwrap();

        assert!(first.created);
        assert!(!again.created);
        assert_eq!(again.edge, first.edge);
        assert_eq!(graph.follower_ids(6).await.unwrap(), vec![5]);
    }
}

#[tokio::test]
async fn self_follow_is_refused() {
    let harness = Harness::with_defaults().await;
    let err = harness.app.friendships.follow(8, 8).await.unwrap_err();
    assert!(matches!(err, FriendshipError::SelfFollow(8)));
}

#[tokio::test]
async fn fanout_reads_followers_from_the_wide_graph() {
    let harness = Harness::with_defaults().await;
    harness.switch_on(EntityFamily::Friendship).await;
    harness.follow_all(1, [2, 3]).await;

    harness.publish(1, 9, 0).await;
    harness.drain().await;

    assert_eq!(harness.repos.entry_count(), 3);
    assert_eq!(harness.app.feed.recent(3).await.unwrap().len(), 1);
}
