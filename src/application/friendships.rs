//! Follow graph over the relational table or two wide-column indexes.

use std::{collections::HashSet, sync::Arc};

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;

use crate::application::repos::{FriendshipRepo, RepoError};
use crate::application::selector::StoreSelector;
use crate::domain::entities::Friendship;
use crate::domain::timestamps::{to_micros, truncate_micros};
use crate::domain::types::{Backend, EntityFamily};
use crate::wide::{FieldSet, FieldValue, Filter, FollowerRow, FollowingRow, WideColumnStore, WideModel};

#[derive(Debug, Error)]
pub enum FriendshipError {
    #[error("user {0} cannot follow themselves")]
    SelfFollow(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Result of a follow call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Followed {
    pub edge: Friendship,
    pub created: bool,
}

/// Follow edges, stored per the friendship gate.
///
/// The wide-column layout keeps two tables because a sorted store only
/// answers prefix queries: `followings` keyed by the follower and
/// `followers` keyed by the followed user. Both are written on follow and
/// removed on unfollow.
pub struct FriendshipService {
    selector: StoreSelector,
    repo: Arc<dyn FriendshipRepo>,
    followings: WideColumnStore<FollowingRow>,
    followers: WideColumnStore<FollowerRow>,
}

impl FriendshipService {
    pub fn new(
        selector: StoreSelector,
        repo: Arc<dyn FriendshipRepo>,
        followings: WideColumnStore<FollowingRow>,
        followers: WideColumnStore<FollowerRow>,
    ) -> Self {
        Self {
            selector,
            repo,
            followings,
            followers,
        }
    }

    pub async fn follow(&self, from_user_id: i64, to_user_id: i64) -> Result<Followed, FriendshipError> {
        if from_user_id == to_user_id {
            return Err(FriendshipError::SelfFollow(from_user_id));
        }

        let backend = self.selector.select(EntityFamily::Friendship).await?;
        let candidate = Friendship {
            from_user_id,
            to_user_id,
            created_at: truncate_micros(OffsetDateTime::now_utc()),
        };

        let followed = match backend {
            Backend::Relational => {
                if self.repo.insert_friendship(&candidate).await? {
                    Followed {
                        edge: candidate,
                        created: true,
                    }
                } else {
                    let edge = self
                        .repo
                        .find_friendship(from_user_id, to_user_id)
                        .await?
                        .ok_or(RepoError::NotFound)?;
                    Followed {
                        edge,
                        created: false,
                    }
                }
            }
            Backend::WideColumn => self.follow_wide(candidate).await?,
        };

        if followed.created {
            info!(
                target = "feedline::application::friendships",
                from_user_id,
                to_user_id,
                backend = backend.as_str(),
                "follow edge created"
            );
        }
        Ok(followed)
    }

    pub async fn unfollow(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, FriendshipError> {
        let backend = self.selector.select(EntityFamily::Friendship).await?;
        let removed = match backend {
            Backend::Relational => self
                .repo
                .delete_friendship(from_user_id, to_user_id)
                .await?
                .is_some(),
            Backend::WideColumn => {
                let Some(edge) = self.find_wide(from_user_id, to_user_id).await? else {
                    return Ok(false);
                };
                let at = to_micros(edge.created_at);
                self.followers
                    .delete(
                        &FieldSet::new()
                            .with("to_user_id", to_user_id)
                            .with("created_at", at),
                    )
                    .await
                    .map_err(RepoError::from)?;
                self.followings
                    .delete(
                        &FieldSet::new()
                            .with("from_user_id", from_user_id)
                            .with("created_at", at),
                    )
                    .await
                    .map_err(RepoError::from)?
            }
        };

        if removed {
            info!(
                target = "feedline::application::friendships",
                from_user_id,
                to_user_id,
                backend = backend.as_str(),
                "follow edge removed"
            );
        }
        Ok(removed)
    }

    pub async fn find(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<Option<Friendship>, RepoError> {
        match self.selector.select(EntityFamily::Friendship).await? {
            Backend::Relational => self.repo.find_friendship(from_user_id, to_user_id).await,
            Backend::WideColumn => self.find_wide(from_user_id, to_user_id).await,
        }
    }

    /// Users subscribed to `user_id`, each listed once.
    pub async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        let ids = match self.selector.select(EntityFamily::Friendship).await? {
            Backend::Relational => self.repo.follower_ids(user_id).await?,
            Backend::WideColumn => self
                .followers
                .filter(&owner_filter(user_id))
                .await?
                .into_iter()
                .map(|row| row.from_user_id)
                .collect(),
        };
        Ok(unique(ids))
    }

    /// Users `user_id` subscribes to, each listed once.
    pub async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError> {
        let ids = match self.selector.select(EntityFamily::Friendship).await? {
            Backend::Relational => self.repo.following_ids(user_id).await?,
            Backend::WideColumn => self
                .followings
                .filter(&owner_filter(user_id))
                .await?
                .into_iter()
                .map(|row| row.to_user_id)
                .collect(),
        };
        Ok(unique(ids))
    }

    async fn follow_wide(&self, candidate: Friendship) -> Result<Followed, RepoError> {
        // An existing `followings` row is authoritative; rewriting its
        // `followers` twin repairs a follow that failed halfway.
        if let Some(edge) = self
            .find_wide(candidate.from_user_id, candidate.to_user_id)
            .await?
        {
            self.followers
                .create(FollowerRow::from(&edge).to_fields())
                .await?;
            return Ok(Followed {
                edge,
                created: false,
            });
        }

        self.followers
            .create(FollowerRow::from(&candidate).to_fields())
            .await?;
        self.followings
            .create(FollowingRow::from(&candidate).to_fields())
            .await?;
        Ok(Followed {
            edge: candidate,
            created: true,
        })
    }

    async fn find_wide(
        &self,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<Option<Friendship>, RepoError> {
        Ok(self
            .followings
            .filter(&owner_filter(from_user_id))
            .await?
            .into_iter()
            .find(|row| row.to_user_id == to_user_id)
            .map(|row| Friendship {
                from_user_id: row.from_user_id,
                to_user_id: row.to_user_id,
                created_at: row.created_at,
            }))
    }
}

fn owner_filter(user_id: i64) -> Filter {
    Filter {
        prefix: Some(vec![FieldValue::Int(user_id)]),
        ..Filter::default()
    }
}

fn unique(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
