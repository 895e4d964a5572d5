use std::sync::Arc;

use crate::application::fanout::FanoutCoordinator;
use crate::application::feed::NewsFeedService;
use crate::application::friendships::FriendshipService;
use crate::application::repos::HealthRepo;

use super::rate_limit::FeedRateLimiter;

#[derive(Clone)]
pub struct ApiState {
    pub feed: Arc<NewsFeedService>,
    pub fanout: Arc<FanoutCoordinator>,
    pub friendships: Arc<FriendshipService>,
    pub health: Arc<dyn HealthRepo>,
    pub rate_limiter: Arc<FeedRateLimiter>,
}
