use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sliding-window limiter for feed reads, one bucket per user.
#[derive(Debug, Clone)]
pub struct FeedRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: Arc<DashMap<i64, Vec<Instant>>>,
}

impl FeedRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: Arc::new(DashMap::new()),
        }
    }

    pub fn from_settings(settings: &crate::config::RateLimitSettings) -> Self {
        Self::new(
            Duration::from_secs(u64::from(settings.window_seconds.get())),
            settings.max_requests.get(),
        )
    }

    /// Record a read for `user_id`; returns whether it is admitted and how
    /// many reads remain in the current window.
    pub fn allow(&self, user_id: i64) -> (bool, u32) {
        self.allow_at(user_id, Instant::now())
    }

    fn allow_at(&self, user_id: i64, now: Instant) -> (bool, u32) {
        let window = self.window;
        let mut entry = self.buckets.entry(user_id).or_default();
        entry.retain(|instant| now.duration_since(*instant) < window);

        let used = u32::try_from(entry.len()).unwrap_or(u32::MAX);
        let remaining = self.max_requests.saturating_sub(used);
        if remaining == 0 {
            return (false, 0);
        }

        entry.push(now);
        (true, remaining.saturating_sub(1))
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_applies_per_user() {
        let limiter = FeedRateLimiter::new(Duration::from_secs(1), 2);
        let now = Instant::now();

        assert_eq!(limiter.allow_at(1, now), (true, 1));
        assert_eq!(limiter.allow_at(1, now), (true, 0));
        assert_eq!(limiter.allow_at(1, now), (false, 0));
        assert_eq!(limiter.allow_at(2, now), (true, 1));
    }

    #[test]
    fn window_slides() {
        let limiter = FeedRateLimiter::new(Duration::from_secs(1), 1);
        let now = Instant::now();

        assert!(limiter.allow_at(9, now).0);
        assert!(!limiter.allow_at(9, now + Duration::from_millis(500)).0);
        assert!(limiter.allow_at(9, now + Duration::from_millis(1001)).0);
    }
}
