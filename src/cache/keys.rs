//! Cache key definitions.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Bounded list of an owner's most recent feed entries.
    NewsFeed(i64),
    /// Number of feed entries fanned out for one piece of content.
    ContentDeliveries(i64),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::NewsFeed(owner_id) => write!(f, "user_newsfeeds:{owner_id}"),
            CacheKey::ContentDeliveries(content_id) => {
                write!(f, "content_deliveries:{content_id}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_kind() {
        assert_eq!(CacheKey::NewsFeed(7).to_string(), "user_newsfeeds:7");
        assert_eq!(
            CacheKey::ContentDeliveries(7).to_string(),
            "content_deliveries:7"
        );
    }
}
