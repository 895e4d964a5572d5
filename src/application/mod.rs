//! Application services: fanout, feed reads, the follow graph and backend selection.

pub mod error;
pub mod fanout;
pub mod feed;
pub mod feed_store;
pub mod friendships;
pub mod gatekeeper;
pub mod jobs;
pub mod pagination;
pub mod repos;
pub mod selector;
