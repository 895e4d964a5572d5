//! API handlers organized by resource type.

mod feeds;
mod friendships;
mod health;
mod publications;

pub use feeds::*;
pub use friendships::*;
pub use health::*;
pub use publications::*;
