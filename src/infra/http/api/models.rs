//! Conversions between application types and the wire types in `feedline_api_types`.

pub use feedline_api_types::{
    FeedEntryView, FeedPageResponse, FollowRequest, FollowView, PublishAccepted, PublishRequest,
};

use crate::application::fanout::PublishReceipt;
use crate::application::pagination::FeedPage;
use crate::domain::entities::{FeedEntry, Friendship};

pub fn entry_view(entry: &FeedEntry) -> FeedEntryView {
    FeedEntryView {
        owner_id: entry.owner_id,
        content_id: entry.content_id,
        created_at: entry.created_at,
    }
}

pub fn page_response(page: FeedPage) -> FeedPageResponse<FeedEntryView> {
    FeedPageResponse {
        results: page.entries.iter().map(entry_view).collect(),
        has_next_page: page.has_next_page,
        beyond_upside_paginate: page.beyond_upside_paginate,
    }
}

pub fn follow_view(edge: &Friendship) -> FollowView {
    FollowView {
        from_user_id: edge.from_user_id,
        to_user_id: edge.to_user_id,
        created_at: edge.created_at,
    }
}

pub fn publish_accepted(receipt: &PublishReceipt) -> PublishAccepted {
    PublishAccepted {
        content_id: receipt.self_entry.content_id,
        backend: receipt.backend.as_str().to_string(),
        self_entry: entry_view(&receipt.self_entry),
        job_id: receipt.job_id.clone(),
    }
}
