//! Timestamp cursor pagination over cached lists and feed stores.
//!
//! A request is in one of three modes: the latest page, entries older than a
//! cursor, or entries newer than a cursor. Older pages use the `page_size + 1`
//! probe to decide `has_next_page`. Newer requests are unbounded up to
//! `max_upside_paginate`; past that ceiling only the newest page is returned
//! and the client is told to reload.

use feedline_api_types::FeedQuery;
use thiserror::Error;
use time::OffsetDateTime;

use crate::application::feed_store::FeedStore;
use crate::application::repos::RepoError;
use crate::config::PaginationSettings;
use crate::domain::entities::FeedEntry;
use crate::domain::timestamps::parse_iso8601;

pub const NEWER_PARAM: &str = "created_at__gt";
pub const OLDER_PARAM: &str = "created_at__lt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    Latest,
    /// Entries strictly older than the timestamp.
    Older(OffsetDateTime),
    /// Entries strictly newer than the timestamp.
    Newer(OffsetDateTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub cursor: Cursor,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    pub has_next_page: bool,
    pub beyond_upside_paginate: bool,
}

impl FeedPage {
    fn bounded(mut entries: Vec<FeedEntry>, page_size: usize) -> Self {
        let has_next_page = entries.len() > page_size;
        entries.truncate(page_size);
        Self {
            entries,
            has_next_page,
            beyond_upside_paginate: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("`{param}` requires a timestamp value")]
    MissingValue { param: &'static str },
    #[error("`{param}` is not an ISO-8601 timestamp: `{value}`")]
    InvalidTimestamp { param: &'static str, value: String },
    #[error("`created_at__gt` and `created_at__lt` cannot be combined")]
    ConflictingCursors,
    #[error("`page_size` must be at least 1")]
    InvalidPageSize,
}

#[derive(Debug, Clone)]
pub struct CursorPaginator {
    default_page_size: usize,
    max_page_size: usize,
    max_upside_paginate: usize,
}

impl CursorPaginator {
    pub fn new(default_page_size: usize, max_page_size: usize, max_upside_paginate: usize) -> Self {
        let max_page_size = max_page_size.max(1);
        Self {
            default_page_size: default_page_size.clamp(1, max_page_size),
            max_page_size,
            max_upside_paginate,
        }
    }

    pub fn from_settings(settings: &PaginationSettings) -> Self {
        Self::new(
            settings.default_page_size.get() as usize,
            settings.max_page_size.get() as usize,
            settings.max_upside_paginate.get() as usize,
        )
    }

    pub fn max_upside_paginate(&self) -> usize {
        self.max_upside_paginate
    }

    /// Validate query parameters into a request.
    ///
    /// `page_size` above the maximum is clamped rather than rejected.
    pub fn parse(&self, query: &FeedQuery) -> Result<PageRequest, PaginationError> {
        let page_size = match query.page_size {
            None => self.default_page_size,
            Some(0) => return Err(PaginationError::InvalidPageSize),
            Some(size) => (size as usize).min(self.max_page_size),
        };

        let cursor = match (
            query.created_after.as_deref(),
            query.created_before.as_deref(),
        ) {
            (Some(_), Some(_)) => return Err(PaginationError::ConflictingCursors),
            (Some(raw), None) => Cursor::Newer(parse_cursor(NEWER_PARAM, raw)?),
            (None, Some(raw)) => Cursor::Older(parse_cursor(OLDER_PARAM, raw)?),
            (None, None) => Cursor::Latest,
        };

        Ok(PageRequest { cursor, page_size })
    }

    /// Page through a complete newest-first list held in memory.
    pub fn paginate_list(&self, entries: &[FeedEntry], request: &PageRequest) -> FeedPage {
        let probe = request.page_size + 1;
        match request.cursor {
            Cursor::Latest => {
                FeedPage::bounded(entries.iter().take(probe).cloned().collect(), request.page_size)
            }
            Cursor::Older(before) => FeedPage::bounded(
                entries
                    .iter()
                    .filter(|entry| entry.created_at < before)
                    .take(probe)
                    .cloned()
                    .collect(),
                request.page_size,
            ),
            Cursor::Newer(after) => self.upside(
                entries
                    .iter()
                    .filter(|entry| entry.created_at > after)
                    .cloned()
                    .collect(),
                request.page_size,
            ),
        }
    }

    /// Page through a cached list holding at most `list_limit` entries.
    ///
    /// Returns `None` when the list was truncated and the requested window may
    /// continue past its oldest entry; the caller then reads the store.
    pub fn paginate_cached(
        &self,
        cached: &[FeedEntry],
        list_limit: usize,
        request: &PageRequest,
    ) -> Option<FeedPage> {
        let page = self.paginate_list(cached, request);
        if cached.len() < list_limit {
            return Some(page);
        }

        let answered = match request.cursor {
            Cursor::Latest | Cursor::Older(_) => page.has_next_page,
            Cursor::Newer(after) => {
                page.beyond_upside_paginate
                    || cached.last().is_some_and(|oldest| oldest.created_at <= after)
            }
        };
        answered.then_some(page)
    }

    /// Page through a store, correcting for inclusive scan bounds.
    pub async fn paginate_store(
        &self,
        store: &dyn FeedStore,
        owner_id: i64,
        request: &PageRequest,
    ) -> Result<FeedPage, RepoError> {
        let page_size = request.page_size;
        let inclusive = store.inclusive_bounds();

        match request.cursor {
            Cursor::Latest => {
                let entries = store.latest(owner_id, page_size + 1).await?;
                Ok(FeedPage::bounded(entries, page_size))
            }
            Cursor::Older(before) => {
                let limit = if inclusive { page_size + 2 } else { page_size + 1 };
                let mut entries = store.older(owner_id, before, limit).await?;
                if inclusive {
                    let boundary = entries
                        .iter()
                        .take_while(|entry| entry.created_at >= before)
                        .count();
                    entries.drain(..boundary);
                }
                entries.truncate(page_size + 1);
                Ok(FeedPage::bounded(entries, page_size))
            }
            Cursor::Newer(after) => {
                let mut entries = store.newer(owner_id, after).await?;
                if inclusive {
                    entries.retain(|entry| entry.created_at > after);
                }
                Ok(self.upside(entries, page_size))
            }
        }
    }

    fn upside(&self, mut entries: Vec<FeedEntry>, page_size: usize) -> FeedPage {
        if entries.len() <= self.max_upside_paginate {
            return FeedPage {
                entries,
                has_next_page: false,
                beyond_upside_paginate: false,
            };
        }
        entries.truncate(page_size);
        FeedPage {
            entries,
            has_next_page: true,
            beyond_upside_paginate: true,
        }
    }
}

fn parse_cursor(param: &'static str, raw: &str) -> Result<OffsetDateTime, PaginationError> {
    if raw.trim().is_empty() {
        return Err(PaginationError::MissingValue { param });
    }
    // An unescaped `+` offset arrives as a space after query decoding.
    let normalized = raw.trim().replace(' ', "+");
    parse_iso8601(&normalized).map_err(|_| PaginationError::InvalidTimestamp {
        param,
        value: raw.to_string(),
    })
}
