//! Feed policy constants.
//!
//! The defaults below are the values the feed has always run with. They are grouped in
//! [`FeedPolicy`] so deployments can override them through configuration.

use serde::{Deserialize, Serialize};

/// Maximum number of entries kept in a user's feed list.
pub const DEFAULT_FEED_CAPACITY: usize = 2000;

/// Number of the followee's most recent photos copied into a new follower's feed.
pub const DEFAULT_BACKFILL_LIMIT: usize = 10;

/// Photos with more flags than this are hidden from timelines.
pub const DEFAULT_FLAG_THRESHOLD: i64 = 1;

/// Number of entries returned per timeline page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Number of recipients whose appends share one pipelined round trip.
pub const DEFAULT_FANOUT_BATCH_SIZE: usize = 1000;

/// Creation time reported for a photo whose metadata is missing from the cache.
pub const MISSING_DATE: i64 = 0;

/// Tunable limits for fan-out, backfill and timeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPolicy {
    /// Feed list capacity; the oldest entries are evicted beyond it.
    pub feed_capacity: usize,

    /// Photos copied on a new follow.
    pub backfill_limit: usize,

    /// Flag count above which a photo is suppressed.
    pub flag_threshold: i64,

    /// Timeline page size.
    pub page_size: usize,

    /// Recipients per fan-out pipeline.
    pub fanout_batch_size: usize,
}

impl FeedPolicy {
    /// Whether a photo with `flags` flags must be hidden.
    #[must_use]
    pub fn is_suppressed(&self, flags: i64) -> bool {
        flags > self.flag_threshold
    }
}

impl Default for FeedPolicy {
    fn default() -> Self {
        Self {
            feed_capacity: DEFAULT_FEED_CAPACITY,
            backfill_limit: DEFAULT_BACKFILL_LIMIT,
            flag_threshold: DEFAULT_FLAG_THRESHOLD,
            page_size: DEFAULT_PAGE_SIZE,
            fanout_batch_size: DEFAULT_FANOUT_BATCH_SIZE,
        }
    }
}
