//! Timeline read types and cursor positioning.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{IdError, PhotoId, UserId};

/// Position marker for timeline pagination.
///
/// A page request either starts at the head of the feed or continues after the last photo of the
/// previous page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Start at the newest entry.
    Start,
    /// Continue after this photo.
    After(PhotoId),
}

impl Cursor {
    /// Wire form of [`Cursor::Start`].
    pub const START: &'static str = "start";

    /// Index in `feed` where the page should begin.
    ///
    /// `After(p)` resolves to the slot following the first occurrence of `p`. A cursor that no
    /// longer appears in the feed (evicted, or never there) restarts from the head.
    #[must_use]
    pub fn start_index(&self, feed: &[PhotoId]) -> usize {
        match self {
            Self::Start => 0,
            Self::After(last) => feed
                .iter()
                .position(|id| id == last)
                .map_or(0, |i| i + 1),
        }
    }
}

impl FromStr for Cursor {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "0" is what older clients send for the first page.
        if s == Self::START || s == "0" {
            return Ok(Self::Start);
        }
        s.parse().map(Self::After)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str(Self::START),
            Self::After(id) => write!(f, "{id}"),
        }
    }
}

/// One photo as shown in a timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Creation time in epoch seconds.
    pub created: i64,

    /// The poster.
    #[serde(rename = "userid")]
    pub user_id: UserId,

    /// The poster's display name, empty if unknown.
    pub name: String,

    /// The photo.
    #[serde(rename = "photoid")]
    pub photo_id: PhotoId,

    /// Number of likes.
    pub likes: u64,

    /// Whether the viewer likes this photo.
    #[serde(rename = "ilike")]
    pub i_like: bool,
}

/// A page of timeline entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePage {
    /// Entries, newest first.
    pub entries: Vec<TimelineEntry>,

    /// Cursor for the next page: the last photo of this page, or `None` once the feed is
    /// exhausted.
    pub next_cursor: Option<PhotoId>,
}

impl TimelinePage {
    /// An empty, exhausted page.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            next_cursor: None,
        }
    }
}
