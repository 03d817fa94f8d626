//! Durable record types.
//!
//! These are the records kept in the system of record. The hierarchy is
//! `User → Photo → {Like, Comment}`; parent keys are implied by the identifiers each record holds.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{PhotoId, UserId};

/// A user profile.
///
/// The social graph is not stored inline: follower and following edges are separate child keys of
/// the user so that an edge pair can be written in a single atomic batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user ID.
    pub user_id: UserId,

    /// Name shown next to the user's photos.
    pub display_name: String,

    /// Contact email, used to resolve follow requests by address.
    pub email: String,

    /// Email addresses this user asked to follow before their owners signed up.
    #[serde(default)]
    pub pending_follows: Vec<String>,
}

impl User {
    /// Create a new user profile.
    #[must_use]
    pub fn new(user_id: UserId, display_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            email: email.into(),
            pending_follows: Vec::new(),
        }
    }
}

/// A posted photo, owned by its poster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// The photo ID (`{posterID}.{suffix}`).
    pub photo_id: PhotoId,

    /// Creation time in epoch seconds.
    pub created: i64,
}

impl Photo {
    /// Create a photo record with an explicit creation time.
    #[must_use]
    pub fn new(photo_id: PhotoId, created: i64) -> Self {
        Self { photo_id, created }
    }

    /// Create a photo record stamped with the current time.
    #[must_use]
    pub fn now(photo_id: PhotoId) -> Self {
        Self::new(photo_id, Utc::now().timestamp())
    }
}

/// A like, keyed by the liking user under the photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Like {
    /// The user who liked the photo.
    pub user_id: UserId,
}

/// A comment on a photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Author of the comment.
    #[serde(rename = "personid")]
    pub author: UserId,

    /// Comment body.
    pub text: String,

    /// Creation time in epoch milliseconds.
    pub time: i64,
}

impl Comment {
    /// Create a comment stamped with the current time.
    #[must_use]
    pub fn now(author: UserId, text: impl Into<String>) -> Self {
        Self {
            author,
            text: text.into(),
            time: Utc::now().timestamp_millis(),
        }
    }
}
