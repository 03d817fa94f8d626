//! Write-path events delivered by the task dispatcher.
//!
//! Delivery is at-least-once and unordered across users, so every handler for these events must be
//! idempotent.

use serde::{Deserialize, Serialize};

use crate::{PhotoId, UserId};

/// An event that drives the fan-out coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FeedEvent {
    /// A photo finished uploading and must reach its poster's followers.
    NewPhoto {
        /// The new photo.
        photo_id: PhotoId,
    },

    /// `follower_id` started following `followee_id`.
    NewFollow {
        /// The user who follows.
        follower_id: UserId,
        /// The user being followed.
        followee_id: UserId,
    },
}

impl FeedEvent {
    /// Short event name, used in task routes and logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewPhoto { .. } => "new-photo",
            Self::NewFollow { .. } => "new-follow",
        }
    }
}
