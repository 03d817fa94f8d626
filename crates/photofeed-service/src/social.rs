//! User-facing social operations: registration, follows, likes, flags, comments and profiles.
//!
//! These keep the durable store authoritative and treat the caches as mirrors. Cache failures on
//! a mirror step are logged and do not fail the request.

use std::sync::Arc;

use serde::Serialize;

use photofeed_cache::{MetadataCache, NameCache};
use photofeed_core::{Comment, FeedEvent, FeedPolicy, Like, PhotoId, TimelineEntry, User, UserId};
use photofeed_store::Store;

use crate::dispatch::Dispatcher;
use crate::error::ApiError;

/// Result of a follow request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowResult {
    /// The followed user, if known.
    pub followee_id: Option<UserId>,
    /// Whether this request created the edge.
    pub edge_created: bool,
    /// Whether the request was parked until the address signs up.
    pub pending: bool,
}

/// A followed user with their cached display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowedUser {
    /// The user.
    pub user_id: UserId,
    /// Display name, empty if unknown.
    pub name: String,
}

/// Follower and following counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Number of followers.
    pub followers: usize,
    /// Number of followed users.
    pub following: usize,
}

/// State of the viewer's like on a photo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeStatus {
    /// The photo.
    pub photo_id: PhotoId,
    /// Whether the viewer now likes it.
    pub liked: bool,
    /// Like count, if the cache answered.
    pub likes: Option<u64>,
}

/// Social operations over the store and caches.
#[derive(Clone)]
pub struct SocialService {
    store: Arc<dyn Store>,
    metadata: MetadataCache,
    names: NameCache,
    dispatcher: Arc<dyn Dispatcher>,
    policy: FeedPolicy,
}

impl SocialService {
    /// Create the service.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        metadata: MetadataCache,
        names: NameCache,
        dispatcher: Arc<dyn Dispatcher>,
        policy: FeedPolicy,
    ) -> Self {
        Self {
            store,
            metadata,
            names,
            dispatcher,
            policy,
        }
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Create or update a user profile and cache its display name.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for a blank display name, or the store error if the
    /// profile cannot be written.
    pub async fn register_user(
        &self,
        user_id: UserId,
        display_name: &str,
        email: &str,
    ) -> Result<User, ApiError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ApiError::BadRequest("display name is required".into()));
        }

        let mut user = User::new(user_id, display_name, email.trim());
        if let Some(existing) = self.store.get_user(&user.user_id)? {
            user.pending_follows = existing.pending_follows;
        }
        self.store.put_user(&user)?;

        if let Err(e) = self.names.set_name(&user.user_id, &user.display_name).await {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to cache display name");
        }

        tracing::info!(user_id = %user.user_id, "User registered");
        Ok(user)
    }

    /// Look up a user profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the user does not exist.
    pub fn get_person(&self, user_id: &UserId) -> Result<User, ApiError> {
        self.store
            .get_user(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("user not found: {user_id}")))
    }

    /// Follower and following counts of `user_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge scan fails.
    pub fn stats(&self, user_id: &UserId) -> Result<Stats, ApiError> {
        Ok(Stats {
            followers: self.store.followers(user_id)?.len(),
            following: self.store.following(user_id)?.len(),
        })
    }

    // ========================================================================
    // Follows
    // ========================================================================

    /// Follow `target` and schedule the backfill of its recent photos.
    ///
    /// # Errors
    ///
    /// - [`ApiError::BadRequest`] if `viewer` and `target` are the same user
    /// - [`ApiError::NotFound`] if either user does not exist
    /// - [`ApiError::Unavailable`] if the store is down or the event cannot be enqueued
    pub async fn follow(&self, viewer: &UserId, target: &UserId) -> Result<FollowResult, ApiError> {
        if viewer == target {
            return Err(ApiError::BadRequest("cannot follow yourself".into()));
        }

        let edge_created = self.store.follow(viewer, target)?;

        let event = FeedEvent::NewFollow {
            follower_id: viewer.clone(),
            followee_id: target.clone(),
        };
        self.dispatcher.enqueue(event).await.map_err(|e| {
            tracing::error!(follower_id = %viewer, followee_id = %target, error = %e, "Failed to enqueue new-follow");
            ApiError::Unavailable(e.to_string())
        })?;

        Ok(FollowResult {
            followee_id: Some(target.clone()),
            edge_created,
            pending: false,
        })
    }

    /// Follow whoever owns `email`, or remember the request if nobody does yet.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for a blank address, otherwise the errors of
    /// [`SocialService::follow`].
    pub async fn follow_by_email(
        &self,
        viewer: &UserId,
        email: &str,
    ) -> Result<FollowResult, ApiError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ApiError::BadRequest("email is required".into()));
        }

        match self.store.find_user_by_email(email)? {
            Some(target) => self.follow(viewer, &target).await,
            None => {
                self.store.add_pending_follow(viewer, email)?;
                tracing::info!(user_id = %viewer, "Follow parked until the address signs up");
                Ok(FollowResult {
                    followee_id: None,
                    edge_created: false,
                    pending: true,
                })
            }
        }
    }

    /// Users `viewer` follows, with their display names.
    ///
    /// Names degrade to empty strings when the cache is unavailable.
    ///
    /// # Errors
    ///
    /// Returns an error if the edge scan fails.
    pub async fn following(&self, viewer: &UserId) -> Result<Vec<FollowedUser>, ApiError> {
        let followed = self.store.following(viewer)?;
        let names = match self.names.get_names(&followed).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(user_id = %viewer, error = %e, "Name lookup failed");
                vec![String::new(); followed.len()]
            }
        };

        Ok(followed
            .into_iter()
            .zip(names)
            .map(|(user_id, name)| FollowedUser { user_id, name })
            .collect())
    }

    // ========================================================================
    // Likes, flags, comments
    // ========================================================================

    /// Like a photo.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable like cannot be written. Cache failures are only logged.
    pub async fn like(&self, viewer: &UserId, photo_id: &PhotoId) -> Result<LikeStatus, ApiError> {
        if let Err(e) = self.metadata.like(photo_id, viewer).await {
            tracing::warn!(photo_id = %photo_id, user_id = %viewer, error = %e, "Cache like failed");
        }
        self.store.put_like(
            photo_id,
            &Like {
                user_id: viewer.clone(),
            },
        )?;

        Ok(LikeStatus {
            photo_id: photo_id.clone(),
            liked: true,
            likes: self.cached_like_count(photo_id).await,
        })
    }

    /// Withdraw a like.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable like cannot be deleted. Cache failures are only logged.
    pub async fn unlike(
        &self,
        viewer: &UserId,
        photo_id: &PhotoId,
    ) -> Result<LikeStatus, ApiError> {
        self.store.delete_like(photo_id, viewer)?;
        if let Err(e) = self.metadata.unlike(photo_id, viewer).await {
            tracing::warn!(photo_id = %photo_id, user_id = %viewer, error = %e, "Cache unlike failed");
        }

        Ok(LikeStatus {
            photo_id: photo_id.clone(),
            liked: false,
            likes: self.cached_like_count(photo_id).await,
        })
    }

    async fn cached_like_count(&self, photo_id: &PhotoId) -> Option<u64> {
        self.metadata
            .like_count(photo_id)
            .await
            .map_err(|e| {
                tracing::warn!(photo_id = %photo_id, error = %e, "Like count unavailable");
            })
            .ok()
    }

    /// Flag a photo, returning its new flag count.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unavailable`] if the cache call fails; the counter lives only there.
    pub async fn flag(&self, viewer: &UserId, photo_id: &PhotoId) -> Result<i64, ApiError> {
        let flags = self.metadata.flag(photo_id).await?;
        tracing::info!(photo_id = %photo_id, user_id = %viewer, flags, "Photo flagged");
        Ok(flags)
    }

    /// Comment on a photo.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::BadRequest`] for empty text, or the store error if the comment cannot
    /// be written.
    pub fn add_comment(
        &self,
        viewer: &UserId,
        photo_id: &PhotoId,
        text: &str,
    ) -> Result<Comment, ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::BadRequest("comment text is required".into()));
        }

        let comment = Comment::now(viewer.clone(), text);
        self.store.put_comment(photo_id, &comment)?;
        Ok(comment)
    }

    /// Comments on a photo, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the comment scan fails.
    pub fn comments(&self, photo_id: &PhotoId) -> Result<Vec<Comment>, ApiError> {
        Ok(self.store.comments(photo_id)?)
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Schedule the fan-out of an uploaded image.
    ///
    /// The upload pipeline reports every object it writes. Only `{posterID}.{photoID}.{ext}`
    /// names are originals; anything else (variants, thumbnails) is ignored and gives `None`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::BadRequest`] if the name has the right shape but an invalid poster or photo
    ///   segment
    /// - [`ApiError::Unavailable`] if the `new-photo` event cannot be enqueued
    pub async fn photo_pushed(&self, object_name: &str) -> Result<Option<PhotoId>, ApiError> {
        let segments: Vec<&str> = object_name.split('.').collect();
        let [poster, suffix, _ext] = segments.as_slice() else {
            tracing::debug!(object_name, "Ignoring pushed object");
            return Ok(None);
        };
        let photo_id = PhotoId::new(poster.parse()?, *suffix)?;

        let event = FeedEvent::NewPhoto {
            photo_id: photo_id.clone(),
        };
        self.dispatcher.enqueue(event).await.map_err(|e| {
            tracing::error!(photo_id = %photo_id, error = %e, "Failed to enqueue new-photo");
            ApiError::Unavailable(e.to_string())
        })?;

        tracing::info!(photo_id = %photo_id, "Photo upload announced");
        Ok(Some(photo_id))
    }

    // ========================================================================
    // Profile
    // ========================================================================

    /// A user's own photos, newest first, read from the durable store.
    ///
    /// With `before`, only photos created strictly earlier are returned.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the user does not exist, or the store error if the scan
    /// fails.
    pub fn profile(
        &self,
        user_id: &UserId,
        before: Option<i64>,
    ) -> Result<Vec<TimelineEntry>, ApiError> {
        let user = self.get_person(user_id)?;
        let limit = self.policy.page_size.saturating_mul(3);

        Ok(self
            .store
            .recent_photos(user_id, limit, before)?
            .into_iter()
            .map(|photo| TimelineEntry {
                created: photo.created,
                user_id: user.user_id.clone(),
                name: user.display_name.clone(),
                photo_id: photo.photo_id,
                likes: 0,
                i_like: false,
            })
            .collect())
    }
}
