//! Write path: fan-out of new photos and backfill on new follows.
//!
//! Both handlers run under at-least-once delivery. `new-photo` is made idempotent by the metadata
//! gate (`create_if_absent`) and the fan-out claim (`claim_fanout`): whichever delivery wins the
//! claim appends, every other one is a duplicate. `new-follow` writes an idempotent edge pair and
//! a bounded backfill.
//! Work that fans out to many recipients never fails the event: per-recipient failures are logged
//! and counted in the outcome.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use photofeed_cache::{FeedLists, MetadataCache};
use photofeed_core::{FeedEvent, FeedPolicy, Photo, PhotoId, UserId};
use photofeed_store::Store;

use crate::error::EventError;

// ============================================================================
// Outcomes
// ============================================================================

/// How a `new-photo` delivery was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoDelivery {
    /// First delivery: the photo was persisted and fanned out.
    Delivered,
    /// Another delivery passed the gate but had not claimed the fan-out; this one did it.
    Resumed,
    /// The photo was already processed; nothing was done.
    Duplicate,
}

/// Result of a `new-photo` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPhotoOutcome {
    /// The photo.
    pub photo_id: PhotoId,
    /// What this delivery did.
    pub delivery: PhotoDelivery,
    /// Feeds the photo was addressed to (poster plus followers).
    pub recipients: usize,
    /// Feeds that received it.
    pub delivered: usize,
    /// Feeds whose append failed.
    pub failed: usize,
}

/// Result of a `new-follow` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewFollowOutcome {
    /// The user who follows.
    pub follower_id: UserId,
    /// The user being followed.
    pub followee_id: UserId,
    /// Whether this delivery created the edge pair.
    pub edge_created: bool,
    /// Photos prepended to the follower's feed.
    pub backfilled: usize,
    /// Whether the backfill failed (the edge is in place either way).
    pub backfill_failed: bool,
}

/// Result of any feed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventOutcome {
    /// Outcome of `new-photo`.
    NewPhoto(NewPhotoOutcome),
    /// Outcome of `new-follow`.
    NewFollow(NewFollowOutcome),
}

// ============================================================================
// Coordinator
// ============================================================================

/// Turns feed events into feed list updates.
#[derive(Clone)]
pub struct FanoutCoordinator {
    store: Arc<dyn Store>,
    metadata: MetadataCache,
    feeds: FeedLists,
    policy: FeedPolicy,
}

impl FanoutCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        metadata: MetadataCache,
        feeds: FeedLists,
        policy: FeedPolicy,
    ) -> Self {
        Self {
            store,
            metadata,
            feeds,
            policy,
        }
    }

    /// Handle any feed event.
    ///
    /// # Errors
    ///
    /// Returns the terminal error of the underlying handler.
    pub async fn handle(&self, event: &FeedEvent) -> Result<EventOutcome, EventError> {
        match event {
            FeedEvent::NewPhoto { photo_id } => self
                .handle_new_photo(&photo_id.to_string())
                .await
                .map(EventOutcome::NewPhoto),
            FeedEvent::NewFollow {
                follower_id,
                followee_id,
            } => self
                .handle_new_follow(follower_id, followee_id)
                .await
                .map(EventOutcome::NewFollow),
        }
    }

    /// Handle a `new-photo` event.
    ///
    /// # Errors
    ///
    /// - [`EventError::MalformedId`] if `photo_id` is not `{poster}.{suffix}`
    /// - [`EventError::Missing`] if the poster does not exist
    /// - [`EventError::Store`] / [`EventError::Cache`] if the follower lookup, the dedup gate, the
    ///   durable write or the fan-out claim fails
    pub async fn handle_new_photo(&self, photo_id: &str) -> Result<NewPhotoOutcome, EventError> {
        let photo_id: PhotoId = photo_id.parse()?;
        let poster = photo_id.poster().clone();

        if self.store.get_user(&poster)?.is_none() {
            return Err(EventError::Missing {
                entity: "user",
                id: poster.to_string(),
            });
        }
        let followers = self.store.followers(&poster)?;

        let now = Utc::now().timestamp();
        let gated = self.metadata.create_if_absent(&photo_id, now).await?;
        if gated {
            self.store.put_photo(&Photo::new(photo_id.clone(), now))?;
        } else if self.store.get_photo(&photo_id)?.is_none() {
            // The gate is set but the record is missing: another delivery is in flight or
            // stopped early. Persist with the date it stored.
            let date = self.metadata.date(&photo_id).await?.unwrap_or(now);
            tracing::warn!(photo_id = %photo_id, created = date, "Persisting photo behind the gate");
            self.store.put_photo(&Photo::new(photo_id.clone(), date))?;
        }

        if !self.metadata.claim_fanout(&photo_id).await? {
            tracing::info!(photo_id = %photo_id, "Duplicate new-photo delivery");
            return Ok(NewPhotoOutcome {
                photo_id,
                delivery: PhotoDelivery::Duplicate,
                recipients: 0,
                delivered: 0,
                failed: 0,
            });
        }
        let delivery = if gated {
            PhotoDelivery::Delivered
        } else {
            PhotoDelivery::Resumed
        };

        let recipients = recipients(poster, followers);
        let (delivered, failed) = self.append_to_feeds(&recipients, &photo_id).await;

        tracing::info!(
            photo_id = %photo_id,
            recipients = recipients.len(),
            delivered,
            failed,
            "Photo fanned out"
        );

        Ok(NewPhotoOutcome {
            photo_id,
            delivery,
            recipients: recipients.len(),
            delivered,
            failed,
        })
    }

    /// Append `photo_id` to every recipient's feed in pipelined batches.
    ///
    /// Returns `(delivered, failed)`.
    async fn append_to_feeds(&self, recipients: &[UserId], photo_id: &PhotoId) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;

        for batch in recipients.chunks(self.policy.fanout_batch_size.max(1)) {
            match self.feeds.append_to_many(batch, photo_id).await {
                Ok(results) => {
                    for (user_id, result) in batch.iter().zip(results) {
                        match result {
                            Ok(_) => delivered += 1,
                            Err(e) => {
                                failed += 1;
                                tracing::warn!(
                                    photo_id = %photo_id,
                                    user_id = %user_id,
                                    error = %e,
                                    "Feed append failed"
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    failed += batch.len();
                    tracing::warn!(
                        photo_id = %photo_id,
                        batch = batch.len(),
                        error = %e,
                        "Feed append batch failed"
                    );
                }
            }
        }

        (delivered, failed)
    }

    /// Handle a `new-follow` event.
    ///
    /// # Errors
    ///
    /// - [`EventError::SelfFollow`] if both users are the same
    /// - [`EventError::Missing`] if either user does not exist
    /// - [`EventError::Store`] if the edge pair cannot be written
    pub async fn handle_new_follow(
        &self,
        follower_id: &UserId,
        followee_id: &UserId,
    ) -> Result<NewFollowOutcome, EventError> {
        if follower_id == followee_id {
            return Err(EventError::SelfFollow(follower_id.to_string()));
        }

        let edge_created = self.store.follow(follower_id, followee_id)?;

        let mut outcome = NewFollowOutcome {
            follower_id: follower_id.clone(),
            followee_id: followee_id.clone(),
            edge_created,
            backfilled: 0,
            backfill_failed: false,
        };

        let photos = match self
            .store
            .recent_photos(followee_id, self.policy.backfill_limit, None)
        {
            Ok(photos) => photos,
            Err(e) => {
                tracing::warn!(
                    follower_id = %follower_id,
                    followee_id = %followee_id,
                    error = %e,
                    "Backfill query failed"
                );
                outcome.backfill_failed = true;
                return Ok(outcome);
            }
        };

        let photo_ids: Vec<PhotoId> = photos.into_iter().map(|p| p.photo_id).collect();
        match self.feeds.backfill_front(follower_id, &photo_ids).await {
            Ok(_) => outcome.backfilled = photo_ids.len(),
            Err(e) => {
                tracing::warn!(
                    follower_id = %follower_id,
                    followee_id = %followee_id,
                    error = %e,
                    "Backfill failed"
                );
                outcome.backfill_failed = true;
            }
        }

        tracing::info!(
            follower_id = %follower_id,
            followee_id = %followee_id,
            edge_created,
            backfilled = outcome.backfilled,
            "Follow processed"
        );

        Ok(outcome)
    }
}

/// The poster followed by each distinct follower.
fn recipients(poster: UserId, followers: Vec<UserId>) -> Vec<UserId> {
    let mut seen = HashSet::with_capacity(followers.len() + 1);
    seen.insert(poster.clone());

    let mut recipients = Vec::with_capacity(followers.len() + 1);
    recipients.push(poster);
    for follower in followers {
        if seen.insert(follower.clone()) {
            recipients.push(follower);
        }
    }
    recipients
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use photofeed_cache::{CacheBackend, MemoryCache, Pipeline, Reply};
    use photofeed_core::User;
    use photofeed_store::RocksStore;
    use tempfile::TempDir;

    struct Fixture {
        coordinator: FanoutCoordinator,
        store: Arc<RocksStore>,
        metadata: MetadataCache,
        feeds: FeedLists,
        _dir: TempDir,
    }

    fn fixture(policy: FeedPolicy) -> Fixture {
        fixture_with(policy, Arc::new(MemoryCache::new()))
    }

    fn fixture_with(policy: FeedPolicy, backend: Arc<dyn CacheBackend>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let metadata = MetadataCache::new(backend.clone());
        let feeds = FeedLists::new(backend, policy.feed_capacity);
        let coordinator =
            FanoutCoordinator::new(store.clone(), metadata.clone(), feeds.clone(), policy);
        Fixture {
            coordinator,
            store,
            metadata,
            feeds,
            _dir: dir,
        }
    }

    /// Applies every pipeline at once but holds back the reply to the first one.
    struct SlowFirstReply {
        inner: MemoryCache,
        delayed: AtomicBool,
    }

    #[async_trait]
    impl CacheBackend for SlowFirstReply {
        async fn execute(&self, pipeline: Pipeline) -> photofeed_cache::Result<Vec<Reply>> {
            let replies = self.inner.execute(pipeline).await;
            if !self.delayed.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            replies
        }
    }

    fn user(s: &str) -> UserId {
        s.parse().unwrap()
    }

    fn photo(s: &str) -> PhotoId {
        s.parse().unwrap()
    }

    fn add_user(store: &RocksStore, id: &str) -> UserId {
        let user_id = user(id);
        store
            .put_user(&User::new(user_id.clone(), id, format!("{id}@example.com")))
            .unwrap();
        user_id
    }

    #[test]
    fn recipients_put_poster_first_without_duplicates() {
        let got = recipients(user("A"), vec![user("B"), user("A"), user("C"), user("B")]);
        assert_eq!(got, vec![user("A"), user("B"), user("C")]);
    }

    #[tokio::test]
    async fn new_photo_reaches_poster_and_followers() {
        let f = fixture(FeedPolicy::default());
        let a = add_user(&f.store, "A");
        let b = add_user(&f.store, "B");
        let c = add_user(&f.store, "C");
        f.store.follow(&b, &a).unwrap();
        f.store.follow(&c, &a).unwrap();

        let outcome = f.coordinator.handle_new_photo("A.1").await.unwrap();
        assert_eq!(outcome.delivery, PhotoDelivery::Delivered);
        assert_eq!(outcome.recipients, 3);
        assert_eq!(outcome.delivered, 3);

        for u in [&a, &b, &c] {
            assert_eq!(f.feeds.scan(u).await.unwrap(), vec![photo("A.1")]);
        }
        assert!(f.store.get_photo(&photo("A.1")).unwrap().is_some());
    }

    #[tokio::test]
    async fn redelivery_is_a_no_op() {
        let f = fixture(FeedPolicy::default());
        let a = add_user(&f.store, "A");
        let b = add_user(&f.store, "B");
        f.store.follow(&b, &a).unwrap();

        f.coordinator.handle_new_photo("A.1").await.unwrap();
        let date = f.metadata.date(&photo("A.1")).await.unwrap();

        let again = f.coordinator.handle_new_photo("A.1").await.unwrap();
        assert_eq!(again.delivery, PhotoDelivery::Duplicate);
        assert_eq!(f.feeds.scan(&b).await.unwrap(), vec![photo("A.1")]);
        assert_eq!(f.metadata.date(&photo("A.1")).await.unwrap(), date);
    }

    #[tokio::test]
    async fn gate_without_record_resumes_with_cached_date() {
        let f = fixture(FeedPolicy::default());
        let a = add_user(&f.store, "A");
        // A delivery that set the gate and then died.
        f.metadata.create_if_absent(&photo("A.1"), 1234).await.unwrap();

        let outcome = f.coordinator.handle_new_photo("A.1").await.unwrap();
        assert_eq!(outcome.delivery, PhotoDelivery::Resumed);
        assert_eq!(f.store.get_photo(&photo("A.1")).unwrap().unwrap().created, 1234);
        assert_eq!(f.feeds.scan(&a).await.unwrap(), vec![photo("A.1")]);
    }

    #[tokio::test]
    async fn persisted_but_unclaimed_photo_is_fanned_out() {
        let f = fixture(FeedPolicy::default());
        let a = add_user(&f.store, "A");
        // A delivery that persisted the photo and died before claiming the fan-out.
        f.metadata.create_if_absent(&photo("A.1"), 1234).await.unwrap();
        f.store.put_photo(&Photo::new(photo("A.1"), 1234)).unwrap();

        let outcome = f.coordinator.handle_new_photo("A.1").await.unwrap();
        assert_eq!(outcome.delivery, PhotoDelivery::Resumed);
        assert_eq!(f.feeds.scan(&a).await.unwrap(), vec![photo("A.1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn racing_deliveries_append_once() {
        let backend = Arc::new(SlowFirstReply {
            inner: MemoryCache::new(),
            delayed: AtomicBool::new(false),
        });
        let f = fixture_with(FeedPolicy::default(), backend);
        let a = add_user(&f.store, "A");
        let b = add_user(&f.store, "B");
        f.store.follow(&b, &a).unwrap();

        // The first delivery wins the gate but its reply is late, so the second one sees the gate
        // set and no record yet.
        let (first, second) = tokio::join!(
            f.coordinator.handle_new_photo("A.1"),
            f.coordinator.handle_new_photo("A.1"),
        );
        assert_eq!(first.unwrap().delivery, PhotoDelivery::Duplicate);
        assert_eq!(second.unwrap().delivery, PhotoDelivery::Resumed);

        assert_eq!(f.feeds.scan(&a).await.unwrap(), vec![photo("A.1")]);
        assert_eq!(f.feeds.scan(&b).await.unwrap(), vec![photo("A.1")]);
        let date = f.metadata.date(&photo("A.1")).await.unwrap();
        assert_eq!(
            Some(f.store.get_photo(&photo("A.1")).unwrap().unwrap().created),
            date
        );
    }

    #[tokio::test]
    async fn malformed_and_orphan_photos_are_integrity_errors() {
        let f = fixture(FeedPolicy::default());

        let err = f.coordinator.handle_new_photo("A.1.webp").await.unwrap_err();
        assert!(matches!(err, EventError::MalformedId(_)));

        let err = f.coordinator.handle_new_photo("ghost.1").await.unwrap_err();
        assert!(matches!(err, EventError::Missing { entity: "user", .. }));
        assert_eq!(err.severity(), crate::error::Severity::Integrity);
    }

    #[tokio::test]
    async fn fanout_batches_cover_every_follower() {
        let policy = FeedPolicy {
            fanout_batch_size: 2,
            ..FeedPolicy::default()
        };
        let f = fixture(policy);
        let a = add_user(&f.store, "A");
        let mut followers = Vec::new();
        for i in 0..5 {
            let u = add_user(&f.store, &format!("F{i}"));
            f.store.follow(&u, &a).unwrap();
            followers.push(u);
        }

        let outcome = f.coordinator.handle_new_photo("A.1").await.unwrap();
        assert_eq!(outcome.delivered, 6);
        for u in &followers {
            assert_eq!(f.feeds.scan(u).await.unwrap(), vec![photo("A.1")]);
        }
    }

    #[tokio::test]
    async fn new_follow_backfills_most_recent_photos() {
        let f = fixture(FeedPolicy::default());
        let a = add_user(&f.store, "A");
        let d = add_user(&f.store, "D");
        for i in 1..=15 {
            let id = PhotoId::new(a.clone(), format!("p{i:02}")).unwrap();
            f.store.put_photo(&Photo::new(id, 1000 + i)).unwrap();
        }
        f.feeds.append(&d, &photo("Z.1")).await.unwrap();

        let outcome = f.coordinator.handle_new_follow(&d, &a).await.unwrap();
        assert!(outcome.edge_created);
        assert_eq!(outcome.backfilled, 10);

        let feed = f.feeds.scan(&d).await.unwrap();
        let expected: Vec<PhotoId> = (6..=15)
            .rev()
            .map(|i| PhotoId::new(a.clone(), format!("p{i:02}")).unwrap())
            .collect();
        assert_eq!(&feed[..10], expected.as_slice());
        assert_eq!(feed[10], photo("Z.1"));
        assert_eq!(f.store.followers(&a).unwrap(), vec![d.clone()]);
        assert_eq!(f.store.following(&d).unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn new_follow_rejects_unknown_users_and_self() {
        let f = fixture(FeedPolicy::default());
        let a = add_user(&f.store, "A");

        let err = f
            .coordinator
            .handle_new_follow(&user("ghost"), &a)
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Missing { .. }));

        let err = f.coordinator.handle_new_follow(&a, &a).await.unwrap_err();
        assert!(matches!(err, EventError::SelfFollow(_)));
    }
}
