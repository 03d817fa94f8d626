//! Bounded per-user feed lists.
//!
//! A feed is a list of photo IDs with the newest at the head. Every insert is followed, when the
//! push reports a length above capacity, by a trim that drops the oldest entries from the tail.

use std::sync::Arc;

use photofeed_core::{PhotoId, UserId};

use crate::backend::{expect_replies, CacheBackend};
use crate::command::{Command, Pipeline};
use crate::error::{CacheError, Result};
use crate::keys::feed_key;

/// Typed access to feed lists.
#[derive(Clone)]
pub struct FeedLists {
    backend: Arc<dyn CacheBackend>,
    capacity: usize,
}

impl FeedLists {
    /// Create feed lists holding at most `capacity` entries each.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>, capacity: usize) -> Self {
        Self {
            backend,
            capacity: capacity.max(1),
        }
    }

    /// Maximum entries per feed.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn trim(&self, user_id: &UserId) -> Command {
        Command::LTrim {
            key: feed_key(user_id),
            start: 0,
            stop: i64::try_from(self.capacity).unwrap_or(i64::MAX) - 1,
        }
    }

    fn over_capacity(&self, len: i64) -> bool {
        usize::try_from(len).map_or(true, |len| len > self.capacity)
    }

    fn bounded(&self, len: i64) -> usize {
        usize::try_from(len).map_or(self.capacity, |len| len.min(self.capacity))
    }

    /// Insert `photo_id` at the head of `user_id`'s feed, returning the resulting length.
    ///
    /// # Errors
    ///
    /// Returns an error if a cache call fails.
    pub async fn append(&self, user_id: &UserId, photo_id: &PhotoId) -> Result<usize> {
        let mut results = self
            .append_to_many(std::slice::from_ref(user_id), photo_id)
            .await?;
        results.pop().unwrap_or(Ok(0))
    }

    /// Insert `photo_id` at the head of every listed feed.
    ///
    /// All pushes go out in one pipeline; the feeds that grew past capacity are then trimmed in a
    /// second one. The outer `Err` means the push round trip failed and nothing is known; otherwise
    /// the result is aligned with `user_ids` and holds each feed's resulting length or its error.
    ///
    /// # Errors
    ///
    /// Returns an error if the push round trip fails.
    pub async fn append_to_many(
        &self,
        user_ids: &[UserId],
        photo_id: &PhotoId,
    ) -> Result<Vec<Result<usize>>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pushes = Pipeline::with_capacity(user_ids.len());
        for user_id in user_ids {
            pushes.push(Command::LPush {
                key: feed_key(user_id),
                values: vec![photo_id.to_string()],
            });
        }
        let replies = expect_replies("LPUSH", user_ids.len(), self.backend.execute(pushes).await?)?;

        let mut results: Vec<Result<usize>> = Vec::with_capacity(user_ids.len());
        let mut trims = Pipeline::new();
        let mut trimmed = Vec::new();
        for (index, (user_id, reply)) in user_ids.iter().zip(replies).enumerate() {
            match reply.into_int("LPUSH") {
                Ok(len) => {
                    if self.over_capacity(len) {
                        trims.push(self.trim(user_id));
                        trimmed.push(index);
                    }
                    results.push(Ok(self.bounded(len)));
                }
                Err(e) => results.push(Err(e)),
            }
        }

        if trims.is_empty() {
            return Ok(results);
        }

        let expected = trims.len();
        match self.backend.execute(trims).await {
            Ok(replies) if replies.len() == expected => {
                for (index, reply) in trimmed.into_iter().zip(replies) {
                    if let Err(e) = reply.into_ok("LTRIM") {
                        results[index] = Err(e);
                    }
                }
            }
            Ok(replies) => {
                let reply = format!("{} replies for {expected} commands", replies.len());
                for index in trimmed {
                    results[index] = Err(CacheError::UnexpectedReply {
                        command: "LTRIM",
                        reply: reply.clone(),
                    });
                }
            }
            Err(e) => {
                // The entries are in place; the next push to these feeds trims them.
                tracing::warn!(feeds = trimmed.len(), error = %e, "Feed trim failed");
                let message = e.to_string();
                for index in trimmed {
                    results[index] = Err(CacheError::Command(message.clone()));
                }
            }
        }

        Ok(results)
    }

    /// Read the whole feed, newest first.
    ///
    /// Entries that are not valid photo IDs are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn scan(&self, user_id: &UserId) -> Result<Vec<PhotoId>> {
        let items = self
            .backend
            .query(Command::LRange {
                key: feed_key(user_id),
                start: 0,
                stop: -1,
            })
            .await?
            .into_strings("LRANGE")?;

        Ok(items
            .into_iter()
            .filter_map(|item| match item.parse() {
                Ok(photo_id) => Some(photo_id),
                Err(e) => {
                    tracing::warn!(user_id = %user_id, entry = %item, error = %e, "Skipping malformed feed entry");
                    None
                }
            })
            .collect())
    }

    /// Insert `photo_ids` (newest first) at the head of the feed so that the newest ends up first.
    ///
    /// Returns the resulting length.
    ///
    /// # Errors
    ///
    /// Returns an error if a cache call fails.
    pub async fn backfill_front(&self, user_id: &UserId, photo_ids: &[PhotoId]) -> Result<usize> {
        if photo_ids.is_empty() {
            return self.len(user_id).await;
        }

        // Each value is pushed to the head in turn, so the oldest goes first.
        let values = photo_ids.iter().rev().map(ToString::to_string).collect();
        let len = self
            .backend
            .query(Command::LPush {
                key: feed_key(user_id),
                values,
            })
            .await?
            .into_int("LPUSH")?;

        if self.over_capacity(len) {
            self.backend.query(self.trim(user_id)).await?.into_ok("LTRIM")?;
        }
        Ok(self.bounded(len))
    }

    /// Current feed length.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn len(&self, user_id: &UserId) -> Result<usize> {
        let len = self
            .backend
            .query(Command::LLen {
                key: feed_key(user_id),
            })
            .await?
            .into_int("LLEN")?;
        Ok(self.bounded(len))
    }
}
