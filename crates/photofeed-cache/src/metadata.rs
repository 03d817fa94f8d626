//! Photo metadata cache: creation date, like-set and flag counter.
//!
//! Each photo has one hash. `date` is written with set-if-absent and acts as the dedup gate of the
//! `new-photo` handler and `fanout` is the claim on its feed appends. Every other field name is a
//! liking user, except `flag`.

use std::sync::Arc;

use photofeed_core::{PhotoId, UserId};

use crate::backend::{expect_replies, CacheBackend};
use crate::command::{Command, Pipeline, Reply};
use crate::error::{CacheError, Result};
use crate::keys::{metadata_key, DATE_FIELD, FANOUT_FIELD, FLAG_FIELD, LIKED};

/// What the timeline needs to know about one photo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhotoSnapshot {
    /// Creation time, if the photo's metadata exists.
    pub created: Option<i64>,
    /// Size of the like-set.
    pub likes: u64,
    /// Whether the viewer is in the like-set.
    pub viewer_likes: bool,
    /// Flag count.
    pub flags: i64,
}

/// Typed access to photo metadata hashes.
#[derive(Clone)]
pub struct MetadataCache {
    backend: Arc<dyn CacheBackend>,
}

impl MetadataCache {
    /// Create a metadata cache on top of `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Store the creation time of `photo_id` unless it is already known.
    ///
    /// Returns `true` if this call created the entry. The first writer wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn create_if_absent(&self, photo_id: &PhotoId, created: i64) -> Result<bool> {
        let reply = self
            .backend
            .query(Command::HSetNx {
                key: metadata_key(photo_id),
                field: DATE_FIELD.to_string(),
                value: created.to_string(),
            })
            .await?;
        Ok(reply.into_int("HSETNX")? == 1)
    }

    /// Claim the feed appends of `photo_id`.
    ///
    /// Returns `true` for exactly one caller per photo, however many deliveries race.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn claim_fanout(&self, photo_id: &PhotoId) -> Result<bool> {
        let reply = self
            .backend
            .query(Command::HSetNx {
                key: metadata_key(photo_id),
                field: FANOUT_FIELD.to_string(),
                value: LIKED.to_string(),
            })
            .await?;
        Ok(reply.into_int("HSETNX")? == 1)
    }

    /// The stored creation time of `photo_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails or the stored value is not a number.
    pub async fn date(&self, photo_id: &PhotoId) -> Result<Option<i64>> {
        let value = self
            .backend
            .query(Command::HGet {
                key: metadata_key(photo_id),
                field: DATE_FIELD.to_string(),
            })
            .await?
            .into_opt_string("HGET")?;
        parse_number("HGET", value)
    }

    /// Add `user_id` to the like-set. Returns `true` if it was not there yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn like(&self, photo_id: &PhotoId, user_id: &UserId) -> Result<bool> {
        let reply = self
            .backend
            .query(Command::HSet {
                key: metadata_key(photo_id),
                field: user_id.to_string(),
                value: LIKED.to_string(),
            })
            .await?;
        Ok(reply.into_int("HSET")? == 1)
    }

    /// Remove `user_id` from the like-set. Returns `true` if it was there.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn unlike(&self, photo_id: &PhotoId, user_id: &UserId) -> Result<bool> {
        let reply = self
            .backend
            .query(Command::HDel {
                key: metadata_key(photo_id),
                field: user_id.to_string(),
            })
            .await?;
        Ok(reply.into_int("HDEL")? > 0)
    }

    /// Whether `user_id` likes the photo.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn has_liked(&self, photo_id: &PhotoId, user_id: &UserId) -> Result<bool> {
        let value = self
            .backend
            .query(Command::HGet {
                key: metadata_key(photo_id),
                field: user_id.to_string(),
            })
            .await?
            .into_opt_string("HGET")?;
        Ok(value.is_some())
    }

    /// Size of the like-set.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn like_count(&self, photo_id: &PhotoId) -> Result<u64> {
        let key = metadata_key(photo_id);
        let mut pipeline = Pipeline::with_capacity(2);
        pipeline
            .push(Command::HLen { key: key.clone() })
            .push(Command::HMGet {
                key,
                fields: vec![
                    DATE_FIELD.to_string(),
                    FLAG_FIELD.to_string(),
                    FANOUT_FIELD.to_string(),
                ],
            });

        let mut replies = expect_replies("HLEN", 2, self.backend.execute(pipeline).await?)?;
        let fields = replies.pop().unwrap_or(Reply::Nil).into_opt_strings("HMGET")?;
        let len = replies.pop().unwrap_or(Reply::Nil).into_int("HLEN")?;

        let reserved = fields.iter().filter(|f| f.is_some()).count();
        Ok(like_set_size(len, reserved))
    }

    /// Increment the flag counter, returning the new count.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn flag(&self, photo_id: &PhotoId) -> Result<i64> {
        self.backend
            .query(Command::HIncrBy {
                key: metadata_key(photo_id),
                field: FLAG_FIELD.to_string(),
                delta: 1,
            })
            .await?
            .into_int("HINCRBY")
    }

    /// Current flag count; zero if never flagged.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache call fails.
    pub async fn flag_count(&self, photo_id: &PhotoId) -> Result<i64> {
        let value = self
            .backend
            .query(Command::HGet {
                key: metadata_key(photo_id),
                field: FLAG_FIELD.to_string(),
            })
            .await?
            .into_opt_string("HGET")?;
        Ok(parse_number("HGET", value)?.unwrap_or(0))
    }

    /// Read the snapshot of every photo in `photo_ids` as seen by `viewer`, in one round trip.
    ///
    /// The result is positionally aligned with `photo_ids`. A photo whose replies cannot be
    /// decoded gets a default snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails.
    pub async fn snapshots(
        &self,
        photo_ids: &[PhotoId],
        viewer: &UserId,
    ) -> Result<Vec<PhotoSnapshot>> {
        if photo_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipeline = Pipeline::with_capacity(photo_ids.len() * 2);
        for photo_id in photo_ids {
            let key = metadata_key(photo_id);
            pipeline
                .push(Command::HMGet {
                    key: key.clone(),
                    fields: vec![
                        DATE_FIELD.to_string(),
                        viewer.to_string(),
                        FLAG_FIELD.to_string(),
                        FANOUT_FIELD.to_string(),
                    ],
                })
                .push(Command::HLen { key });
        }

        let replies = expect_replies(
            "HMGET",
            photo_ids.len() * 2,
            self.backend.execute(pipeline).await?,
        )?;

        let mut snapshots = Vec::with_capacity(photo_ids.len());
        let mut replies = replies.into_iter();
        for photo_id in photo_ids {
            let fields = replies.next().unwrap_or(Reply::Nil);
            let len = replies.next().unwrap_or(Reply::Nil);
            let snapshot = decode_snapshot(fields, len).unwrap_or_else(|e| {
                tracing::warn!(photo_id = %photo_id, error = %e, "Unreadable photo metadata");
                PhotoSnapshot::default()
            });
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }
}

fn decode_snapshot(fields: Reply, len: Reply) -> Result<PhotoSnapshot> {
    let fields = fields.into_opt_strings("HMGET")?;
    let len = len.into_int("HLEN")?;

    let [date, viewer, flag, fanout] = <[Option<String>; 4]>::try_from(fields).map_err(|f| {
        CacheError::UnexpectedReply {
            command: "HMGET",
            reply: format!("{} fields", f.len()),
        }
    })?;

    let reserved =
        usize::from(date.is_some()) + usize::from(flag.is_some()) + usize::from(fanout.is_some());
    Ok(PhotoSnapshot {
        created: parse_number("HMGET", date)?,
        likes: like_set_size(len, reserved),
        viewer_likes: viewer.is_some(),
        flags: parse_number("HMGET", flag)?.unwrap_or(0),
    })
}

/// Number of liking users in a hash of `len` fields, `reserved` of which are not users.
fn like_set_size(len: i64, reserved: usize) -> u64 {
    let reserved = i64::try_from(reserved).unwrap_or(0);
    u64::try_from(len.saturating_sub(reserved)).unwrap_or(0)
}

fn parse_number(command: &'static str, value: Option<String>) -> Result<Option<i64>> {
    value
        .map(|v| match v.parse::<i64>() {
            Ok(n) => Ok(n),
            Err(_) => Err(CacheError::UnexpectedReply { command, reply: v }),
        })
        .transpose()
}
