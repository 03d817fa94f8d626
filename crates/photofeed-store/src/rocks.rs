//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use photofeed_core::{Comment, Like, Photo, PhotoId, User, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn get_value<T: serde::de::DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        let cf = self.cf(cf_name)?;
        let found = self
            .db
            .get_pinned_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        Ok(found)
    }

    /// Collect `(key, value)` pairs under `prefix` in ascending key order.
    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut items = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            items.push((key, value));
        }
        Ok(items)
    }

    /// List the user IDs stored as edge suffixes under `owner`.
    fn edges(&self, cf_name: &'static str, owner: &UserId) -> Result<Vec<UserId>> {
        let prefix = keys::child_prefix(owner.as_bytes());
        self.scan_prefix(cf_name, &prefix)?
            .into_iter()
            .map(|(key, _)| {
                keys::extract_user_suffix(&key, prefix.len())
                    .map_err(|reason| StoreError::CorruptKey { cf: cf_name, reason })
            })
            .collect()
    }

    fn require_user(&self, user_id: &UserId) -> Result<User> {
        self.get_user(user_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "user",
            id: user_id.to_string(),
        })
    }
}

impl Store for RocksStore {
    // =========================================================================
    // User Operations
    // =========================================================================

    fn put_user(&self, user: &User) -> Result<()> {
        let cf_users = self.cf(cf::USERS)?;
        let cf_email = self.cf(cf::USERS_BY_EMAIL)?;

        let mut batch = WriteBatch::default();

        // Drop the index entry of a previous address.
        if let Some(previous) = self.get_user(&user.user_id)? {
            if keys::email_key(&previous.email) != keys::email_key(&user.email) {
                batch.delete_cf(&cf_email, keys::email_key(&previous.email));
            }
        }

        batch.put_cf(
            &cf_users,
            keys::user_key(&user.user_id),
            Self::serialize(user)?,
        );
        if !user.email.trim().is_empty() {
            batch.put_cf(
                &cf_email,
                keys::email_key(&user.email),
                user.user_id.as_bytes(),
            );
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        self.get_value(cf::USERS, &keys::user_key(user_id))
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserId>> {
        let cf = self.cf(cf::USERS_BY_EMAIL)?;
        let Some(raw) = self
            .db
            .get_cf(&cf, keys::email_key(email))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let text = String::from_utf8(raw).map_err(|e| StoreError::CorruptKey {
            cf: cf::USERS_BY_EMAIL,
            reason: e.to_string(),
        })?;
        text.parse().map(Some).map_err(|e: photofeed_core::IdError| {
            StoreError::CorruptKey {
                cf: cf::USERS_BY_EMAIL,
                reason: e.to_string(),
            }
        })
    }

    fn add_pending_follow(&self, user_id: &UserId, email: &str) -> Result<()> {
        let mut user = self.require_user(user_id)?;
        let email = email.trim().to_lowercase();
        if user.pending_follows.contains(&email) {
            return Ok(());
        }
        user.pending_follows.push(email);

        let cf = self.cf(cf::USERS)?;
        self.db
            .put_cf(&cf, keys::user_key(user_id), Self::serialize(&user)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    // =========================================================================
    // Social Graph Operations
    // =========================================================================

    fn follow(&self, follower: &UserId, followee: &UserId) -> Result<bool> {
        self.require_user(follower)?;
        self.require_user(followee)?;

        let follower_edge = keys::edge_key(followee, follower);
        let following_edge = keys::edge_key(follower, followee);

        let existed = self.exists(cf::FOLLOWERS, &follower_edge)?
            && self.exists(cf::FOLLOWING, &following_edge)?;
        if existed {
            return Ok(false);
        }

        let cf_followers = self.cf(cf::FOLLOWERS)?;
        let cf_following = self.cf(cf::FOLLOWING)?;

        // Write both edges atomically
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_followers, &follower_edge, []);
        batch.put_cf(&cf_following, &following_edge, []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(follower = %follower, followee = %followee, "Follow edge written");
        Ok(true)
    }

    fn followers(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        self.edges(cf::FOLLOWERS, user_id)
    }

    fn following(&self, user_id: &UserId) -> Result<Vec<UserId>> {
        self.edges(cf::FOLLOWING, user_id)
    }

    // =========================================================================
    // Photo Operations
    // =========================================================================

    fn put_photo(&self, photo: &Photo) -> Result<()> {
        let cf_photos = self.cf(cf::PHOTOS)?;
        let cf_by_date = self.cf(cf::PHOTOS_BY_DATE)?;

        let value = Self::serialize(photo)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_photos, keys::photo_key(&photo.photo_id), &value);
        batch.put_cf(
            &cf_by_date,
            keys::photo_date_key(&photo.photo_id, photo.created),
            &value,
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_photo(&self, photo_id: &PhotoId) -> Result<Option<Photo>> {
        self.get_value(cf::PHOTOS, &keys::photo_key(photo_id))
    }

    fn recent_photos(
        &self,
        poster: &UserId,
        limit: usize,
        before: Option<i64>,
    ) -> Result<Vec<Photo>> {
        let cf = self.cf(cf::PHOTOS_BY_DATE)?;
        let prefix = keys::child_prefix(poster.as_bytes());
        let upper = match before {
            Some(before) => keys::photo_date_bound(poster, before),
            None => keys::prefix_upper_bound(&prefix),
        };

        // Walk backwards from the upper bound: newest first.
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&upper, Direction::Reverse));

        let mut photos = Vec::with_capacity(limit);
        for item in iter {
            if photos.len() >= limit {
                break;
            }
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            // SeekForPrev lands on the bound itself if such a key exists.
            if key.as_ref() >= upper.as_slice() {
                continue;
            }
            photos.push(Self::deserialize(&value)?);
        }

        Ok(photos)
    }

    // =========================================================================
    // Like & Comment Operations
    // =========================================================================

    fn put_like(&self, photo_id: &PhotoId, like: &Like) -> Result<()> {
        let cf = self.cf(cf::LIKES)?;
        self.db
            .put_cf(
                &cf,
                keys::like_key(photo_id, &like.user_id),
                Self::serialize(like)?,
            )
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn delete_like(&self, photo_id: &PhotoId, user_id: &UserId) -> Result<bool> {
        let key = keys::like_key(photo_id, user_id);
        if !self.exists(cf::LIKES, &key)? {
            return Ok(false);
        }

        let cf = self.cf(cf::LIKES)?;
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(true)
    }

    fn likes(&self, photo_id: &PhotoId) -> Result<Vec<Like>> {
        let prefix = keys::photo_child_prefix(photo_id);
        self.scan_prefix(cf::LIKES, &prefix)?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }

    fn put_comment(&self, photo_id: &PhotoId, comment: &Comment) -> Result<()> {
        let cf = self.cf(cf::COMMENTS)?;
        self.db
            .put_cf(
                &cf,
                keys::comment_key(photo_id, comment.time, &comment.author),
                Self::serialize(comment)?,
            )
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn comments(&self, photo_id: &PhotoId) -> Result<Vec<Comment>> {
        let prefix = keys::photo_child_prefix(photo_id);
        self.scan_prefix(cf::COMMENTS, &prefix)?
            .iter()
            .map(|(_, value)| Self::deserialize(value))
            .collect()
    }
}
