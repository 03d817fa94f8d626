//! `RocksDB` system of record for photofeed.
//!
//! This crate provides persistent storage for users, the social graph, photos, likes and
//! comments using `RocksDB` with column families laid out as a parent/child key hierarchy.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `users`: User profiles, keyed by `user_id`
//! - `users_by_email`: Index for resolving follow requests by email address
//! - `followers` / `following`: Graph edges, one key per edge, written as a pair
//! - `photos`: Photo records parented under the poster
//! - `photos_by_date`: Index for "most recent N photos of this user"
//! - `likes`, `comments`: Children of a photo
//!
//! # Example
//!
//! ```no_run
//! use photofeed_store::{RocksStore, Store};
//! use photofeed_core::User;
//!
//! let store = RocksStore::open("/tmp/photofeed-db").unwrap();
//!
//! let alice = User::new("alice".parse().unwrap(), "Alice", "alice@example.com");
//! let bob = User::new("bob".parse().unwrap(), "Bob", "bob@example.com");
//! store.put_user(&alice).unwrap();
//! store.put_user(&bob).unwrap();
//!
//! // Bob now receives Alice's photos.
//! store.follow(&bob.user_id, &alice.user_id).unwrap();
//! assert_eq!(store.followers(&alice.user_id).unwrap(), vec![bob.user_id.clone()]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use photofeed_core::{Comment, Like, Photo, PhotoId, User, UserId};

/// The storage trait defining all durable record operations.
///
/// This trait abstracts the storage layer so the write and read paths can be handed any
/// implementation behind an `Arc<dyn Store>`.
pub trait Store: Send + Sync {
    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert or update a user profile and its email index entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_user(&self, user: &User) -> Result<()>;

    /// Get a user profile by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_id: &UserId) -> Result<Option<User>>;

    /// Resolve an email address to a user ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_user_by_email(&self, email: &str) -> Result<Option<UserId>>;

    /// Remember that `user_id` wants to follow whoever signs up with `email`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user doesn't exist.
    fn add_pending_follow(&self, user_id: &UserId, email: &str) -> Result<()>;

    // =========================================================================
    // Social Graph Operations
    // =========================================================================

    /// Record that `follower` follows `followee`.
    ///
    /// Both edges (`followee.followers` and `follower.following`) are written in one atomic
    /// batch. The call is idempotent; it returns `true` if the edge did not exist before.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if either user doesn't exist.
    fn follow(&self, follower: &UserId, followee: &UserId) -> Result<bool>;

    /// Users who receive `user_id`'s photos.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn followers(&self, user_id: &UserId) -> Result<Vec<UserId>>;

    /// Users whose photos `user_id` receives.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn following(&self, user_id: &UserId) -> Result<Vec<UserId>>;

    // =========================================================================
    // Photo Operations
    // =========================================================================

    /// Insert a photo record under its poster.
    ///
    /// This also maintains the by-date index.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_photo(&self, photo: &Photo) -> Result<()>;

    /// Get a photo by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_photo(&self, photo_id: &PhotoId) -> Result<Option<Photo>>;

    /// List a poster's photos, newest first.
    ///
    /// With `before`, only photos created strictly earlier than that epoch second are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn recent_photos(
        &self,
        poster: &UserId,
        limit: usize,
        before: Option<i64>,
    ) -> Result<Vec<Photo>>;

    // =========================================================================
    // Like & Comment Operations
    // =========================================================================

    /// Record a like under the photo.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_like(&self, photo_id: &PhotoId, like: &Like) -> Result<()>;

    /// Remove a like. Returns `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn delete_like(&self, photo_id: &PhotoId, user_id: &UserId) -> Result<bool>;

    /// List the likes of a photo.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn likes(&self, photo_id: &PhotoId) -> Result<Vec<Like>>;

    /// Record a comment under the photo.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_comment(&self, photo_id: &PhotoId, comment: &Comment) -> Result<()>;

    /// List the comments of a photo, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn comments(&self, photo_id: &PhotoId) -> Result<Vec<Comment>>;
}
