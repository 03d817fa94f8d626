//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// User profiles, keyed by `user_id`.
    pub const USERS: &str = "users";

    /// Index: user by email, keyed by lowercased email. Value is the `user_id`.
    pub const USERS_BY_EMAIL: &str = "users_by_email";

    /// Graph edges, keyed by `followee_id \0 follower_id`. Value is empty.
    pub const FOLLOWERS: &str = "followers";

    /// Graph edges, keyed by `follower_id \0 followee_id`. Value is empty.
    pub const FOLLOWING: &str = "following";

    /// Photos, keyed by `poster_id \0 photo_id`.
    pub const PHOTOS: &str = "photos";

    /// Photos ordered by creation time, keyed by `poster_id \0 date \0 photo_id`.
    /// Value is the photo record, so recent-photo queries need no second lookup.
    pub const PHOTOS_BY_DATE: &str = "photos_by_date";

    /// Likes, keyed by `photo_id \0 user_id`.
    pub const LIKES: &str = "likes";

    /// Comments, keyed by `photo_id \0 time_ms \0 author_id`.
    pub const COMMENTS: &str = "comments";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::USERS,
        cf::USERS_BY_EMAIL,
        cf::FOLLOWERS,
        cf::FOLLOWING,
        cf::PHOTOS,
        cf::PHOTOS_BY_DATE,
        cf::LIKES,
        cf::COMMENTS,
    ]
}
