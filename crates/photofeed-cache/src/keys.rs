//! Cache key layout.
//!
//! - `IM:{photoID}`: hash with `date`, `flag`, `fanout` and one field per liking user
//! - `HT:{userID}`: hash with `dn` (display name)
//! - `TL:{userID}`: list of photo IDs, newest at the head

use photofeed_core::{PhotoId, UserId};

/// Creation timestamp field of a photo's metadata hash.
pub const DATE_FIELD: &str = "date";

/// Flag counter field of a photo's metadata hash.
pub const FLAG_FIELD: &str = "flag";

/// Fan-out claim field of a photo's metadata hash.
///
/// Set-if-absent once the photo is persisted; only the delivery that sets it appends to feeds.
pub const FANOUT_FIELD: &str = "fanout";

/// Display-name field of a user's hash.
pub const NAME_FIELD: &str = "dn";

/// Value stored for a liking user.
pub const LIKED: &str = "1";

/// Metadata hash key of a photo.
#[must_use]
pub fn metadata_key(photo_id: &PhotoId) -> String {
    format!("IM:{photo_id}")
}

/// Display-name hash key of a user.
#[must_use]
pub fn name_key(user_id: &UserId) -> String {
    format!("HT:{user_id}")
}

/// Feed list key of a user.
#[must_use]
pub fn feed_key(user_id: &UserId) -> String {
    format!("TL:{user_id}")
}
