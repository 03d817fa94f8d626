//! Key encoding utilities for `RocksDB`.
//!
//! Keys are chains of identifiers joined by a NUL byte, parent first, so that every child of a
//! record shares the parent's prefix. Identifiers never contain NUL (see `photofeed_core::ids`).
//! Timestamps are encoded as order-preserving big-endian integers.

use photofeed_core::{PhotoId, UserId};

/// Separator between key segments.
pub const SEP: u8 = 0;

/// Encode an `i64` so that byte order matches numeric order.
#[must_use]
pub fn ordered_i64(value: i64) -> [u8; 8] {
    #[allow(clippy::cast_sign_loss)]
    let flipped = (value as u64) ^ (1 << 63);
    flipped.to_be_bytes()
}

/// Decode a value produced by [`ordered_i64`].
#[must_use]
pub fn decode_ordered_i64(bytes: [u8; 8]) -> i64 {
    #[allow(clippy::cast_possible_wrap)]
    let value = (u64::from_be_bytes(bytes) ^ (1 << 63)) as i64;
    value
}

/// Create a user key from a user ID.
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create an email index key. Emails are matched case-insensitively.
#[must_use]
pub fn email_key(email: &str) -> Vec<u8> {
    email.trim().to_lowercase().into_bytes()
}

/// Create a prefix covering every child of `parent`.
#[must_use]
pub fn child_prefix(parent: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(parent.len() + 1);
    key.extend_from_slice(parent);
    key.push(SEP);
    key
}

/// The smallest key greater than every key starting with `prefix`.
///
/// Used as the starting point for reverse iteration over a prefix.
#[must_use]
pub fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut key = prefix.to_vec();
    while let Some(last) = key.pop() {
        if last < u8::MAX {
            key.push(last + 1);
            return key;
        }
    }
    key
}

/// Create a graph edge key.
///
/// Format: `owner || 0x00 || other`
#[must_use]
pub fn edge_key(owner: &UserId, other: &UserId) -> Vec<u8> {
    let mut key = child_prefix(owner.as_bytes());
    key.extend_from_slice(other.as_bytes());
    key
}

/// Create a photo key, parented under the poster.
///
/// Format: `poster_id || 0x00 || photo_id`
#[must_use]
pub fn photo_key(photo_id: &PhotoId) -> Vec<u8> {
    let mut key = child_prefix(photo_id.poster().as_bytes());
    key.extend_from_slice(photo_id.to_string().as_bytes());
    key
}

/// Create a time-ordered photo index key.
///
/// Format: `poster_id || 0x00 || date (8 bytes) || 0x00 || photo_id`
#[must_use]
pub fn photo_date_key(photo_id: &PhotoId, created: i64) -> Vec<u8> {
    let mut key = child_prefix(photo_id.poster().as_bytes());
    key.extend_from_slice(&ordered_i64(created));
    key.push(SEP);
    key.extend_from_slice(photo_id.to_string().as_bytes());
    key
}

/// Upper bound (exclusive) for a poster's photos created strictly before `before`.
#[must_use]
pub fn photo_date_bound(poster: &UserId, before: i64) -> Vec<u8> {
    let mut key = child_prefix(poster.as_bytes());
    key.extend_from_slice(&ordered_i64(before));
    key
}

/// Create a like key, parented under the photo.
///
/// Format: `photo_id || 0x00 || user_id`
#[must_use]
pub fn like_key(photo_id: &PhotoId, user_id: &UserId) -> Vec<u8> {
    let mut key = photo_child_prefix(photo_id);
    key.extend_from_slice(user_id.as_bytes());
    key
}

/// Create a comment key, parented under the photo.
///
/// Format: `photo_id || 0x00 || time_ms (8 bytes) || 0x00 || author_id`
///
/// The author is part of the key so two comments in the same millisecond do not collide.
#[must_use]
pub fn comment_key(photo_id: &PhotoId, time_ms: i64, author: &UserId) -> Vec<u8> {
    let mut key = photo_child_prefix(photo_id);
    key.extend_from_slice(&ordered_i64(time_ms));
    key.push(SEP);
    key.extend_from_slice(author.as_bytes());
    key
}

/// Create a prefix covering all likes or comments of a photo.
#[must_use]
pub fn photo_child_prefix(photo_id: &PhotoId) -> Vec<u8> {
    child_prefix(photo_id.to_string().as_bytes())
}

/// Extract the trailing user ID from an edge or like key with the given prefix.
///
/// # Errors
///
/// Returns a description of the problem if the tail is not a valid user ID.
pub fn extract_user_suffix(key: &[u8], prefix_len: usize) -> Result<UserId, String> {
    let tail = key
        .get(prefix_len..)
        .ok_or_else(|| format!("key shorter than prefix ({} < {prefix_len})", key.len()))?;
    let text = std::str::from_utf8(tail).map_err(|e| e.to_string())?;
    text.parse().map_err(|e: photofeed_core::IdError| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(s: &str) -> UserId {
        s.parse().unwrap()
    }

    fn photo(s: &str) -> PhotoId {
        s.parse().unwrap()
    }

    #[test]
    fn ordered_i64_preserves_order() {
        let values = [i64::MIN, -5, -1, 0, 1, 1_400_000_000, i64::MAX];
        for pair in values.windows(2) {
            assert!(ordered_i64(pair[0]) < ordered_i64(pair[1]));
        }
        for v in values {
            assert_eq!(decode_ordered_i64(ordered_i64(v)), v);
        }
    }

    #[test]
    fn photo_keys_share_poster_prefix() {
        let prefix = child_prefix(b"A");
        assert!(photo_key(&photo("A.1")).starts_with(&prefix));
        assert!(photo_date_key(&photo("A.1"), 10).starts_with(&prefix));
        assert!(!photo_key(&photo("AB.1")).starts_with(&prefix));
    }

    #[test]
    fn photo_date_keys_sort_by_time() {
        let older = photo_date_key(&photo("A.zzz"), 100);
        let newer = photo_date_key(&photo("A.aaa"), 200);
        assert!(older < newer);
        assert!(newer < photo_date_bound(&user("A"), 201));
        assert!(newer > photo_date_bound(&user("A"), 200));
    }

    #[test]
    fn edge_key_suffix_roundtrip() {
        let key = edge_key(&user("B"), &user("carol"));
        let prefix = child_prefix(b"B");
        assert_eq!(extract_user_suffix(&key, prefix.len()).unwrap(), user("carol"));
    }

    #[test]
    fn upper_bound_exceeds_prefixed_keys() {
        let prefix = child_prefix(b"A");
        let bound = prefix_upper_bound(&prefix);
        assert!(photo_key(&photo("A.zzzz")) < bound);
        assert!(child_prefix(b"B") > bound);
    }
}
