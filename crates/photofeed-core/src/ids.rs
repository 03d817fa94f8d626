//! Identifier types for photofeed.
//!
//! User identifiers are issued externally and only validated here. Photo identifiers embed their
//! poster: `{posterID}.{suffix}`, which lets the write path find the owner of a photo without a
//! store lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum accepted length of a single identifier segment.
pub const MAX_SEGMENT_LEN: usize = 128;

/// Field names used inside a photo's metadata hash.
///
/// Liking users are stored as fields of the same hash, so a user may not be named after one of
/// these.
pub const RESERVED_USER_IDS: [&str; 3] = ["date", "flag", "fanout"];

/// A user identifier.
///
/// User IDs are issued by the identity provider; this type only guarantees they are safe to embed
/// in store keys, cache keys and photo identifiers.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the identifier bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_segment(s)?;
        if RESERVED_USER_IDS.contains(&s) {
            return Err(IdError::ReservedUserId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A photo identifier of the form `{posterID}.{suffix}`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhotoId {
    poster: UserId,
    suffix: String,
}

impl PhotoId {
    /// Build a photo identifier from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if the suffix is not a valid segment.
    pub fn new(poster: UserId, suffix: impl Into<String>) -> Result<Self, IdError> {
        let suffix = suffix.into();
        validate_segment(&suffix)?;
        Ok(Self { poster, suffix })
    }

    /// The user who posted the photo.
    #[must_use]
    pub fn poster(&self) -> &UserId {
        &self.poster
    }

    /// The random part of the identifier.
    #[must_use]
    pub fn suffix(&self) -> &str {
        &self.suffix
    }
}

impl FromStr for PhotoId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (Some(poster), Some(suffix), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(IdError::MalformedPhotoId(s.to_string()));
        };
        let poster = poster
            .parse()
            .map_err(|_| IdError::MalformedPhotoId(s.to_string()))?;
        Self::new(poster, suffix).map_err(|_| IdError::MalformedPhotoId(s.to_string()))
    }
}

impl fmt::Debug for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhotoId({self})")
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.poster, self.suffix)
    }
}

impl TryFrom<String> for PhotoId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PhotoId> for String {
    fn from(id: PhotoId) -> Self {
        id.to_string()
    }
}

fn validate_segment(s: &str) -> Result<(), IdError> {
    if s.is_empty() {
        return Err(IdError::Empty);
    }
    if s.len() > MAX_SEGMENT_LEN {
        return Err(IdError::TooLong(s.len()));
    }
    if let Some(c) = s
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(IdError::InvalidCharacter(c));
    }
    Ok(())
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty.
    #[error("identifier is empty")]
    Empty,

    /// The identifier exceeds [`MAX_SEGMENT_LEN`].
    #[error("identifier too long: {0} bytes")]
    TooLong(usize),

    /// The identifier contains a character outside `[A-Za-z0-9_-]`.
    #[error("invalid character in identifier: {0:?}")]
    InvalidCharacter(char),

    /// The user identifier collides with a metadata field name.
    #[error("reserved user identifier: {0}")]
    ReservedUserId(String),

    /// The photo identifier does not have exactly two valid segments.
    #[error("malformed photo identifier: {0}")]
    MalformedPhotoId(String),
}
