//! Core types for photofeed.
//!
//! This crate provides the vocabulary shared by the store, the cache and the service:
//!
//! - **Identifiers**: `UserId`, `PhotoId` (`{posterID}.{suffix}`)
//! - **Records**: `User`, `Photo`, `Like`, `Comment`
//! - **Events**: `FeedEvent` (`new-photo`, `new-follow`)
//! - **Timelines**: `Cursor`, `TimelineEntry`, `TimelinePage`
//! - **Policy**: `FeedPolicy` (feed capacity, backfill size, flag threshold, page size)
//!
//! # Feed model
//!
//! Every user has a bounded, newest-first list of photo identifiers that is materialized at write
//! time. A new photo is appended to the lists of its poster and all of the poster's followers; a
//! new follow prepends a handful of the followee's most recent photos.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod event;
pub mod ids;
pub mod policy;
pub mod records;
pub mod timeline;

pub use event::FeedEvent;
pub use ids::{IdError, PhotoId, UserId};
pub use policy::{
    FeedPolicy, DEFAULT_BACKFILL_LIMIT, DEFAULT_FANOUT_BATCH_SIZE, DEFAULT_FEED_CAPACITY,
    DEFAULT_FLAG_THRESHOLD, DEFAULT_PAGE_SIZE, MISSING_DATE,
};
pub use records::{Comment, Like, Photo, User};
pub use timeline::{Cursor, TimelineEntry, TimelinePage};
