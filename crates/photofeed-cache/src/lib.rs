//! Low-latency caches for photofeed.
//!
//! This crate holds the volatile half of the system: the per-user feed lists, the photo metadata
//! hashes (creation date, like-set, flag counter) and the display-name hashes. All of them sit on
//! a [`CacheBackend`], which executes pipelines of typed [`Command`]s:
//!
//! - [`RedisCache`]: a Redis-compatible server through one shared, lazily dialled connection
//! - [`MemoryCache`]: an in-process map with the same command semantics
//!
//! Every operation is a single-key atomic command; nothing here spans keys transactionally.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use photofeed_cache::{FeedLists, MemoryCache, MetadataCache};
//! use photofeed_core::DEFAULT_FEED_CAPACITY;
//!
//! # tokio_test_block_on(async {
//! let backend = Arc::new(MemoryCache::new());
//! let metadata = MetadataCache::new(backend.clone());
//! let feeds = FeedLists::new(backend, DEFAULT_FEED_CAPACITY);
//!
//! let photo = "alice.01".parse().unwrap();
//! assert!(metadata.create_if_absent(&photo, 1_400_000_000).await.unwrap());
//! feeds.append(&"bob".parse().unwrap(), &photo).await.unwrap();
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod command;
pub mod error;
pub mod feed;
pub mod keys;
pub mod memory;
pub mod metadata;
pub mod names;
pub mod remote;

pub use backend::CacheBackend;
pub use command::{Command, Pipeline, Reply};
pub use error::{CacheError, Result};
pub use feed::FeedLists;
pub use memory::MemoryCache;
pub use metadata::{MetadataCache, PhotoSnapshot};
pub use names::NameCache;
pub use remote::RedisCache;
