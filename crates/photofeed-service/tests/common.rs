//! Common test utilities for photofeed integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use tempfile::TempDir;

use photofeed_cache::{CacheBackend, CacheError, FeedLists, MemoryCache, Pipeline, Reply};
use photofeed_core::{FeedPolicy, Photo, PhotoId, UserId};
use photofeed_service::{create_router, AppState, ServiceConfig};
use photofeed_store::{RocksStore, Store};

/// Task key the harness configures.
pub const TASK_KEY: &str = "test-task-key";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// The durable store, for seeding photos the upload path would have written.
    pub store: Arc<RocksStore>,
    /// The cache backing every typed cache.
    pub cache: Arc<dyn CacheBackend>,
    /// Policy the service runs with.
    pub policy: FeedPolicy,
}

impl TestHarness {
    /// Create a new test harness with a fresh database and in-process cache.
    pub fn new() -> Self {
        Self::with_policy(FeedPolicy::default())
    }

    /// Create a harness running with `policy`.
    pub fn with_policy(policy: FeedPolicy) -> Self {
        Self::build(policy, Arc::new(MemoryCache::new()))
    }

    /// Create a harness whose cache rejects every command.
    pub fn with_cache_down() -> Self {
        Self::build(FeedPolicy::default(), Arc::new(DownCache))
    }

    fn build(policy: FeedPolicy, cache: Arc<dyn CacheBackend>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            task_api_key: Some(TASK_KEY.to_string()),
            policy,
            ..ServiceConfig::default()
        };

        let state =
            AppState::new(store.clone(), cache.clone(), config).expect("Failed to build state");
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            _temp_dir: temp_dir,
            store,
            cache,
            policy,
        }
    }

    /// Register `user_id` through the API.
    pub async fn register(&self, user_id: &str, display_name: &str) {
        self.server
            .post("/v1/users")
            .add_header("x-verified-user", user_id)
            .json(&serde_json::json!({
                "display_name": display_name,
                "email": format!("{user_id}@example.com"),
            }))
            .await
            .assert_status_ok();
    }

    /// Write a follow edge directly, bypassing the backfill a follow request triggers.
    pub fn follow_edge(&self, follower: &str, followee: &str) {
        self.store
            .follow(&user(follower), &user(followee))
            .expect("Failed to write follow edge");
    }

    /// Persist a photo as the upload path would.
    pub fn seed_photo(&self, poster: &str, suffix: &str, created: i64) -> PhotoId {
        let photo_id = photo(poster, suffix);
        self.store
            .put_photo(&Photo::new(photo_id.clone(), created))
            .expect("Failed to seed photo");
        photo_id
    }

    /// Deliver a `new-photo` task.
    pub async fn deliver_photo(&self, photo_id: &PhotoId) -> axum_test::TestResponse {
        self.server
            .post("/tasks/new-photo")
            .add_header("x-api-key", TASK_KEY)
            .json(&serde_json::json!({ "photo_id": photo_id.to_string() }))
            .await
    }

    /// Deliver a `new-follow` task.
    pub async fn deliver_follow(&self, follower: &str, followee: &str) -> axum_test::TestResponse {
        self.server
            .post("/tasks/new-follow")
            .add_header("x-api-key", TASK_KEY)
            .json(&serde_json::json!({
                "follower_id": follower,
                "followee_id": followee,
            }))
            .await
    }

    /// Read one timeline page as `viewer`.
    pub async fn timeline(&self, viewer: &str, cursor: &str) -> serde_json::Value {
        let response = self
            .server
            .get(&format!("/v1/timeline/{cursor}"))
            .add_header("x-verified-user", viewer)
            .await;
        response.assert_status_ok();
        response.json()
    }

    /// The raw feed list of `user_id`, newest first.
    pub async fn feed(&self, user_id: &str) -> Vec<PhotoId> {
        FeedLists::new(self.cache.clone(), self.policy.feed_capacity)
            .scan(&user(user_id))
            .await
            .expect("Failed to scan feed")
    }

    /// Wait until the feed of `user_id` holds `len` entries.
    ///
    /// Follow requests backfill in the background.
    pub async fn wait_for_feed_len(&self, user_id: &str, len: usize) -> Vec<PhotoId> {
        for _ in 0..100 {
            let feed = self.feed(user_id).await;
            if feed.len() >= len {
                return feed;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("feed of {user_id} never reached {len} entries");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a user ID.
pub fn user(id: &str) -> UserId {
    id.parse().expect("valid user id")
}

/// Build a photo ID.
pub fn photo(poster: &str, suffix: &str) -> PhotoId {
    PhotoId::new(user(poster), suffix).expect("valid photo id")
}

/// Photo IDs listed in a timeline page, in order.
pub fn page_ids(page: &serde_json::Value) -> Vec<String> {
    page["entries"]
        .as_array()
        .expect("entries array")
        .iter()
        .map(|e| e["photoid"].as_str().expect("photoid").to_string())
        .collect()
}

/// A cache whose connection is always refused.
pub struct DownCache;

#[async_trait]
impl CacheBackend for DownCache {
    async fn execute(&self, _pipeline: Pipeline) -> photofeed_cache::Result<Vec<Reply>> {
        Err(CacheError::Connection("connection refused".into()))
    }
}
