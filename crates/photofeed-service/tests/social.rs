//! Users, follows, likes, comments and profiles.

mod common;

use axum::http::StatusCode;
use common::{photo, TestHarness};
use photofeed_store::Store;
use serde_json::json;

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn register_and_look_up_user() {
    let harness = TestHarness::new();
    harness.register("alice", "Alice").await;

    let response = harness
        .server
        .get("/v1/users/alice")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["user_id"], "alice");
    assert_eq!(body["display_name"], "Alice");
}

#[tokio::test]
async fn register_without_viewer_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/users")
        .json(&json!({ "display_name": "Alice" }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn register_with_blank_name_fails() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/users")
        .add_header("x-verified-user", "alice")
        .json(&json!({ "display_name": "  " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reserved_user_id_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/users")
        .add_header("x-verified-user", "flag")
        .json(&json!({ "display_name": "Flag" }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .get("/v1/users/ghost")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status_not_found();
}

// ============================================================================
// Follows
// ============================================================================

#[tokio::test]
async fn follow_creates_edge_and_backfills() {
    let harness = TestHarness::new();
    harness.register("alice", "Alice").await;
    harness.register("bob", "Bob").await;
    let p1 = harness.seed_photo("alice", "p1", 1_000);

    let response = harness
        .server
        .put("/v1/following/alice")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["followee_id"], "alice");
    assert_eq!(body["edge_created"], true);
    assert_eq!(body["pending"], false);

    assert_eq!(harness.wait_for_feed_len("bob", 1).await, vec![p1]);

    let response = harness
        .server
        .get("/v1/following")
        .add_header("x-verified-user", "bob")
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(
        body["following"],
        json!([{ "user_id": "alice", "name": "Alice" }])
    );

    let response = harness
        .server
        .get("/v1/stats")
        .add_header("x-verified-user", "alice")
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["followers"], 1);
    assert_eq!(body["following"], 0);
}

#[tokio::test]
async fn follow_twice_keeps_one_edge() {
    let harness = TestHarness::new();
    harness.register("alice", "Alice").await;
    harness.register("bob", "Bob").await;

    for expected in [true, false] {
        let response = harness
            .server
            .put("/v1/following/alice")
            .add_header("x-verified-user", "bob")
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["edge_created"], expected);
    }

    let response = harness
        .server
        .get("/v1/stats")
        .add_header("x-verified-user", "bob")
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["following"], 1);
}

#[tokio::test]
async fn follow_self_is_rejected() {
    let harness = TestHarness::new();
    harness.register("alice", "Alice").await;

    let response = harness
        .server
        .put("/v1/following/alice")
        .add_header("x-verified-user", "alice")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn follow_unknown_user_is_not_found() {
    let harness = TestHarness::new();
    harness.register("bob", "Bob").await;

    let response = harness
        .server
        .put("/v1/following/ghost")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn follow_by_email_resolves_registered_address() {
    let harness = TestHarness::new();
    harness.register("alice", "Alice").await;
    harness.register("bob", "Bob").await;

    let response = harness
        .server
        .put("/v1/follow-email/alice@example.com")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["followee_id"], "alice");
    assert_eq!(body["pending"], false);
}

#[tokio::test]
async fn follow_by_unknown_email_is_parked() {
    let harness = TestHarness::new();
    harness.register("bob", "Bob").await;

    let response = harness
        .server
        .put("/v1/follow-email/later@example.com")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["followee_id"].is_null());
    assert_eq!(body["pending"], true);

    let bob = harness
        .store
        .get_user(&common::user("bob"))
        .unwrap()
        .unwrap();
    assert_eq!(bob.pending_follows, vec!["later@example.com".to_string()]);
}

// ============================================================================
// Likes, flags, comments
// ============================================================================

#[tokio::test]
async fn like_and_unlike_update_counts() {
    let harness = TestHarness::new();
    harness.register("alice", "Alice").await;
    let p1 = photo("alice", "p1");
    harness.deliver_photo(&p1).await.assert_status_ok();

    for viewer in ["bob", "carol", "bob"] {
        harness
            .server
            .put(&format!("/v1/photos/{p1}/like"))
            .add_header("x-verified-user", viewer)
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .delete(&format!("/v1/photos/{p1}/like"))
        .add_header("x-verified-user", "carol")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["liked"], false);
    assert_eq!(body["likes"], 1);

    let page = harness.timeline("alice", "start").await;
    assert_eq!(page["entries"][0]["likes"], 1);
}

#[tokio::test]
async fn like_survives_cache_outage() {
    let harness = TestHarness::with_cache_down();

    let response = harness
        .server
        .put("/v1/photos/alice.p1/like")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["liked"], true);
    assert!(body["likes"].is_null());
}

#[tokio::test]
async fn flag_fails_when_cache_is_down() {
    let harness = TestHarness::with_cache_down();

    let response = harness
        .server
        .post("/v1/photos/alice.p1/flag")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn malformed_photo_id_is_bad_request() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .put("/v1/photos/nodot/like")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn comments_are_listed_oldest_first() {
    let harness = TestHarness::new();
    let p1 = photo("alice", "p1");
    let path = format!("/v1/photos/{p1}/comments");

    for (viewer, text) in [("bob", "first"), ("carol", "second")] {
        harness
            .server
            .post(&path)
            .add_header("x-verified-user", viewer)
            .json(&json!({ "text": text }))
            .await
            .assert_status_ok();
    }

    let response = harness
        .server
        .get(&path)
        .add_header("x-verified-user", "alice")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let texts: Vec<_> = body["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[tokio::test]
async fn empty_comment_is_rejected() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/photos/alice.p1/comments")
        .add_header("x-verified-user", "bob")
        .json(&json!({ "text": "   " }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Profile
// ============================================================================

#[tokio::test]
async fn profile_lists_own_photos_newest_first() {
    let harness = TestHarness::new();
    harness.register("alice", "Alice").await;
    let old = harness.seed_photo("alice", "old", 1_000);
    let mid = harness.seed_photo("alice", "mid", 2_000);
    let new = harness.seed_photo("alice", "new", 3_000);

    let response = harness
        .server
        .get("/v1/profile/alice")
        .add_header("x-verified-user", "bob")
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    let ids: Vec<_> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["photoid"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec![new.to_string(), mid.to_string(), old.to_string()]);
    assert_eq!(body["entries"][0]["name"], "Alice");
    assert_eq!(body["entries"][0]["created"], 3_000);

    let response = harness
        .server
        .get("/v1/profile/alice")
        .add_query_param("before", 3_000)
        .add_header("x-verified-user", "bob")
        .await;
    let body: serde_json::Value = response.json();
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    assert_eq!(body["entries"][0]["photoid"], mid.to_string());
}

// ============================================================================
// Upload notices
// ============================================================================

#[tokio::test]
async fn photo_push_schedules_fan_out() {
    let harness = TestHarness::new();
    harness.register("alice", "Alice").await;
    harness.register("bob", "Bob").await;
    harness.follow_edge("bob", "alice");

    let response = harness
        .server
        .post("/photopush/alice.p1.webp")
        .add_header("x-api-key", common::TASK_KEY)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], true);
    assert_eq!(body["photo_id"], "alice.p1");

    let p1 = photo("alice", "p1");
    assert_eq!(harness.wait_for_feed_len("bob", 1).await, vec![p1.clone()]);
    assert_eq!(harness.wait_for_feed_len("alice", 1).await, vec![p1.clone()]);
    assert!(harness.store.get_photo(&p1).unwrap().is_some());
}

#[tokio::test]
async fn photo_push_ignores_non_original_objects() {
    let harness = TestHarness::new();
    harness.register("alice", "Alice").await;

    for name in ["alice.p1", "alice.p1.thumb.webp"] {
        let response = harness
            .server
            .post(&format!("/photopush/{name}"))
            .add_header("x-api-key", common::TASK_KEY)
            .await;

        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["accepted"], false, "{name}");
        assert!(body["photo_id"].is_null());
    }
}

#[tokio::test]
async fn photo_push_with_invalid_poster_is_bad_request() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/photopush/date.p1.webp")
        .add_header("x-api-key", common::TASK_KEY)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn photo_push_requires_task_key() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/photopush/alice.p1.webp")
        .add_header("x-verified-user", "alice")
        .await;

    response.assert_status_unauthorized();
}
