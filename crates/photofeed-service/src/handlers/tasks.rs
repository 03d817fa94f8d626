//! Task dispatcher callbacks.
//!
//! A 2xx answer acknowledges the event. 503 (transient) and 422 (integrity) both make the
//! dispatcher redeliver until its own retry bound is reached.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use photofeed_core::UserId;

use crate::auth::TaskAuth;
use crate::error::{ApiError, EventError};
use crate::fanout::{NewFollowOutcome, NewPhotoOutcome};
use crate::state::AppState;

/// `new-photo` task body.
#[derive(Debug, Deserialize)]
pub struct NewPhotoTask {
    /// The uploaded photo.
    pub photo_id: String,
}

/// `new-follow` task body.
#[derive(Debug, Deserialize)]
pub struct NewFollowTask {
    /// The user who follows.
    pub follower_id: String,
    /// The user being followed.
    pub followee_id: String,
}

fn report(event: &'static str, err: EventError) -> ApiError {
    tracing::error!(event, severity = ?err.severity(), error = %err, "Task failed");
    err.into()
}

/// Fan a new photo out to its poster's followers.
pub async fn new_photo(
    State(state): State<Arc<AppState>>,
    _auth: TaskAuth,
    Json(body): Json<NewPhotoTask>,
) -> Result<Json<NewPhotoOutcome>, ApiError> {
    tracing::debug!(photo_id = %body.photo_id, "Processing new-photo task");

    state
        .coordinator
        .handle_new_photo(&body.photo_id)
        .await
        .map(Json)
        .map_err(|e| report("new-photo", e))
}

/// Record a follow and backfill the follower's feed.
pub async fn new_follow(
    State(state): State<Arc<AppState>>,
    _auth: TaskAuth,
    Json(body): Json<NewFollowTask>,
) -> Result<Json<NewFollowOutcome>, ApiError> {
    tracing::debug!(
        follower_id = %body.follower_id,
        followee_id = %body.followee_id,
        "Processing new-follow task"
    );

    let parse = |id: &str| {
        id.parse::<UserId>()
            .map_err(|e| report("new-follow", EventError::from(e)))
    };
    let follower_id = parse(&body.follower_id)?;
    let followee_id = parse(&body.followee_id)?;

    state
        .coordinator
        .handle_new_follow(&follower_id, &followee_id)
        .await
        .map(Json)
        .map_err(|e| report("new-follow", e))
}
