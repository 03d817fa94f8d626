//! Timeline and profile handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use photofeed_core::{Cursor, TimelineEntry, TimelinePage, UserId};

use crate::auth::Viewer;
use crate::error::ApiError;
use crate::state::AppState;

/// Read a page of the viewer's timeline.
///
/// `cursor` is `start` (or `0`) for the first page, otherwise the `next_cursor` of the previous
/// page.
pub async fn get_timeline(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(cursor): Path<String>,
) -> Result<Json<TimelinePage>, ApiError> {
    let cursor: Cursor = cursor
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid cursor: {cursor}")))?;

    let page = state.timeline.get_timeline(&viewer.user_id, &cursor).await?;
    Ok(Json(page))
}

/// Profile query parameters.
#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    /// Only photos created strictly before this epoch second.
    pub before: Option<i64>,
}

/// Profile response.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    /// The user's photos, newest first.
    pub entries: Vec<TimelineEntry>,
}

/// List a user's own photos.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    _viewer: Viewer,
    Path(user_id): Path<String>,
    Query(query): Query<ProfileQuery>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id: UserId = user_id.parse()?;
    let entries = state.social.profile(&user_id, query.before)?;
    Ok(Json(ProfileResponse { entries }))
}
