//! Upload notice, like, flag and comment handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use photofeed_core::{Comment, PhotoId};

use crate::auth::{TaskAuth, Viewer};
use crate::error::ApiError;
use crate::social::LikeStatus;
use crate::state::AppState;

fn parse_photo(photo_id: &str) -> Result<PhotoId, ApiError> {
    Ok(photo_id.parse()?)
}

/// Flag response.
#[derive(Debug, Serialize)]
pub struct FlagResponse {
    /// The photo.
    pub photo_id: PhotoId,
    /// Flag count after this flag.
    pub flags: i64,
}

/// Photo push response.
#[derive(Debug, Serialize)]
pub struct PhotoPushResponse {
    /// Whether a `new-photo` event was scheduled.
    pub accepted: bool,
    /// The photo, when accepted.
    pub photo_id: Option<PhotoId>,
}

/// Comment request.
#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    /// Comment body.
    pub text: String,
}

/// Comment list response.
#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    /// Comments, oldest first.
    pub comments: Vec<Comment>,
}

/// Like a photo.
pub async fn like(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(photo_id): Path<String>,
) -> Result<Json<LikeStatus>, ApiError> {
    let photo_id = parse_photo(&photo_id)?;
    Ok(Json(state.social.like(&viewer.user_id, &photo_id).await?))
}

/// Withdraw a like.
pub async fn unlike(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(photo_id): Path<String>,
) -> Result<Json<LikeStatus>, ApiError> {
    let photo_id = parse_photo(&photo_id)?;
    Ok(Json(state.social.unlike(&viewer.user_id, &photo_id).await?))
}

/// Flag a photo as inappropriate.
pub async fn flag(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(photo_id): Path<String>,
) -> Result<Json<FlagResponse>, ApiError> {
    let photo_id = parse_photo(&photo_id)?;
    let flags = state.social.flag(&viewer.user_id, &photo_id).await?;
    Ok(Json(FlagResponse { photo_id, flags }))
}

/// Comment on a photo.
pub async fn add_comment(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(photo_id): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<Json<Comment>, ApiError> {
    let photo_id = parse_photo(&photo_id)?;
    Ok(Json(
        state
            .social
            .add_comment(&viewer.user_id, &photo_id, &body.text)?,
    ))
}

/// List the comments on a photo.
pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    _viewer: Viewer,
    Path(photo_id): Path<String>,
) -> Result<Json<CommentsResponse>, ApiError> {
    let photo_id = parse_photo(&photo_id)?;
    let comments = state.social.comments(&photo_id)?;
    Ok(Json(CommentsResponse { comments }))
}

/// Upload pipeline notice that an object was written.
pub async fn photo_push(
    State(state): State<Arc<AppState>>,
    _auth: TaskAuth,
    Path(object_name): Path<String>,
) -> Result<Json<PhotoPushResponse>, ApiError> {
    let photo_id = state.social.photo_pushed(&object_name).await?;
    Ok(Json(PhotoPushResponse {
        accepted: photo_id.is_some(),
        photo_id,
    }))
}
