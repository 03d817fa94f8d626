//! User and follow handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use photofeed_core::{User, UserId};

use crate::auth::Viewer;
use crate::error::ApiError;
use crate::social::{FollowResult, FollowedUser, Stats};
use crate::state::AppState;

/// Registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Name shown next to the user's photos.
    pub display_name: String,
    /// Contact email.
    #[serde(default)]
    pub email: String,
}

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct PersonResponse {
    /// User ID.
    pub user_id: UserId,
    /// Display name.
    pub display_name: String,
}

impl From<User> for PersonResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            display_name: user.display_name,
        }
    }
}

/// Following list response.
#[derive(Debug, Serialize)]
pub struct FollowingResponse {
    /// Followed users.
    pub following: Vec<FollowedUser>,
}

/// Register the viewer.
pub async fn register(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<PersonResponse>, ApiError> {
    let user = state
        .social
        .register_user(viewer.user_id, &body.display_name, &body.email)
        .await?;
    Ok(Json(user.into()))
}

/// Look up a user.
pub async fn get_person(
    State(state): State<Arc<AppState>>,
    _viewer: Viewer,
    Path(user_id): Path<String>,
) -> Result<Json<PersonResponse>, ApiError> {
    let user_id: UserId = user_id.parse()?;
    Ok(Json(state.social.get_person(&user_id)?.into()))
}

/// The viewer's follower and following counts.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> Result<Json<Stats>, ApiError> {
    Ok(Json(state.social.stats(&viewer.user_id)?))
}

/// Users the viewer follows.
pub async fn get_following(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> Result<Json<FollowingResponse>, ApiError> {
    let following = state.social.following(&viewer.user_id).await?;
    Ok(Json(FollowingResponse { following }))
}

/// Follow a user by ID.
pub async fn follow(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(user_id): Path<String>,
) -> Result<Json<FollowResult>, ApiError> {
    let target: UserId = user_id.parse()?;
    Ok(Json(state.social.follow(&viewer.user_id, &target).await?))
}

/// Follow a user by email address.
pub async fn follow_by_email(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(email): Path<String>,
) -> Result<Json<FollowResult>, ApiError> {
    Ok(Json(
        state.social.follow_by_email(&viewer.user_id, &email).await?,
    ))
}
