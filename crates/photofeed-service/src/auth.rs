//! Request authentication extractors.
//!
//! - `Viewer` - the end user, as already verified by the gateway in front of this service
//! - `TaskAuth` - the task dispatcher calling back with the shared task key

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use photofeed_core::UserId;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the verified user ID.
pub const VERIFIED_USER_HEADER: &str = "x-verified-user";

/// Header carrying the task key.
pub const TASK_KEY_HEADER: &str = "x-api-key";

/// The user on whose behalf a request is made.
///
/// Token verification happens upstream; this only reads the verified identity it forwards.
#[derive(Debug, Clone)]
pub struct Viewer {
    /// The user ID.
    pub user_id: UserId,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(VERIFIED_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(Viewer { user_id })
    }
}

/// A callback from the task dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct TaskAuth;

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for TaskAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get(TASK_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        // Validate against configured task key
        let expected_key = state
            .config
            .task_api_key
            .as_ref()
            .ok_or(ApiError::Unauthorized)?;

        if api_key != expected_key {
            return Err(ApiError::Unauthorized);
        }

        Ok(TaskAuth)
    }
}
