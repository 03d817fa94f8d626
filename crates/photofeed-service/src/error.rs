//! API and event error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use photofeed_cache::CacheError;
use photofeed_core::IdError;
use photofeed_store::StoreError;

// ============================================================================
// Event errors
// ============================================================================

/// How the dispatcher should treat a failed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Infrastructure failure; redelivery may succeed.
    Transient,
    /// The event can never succeed; it should eventually be dropped.
    Integrity,
}

/// A terminal failure of a write-path event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// An identifier in the event is malformed.
    #[error("malformed identifier: {0}")]
    MalformedId(#[from] IdError),

    /// A record the event refers to does not exist.
    #[error("{entity} not found: {id}")]
    Missing {
        /// Kind of record.
        entity: &'static str,
        /// Its identifier.
        id: String,
    },

    /// A user tried to follow themselves.
    #[error("user {0} cannot follow themselves")]
    SelfFollow(String),

    /// The durable store failed.
    #[error("store error: {0}")]
    Store(StoreError),

    /// The cache failed on a step the event cannot skip.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl EventError {
    /// Classify the failure.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::MalformedId(_) | Self::Missing { .. } | Self::SelfFollow(_) => {
                Severity::Integrity
            }
            Self::Store(err) if err.is_transient() => Severity::Transient,
            Self::Store(_) => Severity::Integrity,
            Self::Cache(CacheError::UnexpectedReply { .. }) => Severity::Integrity,
            Self::Cache(_) => Severity::Transient,
        }
    }
}

impl From<StoreError> for EventError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::Missing { entity, id },
            other => Self::Store(other),
        }
    }
}

// ============================================================================
// API errors
// ============================================================================

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The event can never be processed.
    #[error("unprocessable: {0}")]
    Unprocessable(String),

    /// A backing store is unavailable; retry later.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "unprocessable",
                msg.clone(),
            ),
            Self::Unavailable(msg) => {
                tracing::warn!(error = %msg, "Backend unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "unavailable",
                    msg.clone(),
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("{entity} not found: {id}")),
            StoreError::Database(msg) => Self::Unavailable(msg),
            err @ (StoreError::Serialization(_) | StoreError::CorruptKey { .. }) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        match err.severity() {
            Severity::Transient => Self::Unavailable(err.to_string()),
            Severity::Integrity => Self::Unprocessable(err.to_string()),
        }
    }
}
