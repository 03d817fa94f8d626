//! Photofeed HTTP service.
//!
//! Two paths share one cache:
//!
//! - the write path ([`FanoutCoordinator`]) consumes `new-photo` and `new-follow` events from the
//!   task dispatcher and pushes photo IDs into follower feeds
//! - the read path ([`TimelineReader`]) pages through a viewer's feed, joining per-photo
//!   metadata and poster names
//!
//! # Authentication
//!
//! End-user requests carry `x-verified-user`, set by the gateway after it has checked the
//! user's token. Task callbacks carry the shared task key in `x-api-key`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers stay async for axum even when the body is sync

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fanout;
pub mod handlers;
pub mod routes;
pub mod social;
pub mod state;
pub mod timeline;

pub use config::ServiceConfig;
pub use dispatch::{DispatchError, Dispatcher, HttpDispatcher, LocalDispatcher};
pub use error::{ApiError, EventError, Severity};
pub use fanout::{EventOutcome, FanoutCoordinator, NewFollowOutcome, NewPhotoOutcome, PhotoDelivery};
pub use routes::create_router;
pub use social::SocialService;
pub use state::{build_cache, build_coordinator, AppState};
pub use timeline::TimelineReader;
