//! Task dispatcher integration.
//!
//! Follow requests and uploads hand their fan-out work to a dispatcher instead of doing it inline.
//! The dispatcher delivers each event at least once to the `/tasks/*` callbacks; in deployments
//! without one, [`LocalDispatcher`] runs the coordinator in a background task with the same retry
//! contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use photofeed_core::FeedEvent;

use crate::error::{EventError, Severity};
use crate::fanout::{EventOutcome, FanoutCoordinator};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of attempts for an event handled in process.
const LOCAL_MAX_ATTEMPTS: u32 = 5;

/// Initial backoff between attempts (doubles with each attempt).
const LOCAL_INITIAL_BACKOFF_MS: u64 = 100;

/// Maximum backoff between attempts.
const LOCAL_MAX_BACKOFF_MS: u64 = 5000;

/// Timeout for enqueue requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while handing an event to the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The request did not complete.
    #[error("dispatcher request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The dispatcher answered with an error status.
    #[error("dispatcher rejected event ({status}): {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Something that accepts feed events for asynchronous, at-least-once handling.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Enqueue `event`.
    ///
    /// # Errors
    ///
    /// Returns an error if the event could not be handed over.
    async fn enqueue(&self, event: FeedEvent) -> Result<(), DispatchError>;
}

// ============================================================================
// HTTP dispatcher
// ============================================================================

/// Enqueues events with an external task dispatcher over HTTP.
///
/// Each event is `POST`ed as JSON to `{base_url}/tasks/{event-name}`; the dispatcher later calls
/// the matching callback on this service.
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpDispatcher {
    /// Create a dispatcher client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, DispatchError> {
        let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn enqueue(&self, event: FeedEvent) -> Result<(), DispatchError> {
        let url = format!("{}/tasks/{}", self.base_url, event.name());

        let mut request = self.client.post(&url).json(&event);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(event = event.name(), url = %url, "Event enqueued");
        Ok(())
    }
}

// ============================================================================
// In-process dispatcher
// ============================================================================

/// Runs events against the coordinator in background tasks.
///
/// Transient failures are retried with exponential backoff up to a bounded number of attempts;
/// integrity failures are dropped at once.
#[derive(Clone)]
pub struct LocalDispatcher {
    coordinator: Arc<FanoutCoordinator>,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl LocalDispatcher {
    /// Create an in-process dispatcher.
    #[must_use]
    pub fn new(coordinator: Arc<FanoutCoordinator>) -> Self {
        Self {
            coordinator,
            max_attempts: LOCAL_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(LOCAL_INITIAL_BACKOFF_MS),
        }
    }

    /// Override the retry bound and initial backoff.
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    /// Handle `event` now, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once the event is dropped.
    pub async fn run(&self, event: &FeedEvent) -> Result<EventOutcome, EventError> {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match self.coordinator.handle(event).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    attempt += 1;

                    if e.severity() == Severity::Integrity || attempt >= self.max_attempts {
                        tracing::error!(
                            event = event.name(),
                            attempt = %attempt,
                            severity = ?e.severity(),
                            error = %e,
                            "Dropping event"
                        );
                        return Err(e);
                    }

                    tracing::debug!(
                        event = event.name(),
                        attempt = %attempt,
                        backoff_ms = %backoff.as_millis(),
                        error = %e,
                        "Event failed, retrying"
                    );

                    tokio::time::sleep(backoff).await;

                    // Exponential backoff with cap
                    backoff = (backoff * 2).min(Duration::from_millis(LOCAL_MAX_BACKOFF_MS));
                }
            }
        }
    }
}

#[async_trait]
impl Dispatcher for LocalDispatcher {
    async fn enqueue(&self, event: FeedEvent) -> Result<(), DispatchError> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            // Failures are logged by `run`.
            let _ = dispatcher.run(&event).await;
        });
        Ok(())
    }
}
