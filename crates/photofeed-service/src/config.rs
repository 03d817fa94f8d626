//! Service configuration.

use std::time::Duration;

use photofeed_core::FeedPolicy;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/photofeed").
    pub data_dir: String,

    /// Cache server URL, `redis://[:password@]host:port[/db]`.
    ///
    /// When unset, an in-process cache is used.
    pub cache_url: Option<String>,

    /// Per-call cache timeout in milliseconds.
    pub cache_timeout_ms: u64,

    /// Key the task dispatcher presents in `x-api-key` on callbacks.
    pub task_api_key: Option<String>,

    /// Base URL of the task dispatcher.
    ///
    /// When unset, events are handled in process.
    pub dispatcher_url: Option<String>,

    /// Feed capacity, backfill size, flag threshold, page size and fan-out batch size.
    pub policy: FeedPolicy,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = FeedPolicy::default();
        let policy = FeedPolicy {
            feed_capacity: env_parse("FEED_CAPACITY").unwrap_or(defaults.feed_capacity),
            backfill_limit: env_parse("BACKFILL_LIMIT").unwrap_or(defaults.backfill_limit),
            flag_threshold: env_parse("FLAG_THRESHOLD").unwrap_or(defaults.flag_threshold),
            page_size: env_parse("TIMELINE_PAGE_SIZE").unwrap_or(defaults.page_size),
            fanout_batch_size: env_parse("FANOUT_BATCH_SIZE")
                .unwrap_or(defaults.fanout_batch_size),
        };

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/photofeed".into()),
            cache_url: std::env::var("CACHE_URL").ok().filter(|s| !s.is_empty()),
            cache_timeout_ms: env_parse("CACHE_TIMEOUT_MS").unwrap_or(500),
            task_api_key: std::env::var("TASK_API_KEY").ok(),
            dispatcher_url: std::env::var("DISPATCHER_URL").ok().filter(|s| !s.is_empty()),
            policy,
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS").unwrap_or(30),
        }
    }

    /// Per-call cache timeout.
    #[must_use]
    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/photofeed".into(),
            cache_url: None,
            cache_timeout_ms: 500,
            task_api_key: None,
            dispatcher_url: None,
            policy: FeedPolicy::default(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
