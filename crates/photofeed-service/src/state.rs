//! Application state.

use std::sync::Arc;

use photofeed_cache::{
    CacheBackend, CacheError, FeedLists, MemoryCache, MetadataCache, NameCache, RedisCache,
};
use photofeed_store::Store;

use crate::config::ServiceConfig;
use crate::dispatch::{DispatchError, Dispatcher, HttpDispatcher, LocalDispatcher};
use crate::fanout::FanoutCoordinator;
use crate::social::SocialService;
use crate::timeline::TimelineReader;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The durable store.
    pub store: Arc<dyn Store>,

    /// The cache backend, shared by every typed cache.
    pub cache: Arc<dyn CacheBackend>,

    /// Write path.
    pub coordinator: Arc<FanoutCoordinator>,

    /// Read path.
    pub timeline: TimelineReader,

    /// Social operations.
    pub social: SocialService,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create the application state, choosing the dispatcher from the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP dispatcher client cannot be built.
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn CacheBackend>,
        config: ServiceConfig,
    ) -> Result<Self, DispatchError> {
        let coordinator = Arc::new(build_coordinator(&store, &cache, &config));

        let dispatcher: Arc<dyn Dispatcher> = match &config.dispatcher_url {
            Some(url) => {
                tracing::info!(dispatcher_url = %url, "Task dispatcher enabled");
                Arc::new(HttpDispatcher::new(url, config.task_api_key.clone())?)
            }
            None => {
                tracing::warn!("Task dispatcher not configured - events are handled in process");
                Arc::new(LocalDispatcher::new(coordinator.clone()))
            }
        };

        Ok(Self::with_dispatcher(store, cache, coordinator, dispatcher, config))
    }

    /// Create the application state with an explicit dispatcher.
    #[must_use]
    pub fn with_dispatcher(
        store: Arc<dyn Store>,
        cache: Arc<dyn CacheBackend>,
        coordinator: Arc<FanoutCoordinator>,
        dispatcher: Arc<dyn Dispatcher>,
        config: ServiceConfig,
    ) -> Self {
        let policy = config.policy;
        let metadata = MetadataCache::new(cache.clone());
        let names = NameCache::new(cache.clone());
        let feeds = FeedLists::new(cache.clone(), policy.feed_capacity);

        let timeline = TimelineReader::new(feeds, metadata.clone(), names.clone(), policy);
        let social = SocialService::new(store.clone(), metadata, names, dispatcher, policy);

        Self {
            store,
            cache,
            coordinator,
            timeline,
            social,
            config,
        }
    }
}

/// Build the fan-out coordinator for `store` and `cache`.
#[must_use]
pub fn build_coordinator(
    store: &Arc<dyn Store>,
    cache: &Arc<dyn CacheBackend>,
    config: &ServiceConfig,
) -> FanoutCoordinator {
    FanoutCoordinator::new(
        store.clone(),
        MetadataCache::new(cache.clone()),
        FeedLists::new(cache.clone(), config.policy.feed_capacity),
        config.policy,
    )
}

/// Build the cache backend named by the configuration.
///
/// # Errors
///
/// Returns an error if the cache URL is invalid.
pub fn build_cache(config: &ServiceConfig) -> Result<Arc<dyn CacheBackend>, CacheError> {
    match &config.cache_url {
        Some(url) => {
            let cache = RedisCache::new(url, config.cache_timeout())?;
            tracing::info!(timeout_ms = config.cache_timeout_ms, "Redis cache configured");
            Ok(Arc::new(cache))
        }
        None => {
            tracing::warn!("Cache server not configured - using in-process cache");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}
