//! Tollgate - single-hop forwarding gateway for AI provider APIs
//!
//! This library provides the core functionality for the Tollgate server.
//! It forwards tenant requests to configured provider APIs with an
//! allowlisted destination, sanitized headers and per-project quotas.

pub mod config;
pub mod error;
pub mod middleware;
pub mod providers;
pub mod proxy;
pub mod routes;
pub mod store;
pub mod usage;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

pub use crate::config::Config;
pub use crate::proxy::{AllowedHostSet, ForwardingEngine};

use crate::{
    providers::{ProviderResolver, RedisProviderResolver, StaticProviderResolver},
    proxy::ReqwestDispatcher,
    store::RedisStore,
    usage::{RedisUsageLimiter, UsageLimiter},
};

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    /// Forwarding pipeline shared by every request
    pub engine: Arc<ForwardingEngine>,
    pub start_time: Instant,
}

impl AppState {
    /// Create a new application state
    pub async fn new(config: Config) -> Result<Self> {
        // Initialize Redis connection
        let store = RedisStore::connect(&config.redis_url)
            .await
            .context("Failed to connect to Redis")?;

        let providers: Arc<dyn ProviderResolver> = match &config.providers_file {
            Some(path) => {
                info!(path = %path, "Loading provider configuration from file");
                Arc::new(
                    StaticProviderResolver::from_file(path)
                        .with_context(|| format!("Failed to load providers file {path}"))?,
                )
            }
            None => Arc::new(RedisProviderResolver::new(store.clone())),
        };

        let limiter: Arc<dyn UsageLimiter> =
            Arc::new(RedisUsageLimiter::new(store, config.default_ai_tokens_limit));

        let allowlist = match &config.allowed_hosts {
            Some(hosts) => AllowedHostSet::new(hosts),
            None => AllowedHostSet::default(),
        };
        info!(hosts = allowlist.len(), "Destination allowlist loaded");

        // Initialize HTTP client with redirects disabled
        let dispatcher = Arc::new(
            ReqwestDispatcher::from_config(&config).context("Failed to build HTTP client")?,
        );

        let engine = ForwardingEngine::new(providers, limiter, dispatcher, allowlist);

        Ok(Self {
            config,
            engine: Arc::new(engine),
            start_time: Instant::now(),
        })
    }

    /// Create an application state around a pre-built engine
    ///
    /// Tests assemble the engine from in-memory components and a dispatcher
    /// pointing at a mock server.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new_for_testing(config: Config, engine: ForwardingEngine) -> Self {
        Self {
            config,
            engine: Arc::new(engine),
            start_time: Instant::now(),
        }
    }
}
