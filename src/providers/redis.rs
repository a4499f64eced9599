//! Redis-backed provider resolver
//!
//! Reads `ProviderConfig` JSON documents stored under
//! `tollgate:provider:{tenant}:{provider}`.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    error::AppResult,
    providers::{ProviderConfig, ProviderResolver},
    store::redis::{keys, RedisStore},
};

pub struct RedisProviderResolver {
    store: RedisStore,
}

impl RedisProviderResolver {
    pub fn new(store: RedisStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProviderResolver for RedisProviderResolver {
    #[instrument(skip(self))]
    async fn get_provider_config(
        &self,
        tenant: &str,
        provider: &str,
    ) -> AppResult<Option<ProviderConfig>> {
        let config = self
            .store
            .get_json::<ProviderConfig>(&keys::provider_config(tenant, provider))
            .await?;
        debug!(found = config.is_some(), "Provider config lookup");
        Ok(config)
    }
}
