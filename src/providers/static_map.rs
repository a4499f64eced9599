//! Static provider resolver
//!
//! Holds provider configuration in memory. Loaded from a JSON file at
//! startup, or built directly in tests.
//!
//! File format:
//!
//! ```json
//! {
//!   "proj_123": {
//!     "openai": {
//!       "baseUrl": "https://api.openai.com/v1",
//!       "defaultHeaders": { "Authorization": "Bearer sk-..." }
//!     }
//!   }
//! }
//! ```
//!
//! The tenant key `*` applies to every tenant without its own entry.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    providers::{ProviderConfig, ProviderResolver},
};

/// Tenant key matching any tenant
pub const ANY_TENANT: &str = "*";

#[derive(Debug, Default, Clone)]
pub struct StaticProviderResolver {
    tenants: HashMap<String, HashMap<String, ProviderConfig>>,
}

impl StaticProviderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON document described in the module docs
    pub fn from_json(json: &str) -> AppResult<Self> {
        let tenants: HashMap<String, HashMap<String, ProviderConfig>> = serde_json::from_str(json)?;
        let tenants = tenants
            .into_iter()
            .map(|(tenant, providers)| {
                let providers = providers
                    .into_iter()
                    .map(|(name, config)| (name.to_ascii_lowercase(), config))
                    .collect();
                (tenant, providers)
            })
            .collect();
        Ok(Self { tenants })
    }

    /// Load the JSON document from disk
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Add or replace one entry
    pub fn insert(&mut self, tenant: &str, provider: &str, config: ProviderConfig) {
        self.tenants
            .entry(tenant.to_string())
            .or_default()
            .insert(provider.to_ascii_lowercase(), config);
    }

    /// Builder-style [`StaticProviderResolver::insert`]
    pub fn with(mut self, tenant: &str, provider: &str, config: ProviderConfig) -> Self {
        self.insert(tenant, provider, config);
        self
    }
}

#[async_trait]
impl ProviderResolver for StaticProviderResolver {
    async fn get_provider_config(
        &self,
        tenant: &str,
        provider: &str,
    ) -> AppResult<Option<ProviderConfig>> {
        let found = self
            .tenants
            .get(tenant)
            .and_then(|providers| providers.get(provider))
            .or_else(|| {
                self.tenants
                    .get(ANY_TENANT)
                    .and_then(|providers| providers.get(provider))
            });
        Ok(found.cloned())
    }
}
