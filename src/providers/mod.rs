//! Provider configuration lookup
//!
//! Maps a tenant and a provider name to the provider's base URL and default
//! headers. The data is owned by an external store; the gateway only reads it.

pub mod redis;
pub mod static_map;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

pub use self::redis::RedisProviderResolver;
pub use self::static_map::StaticProviderResolver;

/// Per-tenant, per-provider configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Absolute `https` base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Headers added to every outbound call (typically the provider API key)
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }
}

// Default headers carry credentials, so only their names are printed
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.default_headers.keys().collect();
        names.sort();
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("default_headers", &names)
            .finish()
    }
}

/// Source of provider configuration
#[async_trait]
pub trait ProviderResolver: Send + Sync {
    /// Look up the configuration; `Ok(None)` when the tenant has none for
    /// this provider
    async fn get_provider_config(
        &self,
        tenant: &str,
        provider: &str,
    ) -> AppResult<Option<ProviderConfig>>;
}

/// Normalize a provider name from the inbound path.
///
/// Returns `None` for names that cannot be a provider key.
pub fn normalize_provider_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_ascii_lowercase();
    let valid = !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    valid.then_some(name)
}
