//! Configuration management for Tollgate
//!
//! Configuration is loaded from environment variables.

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Redis connection URL (usage counters and provider configs)
    pub redis_url: String,

    /// Upper bound for a single outbound call, in seconds
    pub upstream_timeout_secs: u64,
    /// Maximum accepted inbound body size
    pub max_body_bytes: usize,

    /// Destination hosts permitted for outbound calls.
    /// `None` means the built-in provider list.
    pub allowed_hosts: Option<Vec<String>>,

    /// Limit applied to projects with no per-project limit stored.
    /// `None` means such projects are unmetered.
    pub default_ai_tokens_limit: Option<i64>,

    /// Static provider configuration file. When unset, provider configs are
    /// read from Redis.
    pub providers_file: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("TOLLGATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("TOLLGATE_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid TOLLGATE_PORT")?,

            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            upstream_timeout_secs: env::var("TOLLGATE_UPSTREAM_TIMEOUT_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .context("Invalid TOLLGATE_UPSTREAM_TIMEOUT_SECS")?,
            max_body_bytes: env::var("TOLLGATE_MAX_BODY_BYTES")
                .unwrap_or_else(|_| (32 * 1024 * 1024).to_string())
                .parse()
                .context("Invalid TOLLGATE_MAX_BODY_BYTES")?,

            allowed_hosts: env::var("TOLLGATE_ALLOWED_HOSTS")
                .ok()
                .map(|v| parse_host_list(&v))
                .filter(|hosts| !hosts.is_empty()),

            default_ai_tokens_limit: env::var("TOLLGATE_DEFAULT_AI_TOKENS_LIMIT")
                .ok()
                .map(|v| v.parse())
                .transpose()
                .context("Invalid TOLLGATE_DEFAULT_AI_TOKENS_LIMIT")?,

            providers_file: env::var("TOLLGATE_PROVIDERS_FILE").ok(),

            log_json: env::var("TOLLGATE_LOG_JSON")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

/// Split a comma-separated host list, dropping blanks
fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}
