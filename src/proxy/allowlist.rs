//! Destination host allowlist
//!
//! The allowlist is the only basis on which an outbound call is permitted.
//! It is built once at startup and handed to the engine, so tests can run
//! against their own host sets.

use std::collections::HashSet;

use tracing::warn;
use url::{Host, Url};

/// Provider API hosts permitted when no override is configured
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "api.openai.com",
    "api.anthropic.com",
    "api.cohere.ai",
    "api.google.com",
    "api.mistral.ai",
    "api.replicate.com",
];

/// Immutable set of permitted destination hostnames
#[derive(Debug, Clone)]
pub struct AllowedHostSet {
    hosts: HashSet<String>,
}

impl AllowedHostSet {
    /// Build a set from hostnames.
    ///
    /// Entries are normalized the same way the URL parser normalizes hosts
    /// (lowercase, punycode). Entries that are not domain names are dropped.
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .filter_map(|raw| match Host::parse(raw.as_ref().trim()) {
                Ok(Host::Domain(domain)) => Some(domain),
                Ok(_) | Err(_) => {
                    warn!(host = %raw.as_ref(), "Ignoring allowlist entry that is not a domain name");
                    None
                }
            })
            .collect();

        Self { hosts }
    }

    /// Whether `hostname` (already parsed and normalized) is a member
    pub fn contains(&self, hostname: &str) -> bool {
        self.hosts.contains(hostname)
    }

    /// Whether the parsed URL's host is permitted.
    ///
    /// Only the parsed host is consulted. IP literals are never permitted.
    pub fn permits(&self, url: &Url) -> bool {
        match url.host() {
            Some(Host::Domain(domain)) => self.contains(domain),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl Default for AllowedHostSet {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_HOSTS)
    }
}
