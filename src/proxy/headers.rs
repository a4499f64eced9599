//! Header utilities for AI provider forwarding
//!
//! Outbound headers are built from an allowlist of inbound headers plus the
//! provider's default headers. Inbound credentials, cookies and topology
//! headers are never forwarded, and provider defaults always win over a
//! client header of the same name.

use std::collections::HashMap;

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::error::{AppError, AppResult};

/// Hop-by-hop headers that must never be forwarded
const HOP_BY_HOP_HEADERS: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Headers that identify the inbound caller or its transport
const DENIED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "keep-alive",
    "authorization",
    "cookie",
    "origin",
    "referer",
    "x-api-key",
    "api-key",
    "forwarded",
    "x-real-ip",
    "via",
];

/// Header name prefixes that are never forwarded
const DENIED_PREFIXES: &[&str] = &["x-forwarded-", "proxy-", "x-tollgate-"];

/// Inbound headers forwarded by default
const DEFAULT_FORWARDED_HEADERS: &[&str] = &["content-type", "accept", "accept-language", "user-agent"];

/// Inbound header prefixes forwarded by default (provider metadata such as
/// `openai-organization` or `anthropic-version`)
const DEFAULT_FORWARDED_PREFIXES: &[&str] = &["openai-", "anthropic-"];

/// Upstream response headers relayed back to the caller besides content-type
const RELAYED_RESPONSE_HEADERS: &[&str] = &["retry-after", "x-request-id", "request-id"];

/// Upstream response header prefixes relayed back to the caller
const RELAYED_RESPONSE_PREFIXES: &[&str] = &["x-ratelimit-"];

/// Check if a header is a hop-by-hop header that should not be forwarded
pub fn is_hop_by_hop_header(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(name)
}

/// Check if a header must never leave the gateway, whatever the allowlist says
pub fn is_denied_header(name: &HeaderName) -> bool {
    let name = name.as_str();
    DENIED_HEADERS.contains(&name) || DENIED_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Inbound header allowlist
#[derive(Debug, Clone)]
pub struct HeaderPolicy {
    forwarded: Vec<String>,
    forwarded_prefixes: Vec<String>,
}

impl HeaderPolicy {
    /// Create a policy forwarding exactly the given names and prefixes
    pub fn new<I, P>(forwarded: I, forwarded_prefixes: P) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Self {
            forwarded: forwarded
                .into_iter()
                .map(|n| n.as_ref().to_ascii_lowercase())
                .collect(),
            forwarded_prefixes: forwarded_prefixes
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether an inbound header may be forwarded
    pub fn is_forwarded(&self, name: &HeaderName) -> bool {
        if is_hop_by_hop_header(name) || is_denied_header(name) {
            return false;
        }
        let name = name.as_str();
        self.forwarded.iter().any(|n| n == name)
            || self.forwarded_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Build the outbound header set.
    ///
    /// Headers named in the inbound `Connection` header are dropped as well.
    /// Provider defaults are applied last and replace any inbound value.
    pub fn sanitize(
        &self,
        inbound: &HeaderMap,
        provider_defaults: &HashMap<String, String>,
    ) -> AppResult<HeaderMap> {
        let connection_listed: Vec<String> = inbound
            .get_all(header::CONNECTION)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|n| n.trim().to_ascii_lowercase())
            .filter(|n| !n.is_empty())
            .collect();

        let mut headers = HeaderMap::new();
        for (name, value) in inbound {
            if self.is_forwarded(name) && !connection_listed.iter().any(|n| n == name.as_str()) {
                headers.append(name.clone(), value.clone());
            }
        }

        for (name, value) in provider_defaults {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Invalid provider header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                AppError::Internal(anyhow::anyhow!("Invalid value for provider header '{}': {}", name, e))
            })?;
            headers.insert(name, value);
        }

        Ok(headers)
    }
}

impl Default for HeaderPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FORWARDED_HEADERS, DEFAULT_FORWARDED_PREFIXES)
    }
}

/// Select the upstream response headers relayed to the caller
///
/// Content-type is handled separately by the reply path.
pub fn filter_response_headers(response_headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::new();

    for (name, value) in response_headers {
        let n = name.as_str();
        if RELAYED_RESPONSE_HEADERS.contains(&n)
            || RELAYED_RESPONSE_PREFIXES.iter().any(|p| n.starts_with(p))
        {
            filtered.append(name.clone(), value.clone());
        }
    }

    filtered
}
