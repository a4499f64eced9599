//! Outbound dispatch
//!
//! A single HTTP call per inbound request. Redirects are never followed and
//! there are no retries. The result is an explicit [`DispatchOutcome`] so the
//! engine can tell "the upstream answered, whatever the status" apart from
//! "the call itself failed".

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use tracing::debug;
use url::Url;

use crate::config::Config;

/// Request handed to the dispatcher after every check has passed
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Fully read upstream response
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.headers.get(header::CONTENT_TYPE)
    }
}

/// What happened to the outbound call
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The upstream answered. Error statuses land here too.
    Responded(UpstreamResponse),
    /// The upstream answered with a 3xx, which is never chased
    Redirected {
        status: StatusCode,
        location: Option<String>,
    },
    /// Connect failure or timeout
    Unavailable(String),
    /// Any other transport failure, including unreadable bodies
    Failed(String),
}

/// Performs the outbound HTTP call
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: OutboundRequest) -> DispatchOutcome;
}

/// `reqwest`-backed dispatcher used in production
pub struct ReqwestDispatcher {
    client: reqwest::Client,
}

impl ReqwestDispatcher {
    /// Wrap an existing client.
    ///
    /// The client must have been built with redirects disabled; use
    /// [`ReqwestDispatcher::build_client`] to get one.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Create a dispatcher with the timeout from configuration
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let client = Self::build_client(Duration::from_secs(config.upstream_timeout_secs))?;
        Ok(Self::new(client))
    }

    /// Build an HTTP client suitable for forwarding
    pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(100)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
    }
}

#[async_trait]
impl Dispatcher for ReqwestDispatcher {
    async fn dispatch(&self, request: OutboundRequest) -> DispatchOutcome {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers);

        // Mirrored as-is, whatever the method
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return DispatchOutcome::Unavailable(e.to_string());
            }
            Err(e) => return DispatchOutcome::Failed(e.to_string()),
        };

        let status = response.status();
        debug!(url = %request.url, status = %status, "Received response from upstream");

        if is_redirect(status) {
            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            return DispatchOutcome::Redirected { status, location };
        }

        let headers = response.headers().clone();
        match response.bytes().await {
            Ok(body) => DispatchOutcome::Responded(UpstreamResponse { status, headers, body }),
            Err(e) if e.is_timeout() => DispatchOutcome::Unavailable(e.to_string()),
            Err(e) => DispatchOutcome::Failed(format!("failed to read upstream body: {e}")),
        }
    }
}

/// 3xx statuses that point elsewhere. 304 only revalidates a cached copy.
fn is_redirect(status: StatusCode) -> bool {
    status.is_redirection() && status != StatusCode::NOT_MODIFIED
}
