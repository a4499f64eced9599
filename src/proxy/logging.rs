//! Request logging utilities for provider forwarding
//!
//! Provides structured logging with correlation IDs for tracing a request
//! through each stage of the forwarding pipeline.

use std::time::Instant;
use tracing::{debug, error, info, warn, Span};
use uuid::Uuid;

/// Context for tracking a request through the system
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request (for log correlation)
    pub trace_id: String,
    /// When the request started
    pub start_time: Instant,
    /// Provider name from the inbound path
    pub provider: String,
    /// Inbound HTTP method
    pub method: String,
    /// Raw path suffix forwarded to the provider
    pub path: String,
    /// Calling project
    pub project_id: Option<String>,
}

impl RequestContext {
    /// Create a new request context
    pub fn new(provider: &str, method: &str, path: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4().to_string()[..8].to_string(), // Short ID for readability
            start_time: Instant::now(),
            provider: provider.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            project_id: None,
        }
    }

    /// Set the calling project
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    /// Log request initiation
    pub fn log_request_start(&self) {
        info!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            method = %self.method,
            path = %self.path,
            project_id = ?self.project_id,
            "Forward request started"
        );
    }

    /// Log headers being sent (debug level)
    pub fn log_headers_prepared(&self, header_count: usize) {
        debug!(
            trace_id = %self.trace_id,
            header_count = %header_count,
            "Headers prepared for upstream request"
        );
    }

    /// Log request being sent to upstream
    pub fn log_upstream_request(&self, url: &str, body_size: usize) {
        debug!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            url = %url,
            body_size = %body_size,
            elapsed_ms = %self.elapsed_ms(),
            "Sending request to upstream"
        );
    }

    /// Log response received from upstream
    pub fn log_upstream_response(&self, status: u16, body_size: usize) {
        info!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            status = %status,
            body_size = %body_size,
            elapsed_ms = %self.elapsed_ms(),
            "Response received from upstream"
        );
    }

    /// Log successful request completion
    pub fn log_request_complete(&self, status: u16) {
        info!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            method = %self.method,
            status = %status,
            elapsed_ms = %self.elapsed_ms(),
            project_id = ?self.project_id,
            "Forward request completed"
        );
    }

    /// Log a warning condition
    pub fn log_warning(&self, message: &str) {
        warn!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            elapsed_ms = %self.elapsed_ms(),
            project_id = ?self.project_id,
            message = %message,
            "Warning during request"
        );
    }

    /// Log a refused redirect
    pub fn log_redirect_blocked(&self, status: u16, location: Option<&str>) {
        warn!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            status = %status,
            location = ?location,
            elapsed_ms = %self.elapsed_ms(),
            "Upstream redirect refused"
        );
    }

    /// Log connection error (specific for debugging connectivity issues)
    pub fn log_connection_error(&self, error: &str, url: &str) {
        error!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            url = %url,
            elapsed_ms = %self.elapsed_ms(),
            error = %error,
            "Connection to upstream failed"
        );
    }

    /// Log a usage accounting failure after a successful relay
    pub fn log_accounting_failed(&self, error: &str) {
        error!(
            trace_id = %self.trace_id,
            provider = %self.provider,
            project_id = ?self.project_id,
            error = %error,
            "Usage accounting failed; response is still relayed"
        );
    }

    /// Create a tracing span for this request
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "forward",
            trace_id = %self.trace_id,
            provider = %self.provider,
            method = %self.method,
        )
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new("unknown", "GET", "")
    }
}
