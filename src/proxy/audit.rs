//! Security audit and error reporting sink
//!
//! The engine reports forbidden destinations and every failed request here.
//! The production sink writes structured `tracing` events; tests swap in a
//! recording sink.

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use crate::{error::AppError, proxy::logging::RequestContext};

/// A rejected outbound destination
#[derive(Debug, Clone)]
pub struct SecurityEvent {
    pub hostname: String,
    pub project_id: String,
    pub provider: String,
    pub trace_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Receives security events and request failures
pub trait EventSink: Send + Sync {
    /// Record a blocked destination
    fn security_violation(&self, event: &SecurityEvent);

    /// Record a failed request with full internal detail
    fn handle(&self, error: &AppError, ctx: &RequestContext);
}

/// Sink writing to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn security_violation(&self, event: &SecurityEvent) {
        warn!(
            target: "tollgate::audit",
            hostname = %event.hostname,
            project_id = %event.project_id,
            provider = %event.provider,
            trace_id = %event.trace_id,
            timestamp = %event.timestamp.to_rfc3339(),
            "Blocked outbound request to host outside the allowlist"
        );
    }

    fn handle(&self, error: &AppError, ctx: &RequestContext) {
        match error {
            // Client-side or policy outcomes, not faults
            AppError::MissingPrincipal
            | AppError::ProviderNotFound(_)
            | AppError::QuotaExceeded { .. }
            | AppError::InvalidTargetUrl(_)
            | AppError::ForbiddenHost(_) => ctx.log_warning(&error.to_string()),
            _ => {
                error!(
                    trace_id = %ctx.trace_id,
                    provider = %ctx.provider,
                    project_id = ?ctx.project_id,
                    kind = error.kind(),
                    error = %error,
                    "Forwarding failed"
                );
            }
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingEventSink;

#[cfg(any(test, feature = "test-utils"))]
mod recording {
    use std::sync::Mutex;

    use super::*;

    /// Sink that keeps everything it receives, for assertions
    #[derive(Debug, Default)]
    pub struct RecordingEventSink {
        security: Mutex<Vec<SecurityEvent>>,
        errors: Mutex<Vec<String>>,
    }

    impl RecordingEventSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn security_events(&self) -> Vec<SecurityEvent> {
            self.security.lock().unwrap().clone()
        }

        /// Error kinds (see [`AppError::kind`]) in the order they were handled
        pub fn error_kinds(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingEventSink {
        fn security_violation(&self, event: &SecurityEvent) {
            self.security.lock().unwrap().push(event.clone());
        }

        fn handle(&self, error: &AppError, _ctx: &RequestContext) {
            self.errors.lock().unwrap().push(error.kind().to_string());
        }
    }
}
