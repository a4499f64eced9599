//! Proxy module
//!
//! Handles request forwarding to upstream AI providers.

pub mod allowlist;
pub mod audit;
pub mod dispatch;
pub mod engine;
pub mod headers;
pub mod logging;
pub mod target;

pub use allowlist::AllowedHostSet;
pub use audit::{EventSink, SecurityEvent, TracingEventSink};
pub use dispatch::{DispatchOutcome, Dispatcher, OutboundRequest, ReqwestDispatcher, UpstreamResponse};
pub use engine::{ForwardRequest, ForwardResult, ForwardStage, ForwardingEngine};
pub use headers::HeaderPolicy;
pub use logging::RequestContext;

#[cfg(any(test, feature = "test-utils"))]
pub use audit::RecordingEventSink;
