//! Common test utilities for Tollgate
//!
//! This module provides the gateway harness, the loopback dispatcher and the
//! helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use url::Url;
use wiremock::MockServer;

use tollgate::{
    middleware::principal::{ORGANIZATION_ID_HEADER, PROJECT_ID_HEADER},
    providers::{ProviderConfig, StaticProviderResolver},
    proxy::{
        AllowedHostSet, DispatchOutcome, Dispatcher, ForwardingEngine, OutboundRequest,
        RecordingEventSink, ReqwestDispatcher,
    },
    routes::create_router,
    usage::InMemoryUsageLimiter,
    AppState, Config,
};

/// Test configuration constants
pub mod constants {
    /// Project used by most tests
    pub const TEST_PROJECT_ID: &str = "proj_test";
    /// Organization owning the test project
    pub const TEST_ORG_ID: &str = "org_test";
    /// Provider credential injected by the gateway
    pub const TEST_PROVIDER_KEY: &str = "Bearer sk-provider-test";
    /// Base URL of the default test provider
    pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
    /// Quota applied by default in tests
    pub const TEST_DEFAULT_LIMIT: i64 = 1_000;
    /// Body limit applied by the test router
    pub const TEST_MAX_BODY_BYTES: usize = 64 * 1024;
}

/// Configuration used by the test router
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        redis_url: "redis://localhost:6379".to_string(),
        upstream_timeout_secs: 5,
        max_body_bytes: constants::TEST_MAX_BODY_BYTES,
        allowed_hosts: None,
        default_ai_tokens_limit: Some(constants::TEST_DEFAULT_LIMIT),
        providers_file: None,
        log_json: false,
    }
}

/// Provider map with `openai` configured for every tenant
pub fn default_providers() -> StaticProviderResolver {
    StaticProviderResolver::new().with(
        "*",
        "openai",
        ProviderConfig::new(constants::OPENAI_BASE_URL)
            .with_header("Authorization", constants::TEST_PROVIDER_KEY),
    )
}

/// Dispatcher that delivers every outbound call to a local mock server.
///
/// The gateway only ever produces `https` URLs for allowlisted hosts; this
/// dispatcher records that URL and then rewrites scheme, host and port so the
/// call lands on wiremock.
pub struct LoopbackDispatcher {
    upstream: Url,
    inner: ReqwestDispatcher,
    targets: Mutex<Vec<Url>>,
}

impl LoopbackDispatcher {
    pub fn new(upstream: &MockServer, timeout: Duration) -> Self {
        let client = ReqwestDispatcher::build_client(timeout).expect("Failed to build client");
        Self {
            upstream: Url::parse(&upstream.uri()).expect("Invalid mock server URI"),
            inner: ReqwestDispatcher::new(client),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// URLs the gateway dispatched to, before rewriting
    pub fn targets(&self) -> Vec<Url> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for LoopbackDispatcher {
    async fn dispatch(&self, mut request: OutboundRequest) -> DispatchOutcome {
        self.targets.lock().unwrap().push(request.url.clone());

        request.url.set_scheme("http").expect("scheme rewrite");
        request
            .url
            .set_host(self.upstream.host_str())
            .expect("host rewrite");
        request
            .url
            .set_port(self.upstream.port())
            .expect("port rewrite");

        self.inner.dispatch(request).await
    }
}

/// A running gateway wired to in-memory components and a mock upstream
pub struct TestHarness {
    pub server: TestServer,
    pub upstream: MockServer,
    pub limiter: Arc<InMemoryUsageLimiter>,
    pub events: Arc<RecordingEventSink>,
    pub dispatcher: Arc<LoopbackDispatcher>,
}

impl TestHarness {
    /// Gateway with the default provider map and limits
    pub async fn new() -> Self {
        Self::with_providers(default_providers()).await
    }

    /// Gateway with a custom provider map
    pub async fn with_providers(providers: StaticProviderResolver) -> Self {
        Self::build(providers, Duration::from_secs(5)).await
    }

    /// Gateway whose outbound timeout is `timeout`
    pub async fn with_timeout(timeout: Duration) -> Self {
        Self::build(default_providers(), timeout).await
    }

    async fn build(providers: StaticProviderResolver, timeout: Duration) -> Self {
        let upstream = MockServer::start().await;
        let config = test_config();

        let limiter = Arc::new(InMemoryUsageLimiter::new(config.default_ai_tokens_limit));
        let events = Arc::new(RecordingEventSink::new());
        let dispatcher = Arc::new(LoopbackDispatcher::new(&upstream, timeout));

        let engine = ForwardingEngine::new(
            Arc::new(providers),
            limiter.clone(),
            dispatcher.clone(),
            AllowedHostSet::default(),
        )
        .with_event_sink(events.clone());

        let state = Arc::new(AppState::new_for_testing(config, engine));
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        Self {
            server,
            upstream,
            limiter,
            events,
            dispatcher,
        }
    }
}

/// Attach the test project's identity headers
pub fn as_project(request: TestRequest) -> TestRequest {
    as_principal(request, constants::TEST_PROJECT_ID, Some(constants::TEST_ORG_ID))
}

/// Attach identity headers for an arbitrary principal
pub fn as_principal(request: TestRequest, project_id: &str, organization_id: Option<&str>) -> TestRequest {
    let request = request.add_header(
        HeaderName::from_static(PROJECT_ID_HEADER),
        HeaderValue::from_str(project_id).expect("invalid project id"),
    );
    match organization_id {
        Some(org) => request.add_header(
            HeaderName::from_static(ORGANIZATION_ID_HEADER),
            HeaderValue::from_str(org).expect("invalid organization id"),
        ),
        None => request,
    }
}

/// Requests the mock upstream has received so far
pub async fn received(upstream: &MockServer) -> Vec<wiremock::Request> {
    upstream.received_requests().await.unwrap_or_default()
}
