//! Forwarding engine
//!
//! Runs one inbound request through the pipeline:
//!
//! 1. resolve the provider configuration for the tenant
//! 2. build the target URL from the base URL and the client path
//! 3. check the parsed host against the allowlist
//! 4. check the project's quota
//! 5. sanitize headers
//! 6. dispatch once, without following redirects
//! 7. translate the outcome
//! 8. account one usage unit for the relayed response
//!
//! Every check before step 6 short-circuits with no outbound traffic and no
//! usage recorded.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, Instrument};
use url::{Position, Url};

use crate::{
    error::{AppError, AppResult},
    middleware::principal::Principal,
    providers::{normalize_provider_name, ProviderResolver},
    proxy::{
        allowlist::AllowedHostSet,
        audit::{EventSink, SecurityEvent, TracingEventSink},
        dispatch::{DispatchOutcome, Dispatcher, OutboundRequest, UpstreamResponse},
        headers::{filter_response_headers, HeaderPolicy},
        logging::RequestContext,
        target::build_target_url,
    },
    routes::metrics::{record_rejection, record_request, record_usage},
    usage::{UsageKind, UsageLimiter},
};

/// Units charged for one relayed response
const UNITS_PER_REQUEST: i64 = 1;

/// One inbound call
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: Method,
    /// Raw path suffix after `/{provider}`, still percent-encoded. One
    /// leading `/` is ignored.
    pub path: String,
    /// Raw query string without `?`
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Response relayed to the caller
#[derive(Debug, Clone)]
pub struct ForwardResult {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    /// Informational upstream headers (rate limits, request ids)
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ForwardResult {
    fn from_upstream(response: UpstreamResponse) -> Self {
        Self {
            status: response.status,
            content_type: response.content_type().cloned(),
            headers: filter_response_headers(&response.headers),
            body: response.body,
        }
    }
}

impl IntoResponse for ForwardResult {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        if let Some(content_type) = self.content_type {
            response.headers_mut().insert(header::CONTENT_TYPE, content_type);
        }
        response
    }
}

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardStage {
    Resolving,
    Building,
    Validating,
    QuotaChecking,
    HeaderPreparing,
    Dispatching,
    Translating,
    Accounting,
    Replying,
}

impl ForwardStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardStage::Resolving => "resolving",
            ForwardStage::Building => "building",
            ForwardStage::Validating => "validating",
            ForwardStage::QuotaChecking => "quota_checking",
            ForwardStage::HeaderPreparing => "header_preparing",
            ForwardStage::Dispatching => "dispatching",
            ForwardStage::Translating => "translating",
            ForwardStage::Accounting => "accounting",
            ForwardStage::Replying => "replying",
        }
    }
}

/// Stateless request pipeline; shared by all requests
pub struct ForwardingEngine {
    providers: Arc<dyn ProviderResolver>,
    limiter: Arc<dyn UsageLimiter>,
    dispatcher: Arc<dyn Dispatcher>,
    allowlist: Arc<AllowedHostSet>,
    header_policy: HeaderPolicy,
    events: Arc<dyn EventSink>,
}

impl ForwardingEngine {
    pub fn new(
        providers: Arc<dyn ProviderResolver>,
        limiter: Arc<dyn UsageLimiter>,
        dispatcher: Arc<dyn Dispatcher>,
        allowlist: AllowedHostSet,
    ) -> Self {
        Self {
            providers,
            limiter,
            dispatcher,
            allowlist: Arc::new(allowlist),
            header_policy: HeaderPolicy::default(),
            events: Arc::new(TracingEventSink),
        }
    }

    pub fn with_header_policy(mut self, header_policy: HeaderPolicy) -> Self {
        self.header_policy = header_policy;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Usage limiter, exposed for readiness checks
    pub fn limiter(&self) -> &Arc<dyn UsageLimiter> {
        &self.limiter
    }

    /// Forward one request on behalf of `principal`.
    ///
    /// Upstream error statuses are successful results. Every returned error
    /// has already been reported to the event sink.
    pub async fn forward(
        &self,
        principal: &Principal,
        provider: &str,
        request: ForwardRequest,
    ) -> AppResult<ForwardResult> {
        let ctx = RequestContext::new(provider, request.method.as_str(), &request.path)
            .with_project_id(principal.project_id.as_str());
        let span = ctx.create_span();

        let result = self.run(principal, provider, request, &ctx).instrument(span).await;

        let duration = ctx.start_time.elapsed().as_secs_f64();
        match &result {
            Ok(_) => record_request(&ctx.provider, "relayed", duration),
            Err(e) => {
                record_request(&ctx.provider, e.kind(), duration);
                self.events.handle(e, &ctx);
            }
        }

        result
    }

    async fn run(
        &self,
        principal: &Principal,
        provider: &str,
        request: ForwardRequest,
        ctx: &RequestContext,
    ) -> AppResult<ForwardResult> {
        ctx.log_request_start();

        enter(ctx, ForwardStage::Resolving);
        let provider_name = normalize_provider_name(provider)
            .ok_or_else(|| AppError::ProviderNotFound(provider.to_string()))?;
        let config = self
            .providers
            .get_provider_config(&principal.project_id, &provider_name)
            .await?
            .ok_or_else(|| AppError::ProviderNotFound(provider_name.clone()))?;

        enter(ctx, ForwardStage::Building);
        let url = build_target_url(&config.base_url, &request.path, request.query.as_deref())?;

        enter(ctx, ForwardStage::Validating);
        self.validate_host(&url, principal, &provider_name, ctx)?;

        enter(ctx, ForwardStage::QuotaChecking);
        match self.limiter.check_exceeded(&principal.project_id).await {
            Ok(false) => {}
            Ok(true) => {
                record_rejection("quota_exceeded");
                return Err(AppError::QuotaExceeded {
                    project_id: principal.project_id.clone(),
                });
            }
            Err(e) => {
                // Fail closed: unmetered usage is never the fallback
                record_rejection("quota_store_unavailable");
                return Err(AppError::QuotaStoreUnavailable(e.to_string()));
            }
        }

        enter(ctx, ForwardStage::HeaderPreparing);
        let headers = self
            .header_policy
            .sanitize(&request.headers, &config.default_headers)?;
        ctx.log_headers_prepared(headers.len());

        enter(ctx, ForwardStage::Dispatching);
        let loggable_url = url[..Position::AfterPath].to_string();
        ctx.log_upstream_request(&loggable_url, request.body.len());
        let outcome = self
            .dispatcher
            .dispatch(OutboundRequest {
                method: request.method,
                url,
                headers,
                body: request.body,
            })
            .await;

        enter(ctx, ForwardStage::Translating);
        let response = match outcome {
            DispatchOutcome::Responded(response) => response,
            DispatchOutcome::Redirected { status, location } => {
                ctx.log_redirect_blocked(status.as_u16(), location.as_deref());
                return Err(AppError::UpstreamError(format!(
                    "upstream answered with redirect status {}",
                    status
                )));
            }
            DispatchOutcome::Unavailable(detail) => {
                ctx.log_connection_error(&detail, &loggable_url);
                return Err(AppError::UpstreamUnavailable(detail));
            }
            DispatchOutcome::Failed(detail) => {
                ctx.log_connection_error(&detail, &loggable_url);
                return Err(AppError::UpstreamError(detail));
            }
        };
        ctx.log_upstream_response(response.status.as_u16(), response.body.len());
        let result = ForwardResult::from_upstream(response);

        enter(ctx, ForwardStage::Accounting);
        self.account(principal, ctx).await;

        enter(ctx, ForwardStage::Replying);
        ctx.log_request_complete(result.status.as_u16());
        Ok(result)
    }

    /// Allowlist check on the parsed target; emits the audit event on rejection
    fn validate_host(
        &self,
        url: &Url,
        principal: &Principal,
        provider: &str,
        ctx: &RequestContext,
    ) -> AppResult<()> {
        if self.allowlist.permits(url) {
            return Ok(());
        }

        let hostname = url.host_str().unwrap_or_default().to_string();
        self.events.security_violation(&SecurityEvent {
            hostname: hostname.clone(),
            project_id: principal.project_id.clone(),
            provider: provider.to_string(),
            trace_id: ctx.trace_id.clone(),
            timestamp: Utc::now(),
        });
        record_rejection("forbidden_host");
        Err(AppError::ForbiddenHost(hostname))
    }

    /// Record one usage unit.
    ///
    /// The increment runs on its own task so a client disconnect after the
    /// upstream answered cannot drop it halfway. Failures are logged only.
    async fn account(&self, principal: &Principal, ctx: &RequestContext) {
        let limiter = Arc::clone(&self.limiter);
        let principal = principal.clone();
        let kind = UsageKind::AiTokens;

        let outcome = tokio::spawn(async move {
            limiter.increment(&principal, UNITS_PER_REQUEST, kind).await
        })
        .await;

        match outcome {
            Ok(Ok(())) => record_usage(kind.as_str(), UNITS_PER_REQUEST as u64),
            Ok(Err(e)) => ctx.log_accounting_failed(&e.to_string()),
            Err(e) => ctx.log_accounting_failed(&format!("accounting task failed: {e}")),
        }
    }
}

fn enter(ctx: &RequestContext, stage: ForwardStage) {
    debug!(trace_id = %ctx.trace_id, stage = stage.as_str(), "Entering stage");
}
