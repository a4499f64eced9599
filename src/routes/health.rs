//! Health endpoints
//!
//! `/health` reports the usage store, `/health/ready` gates traffic on it and
//! `/health/live` only proves the process answers. Quota checks fail closed,
//! so a gateway without its store cannot serve and is reported unhealthy.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    fn status_code(self) -> StatusCode {
        match self {
            HealthStatus::Healthy => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Result of pinging the usage store
#[derive(Debug, Serialize)]
pub struct StoreCheck {
    pub status: HealthStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub usage_store: StoreCheck,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub status: HealthStatus,
}

async fn check_usage_store(state: &AppState) -> StoreCheck {
    let start = Instant::now();
    let result = state.engine.limiter().ping().await;
    let latency_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => StoreCheck {
            status: HealthStatus::Healthy,
            latency_ms,
            error: None,
        },
        Err(e) => StoreCheck {
            status: HealthStatus::Unhealthy,
            latency_ms,
            error: Some(e.to_string()),
        },
    }
}

/// Full health report
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let usage_store = check_usage_store(&state).await;
    let status = usage_store.status;

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        checks: HealthChecks { usage_store },
    };

    (status.status_code(), Json(response))
}

/// Readiness probe: ready only while the usage store answers
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ProbeResponse>) {
    let status = check_usage_store(&state).await.status;
    (status.status_code(), Json(ProbeResponse { status }))
}

/// Liveness probe
pub async fn liveness_check() -> (StatusCode, Json<ProbeResponse>) {
    let status = HealthStatus::Healthy;
    (status.status_code(), Json(ProbeResponse { status }))
}
