//! Error types for Tollgate
//!
//! Every failure the forwarding pipeline can produce is a variant of
//! [`AppError`]. The `IntoResponse` impl decides the exact body a caller sees,
//! so internal detail (upstream messages, store errors, credentials) never
//! leaves the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Error code reported to clients when a project is out of quota
pub const QUOTA_EXCEEDED_CODE: &str = "ai_tokens_limit_exceeded";

/// Body returned for forbidden destinations
pub const FORBIDDEN_HOST_MESSAGE: &str =
    "Security Violation: Access to the requested host is restricted.";

/// Body returned for every internal or transport failure
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred in the proxy";

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing principal")]
    MissingPrincipal,

    #[error("Provider '{0}' is not configured")]
    ProviderNotFound(String),

    #[error("Quota exceeded for project {project_id}")]
    QuotaExceeded { project_id: String },

    #[error("Invalid target URL: {0}")]
    InvalidTargetUrl(String),

    #[error("Forbidden host: {0}")]
    ForbiddenHost(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),

    #[error("Quota store unavailable: {0}")]
    QuotaStoreUnavailable(String),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status reported to the caller for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingPrincipal => StatusCode::UNAUTHORIZED,
            AppError::ProviderNotFound(_) => StatusCode::NOT_FOUND,
            AppError::QuotaExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::InvalidTargetUrl(_) => StatusCode::BAD_REQUEST,
            AppError::ForbiddenHost(_) => StatusCode::FORBIDDEN,
            AppError::UpstreamUnavailable(_)
            | AppError::UpstreamError(_)
            | AppError::QuotaStoreUnavailable(_)
            | AppError::RedisError(_)
            | AppError::JsonError(_)
            | AppError::IoError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MissingPrincipal => "missing_principal",
            AppError::ProviderNotFound(_) => "provider_not_found",
            AppError::QuotaExceeded { .. } => "quota_exceeded",
            AppError::InvalidTargetUrl(_) => "invalid_target_url",
            AppError::ForbiddenHost(_) => "forbidden_host",
            AppError::UpstreamUnavailable(_) => "upstream_unavailable",
            AppError::UpstreamError(_) => "upstream_error",
            AppError::QuotaStoreUnavailable(_) => "quota_store_unavailable",
            AppError::RedisError(_) => "redis",
            AppError::JsonError(_) => "json",
            AppError::IoError(_) => "io",
            AppError::Internal(_) => "internal",
        }
    }
}

/// OpenAI-style error envelope used for quota rejections
#[derive(Debug, Serialize)]
pub struct QuotaErrorResponse {
    pub error: QuotaErrorBody,
}

/// Inner quota error body
#[derive(Debug, Serialize)]
pub struct QuotaErrorBody {
    pub message: String,
    pub code: String,
    pub param: serde_json::Map<String, serde_json::Value>,
}

impl QuotaErrorResponse {
    pub fn new() -> Self {
        Self {
            error: QuotaErrorBody {
                message: "You have exceeded your AI usage limit for this project. \
                          Upgrade your plan or wait for the limit to reset."
                    .to_string(),
                code: QUOTA_EXCEEDED_CODE.to_string(),
                param: serde_json::Map::new(),
            },
        }
    }
}

impl Default for QuotaErrorResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::QuotaExceeded { .. } => {
                (status, Json(QuotaErrorResponse::new())).into_response()
            }
            AppError::ForbiddenHost(_) => {
                (status, Json(json!({ "error": FORBIDDEN_HOST_MESSAGE }))).into_response()
            }
            AppError::MissingPrincipal | AppError::ProviderNotFound(_) => {
                (status, Json(json!({ "error": self.to_string() }))).into_response()
            }
            AppError::InvalidTargetUrl(_) => {
                (status, Json(json!({ "error": "Invalid target URL" }))).into_response()
            }
            _ => (status, Json(json!({ "message": INTERNAL_ERROR_MESSAGE }))).into_response(),
        }
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
