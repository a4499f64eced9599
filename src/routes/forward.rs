//! Provider forwarding handler
//!
//! Serves `/{provider}/{*path}` for every method. The path and query are
//! taken raw from the original URI so percent-encoding reaches the
//! upstream untouched.

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, State},
    http::{HeaderMap, Method},
    Extension,
};
use bytes::Bytes;

use crate::{
    error::AppError,
    middleware::principal::Principal,
    proxy::{ForwardRequest, ForwardResult},
    AppState,
};

/// Forward one request to the named provider
pub async fn forward(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    method: Method,
    headers: HeaderMap,
    Extension(principal): Extension<Principal>,
    body: Bytes,
) -> Result<ForwardResult, AppError> {
    let (provider, path) = split_provider_path(uri.path())
        .ok_or_else(|| AppError::ProviderNotFound(String::new()))?;

    let request = ForwardRequest {
        method,
        path: path.to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    state.engine.forward(&principal, provider, request).await
}

/// Split `/{provider}/{rest}` into the provider segment and the raw suffix.
///
/// The suffix keeps its leading separator so a doubled slash after the
/// provider still reaches the target builder as `//`.
fn split_provider_path(raw_path: &str) -> Option<(&str, &str)> {
    let trimmed = raw_path.strip_prefix('/')?;
    let idx = trimmed.find('/')?;
    let (provider, rest) = trimmed.split_at(idx);
    (!provider.is_empty()).then_some((provider, rest))
}
