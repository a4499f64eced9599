//! Target URL construction
//!
//! Joins a trusted provider base URL with the untrusted path suffix taken
//! from the inbound request. The suffix may only ever extend the base path:
//! it can never replace the scheme, the authority, or climb out of the base
//! path with dot segments.

use url::Url;

use crate::error::{AppError, AppResult};

/// The only scheme outbound calls may use
pub const SECURE_SCHEME: &str = "https";

/// Build the absolute outbound URL for a provider call.
///
/// `path` is the raw (still percent-encoded) suffix after `/{provider}/`;
/// `query` is the raw inbound query string, without the leading `?`.
pub fn build_target_url(base_url: &str, path: &str, query: Option<&str>) -> AppResult<Url> {
    let base = parse_base(base_url)?;
    let suffix = validate_suffix(path)?;

    let mut target = format!("{}/{}", base_url.trim_end_matches('/'), suffix);
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        if q.contains('#') || q.chars().any(char::is_control) {
            return Err(AppError::InvalidTargetUrl("query contains forbidden characters".into()));
        }
        target.push('?');
        target.push_str(q);
    }

    let url = Url::parse(&target)
        .map_err(|e| AppError::InvalidTargetUrl(format!("composed URL does not parse: {e}")))?;

    if url.scheme() != SECURE_SCHEME {
        return Err(AppError::InvalidTargetUrl(format!(
            "scheme '{}' is not permitted",
            url.scheme()
        )));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(AppError::InvalidTargetUrl("userinfo is not permitted".into()));
    }
    if url.port().is_some() {
        return Err(AppError::InvalidTargetUrl("explicit ports are not permitted".into()));
    }
    // Concatenation must never move the authority
    if url.host_str().is_none() || url.host_str() != base.host_str() {
        return Err(AppError::InvalidTargetUrl("suffix changed the target host".into()));
    }

    Ok(url)
}

/// Parse and check the provider base URL
fn parse_base(base_url: &str) -> AppResult<Url> {
    let base = Url::parse(base_url)
        .map_err(|e| AppError::InvalidTargetUrl(format!("provider base URL is invalid: {e}")))?;

    if base.scheme() != SECURE_SCHEME {
        return Err(AppError::InvalidTargetUrl(format!(
            "provider base URL scheme '{}' is not permitted",
            base.scheme()
        )));
    }
    if base.host_str().is_none() {
        return Err(AppError::InvalidTargetUrl("provider base URL has no host".into()));
    }
    if base.query().is_some() || base.fragment().is_some() {
        return Err(AppError::InvalidTargetUrl(
            "provider base URL must not carry a query or fragment".into(),
        ));
    }
    if !base.username().is_empty() || base.password().is_some() {
        return Err(AppError::InvalidTargetUrl("provider base URL carries userinfo".into()));
    }

    Ok(base)
}

/// Check the client suffix and return it without its leading separator
fn validate_suffix(path: &str) -> AppResult<&str> {
    let suffix = path.strip_prefix('/').unwrap_or(path);

    if suffix.starts_with('/') || suffix.starts_with('\\') {
        return Err(AppError::InvalidTargetUrl("suffix begins with '//'".into()));
    }
    if suffix.chars().any(|c| c.is_control() || c == '\\' || c == '#') {
        return Err(AppError::InvalidTargetUrl("suffix contains forbidden characters".into()));
    }

    let decoded = urlencoding::decode(suffix)
        .map_err(|_| AppError::InvalidTargetUrl("suffix is not valid UTF-8".into()))?;

    if suffix.contains("://") || decoded.contains("://") {
        return Err(AppError::InvalidTargetUrl("suffix contains a scheme delimiter".into()));
    }
    if decoded.starts_with('/') || decoded.contains('\\') || decoded.chars().any(char::is_control) {
        return Err(AppError::InvalidTargetUrl("suffix decodes to forbidden characters".into()));
    }
    if decoded.split('/').any(|segment| segment == "." || segment == "..") {
        return Err(AppError::InvalidTargetUrl("suffix contains dot segments".into()));
    }

    Ok(suffix)
}
